//! Binary plist encoding and decoding.
//!
//! This module handles the `bplist00` wire format:
//! - Primitive big-endian reads and writes
//! - Object markers and per-object bodies
//! - Header, offset table, and trailer

pub mod document;
pub mod primitives;
pub mod value;

pub use document::{decode, encode, read_trailer, Trailer};
pub use primitives::{Reader, Writer};
