//! shortcut-merge: Splice reusable action snippets into binary plist workflows.
//!
//! This crate provides a binary property list (`bplist00`) codec and a merge engine
//! that inserts snippet actions into workflows, drops excluded actions, and rewrites
//! identifier collisions between snippets and the workflows they land in.
//!
//! # Overview
//!
//! - **Graph model**: Decoded documents are arenas of values; containers refer to
//!   their children by index, so shared and cyclic structures survive a round trip
//! - **Original coordinates**: Insert positions and exclusion indices always refer to
//!   the workflow's action array as it was before the merge
//! - **Structural rewriting**: Identifiers are replaced only where a value equals
//!   them exactly, never inside longer strings
//!
//! # Quick Start
//!
//! ```rust
//! use shortcut_merge::codec::{decode, encode};
//! use shortcut_merge::merge::{MergeOptions, Merger};
//! use shortcut_merge::model::{ExclusionRule, IdSets, InsertRecord, MergeRequest, Node, Plist, WorkflowRecord};
//!
//! fn comment(text: &str) -> Node {
//!     Node::dict([("WFCommentActionText", Node::from(text))])
//! }
//!
//! let workflow = Plist::from_node(Node::dict([(
//!     "WFWorkflowActions",
//!     Node::array([comment("A"), comment("B"), comment("C")]),
//! )]));
//! let snippet = Plist::from_node(Node::array([comment("X")]));
//!
//! let record = WorkflowRecord::new("Example", encode(&workflow).unwrap(), IdSets::default())
//!     .exclude(ExclusionRule::always(2))
//!     .insert(InsertRecord {
//!         id: 1,
//!         position: 1,
//!         actions: encode(&snippet).unwrap(),
//!         ids: IdSets::default(),
//!     });
//!
//! let result = Merger::new(MergeOptions::default()).merge(&MergeRequest { workflows: vec![record] });
//! assert!(result.failures.is_empty());
//!
//! let merged = decode(&result.workflows[0].workflow).unwrap().root_node().unwrap();
//! let actions = merged.get("WFWorkflowActions").and_then(Node::as_array).unwrap();
//! assert_eq!(actions, &[comment("A"), comment("X"), comment("B")]);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Values, the graph arena, identifier sets, request records
//! - [`codec`]: Binary plist encoding/decoding
//! - [`merge`]: Merge engine, exclusion policy, identifier rewriting, JSON shapes
//! - [`validate`]: Request validation
//! - [`error`]: Error types
//! - [`limits`]: Format constants and decoder limits
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - Every reference and offset is bounds-checked against the trailer
//! - Lengths are checked against the remaining input before allocating
//! - Resolution is iterative, so deep or cyclic documents cannot overflow the stack
//!
//! # Feature Flags
//!
//! - `parallel`: merge workflows of a batch concurrently with rayon

pub mod codec;
pub mod error;
pub mod limits;
pub mod merge;
pub mod model;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::{decode, encode};
pub use error::{DecodeError, EncodeError, GraphError, MergeError, ValidationError};
pub use merge::{
    merge, merge_request_json, InsertAnchor, MergeOptions, MergeResponse, MergeResult, Merger,
    SamePositionPolicy,
};
pub use model::{
    Excluder, ExclusionRule, IdSets, InsertRecord, MergeRequest, Node, ObjectRef, Plist, Value,
    WorkflowRecord,
};
pub use validate::validate_request;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
