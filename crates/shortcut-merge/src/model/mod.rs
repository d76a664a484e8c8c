//! Data model types.
//!
//! This module contains:
//! - Values and the arena graph they live in
//! - An owned tree form for building and inspecting graphs
//! - Identifier sets, the per-batch registry, and id generation
//! - Validated merge request records

pub mod id;
pub mod node;
pub mod plist;
pub mod value;
pub mod workflow;

pub use id::{IdGenerator, IdRegistry, IdSets, UuidGenerator};
pub use node::Node;
pub use plist::Plist;
pub use value::{ObjectRef, Value};
pub use workflow::{Excluder, ExclusionRule, InsertRecord, MergeRequest, WorkflowRecord};
