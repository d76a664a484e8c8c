//! Merging snippets into workflows.
//!
//! This module provides:
//! - The merge engine and its options
//! - The exclusion policy for original actions
//! - Structural identifier rewriting
//! - The JSON request and response shapes

pub mod engine;
pub mod exclusion;
pub mod options;
pub mod request;
pub mod rewrite;

pub use engine::{merge, merge_request_json, MergeResult, MergedWorkflow, Merger, WorkflowFailure};
pub use exclusion::{decide, AppliedIds, Decision, ExclusionTable};
pub use options::{InsertAnchor, MergeOptions, SamePositionPolicy};
pub use request::{FailureReport, MergeResponse, MergedShortcut, RawRequest};
pub use rewrite::{IdRewriter, Rename};
