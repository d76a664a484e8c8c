//! Validated merge request records.
//!
//! These are built from the wire request by [`crate::validate::validate_request`];
//! every required field is present and every payload is already base64-decoded.

use crate::model::IdSets;

/// Who triggers an exclusion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Excluder {
    /// Drop the action unconditionally.
    Always,
    /// Drop the action if the insert with this id is applied.
    Insert(i64),
}

/// A directive to drop the original action at `action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRule {
    /// 0-based index into the original (pre-merge) action array.
    pub action: usize,
    pub excluded_by: Vec<Excluder>,
}

impl ExclusionRule {
    /// Creates a rule that always drops `action`.
    pub fn always(action: usize) -> Self {
        Self {
            action,
            excluded_by: vec![Excluder::Always],
        }
    }

    /// Creates a rule that drops `action` when any of `inserts` is applied.
    pub fn when_applied(action: usize, inserts: impl IntoIterator<Item = i64>) -> Self {
        Self {
            action,
            excluded_by: inserts.into_iter().map(Excluder::Insert).collect(),
        }
    }
}

/// A snippet to splice into a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertRecord {
    pub id: i64,
    /// Index into the original action array.
    pub position: usize,
    /// Encoded bplist holding the snippet's actions.
    pub actions: Vec<u8>,
    pub ids: IdSets,
}

/// A workflow and everything to merge into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRecord {
    pub name: String,
    /// Encoded bplist of the workflow.
    pub workflow: Vec<u8>,
    /// Identifiers the workflow itself defines.
    pub ids: IdSets,
    pub exclusions: Vec<ExclusionRule>,
    pub inserts: Vec<InsertRecord>,
}

impl WorkflowRecord {
    /// Creates a record with no exclusions or inserts.
    pub fn new(name: impl Into<String>, workflow: Vec<u8>, ids: IdSets) -> Self {
        Self {
            name: name.into(),
            workflow,
            ids,
            exclusions: Vec::new(),
            inserts: Vec::new(),
        }
    }

    /// Adds an exclusion rule.
    pub fn exclude(mut self, rule: ExclusionRule) -> Self {
        self.exclusions.push(rule);
        self
    }

    /// Adds an insert.
    pub fn insert(mut self, insert: InsertRecord) -> Self {
        self.inserts.push(insert);
        self
    }
}

/// A batch of workflows to merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRequest {
    pub workflows: Vec<WorkflowRecord>,
}
