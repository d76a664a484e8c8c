//! JSON request and response shapes.
//!
//! Every sequence field also accepts a bare value, which is read as a one-element
//! sequence, and `null` or absence, which is read as empty. The raw types here only
//! describe the wire shape; [`crate::validate::validate_request`] turns them into
//! [`MergeRequest`].

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;
use crate::model::MergeRequest;
use crate::validate::validate_request;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Deserializes a sequence that may arrive as a single value or `null`.
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
    })
}

/// A merge request as received.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub shortcuts: Vec<RawWorkflow>,
}

/// Top-level shape. Workflows stay untyped so each one reports its own errors.
#[derive(Deserialize)]
struct Envelope {
    #[serde(default, deserialize_with = "one_or_many")]
    shortcuts: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWorkflow {
    pub name: Option<String>,
    /// Base64 bplist.
    #[serde(alias = "shortcut")]
    pub encoded_workflow: Option<String>,
    #[serde(default)]
    pub uuids: Option<RawIdSets>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub actions_to_remove: Vec<RawExclusionRule>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub inserts: Vec<RawInsert>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIdSets {
    #[serde(default, deserialize_with = "one_or_many")]
    pub groups: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExclusionRule {
    #[serde(alias = "actions")]
    pub action: Option<i64>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub excluded_by: Vec<RawExcluder>,
}

/// An insert id, or a tag such as `"always"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawExcluder {
    Id(i64),
    Tag(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInsert {
    pub id: Option<i64>,
    pub position: Option<i64>,
    /// Base64 bplist.
    #[serde(alias = "actions")]
    pub encoded_actions: Option<String>,
    #[serde(default)]
    pub uuids: Option<RawIdSets>,
}

/// Parses a JSON request without validating it.
///
/// A workflow of the wrong shape is reported under its `name`, or `#index` when
/// it has none.
pub fn parse_raw(json: &str) -> Result<RawRequest, ValidationError> {
    let envelope: Envelope =
        serde_json::from_str(json).map_err(|e| ValidationError::Json(e.to_string()))?;
    let shortcuts = envelope
        .shortcuts
        .into_iter()
        .enumerate()
        .map(|(index, entry)| parse_workflow(index, entry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawRequest { shortcuts })
}

fn parse_workflow(index: usize, entry: serde_json::Value) -> Result<RawWorkflow, ValidationError> {
    let label = match entry.get("name").and_then(serde_json::Value::as_str) {
        Some(name) => name.to_string(),
        None => format!("#{}", index),
    };
    serde_json::from_value(entry).map_err(|e| ValidationError::MalformedWorkflow {
        workflow: label,
        message: e.to_string(),
    })
}

impl MergeRequest {
    /// Parses and validates a JSON request.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        validate_request(parse_raw(json)?)
    }
}

/// The JSON response. Only changed workflows are listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResponse {
    pub shortcuts: Vec<MergedShortcut>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FailureReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedShortcut {
    pub name: String,
    /// Base64 bplist.
    pub encoded_workflow: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub name: String,
    pub message: String,
}

impl MergeResponse {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
