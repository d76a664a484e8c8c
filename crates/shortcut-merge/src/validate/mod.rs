//! Request validation.
//!
//! Checks the shape of a wire request and converts it to a [`MergeRequest`]:
//! - Required fields are present
//! - Indices and positions are non-negative
//! - Payloads are valid base64 (their bplist contents are checked during merge)
//! - Exclusion sentinels are recognised
//!
//! Validation stops at the first problem. Errors name the workflow, or its index
//! when the name itself is missing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::ValidationError;
use crate::merge::request::{RawExcluder, RawExclusionRule, RawIdSets, RawInsert, RawRequest, RawWorkflow};
use crate::model::{Excluder, ExclusionRule, IdSets, InsertRecord, MergeRequest, WorkflowRecord};

/// Integer sentinel meaning "always exclude".
pub const ALWAYS_SENTINEL: i64 = -1;

/// String sentinel meaning "always exclude".
pub const ALWAYS_TAG: &str = "always";

/// Validates a parsed request.
pub fn validate_request(raw: RawRequest) -> Result<MergeRequest, ValidationError> {
    let workflows = raw
        .shortcuts
        .into_iter()
        .enumerate()
        .map(|(index, workflow)| validate_workflow(index, workflow))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MergeRequest { workflows })
}

fn validate_workflow(index: usize, raw: RawWorkflow) -> Result<WorkflowRecord, ValidationError> {
    let Some(name) = raw.name else {
        return Err(ValidationError::MissingField {
            workflow: format!("#{}", index),
            field: "name",
        });
    };
    let encoded = raw.encoded_workflow.ok_or_else(|| ValidationError::MissingField {
        workflow: name.clone(),
        field: "encodedWorkflow",
    })?;
    let workflow = decode_base64(&name, "encodedWorkflow", &encoded)?;

    let exclusions = raw
        .actions_to_remove
        .into_iter()
        .map(|rule| validate_rule(&name, rule))
        .collect::<Result<Vec<_>, _>>()?;
    let inserts = raw
        .inserts
        .into_iter()
        .map(|insert| validate_insert(&name, insert))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WorkflowRecord {
        ids: id_sets(raw.uuids),
        name,
        workflow,
        exclusions,
        inserts,
    })
}

fn validate_rule(workflow: &str, raw: RawExclusionRule) -> Result<ExclusionRule, ValidationError> {
    let action = raw.action.ok_or_else(|| missing(workflow, "action"))?;
    let action = validate_index(workflow, "action", action)?;
    let excluded_by = raw
        .excluded_by
        .into_iter()
        .map(|excluder| validate_excluder(workflow, excluder))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExclusionRule { action, excluded_by })
}

/// Maps a wire excluder to an [`Excluder`]: `-1` and `"always"` are the sentinel,
/// other integers are insert ids, and numeric strings are read as ids.
pub fn validate_excluder(workflow: &str, raw: RawExcluder) -> Result<Excluder, ValidationError> {
    match raw {
        RawExcluder::Id(ALWAYS_SENTINEL) => Ok(Excluder::Always),
        RawExcluder::Id(id) => Ok(Excluder::Insert(id)),
        RawExcluder::Tag(tag) if tag.eq_ignore_ascii_case(ALWAYS_TAG) => Ok(Excluder::Always),
        RawExcluder::Tag(tag) => match tag.trim().parse::<i64>() {
            Ok(ALWAYS_SENTINEL) => Ok(Excluder::Always),
            Ok(id) => Ok(Excluder::Insert(id)),
            Err(_) => Err(ValidationError::InvalidSentinel {
                workflow: workflow.to_string(),
                value: tag,
            }),
        },
    }
}

fn validate_insert(workflow: &str, raw: RawInsert) -> Result<InsertRecord, ValidationError> {
    let id = raw.id.ok_or_else(|| missing(workflow, "id"))?;
    let position = raw.position.ok_or_else(|| missing(workflow, "position"))?;
    let position = validate_index(workflow, "position", position)?;
    let encoded = raw
        .encoded_actions
        .ok_or_else(|| missing(workflow, "encodedActions"))?;
    let actions = decode_base64(workflow, "encodedActions", &encoded)?;

    Ok(InsertRecord {
        id,
        position,
        actions,
        ids: id_sets(raw.uuids),
    })
}

/// Validates that an action index or insert position is non-negative.
pub fn validate_index(workflow: &str, field: &'static str, value: i64) -> Result<usize, ValidationError> {
    usize::try_from(value).map_err(|_| ValidationError::NegativeIndex {
        workflow: workflow.to_string(),
        field,
        value,
    })
}

fn decode_base64(workflow: &str, field: &'static str, encoded: &str) -> Result<Vec<u8>, ValidationError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|_| ValidationError::InvalidBase64 {
            workflow: workflow.to_string(),
            field,
        })
}

fn id_sets(raw: Option<RawIdSets>) -> IdSets {
    let raw = raw.unwrap_or_default();
    IdSets {
        groups: raw.groups,
        vars: raw.vars,
    }
}

fn missing(workflow: &str, field: &'static str) -> ValidationError {
    ValidationError::MissingField {
        workflow: workflow.to_string(),
        field,
    }
}
