//! The merge engine.
//!
//! For each workflow:
//! 1. Decode it and read its action array (the "original" array of length `N`)
//! 2. For each insert in request order: decode its actions, rewrite identifiers that
//!    collide with the workflow's own, copy them into the workflow, and stage them at
//!    their position
//! 3. Walk the original array, emitting staged actions around each original action
//!    and dropping the actions the exclusion rules remove
//! 4. Re-encode the workflow if anything was inserted or dropped
//!
//! Positions and exclusion indices always refer to the original array. Each
//! workflow is merged independently with its own identifier registry; one failing
//! workflow does not stop the others.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustc_hash::FxHashMap;
use tracing::{debug, debug_span, warn};

use crate::codec::{decode, encode};
use crate::error::{MergeError, ValidationError};
use crate::limits::ACTIONS_KEY;
use crate::merge::exclusion::{decide, AppliedIds, Decision, ExclusionTable};
use crate::merge::options::{InsertAnchor, MergeOptions, SamePositionPolicy};
use crate::merge::request::{FailureReport, MergeResponse, MergedShortcut};
use crate::merge::rewrite::IdRewriter;
use crate::model::{
    IdGenerator, IdRegistry, MergeRequest, ObjectRef, Plist, UuidGenerator, Value, WorkflowRecord,
};

/// A workflow that changed during the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedWorkflow {
    pub name: String,
    /// Encoded bplist.
    pub workflow: Vec<u8>,
}

/// A workflow whose merge was abandoned.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowFailure {
    pub name: String,
    pub error: MergeError,
}

/// Outcome of merging a batch. Unchanged workflows appear in neither list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    pub workflows: Vec<MergedWorkflow>,
    pub failures: Vec<WorkflowFailure>,
}

impl MergeResult {
    /// Converts to the JSON response shape, base64-encoding each workflow.
    pub fn to_response(&self) -> MergeResponse {
        MergeResponse {
            shortcuts: self
                .workflows
                .iter()
                .map(|w| MergedShortcut {
                    name: w.name.clone(),
                    encoded_workflow: STANDARD.encode(&w.workflow),
                })
                .collect(),
            errors: self
                .failures
                .iter()
                .map(|f| FailureReport {
                    name: f.name.clone(),
                    message: f.error.to_string(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        self.to_response().to_json()
    }
}

/// Merges snippets into workflows.
///
/// `G` supplies replacement identifiers. Each workflow gets its own clone, so a
/// deterministic generator produces the same sequence for every workflow.
#[derive(Debug, Clone, Default)]
pub struct Merger<G = UuidGenerator> {
    options: MergeOptions,
    generator: G,
}

impl Merger<UuidGenerator> {
    /// Creates a merger generating random UUIDs.
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            generator: UuidGenerator,
        }
    }
}

impl<G> Merger<G> {
    /// Creates a merger with a custom identifier generator.
    pub fn with_generator(options: MergeOptions, generator: G) -> Self {
        Self { options, generator }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }
}

impl<G: IdGenerator + Clone + Send + Sync> Merger<G> {
    /// Merges every workflow of `request`, keeping request order.
    pub fn merge(&self, request: &MergeRequest) -> MergeResult {
        #[cfg(feature = "parallel")]
        let outcomes: Vec<_> = {
            use rayon::prelude::*;
            request
                .workflows
                .par_iter()
                .map(|record| (record, self.merge_workflow(record)))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<_> = request
            .workflows
            .iter()
            .map(|record| (record, self.merge_workflow(record)))
            .collect();

        let mut result = MergeResult::default();
        for (record, outcome) in outcomes {
            match outcome {
                Ok(Some(workflow)) => result.workflows.push(MergedWorkflow {
                    name: record.name.clone(),
                    workflow,
                }),
                Ok(None) => {}
                Err(error) => {
                    warn!(workflow = %record.name, %error, "workflow merge failed");
                    result.failures.push(WorkflowFailure {
                        name: record.name.clone(),
                        error,
                    });
                }
            }
        }
        result
    }

    /// Merges a single workflow. Returns `None` when nothing changed.
    pub fn merge_workflow(&self, record: &WorkflowRecord) -> Result<Option<Vec<u8>>, MergeError> {
        let span = debug_span!("merge_workflow", name = %record.name);
        let _enter = span.enter();

        let mut plist = decode(&record.workflow).map_err(MergeError::Workflow)?;
        let actions_ref = plist
            .dict_get(plist.root(), ACTIONS_KEY)
            .ok_or(MergeError::MissingActions)?;
        let original: Vec<ObjectRef> = plist
            .get(actions_ref)
            .and_then(Value::as_array)
            .ok_or(MergeError::MissingActions)?
            .to_vec();

        let registry = IdRegistry::seed_batch(&record.ids, record.inserts.iter().map(|i| &i.ids));
        let mut generator = self.generator.clone();
        let mut rewriter = IdRewriter::new(registry, &mut generator);

        let mut staged: FxHashMap<usize, Vec<ObjectRef>> = FxHashMap::default();
        let mut applied = AppliedIds::new();
        for insert in &record.inserts {
            let mut fragment = decode(&insert.actions).map_err(|source| MergeError::Insert {
                insert: insert.id,
                source,
            })?;
            let actions = fragment_actions(&fragment).ok_or(MergeError::InvalidActions { insert: insert.id })?;
            let renames = rewriter.rewrite(&insert.ids, &record.ids, &mut fragment);
            let imported = plist.import_all(&fragment, &actions)?;

            debug!(
                insert = insert.id,
                position = insert.position,
                actions = imported.len(),
                renamed = renames.len(),
                "staged insert"
            );
            match self.options.same_position {
                SamePositionPolicy::Replace => {
                    if staged.insert(insert.position, imported).is_some() {
                        debug!(position = insert.position, "replaced earlier insert at same position");
                    }
                }
                SamePositionPolicy::Concatenate => {
                    staged.entry(insert.position).or_default().extend(imported);
                }
            }
            applied.insert(insert.id);
        }

        let exclusions = ExclusionTable::new(&record.exclusions);
        let mut merged = Vec::with_capacity(original.len() + staged.values().map(Vec::len).sum::<usize>());
        let mut dirty = false;
        let mut splice = |position: usize, merged: &mut Vec<ObjectRef>| {
            if let Some(items) = staged.remove(&position) {
                merged.extend(items);
                true
            } else {
                false
            }
        };

        for (index, &action) in original.iter().enumerate() {
            if self.options.anchor == InsertAnchor::Before {
                dirty |= splice(index, &mut merged);
            }
            match decide(exclusions.rule_for(index), &applied) {
                Decision::Keep => merged.push(action),
                Decision::Drop => {
                    debug!(action = index, "dropped action");
                    dirty = true;
                }
            }
            if self.options.anchor == InsertAnchor::After {
                dirty |= splice(index, &mut merged);
            }
        }
        if self.options.anchor == InsertAnchor::Before {
            dirty |= splice(original.len(), &mut merged);
        }

        for (position, items) in &staged {
            warn!(
                position,
                actions = items.len(),
                len = original.len(),
                "insert position outside action array; not spliced"
            );
        }

        if !dirty {
            debug!("workflow unchanged");
            return Ok(None);
        }
        plist.replace(actions_ref, Value::Array(merged))?;
        Ok(Some(encode(&plist)?))
    }
}

/// The actions of a snippet: a bare array, or a workflow dict's action array.
fn fragment_actions(fragment: &Plist) -> Option<Vec<ObjectRef>> {
    let actions = match fragment.root_value()? {
        Value::Array(items) => items,
        Value::Dict(_) => {
            let r = fragment.dict_get(fragment.root(), ACTIONS_KEY)?;
            fragment.get(r)?.as_array()?
        }
        _ => return None,
    };
    Some(actions.to_vec())
}

/// Merges with default options and random UUIDs.
pub fn merge(request: &MergeRequest) -> MergeResult {
    Merger::new(MergeOptions::default()).merge(request)
}

/// Parses, validates and merges a JSON request.
pub fn merge_request_json(json: &str) -> Result<MergeResponse, ValidationError> {
    let request = MergeRequest::from_json(json)?;
    Ok(merge(&request).to_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::model::{ExclusionRule, IdSets, InsertRecord, Node};

    #[derive(Debug, Clone)]
    struct Sequence {
        n: u32,
    }

    impl IdGenerator for Sequence {
        fn next_id(&mut self) -> String {
            self.n += 1;
            format!("NEW-{}", self.n)
        }
    }

    fn action(text: &str) -> Node {
        Node::dict([
            ("WFWorkflowActionIdentifier", Node::from("is.workflow.actions.comment")),
            (
                "WFWorkflowActionParameters",
                Node::dict([("WFCommentActionText", Node::from(text))]),
            ),
        ])
    }

    fn workflow(texts: &[&str]) -> Vec<u8> {
        let node = Node::dict([
            ("WFWorkflowActions", Node::array(texts.iter().map(|t| action(t)))),
            ("WFWorkflowClientVersion", Node::from("1146.14")),
        ]);
        encode(&Plist::from_node(node)).unwrap()
    }

    fn snippet(texts: &[&str]) -> Vec<u8> {
        encode(&Plist::from_node(Node::dict([(
            "WFWorkflowActions",
            Node::array(texts.iter().map(|t| action(t))),
        )])))
        .unwrap()
    }

    fn insert(id: i64, position: usize, texts: &[&str]) -> InsertRecord {
        InsertRecord {
            id,
            position,
            actions: snippet(texts),
            ids: IdSets::default(),
        }
    }

    fn texts(encoded: &[u8]) -> Vec<String> {
        let root = decode(encoded).unwrap().root_node().unwrap();
        root.get("WFWorkflowActions")
            .and_then(Node::as_array)
            .unwrap()
            .iter()
            .map(|a| {
                a.get("WFWorkflowActionParameters")
                    .and_then(|p| p.get("WFCommentActionText"))
                    .and_then(Node::as_str)
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    fn merge_one(options: MergeOptions, record: WorkflowRecord) -> Option<Vec<String>> {
        let merger = Merger::with_generator(options, Sequence { n: 0 });
        merger.merge_workflow(&record).unwrap().map(|bytes| texts(&bytes))
    }

    fn abc() -> WorkflowRecord {
        WorkflowRecord::new("abc", workflow(&["A", "B", "C"]), IdSets::default())
    }

    #[test]
    fn test_no_op_not_reported() {
        let request = MergeRequest { workflows: vec![abc()] };
        let result = merge(&request);
        assert!(result.workflows.is_empty());
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_unconditional_exclusion() {
        let record = abc().exclude(ExclusionRule::always(2));
        assert_eq!(merge_one(MergeOptions::new(), record).unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_conditional_exclusion_unfired() {
        let record = abc().exclude(ExclusionRule::when_applied(1, [5]));
        assert_eq!(merge_one(MergeOptions::new(), record), None);
    }

    #[test]
    fn test_conditional_exclusion_fired() {
        let record = abc()
            .exclude(ExclusionRule::when_applied(1, [5]))
            .insert(insert(5, 0, &["X"]));
        assert_eq!(merge_one(MergeOptions::new(), record).unwrap(), vec!["X", "A", "C"]);
    }

    #[test]
    fn test_insertion_before_anchor() {
        let record = abc().insert(insert(1, 1, &["X", "Y"]));
        assert_eq!(
            merge_one(MergeOptions::new(), record).unwrap(),
            vec!["A", "X", "Y", "B", "C"]
        );
    }

    #[test]
    fn test_insertion_after_anchor() {
        let record = abc().insert(insert(1, 1, &["X", "Y"]));
        let options = MergeOptions::new().with_anchor(InsertAnchor::After);
        assert_eq!(merge_one(options, record).unwrap(), vec!["A", "B", "X", "Y", "C"]);
    }

    #[test]
    fn test_after_anchor_survives_excluded_action() {
        let record = abc()
            .exclude(ExclusionRule::always(1))
            .insert(insert(1, 1, &["X"]));
        assert_eq!(merge_one(MergeOptions::legacy(), record).unwrap(), vec!["A", "X", "C"]);
    }

    #[test]
    fn test_positions_use_original_coordinates() {
        let record = abc()
            .exclude(ExclusionRule::always(0))
            .insert(insert(1, 2, &["X"]))
            .insert(insert(2, 3, &["Z"]));
        assert_eq!(
            merge_one(MergeOptions::new(), record).unwrap(),
            vec!["B", "X", "C", "Z"]
        );
    }

    #[test]
    fn test_position_past_end() {
        // With After, position N is never reached but its id still counts as applied.
        let record = abc()
            .exclude(ExclusionRule::when_applied(0, [9]))
            .insert(insert(9, 3, &["X"]));
        let options = MergeOptions::new().with_anchor(InsertAnchor::After);
        assert_eq!(merge_one(options, record).unwrap(), vec!["B", "C"]);

        let record = abc().insert(insert(9, 7, &["X"]));
        assert_eq!(merge_one(MergeOptions::new(), record), None);
    }

    #[test]
    fn test_same_position_policies() {
        let record = abc().insert(insert(1, 1, &["X"])).insert(insert(2, 1, &["Y"]));

        assert_eq!(
            merge_one(MergeOptions::new(), record.clone()).unwrap(),
            vec!["A", "Y", "B", "C"]
        );
        let options = MergeOptions::new().with_same_position(SamePositionPolicy::Concatenate);
        assert_eq!(merge_one(options, record).unwrap(), vec!["A", "X", "Y", "B", "C"]);
    }

    #[test]
    fn test_bare_array_payload() {
        let payload = encode(&Plist::from_node(Node::array([action("X")]))).unwrap();
        let record = abc().insert(InsertRecord {
            id: 1,
            position: 0,
            actions: payload,
            ids: IdSets::default(),
        });
        assert_eq!(merge_one(MergeOptions::new(), record).unwrap(), vec!["X", "A", "B", "C"]);
    }

    #[test]
    fn test_empty_insert_marks_dirty() {
        let record = abc().insert(insert(1, 1, &[]));
        assert_eq!(merge_one(MergeOptions::new(), record).unwrap(), vec!["A", "B", "C"]);
    }

    fn uuid_action(uuid: &str, group: &str) -> Node {
        Node::dict([
            ("WFWorkflowActionIdentifier", Node::from("is.workflow.actions.conditional")),
            (
                "WFWorkflowActionParameters",
                Node::dict([
                    ("UUID", Node::from(uuid)),
                    ("GroupingIdentifier", Node::from(group)),
                    ("WFCommentActionText", Node::from(format!("uses {}", uuid))),
                ]),
            ),
        ])
    }

    fn params(encoded: &[u8], index: usize, key: &str) -> String {
        let root = decode(encoded).unwrap().root_node().unwrap();
        let actions = root.get("WFWorkflowActions").and_then(Node::as_array).unwrap();
        actions[index]
            .get("WFWorkflowActionParameters")
            .and_then(|p| p.get(key))
            .and_then(Node::as_str)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_colliding_identifiers_rewritten() {
        let target = encode(&Plist::from_node(Node::dict([(
            "WFWorkflowActions",
            Node::array([uuid_action("U1", "G1")]),
        )])))
        .unwrap();
        let payload = encode(&Plist::from_node(Node::array([uuid_action("U1", "G1")]))).unwrap();
        let record = WorkflowRecord::new("w", target, IdSets::new(["G1"], ["U1"])).insert(InsertRecord {
            id: 1,
            position: 1,
            actions: payload,
            ids: IdSets::new(["G1"], ["U1", "NEW-2"]),
        });

        let merger = Merger::with_generator(MergeOptions::new(), Sequence { n: 0 });
        let merged = merger.merge_workflow(&record).unwrap().unwrap();

        assert_eq!(params(&merged, 0, "UUID"), "U1");
        assert_eq!(params(&merged, 0, "GroupingIdentifier"), "G1");
        // NEW-2 is already defined by the insert, so it is skipped
        assert_eq!(params(&merged, 1, "GroupingIdentifier"), "NEW-1");
        assert_eq!(params(&merged, 1, "UUID"), "NEW-3");
        assert_eq!(params(&merged, 1, "WFCommentActionText"), "uses U1");
    }

    #[test]
    fn test_replacement_avoids_later_insert_ids() {
        let target = encode(&Plist::from_node(Node::dict([(
            "WFWorkflowActions",
            Node::array([uuid_action("U1", "G1")]),
        )])))
        .unwrap();
        let first = encode(&Plist::from_node(Node::array([uuid_action("U1", "GX")]))).unwrap();
        let second = encode(&Plist::from_node(Node::array([uuid_action("NEW-1", "G2")]))).unwrap();
        let record = WorkflowRecord::new("w", target, IdSets::new(["G1"], ["U1"]))
            .insert(InsertRecord {
                id: 1,
                position: 0,
                actions: first,
                ids: IdSets::new(["GX"], ["U1"]),
            })
            .insert(InsertRecord {
                id: 2,
                position: 1,
                actions: second,
                ids: IdSets::new(["G2"], ["NEW-1"]),
            });

        let merger = Merger::with_generator(MergeOptions::new(), Sequence { n: 0 });
        let merged = merger.merge_workflow(&record).unwrap().unwrap();

        // NEW-1 belongs to insert 2, which has not been staged when insert 1 is rewritten
        assert_eq!(params(&merged, 0, "UUID"), "NEW-2");
        assert_eq!(params(&merged, 0, "GroupingIdentifier"), "GX");
        assert_eq!(params(&merged, 1, "UUID"), "U1");
        assert_eq!(params(&merged, 2, "UUID"), "NEW-1");
        assert_eq!(params(&merged, 2, "GroupingIdentifier"), "G2");
    }

    #[test]
    fn test_random_identifiers_distinct_from_batch() {
        let target = encode(&Plist::from_node(Node::dict([(
            "WFWorkflowActions",
            Node::array([uuid_action("U1", "G1")]),
        )])))
        .unwrap();
        let payload = encode(&Plist::from_node(Node::array([uuid_action("U1", "G1")]))).unwrap();
        let record = WorkflowRecord::new("w", target, IdSets::new(["G1"], ["U1"])).insert(InsertRecord {
            id: 1,
            position: 1,
            actions: payload,
            ids: IdSets::new(["G1"], ["U1"]),
        });

        let merged = Merger::new(MergeOptions::new()).merge_workflow(&record).unwrap().unwrap();
        let uuid = params(&merged, 1, "UUID");
        let group = params(&merged, 1, "GroupingIdentifier");
        assert_ne!(uuid, group);
        for id in ["U1", "G1"] {
            assert_ne!(uuid, id);
            assert_ne!(group, id);
        }
    }

    #[test]
    fn test_failures_do_not_stop_siblings() {
        let broken = WorkflowRecord::new("broken", b"not a plist at all".to_vec(), IdSets::default());
        let no_actions = WorkflowRecord::new(
            "no-actions",
            encode(&Plist::from_node(Node::dict([("Other", Node::from(1i64))]))).unwrap(),
            IdSets::default(),
        );
        let bad_insert = abc().insert(InsertRecord {
            id: 3,
            position: 0,
            actions: encode(&Plist::from_node(Node::from("text"))).unwrap(),
            ids: IdSets::default(),
        });
        let good = abc().exclude(ExclusionRule::always(0));
        let request = MergeRequest {
            workflows: vec![broken, no_actions, bad_insert, good],
        };

        let result = Merger::with_generator(MergeOptions::new(), Sequence { n: 0 }).merge(&request);

        assert_eq!(result.workflows.len(), 1);
        assert_eq!(result.workflows[0].name, "abc");
        assert_eq!(texts(&result.workflows[0].workflow), vec!["B", "C"]);

        assert_eq!(result.failures.len(), 3);
        assert!(matches!(
            result.failures[0].error,
            MergeError::Workflow(DecodeError::InvalidMagic { .. })
        ));
        assert_eq!(result.failures[1].error, MergeError::MissingActions);
        assert_eq!(result.failures[2].error, MergeError::InvalidActions { insert: 3 });

        let response = result.to_response();
        assert_eq!(response.shortcuts.len(), 1);
        assert_eq!(response.errors[0].name, "broken");
    }

    #[test]
    fn test_undecodable_insert() {
        let record = abc().insert(InsertRecord {
            id: 4,
            position: 0,
            actions: b"bplist00".to_vec(),
            ids: IdSets::default(),
        });
        let err = Merger::new(MergeOptions::new()).merge_workflow(&record).unwrap_err();
        assert!(matches!(err, MergeError::Insert { insert: 4, .. }));
    }

    #[test]
    fn test_other_top_level_keys_preserved() {
        let record = abc().exclude(ExclusionRule::always(1));
        let merger = Merger::with_generator(MergeOptions::new(), Sequence { n: 0 });
        let merged = merger.merge_workflow(&record).unwrap().unwrap();
        let root = decode(&merged).unwrap().root_node().unwrap();
        assert_eq!(root.get("WFWorkflowClientVersion"), Some(&Node::from("1146.14")));
    }
}
