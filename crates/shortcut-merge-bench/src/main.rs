//! Benchmark for the codec and merge engine using a synthetic batch.
//!
//! Builds every workflow and snippet in memory, so no input files are needed.
//! Usage: `bench-merge [WORKFLOWS] [ACTIONS_PER_WORKFLOW]`

use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shortcut_merge::{
    ExclusionRule, IdSets, InsertRecord, MergeOptions, MergeRequest, Merger, Node, Plist,
    WorkflowRecord,
};

const DECODE_ITERS: u32 = 10;

fn uuid_for(workflow: usize, action: usize) -> String {
    format!("{:08X}-0000-4000-8000-{:012X}", workflow, action)
}

fn group_for(workflow: usize, action: usize) -> String {
    format!("{:08X}-1111-4000-8000-{:012X}", workflow, action / 4)
}

fn action(workflow: usize, index: usize) -> Node {
    Node::dict([
        ("WFWorkflowActionIdentifier", Node::from("is.workflow.actions.conditional")),
        (
            "WFWorkflowActionParameters",
            Node::dict([
                ("UUID", Node::from(uuid_for(workflow, index))),
                ("GroupingIdentifier", Node::from(group_for(workflow, index))),
                ("WFControlFlowMode", Node::from((index % 3) as i64)),
                (
                    "WFCondition",
                    Node::dict([
                        ("Value", Node::from(format!("action {} of workflow {}", index, workflow))),
                        ("Threshold", Node::from(index as f64 * 0.5)),
                    ]),
                ),
            ]),
        ),
    ])
}

fn build_workflow(workflow: usize, actions: usize) -> Plist {
    Plist::from_node(Node::dict([
        ("WFWorkflowActions", Node::array((0..actions).map(|i| action(workflow, i)))),
        ("WFWorkflowClientVersion", Node::from("1146.14")),
        ("WFWorkflowMinimumClientVersion", Node::from(900i64)),
        ("WFWorkflowIcon", Node::dict([
            ("WFWorkflowIconStartColor", Node::from(4282601983i64)),
            ("WFWorkflowIconGlyphNumber", Node::from(59511i64)),
        ])),
        ("WFWorkflowImportQuestions", Node::array([])),
    ]))
}

/// Snippets reuse the first actions of their target, so every identifier collides.
fn build_snippet(workflow: usize, actions: usize) -> (Plist, IdSets) {
    let nodes: Vec<Node> = (0..actions).map(|i| action(workflow, i)).collect();
    let ids = IdSets::new(
        (0..actions).map(|i| group_for(workflow, i)),
        (0..actions).map(|i| uuid_for(workflow, i)),
    );
    (Plist::from_node(Node::array(nodes)), ids)
}

fn build_request(workflows: usize, actions: usize) -> MergeRequest {
    let records = (0..workflows)
        .map(|w| {
            let encoded = shortcut_merge::encode(&build_workflow(w, actions)).unwrap_or_default();
            let ids = IdSets::new(
                (0..actions).map(|i| group_for(w, i)),
                (0..actions).map(|i| uuid_for(w, i)),
            );
            let mut record = WorkflowRecord::new(format!("Workflow {}", w), encoded, ids)
                .exclude(ExclusionRule::always(0))
                .exclude(ExclusionRule::when_applied(actions / 2, [2]));
            for (id, position) in [(1, actions / 4), (2, actions / 2), (3, actions)] {
                let (snippet, snippet_ids) = build_snippet(w, 4);
                record = record.insert(InsertRecord {
                    id,
                    position,
                    actions: shortcut_merge::encode(&snippet).unwrap_or_default(),
                    ids: snippet_ids,
                });
            }
            record
        })
        .collect();
    MergeRequest { workflows: records }
}

fn request_json(request: &MergeRequest) -> String {
    let shortcuts: Vec<_> = request
        .workflows
        .iter()
        .map(|w| {
            json!({
                "name": w.name,
                "encodedWorkflow": STANDARD.encode(&w.workflow),
                "uuids": { "groups": w.ids.groups, "vars": w.ids.vars },
                "actionsToRemove": w.exclusions.iter().map(|r| json!({
                    "action": r.action,
                    "excludedBy": r.excluded_by.iter().map(|e| match e {
                        shortcut_merge::Excluder::Always => json!(-1),
                        shortcut_merge::Excluder::Insert(id) => json!(id),
                    }).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
                "inserts": w.inserts.iter().map(|i| json!({
                    "id": i.id,
                    "position": i.position,
                    "encodedActions": STANDARD.encode(&i.actions),
                    "uuids": { "groups": i.ids.groups, "vars": i.ids.vars },
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "shortcuts": shortcuts }).to_string()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args = std::env::args().skip(1);
    let workflows: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(200);
    let actions: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(400);
    info!(workflows, actions, "building synthetic batch");

    // Encode
    let sample = build_workflow(0, actions);
    let encode_start = Instant::now();
    let encoded = shortcut_merge::encode(&sample).expect("Failed to encode");
    let encode_time = encode_start.elapsed();

    println!(
        "Encode: {} objects -> {} bytes in {:?}",
        sample.len(),
        encoded.len(),
        encode_time
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (encoded.len() as f64 / 1_000_000.0) / encode_time.as_secs_f64()
    );

    // Decode
    for _ in 0..3 {
        let _ = shortcut_merge::decode(&encoded).expect("Failed to decode");
    }
    let decode_start = Instant::now();
    let mut decoded = None;
    for _ in 0..DECODE_ITERS {
        decoded = Some(shortcut_merge::decode(&encoded).expect("Failed to decode"));
    }
    let decode_time = decode_start.elapsed() / DECODE_ITERS;
    let decoded = decoded.expect("decoded at least once");

    println!(
        "\nDecode: {:?} (avg of {} iterations)",
        decode_time, DECODE_ITERS
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (encoded.len() as f64 / 1_000_000.0) / decode_time.as_secs_f64()
    );
    assert_eq!(decoded, sample, "Round trip should preserve the workflow");

    // Merge
    let request = build_request(workflows, actions);
    let input_bytes: usize = request
        .workflows
        .iter()
        .map(|w| w.workflow.len() + w.inserts.iter().map(|i| i.actions.len()).sum::<usize>())
        .sum();

    let merger = Merger::new(MergeOptions::default());
    let merge_start = Instant::now();
    let result = merger.merge(&request);
    let merge_time = merge_start.elapsed();

    println!(
        "\nMerge: {} workflows ({} input bytes) in {:?}",
        request.workflows.len(),
        input_bytes,
        merge_time
    );
    println!(
        "  - {} merged, {} failed",
        result.workflows.len(),
        result.failures.len()
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (input_bytes as f64 / 1_000_000.0) / merge_time.as_secs_f64()
    );
    assert!(result.failures.is_empty(), "Synthetic batch should merge cleanly");

    // JSON surface
    let json = request_json(&request);
    let json_start = Instant::now();
    let response = shortcut_merge::merge_request_json(&json).expect("Failed to merge JSON request");
    let json_time = json_start.elapsed();

    println!(
        "\nJSON request: {} bytes, {} shortcuts returned in {:?}",
        json.len(),
        response.shortcuts.len(),
        json_time
    );
    println!(
        "  Overhead vs direct merge: {:.1}x",
        json_time.as_secs_f64() / merge_time.as_secs_f64()
    );
}
