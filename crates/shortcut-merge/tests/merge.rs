//! End-to-end tests over the JSON request/response surface.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{json, Value as Json};

use shortcut_merge::{decode, encode, merge_request_json, MergeRequest, Node, Plist, ValidationError};

fn comment(text: &str) -> Node {
    Node::dict([
        ("WFWorkflowActionIdentifier", Node::from("is.workflow.actions.comment")),
        (
            "WFWorkflowActionParameters",
            Node::dict([("WFCommentActionText", Node::from(text))]),
        ),
    ])
}

fn workflow_b64(texts: &[&str]) -> String {
    let plist = Plist::from_node(Node::dict([
        ("WFWorkflowActions", Node::array(texts.iter().map(|t| comment(t)))),
        ("WFWorkflowClientVersion", Node::from("1146.14")),
    ]));
    STANDARD.encode(encode(&plist).unwrap())
}

fn texts(encoded_b64: &str) -> Vec<String> {
    let bytes = STANDARD.decode(encoded_b64).unwrap();
    let root = decode(&bytes).unwrap().root_node().unwrap();
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

fn run(request: &Json) -> Json {
    let response = merge_request_json(&request.to_string()).unwrap();
    serde_json::from_str(&response.to_json().unwrap()).unwrap()
}

#[test]
fn insertion_and_exclusion() {
    let request = json!({
        "shortcuts": [{
            "name": "Morning",
            "encodedWorkflow": workflow_b64(&["A", "B", "C"]),
            "uuids": { "groups": [], "vars": [] },
            "actionsToRemove": [{ "action": 2, "excludedBy": ["always"] }],
            "inserts": [{
                "id": 1,
                "position": 1,
                "encodedActions": workflow_b64(&["X", "Y"]),
                "uuids": { "groups": [], "vars": [] }
            }]
        }]
    });

    let response = run(&request);
    let shortcuts = response["shortcuts"].as_array().unwrap();
    assert_eq!(shortcuts.len(), 1);
    assert_eq!(shortcuts[0]["name"], "Morning");
    assert_eq!(
        texts(shortcuts[0]["encodedWorkflow"].as_str().unwrap()),
        vec!["A", "X", "Y", "B"]
    );
    assert!(response.get("errors").is_none());
}

#[test]
fn unchanged_workflows_omitted() {
    let request = json!({
        "shortcuts": [
            { "name": "Plain", "encodedWorkflow": workflow_b64(&["A"]) },
            {
                "name": "Unfired",
                "encodedWorkflow": workflow_b64(&["A", "B", "C"]),
                "actionsToRemove": [{ "action": 1, "excludedBy": [5] }]
            }
        ]
    });

    let response = run(&request);
    assert_eq!(response["shortcuts"], json!([]));
}

#[test]
fn scalar_and_sequence_forms_agree() {
    let workflow = json!({
        "name": "Single",
        "shortcut": workflow_b64(&["A", "B"]),
        "uuids": { "groups": "G1", "vars": "V1" },
        "actionsToRemove": { "action": 0, "excludedBy": 7 },
        "inserts": {
            "id": 7,
            "position": 2,
            "actions": workflow_b64(&["Z"]),
            "uuids": { "groups": [], "vars": [] }
        }
    });
    let wrapped = json!({
        "shortcuts": [{
            "name": "Single",
            "shortcut": workflow_b64(&["A", "B"]),
            "uuids": { "groups": ["G1"], "vars": ["V1"] },
            "actionsToRemove": [{ "action": 0, "excludedBy": [7] }],
            "inserts": [{
                "id": 7,
                "position": 2,
                "actions": workflow_b64(&["Z"]),
                "uuids": { "groups": [], "vars": [] }
            }]
        }]
    });

    let scalar = MergeRequest::from_json(&json!({ "shortcuts": workflow }).to_string()).unwrap();
    let sequence = MergeRequest::from_json(&wrapped.to_string()).unwrap();
    assert_eq!(scalar, sequence);

    let response = run(&json!({ "shortcuts": workflow }));
    assert_eq!(response, run(&wrapped));
    assert_eq!(
        texts(response["shortcuts"][0]["encodedWorkflow"].as_str().unwrap()),
        vec!["B", "Z"]
    );
}

#[test]
fn failing_workflow_reported_with_siblings_merged() {
    let request = json!({
        "shortcuts": [
            { "name": "Broken", "encodedWorkflow": STANDARD.encode(b"definitely not bplist") },
            {
                "name": "Fine",
                "encodedWorkflow": workflow_b64(&["A", "B"]),
                "actionsToRemove": [{ "action": 0, "excludedBy": [-1] }]
            }
        ]
    });

    let response = run(&request);
    assert_eq!(response["shortcuts"][0]["name"], "Fine");
    assert_eq!(response["errors"][0]["name"], "Broken");
    assert!(
        response["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("E001")
    );
}

#[test]
fn validation_errors_reject_request() {
    let err = merge_request_json(r#"{"shortcuts": {"name": "a", "encodedWorkflow": "***"}}"#).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidBase64 { .. }));

    let err = merge_request_json(
        r#"{"shortcuts": {"name": "a", "encodedWorkflow": "", "actionsToRemove": {"action": 0, "excludedBy": "sometimes"}}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::InvalidSentinel { .. }));

    assert!(matches!(merge_request_json("[1, 2"), Err(ValidationError::Json(_))));
}

#[test]
fn wrong_typed_field_names_its_workflow() {
    let request = json!({
        "shortcuts": [
            { "name": "Good", "encodedWorkflow": workflow_b64(&["A"]) },
            {
                "name": "Bad",
                "encodedWorkflow": workflow_b64(&["A"]),
                "inserts": [{ "id": 1, "position": "one", "encodedActions": workflow_b64(&["X"]) }]
            }
        ]
    });

    let err = merge_request_json(&request.to_string()).unwrap_err();
    assert!(matches!(err, ValidationError::MalformedWorkflow { ref workflow, .. } if workflow == "Bad"));
    assert!(err.to_string().contains("Bad"));
}
