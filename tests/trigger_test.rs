mod common;

use std::collections::BTreeSet;

use docs_agent_rs::error::RunError;
use docs_agent_rs::request::{Scope, extract_scope};
use docs_agent_rs::trigger::{IssueEvent, TriggerListener};

use common::issue_event;

fn paths(items: &[&str]) -> Scope {
    Scope::Paths(items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>())
}

#[test]
fn test_marker_issue_becomes_request() {
    let listener = TriggerListener::new("[Docs Agent]");
    let event = issue_event(12, "[Docs Agent] Update README", "");

    let request = listener.listen(&event).unwrap();

    assert_eq!(request.source_event_id, "octo/widgets#12");
    assert_eq!(request.issue_number, 12);
    assert_eq!(request.repository.slug(), "octo/widgets");
    assert_eq!(request.requested_scope, paths(&["README.md"]));
    assert_eq!(request.raw_instruction, "Update README");
}

#[test]
fn test_titles_without_marker_are_not_applicable() {
    let listener = TriggerListener::new("[Docs Agent]");

    for title in [
        "Fix bug #42",
        "Docs Agent: update README",
        "[docs agent] lowercase marker",
        "",
        "[Docs] Update README",
    ] {
        let event = issue_event(42, title, "Please document README.md");
        match listener.listen(&event) {
            Err(RunError::NotApplicable(_)) => {}
            other => panic!("expected NotApplicable for {title:?}, got {other:?}"),
        }
    }
}

#[test]
fn test_closed_issue_is_not_applicable() {
    let listener = TriggerListener::new("[Docs Agent]");
    let mut event = issue_event(3, "[Docs Agent] Update README", "");
    event.action = Some("closed".to_string());

    assert!(matches!(
        listener.listen(&event),
        Err(RunError::NotApplicable(_))
    ));
}

#[test]
fn test_payload_without_action_is_accepted() {
    let payload = r#"{
        "issue": {"number": 5, "title": "[Docs Agent] Document the sample", "body": null},
        "repository": {"name": "samples", "owner": {"login": "acme"}, "private": false}
    }"#;

    let event = IssueEvent::from_json(payload).unwrap();
    let request = TriggerListener::new("[Docs Agent]").listen(&event).unwrap();

    assert_eq!(request.source_event_id, "acme/samples#5");
    assert_eq!(request.requested_scope, Scope::All);
    assert_eq!(request.raw_instruction, "Document the sample");
}

#[test]
fn test_delivery_id_is_preferred_as_event_id() {
    let mut event = issue_event(8, "[Docs Agent] Update README", "");
    event.delivery_id = Some("72d3162e-cc78-11e3-81ab-4c9367dc0958".to_string());

    let request = TriggerListener::new("[Docs Agent]").listen(&event).unwrap();
    assert_eq!(request.source_event_id, "72d3162e-cc78-11e3-81ab-4c9367dc0958");
}

#[test]
fn test_custom_marker() {
    let listener = TriggerListener::new("/document");
    let event = issue_event(9, "/document CHANGELOG", "");

    let request = listener.listen(&event).unwrap();
    assert_eq!(request.requested_scope, paths(&["CHANGELOG.md"]));
    assert!(listener.listen(&issue_event(9, "[Docs Agent] CHANGELOG", "")).is_err());
}

#[test]
fn test_body_paths_are_collected() {
    let listener = TriggerListener::new("[Docs Agent]");
    let event = issue_event(
        21,
        "[Docs Agent] Document the parser",
        "Please cover `src/parser.rs`, ./docs/guide.md and examples/basic.py.\nSee https://example.com/spec.md for context.",
    );

    let request = listener.listen(&event).unwrap();
    assert_eq!(
        request.requested_scope,
        paths(&["docs/guide.md", "examples/basic.py", "src/parser.rs"])
    );
    assert!(request.raw_instruction.starts_with("Document the parser\n\nPlease cover"));
}

#[test]
fn test_scope_extraction() {
    assert_eq!(extract_scope("Update README"), paths(&["README.md"]));
    assert_eq!(extract_scope("Update README.md"), paths(&["README.md"]));
    assert_eq!(extract_scope("Refresh docs/README.md"), paths(&["docs/README.md"]));
    assert_eq!(
        extract_scope("Update README and CONTRIBUTING"),
        paths(&["CONTRIBUTING.md", "README.md"])
    );
    assert_eq!(extract_scope("Rewrite all docs"), Scope::All);
    assert_eq!(extract_scope("Review the entire documentation for docs/a.md"), Scope::All);
    assert_eq!(extract_scope("Explain the end-to-end flow"), Scope::All);
    // Version numbers and abbreviations are not paths
    assert_eq!(extract_scope("Document v1.2 changes, e.g. the API"), Scope::All);
}
