//! Unit tests for sketch parsing and validation.

use std::io::Write;
use std::time::Duration;

use procflow::sketch::{load_procedure, parse_duration, Validator};
use procflow::FlowError;
use serde_json::json;

#[test]
fn durations_accept_all_four_units() {
    assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
}

#[test]
fn durations_reject_malformed_values() {
    for raw in ["5", "1.5m", "5x", "1h30m", "0s", "", "m", "-2s"] {
        assert!(parse_duration(raw).is_err(), "accepted {raw:?}");
    }
}

#[test]
fn minimal_valid_sketch_parses() {
    let doc = json!({
        "name": "deploy",
        "build": [
            { "name": "compile", "cmd": "make" }
        ]
    });

    let spec = Validator.check(&doc, "fallback").unwrap();
    assert_eq!(spec.name, "deploy");
    assert_eq!(spec.stages.len(), 1);
    assert_eq!(spec.stages[0].name, "build");
    assert_eq!(spec.stages[0].actions[0].command, "make");
    assert!(!spec.stages[0].actions[0].fatal_nok);
}

#[test]
fn procedure_name_falls_back_to_the_file_name() {
    let doc = json!({ "build": [{ "name": "a", "cmd": "true" }] });
    let spec = Validator.check(&doc, "deploy.json").unwrap();
    assert_eq!(spec.name, "deploy.json");
}

#[test]
fn stage_declaration_order_is_preserved() {
    let doc = json!({
        "zeta": [{ "name": "z", "cmd": "true" }],
        "alpha": [{ "name": "a", "cmd": "true" }],
        "midway": [{ "name": "m", "cmd": "true" }]
    });

    let spec = Validator.check(&doc, "f").unwrap();
    let order: Vec<&str> = spec.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(order, ["zeta", "alpha", "midway"]);
}

#[test]
fn all_issues_are_collected_in_one_pass() {
    let doc = json!({
        "build": [
            { "cmd": "make" },
            { "name": "lint", "timeout": "ten minutes" }
        ],
        "empty": []
    });

    let issues = Validator.check(&doc, "f").unwrap_err();
    let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
    assert!(messages.iter().any(|m| m.contains("\"name\"")));
    assert!(messages.iter().any(|m| m.contains("\"cmd\"")));
    assert!(messages.iter().any(|m| m.contains("timeout")));
    assert!(messages.iter().any(|m| m.contains("no actions")));
    assert!(issues.len() >= 4);
}

#[test]
fn duplicate_action_names_within_a_stage_are_rejected() {
    let doc = json!({
        "build": [
            { "name": "compile", "cmd": "make" },
            { "name": "compile", "cmd": "make again" }
        ]
    });

    let issues = Validator.check(&doc, "f").unwrap_err();
    assert!(issues
        .iter()
        .any(|i| i.to_string().contains("duplicate action name")));
}

#[test]
fn unknown_action_fields_are_rejected() {
    let doc = json!({
        "build": [
            { "name": "a", "cmd": "true", "retries": 3 }
        ]
    });

    let issues = Validator.check(&doc, "f").unwrap_err();
    assert!(issues
        .iter()
        .any(|i| i.to_string().contains("malformed action object")));
}

#[test]
fn stage_value_must_be_an_array() {
    let doc = json!({ "build": "not an array" });
    let issues = Validator.check(&doc, "f").unwrap_err();
    assert!(issues
        .iter()
        .any(|i| i.to_string().contains("array of actions")));
}

#[test]
fn non_object_top_level_is_rejected() {
    let issues = Validator.check(&json!([1, 2, 3]), "f").unwrap_err();
    assert_eq!(issues.len(), 1);
    assert!(issues[0].to_string().contains("JSON object"));
}

#[test]
fn empty_document_has_no_stages() {
    let issues = Validator.check(&json!({}), "f").unwrap_err();
    assert!(issues.iter().any(|i| i.to_string().contains("no stages")));
}

#[test]
fn hyphenated_optional_fields_are_recognised() {
    let doc = json!({
        "build": [{
            "name": "compile",
            "cmd": "make",
            "setup-cmd": "make prepare",
            "teardown-cmd": "make clean",
            "on-ok-cmd": "notify ok",
            "on-nok-cmd": "notify nok",
            "fatal-nok": true,
            "time": "5m",
            "timeout": "10m"
        }]
    });

    let spec = Validator.check(&doc, "f").unwrap();
    let action = &spec.stages[0].actions[0];
    assert_eq!(action.setup_command.as_deref(), Some("make prepare"));
    assert_eq!(action.teardown_command.as_deref(), Some("make clean"));
    assert_eq!(action.on_ok_command.as_deref(), Some("notify ok"));
    assert_eq!(action.on_nok_command.as_deref(), Some("notify nok"));
    assert!(action.fatal_nok);
    assert_eq!(action.estimated, Some(Duration::from_secs(300)));
    assert_eq!(action.timeout, Some(Duration::from_secs(600)));
}

#[test]
fn load_procedure_reports_missing_file_as_io() {
    let err = load_procedure(std::path::Path::new("/nonexistent/sketch.json")).unwrap_err();
    assert!(matches!(err, FlowError::Io(_)));
}

#[test]
fn load_procedure_joins_issues_into_one_validation_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{}", json!({ "build": [{ "cmd": "make" }] })).unwrap();

    let err = load_procedure(&path).unwrap_err();
    match err {
        FlowError::Validation(msg) => assert!(msg.contains("\"name\"")),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn load_procedure_rejects_invalid_json() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = load_procedure(&path).unwrap_err();
    assert!(matches!(err, FlowError::Validation(_)));
}
