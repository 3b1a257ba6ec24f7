//! Unit tests for the domain model: control commands, engine states, and
//! procedure definitions.

use chrono::Utc;
use procflow::model::command::{CommandKind, ControlCommand};
use procflow::model::progress::{EngineState, ExecutionProgress};
use procflow::model::spec::{ActionSpec, ProcedureSpec, StageSpec};

fn two_stage_procedure() -> ProcedureSpec {
    ProcedureSpec::new(
        "deploy",
        vec![
            StageSpec::new(
                "build",
                vec![ActionSpec::new("compile", "true"), ActionSpec::new("package", "true")],
            ),
            StageSpec::new("ship", vec![ActionSpec::new("upload", "true")]),
        ],
    )
}

#[test]
fn command_kind_round_trips_through_names() {
    for kind in [
        CommandKind::Pause,
        CommandKind::Resume,
        CommandKind::Stop,
        CommandKind::Purge,
    ] {
        assert_eq!(CommandKind::parse(kind.as_str()), Some(kind));
    }
}

#[test]
fn unknown_command_name_parses_to_none() {
    assert_eq!(CommandKind::parse("restart"), None);
    assert_eq!(CommandKind::parse(""), None);
}

#[test]
fn control_command_line_round_trip() {
    let command = ControlCommand::now(CommandKind::Stop);
    let line = command.to_line();
    let parsed = ControlCommand::parse_line(&line).unwrap();
    assert_eq!(parsed.kind, CommandKind::Stop);
    assert_eq!(parsed.issued_at, command.issued_at);
}

#[test]
fn control_command_tolerates_bad_timestamp() {
    let parsed = ControlCommand::parse_line("pause,not-a-timestamp").unwrap();
    assert_eq!(parsed.kind, CommandKind::Pause);
    // Falls back to a current timestamp rather than rejecting the command.
    assert!((Utc::now() - parsed.issued_at).num_seconds() < 5);
}

#[test]
fn blank_and_unknown_lines_parse_to_none() {
    assert!(ControlCommand::parse_line("").is_none());
    assert!(ControlCommand::parse_line("   ").is_none());
    assert!(ControlCommand::parse_line("reboot,2024-01-01T00:00:00Z").is_none());
}

#[test]
fn terminal_states_are_exactly_stopped_completed_failed() {
    assert!(EngineState::Stopped.is_terminal());
    assert!(EngineState::Completed.is_terminal());
    assert!(EngineState::Failed.is_terminal());
    assert!(!EngineState::Idle.is_terminal());
    assert!(!EngineState::Running.is_terminal());
    assert!(!EngineState::Paused.is_terminal());
}

#[test]
fn engine_state_displays_lowercase() {
    assert_eq!(EngineState::Running.to_string(), "running");
    assert_eq!(EngineState::Paused.to_string(), "paused");
}

#[test]
fn locate_finds_stage_and_action_positions() {
    let spec = two_stage_procedure();
    assert_eq!(spec.locate("build", "package"), Some((0, 1)));
    assert_eq!(spec.locate("ship", "upload"), Some((1, 0)));
    assert_eq!(spec.locate("ship", "compile"), None);
    assert_eq!(spec.locate("missing", "compile"), None);
}

#[test]
fn total_actions_counts_across_stages() {
    assert_eq!(two_stage_procedure().total_actions(), 3);
}

#[test]
fn progress_bounds_check_rejects_out_of_range_cursors() {
    let spec = two_stage_procedure();
    assert!(ExecutionProgress::resumed_at(0, 1).within_bounds(&spec));
    assert!(ExecutionProgress::resumed_at(1, 0).within_bounds(&spec));
    assert!(!ExecutionProgress::resumed_at(1, 1).within_bounds(&spec));
    assert!(!ExecutionProgress::resumed_at(2, 0).within_bounds(&spec));
}
