//! Unit tests for single-action execution: hook ordering, guaranteed
//! teardown, and fatal escalation.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use procflow::exec::action::{self, ActionStatus};
use procflow::exec::context::{ExecContext, RunControl};
use procflow::exec::shell::ShellExecutor;
use procflow::model::progress::ExecutionProgress;
use procflow::model::spec::ActionSpec;
use procflow::report::ReportWriter;
use procflow::state::channel::FileChannel;
use procflow::state::manager::StateManager;
use tempfile::TempDir;

fn ctx_in(dir: &Path) -> ExecContext {
    let channel = Arc::new(FileChannel::new(dir.join("cmd")));
    let state = Arc::new(StateManager::new(
        dir.join("state"),
        dir.join("report"),
        channel,
    ));
    ExecContext {
        shell: ShellExecutor,
        state,
        control: RunControl::default(),
        progress: Arc::new(Mutex::new(ExecutionProgress::new())),
        report: Arc::new(ReportWriter::new(dir.join("report"))),
    }
}

fn marker(dir: &Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

#[tokio::test]
async fn teardown_runs_after_success() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());
    let done = marker(dir.path(), "teardown");

    let mut spec = ActionSpec::new("a", "true");
    spec.teardown_command = Some(format!("touch {done}"));

    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::Ok);
    assert!(Path::new(&done).exists());
}

#[tokio::test]
async fn teardown_runs_after_failure() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());
    let done = marker(dir.path(), "teardown");

    let mut spec = ActionSpec::new("a", "false");
    spec.teardown_command = Some(format!("touch {done}"));

    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::Failed);
    assert!(Path::new(&done).exists());
}

#[tokio::test]
async fn teardown_runs_after_timeout() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());
    let done = marker(dir.path(), "teardown");

    let mut spec = ActionSpec::new("a", "sleep 5");
    spec.timeout = Some(Duration::from_secs(1));
    spec.teardown_command = Some(format!("touch {done}"));

    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::TimedOut);
    assert!(Path::new(&done).exists());
}

#[tokio::test]
async fn on_ok_hook_runs_only_on_success() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());
    let ok_marker = marker(dir.path(), "ok");
    let nok_marker = marker(dir.path(), "nok");

    let mut spec = ActionSpec::new("a", "true");
    spec.on_ok_command = Some(format!("touch {ok_marker}"));
    spec.on_nok_command = Some(format!("touch {nok_marker}"));

    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::Ok);
    assert!(Path::new(&ok_marker).exists());
    assert!(!Path::new(&nok_marker).exists());
}

#[tokio::test]
async fn on_nok_hook_runs_on_failure() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());
    let ok_marker = marker(dir.path(), "ok");
    let nok_marker = marker(dir.path(), "nok");

    let mut spec = ActionSpec::new("a", "false");
    spec.on_ok_command = Some(format!("touch {ok_marker}"));
    spec.on_nok_command = Some(format!("touch {nok_marker}"));

    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::Failed);
    assert!(!Path::new(&ok_marker).exists());
    assert!(Path::new(&nok_marker).exists());
}

#[tokio::test]
async fn on_nok_hook_runs_on_timeout() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());
    let nok_marker = marker(dir.path(), "nok");

    let mut spec = ActionSpec::new("a", "sleep 5");
    spec.timeout = Some(Duration::from_secs(1));
    spec.on_nok_command = Some(format!("touch {nok_marker}"));

    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::TimedOut);
    assert!(Path::new(&nok_marker).exists());
}

#[tokio::test]
async fn setup_failure_does_not_abort_the_action() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());

    let mut spec = ActionSpec::new("a", "echo main ran");
    spec.setup_command = Some("false".into());

    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::Ok);
    assert_eq!(outcome.main.stdout, "main ran");
}

#[tokio::test]
async fn fatal_requires_both_failure_and_flag() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());

    // Failure without the flag: not fatal.
    let spec = ActionSpec::new("a", "false");
    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::Failed);
    assert!(!outcome.fatal);

    // Failure with the flag: fatal.
    let mut spec = ActionSpec::new("b", "false");
    spec.fatal_nok = true;
    let outcome = action::execute(&spec, &ctx).await;
    assert!(outcome.fatal);

    // Success with the flag: not fatal.
    let mut spec = ActionSpec::new("c", "true");
    spec.fatal_nok = true;
    let outcome = action::execute(&spec, &ctx).await;
    assert!(!outcome.fatal);
}

#[tokio::test]
async fn hook_failure_never_sets_fatal() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());

    let mut spec = ActionSpec::new("a", "true");
    spec.fatal_nok = true;
    spec.on_ok_command = Some("false".into());
    spec.teardown_command = Some("false".into());

    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::Ok);
    assert!(!outcome.fatal);
}

#[tokio::test]
async fn timed_out_action_with_flag_is_fatal() {
    let dir = TempDir::new().unwrap();
    let ctx = ctx_in(dir.path());

    let mut spec = ActionSpec::new("a", "sleep 5");
    spec.timeout = Some(Duration::from_secs(1));
    spec.fatal_nok = true;

    let outcome = action::execute(&spec, &ctx).await;
    assert_eq!(outcome.status, ActionStatus::TimedOut);
    assert!(outcome.fatal);
}
