//! Sketch file loading and validation.
//!
//! A sketch is a JSON object mapping stage names to ordered arrays of
//! action objects, with an optional top-level `"name"`. Validation walks
//! the whole document and collects every problem rather than stopping at
//! the first, then yields an immutable [`ProcedureSpec`].

use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::model::spec::{ActionSpec, ProcedureSpec, StageSpec};
use crate::{FlowError, Result};

/// A single validation problem with its location inside the sketch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Where the problem was found, e.g. `stage "build" / action "compile"`.
    pub location: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Raw action object as it appears in the sketch JSON. All fields optional
/// so the validator can report every missing field instead of failing on
/// the first.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAction {
    name: Option<String>,
    cmd: Option<String>,
    #[serde(rename = "setup-cmd")]
    setup_cmd: Option<String>,
    #[serde(rename = "teardown-cmd")]
    teardown_cmd: Option<String>,
    #[serde(rename = "on-ok-cmd")]
    on_ok_cmd: Option<String>,
    #[serde(rename = "on-nok-cmd")]
    on_nok_cmd: Option<String>,
    time: Option<String>,
    timeout: Option<String>,
    #[serde(rename = "fatal-nok")]
    fatal_nok: Option<bool>,
}

/// Parse a duration string of the form integer + one of `s|m|h|d`.
///
/// Fractional or compound values (`1.5m`, `1h30m`) are rejected, as is a
/// zero value.
///
/// # Errors
///
/// Returns [`FlowError::Validation`] describing the malformed input.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if raw.len() < 2 || !raw.is_char_boundary(raw.len() - 1) {
        return Err(FlowError::Validation(format!(
            "duration {raw:?} must be an integer followed by s, m, h, or d"
        )));
    }

    let (value_part, unit_part) = raw.split_at(raw.len() - 1);
    let multiplier = match unit_part {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        other => {
            return Err(FlowError::Validation(format!(
                "unknown duration unit {other:?} in {raw:?}"
            )))
        }
    };

    let value: u64 = value_part.parse().map_err(|_| {
        FlowError::Validation(format!("invalid duration value {value_part:?} in {raw:?}"))
    })?;

    if value == 0 {
        return Err(FlowError::Validation(format!(
            "duration {raw:?} must be greater than zero"
        )));
    }

    Ok(Duration::from_secs(value.saturating_mul(multiplier)))
}

/// Sketch document validator producing checked procedure definitions.
#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

impl Validator {
    /// Check a parsed sketch document and build the procedure definition.
    ///
    /// `fallback_name` names the procedure when the sketch has no
    /// top-level `"name"` (the sketch file name, in practice).
    ///
    /// # Errors
    ///
    /// Returns the full list of validation issues found anywhere in the
    /// document.
    pub fn check(
        &self,
        document: &Value,
        fallback_name: &str,
    ) -> std::result::Result<ProcedureSpec, Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let Some(root) = document.as_object() else {
            return Err(vec![ValidationIssue {
                location: "sketch".into(),
                message: "top level must be a JSON object".into(),
            }]);
        };

        let name = root
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(fallback_name)
            .to_owned();

        let mut stages = Vec::new();
        for (stage_name, actions_value) in root {
            if stage_name == "name" {
                continue;
            }
            stages.push(Self::check_stage(stage_name, actions_value, &mut issues));
        }

        if stages.is_empty() {
            issues.push(ValidationIssue {
                location: "sketch".into(),
                message: "procedure has no stages".into(),
            });
        }

        if issues.is_empty() {
            Ok(ProcedureSpec::new(name, stages))
        } else {
            Err(issues)
        }
    }

    /// Check one stage entry and its action array.
    fn check_stage(
        stage_name: &str,
        actions_value: &Value,
        issues: &mut Vec<ValidationIssue>,
    ) -> StageSpec {
        let location = format!("stage {stage_name:?}");

        let Some(raw_actions) = actions_value.as_array() else {
            issues.push(ValidationIssue {
                location,
                message: "stage must contain an array of actions".into(),
            });
            return StageSpec::new(stage_name, Vec::new());
        };

        if raw_actions.is_empty() {
            issues.push(ValidationIssue {
                location: location.clone(),
                message: "stage has no actions".into(),
            });
        }

        let mut actions = Vec::new();
        for (index, value) in raw_actions.iter().enumerate() {
            if let Some(action) = Self::check_action(stage_name, index, value, issues) {
                if actions.iter().any(|a: &ActionSpec| a.name == action.name) {
                    issues.push(ValidationIssue {
                        location: format!("{location} / action {:?}", action.name),
                        message: "duplicate action name within stage".into(),
                    });
                } else {
                    actions.push(action);
                }
            }
        }

        StageSpec::new(stage_name, actions)
    }

    /// Check one action object; `None` when it is unusable.
    fn check_action(
        stage_name: &str,
        index: usize,
        value: &Value,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<ActionSpec> {
        let location = format!("stage {stage_name:?} / action #{index}");

        let raw: RawAction = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(err) => {
                issues.push(ValidationIssue {
                    location,
                    message: format!("malformed action object: {err}"),
                });
                return None;
            }
        };

        let location = raw.name.as_ref().map_or_else(
            || format!("stage {stage_name:?} / action #{index}"),
            |name| format!("stage {stage_name:?} / action {name:?}"),
        );

        let mut usable = true;

        if raw.name.as_deref().is_none_or(str::is_empty) {
            issues.push(ValidationIssue {
                location: location.clone(),
                message: "missing required field \"name\"".into(),
            });
            usable = false;
        }

        if raw.cmd.as_deref().is_none_or(str::is_empty) {
            issues.push(ValidationIssue {
                location: location.clone(),
                message: "missing required field \"cmd\"".into(),
            });
            usable = false;
        }

        let estimated = Self::check_duration(raw.time.as_deref(), "time", &location, issues);
        let timeout = Self::check_duration(raw.timeout.as_deref(), "timeout", &location, issues);

        if !usable {
            return None;
        }

        Some(ActionSpec {
            name: raw.name.unwrap_or_default(),
            command: raw.cmd.unwrap_or_default(),
            setup_command: raw.setup_cmd.filter(|c| !c.is_empty()),
            teardown_command: raw.teardown_cmd.filter(|c| !c.is_empty()),
            on_ok_command: raw.on_ok_cmd.filter(|c| !c.is_empty()),
            on_nok_command: raw.on_nok_cmd.filter(|c| !c.is_empty()),
            estimated,
            timeout,
            fatal_nok: raw.fatal_nok.unwrap_or(false),
        })
    }

    fn check_duration(
        raw: Option<&str>,
        field: &str,
        location: &str,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Duration> {
        let raw = raw?;
        match parse_duration(raw) {
            Ok(duration) => Some(duration),
            Err(err) => {
                issues.push(ValidationIssue {
                    location: location.to_owned(),
                    message: format!("invalid {field:?} field: {err}"),
                });
                None
            }
        }
    }
}

/// Load and validate a sketch file into a procedure definition.
///
/// # Errors
///
/// Returns [`FlowError::Validation`] listing every issue found in the
/// sketch, or [`FlowError::Io`] if the file cannot be read.
pub fn load_procedure(path: &Path) -> Result<ProcedureSpec> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| FlowError::Io(format!("cannot read sketch {}: {err}", path.display())))?;

    let document: Value = serde_json::from_str(&raw)
        .map_err(|err| FlowError::Validation(format!("invalid JSON in sketch: {err}")))?;

    let fallback_name = path
        .file_name()
        .map_or_else(|| "unnamed procedure".into(), |n| n.to_string_lossy());

    let spec = Validator
        .check(&document, &fallback_name)
        .map_err(|issues| {
            let joined = issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            FlowError::Validation(joined)
        })?;

    info!(
        procedure = spec.name,
        stages = spec.stages.len(),
        actions = spec.total_actions(),
        "sketch loaded"
    );

    Ok(spec)
}
