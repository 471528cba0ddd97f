// Replayable operation scripts
//
// A script is a JSON array of steps, one per pipeline operation. Replaying
// applies every step in order and records what each one did; a failing step
// does not stop the replay, since diversions are part of what gets observed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::pipeline::{
    Blueprint, ClarifyingQuestion, ErrorKind, PipelineMachine, PipelineResult, PipelineSnapshot,
    PipelineState, PipelineStatusReport, ValidationIssue,
};
use crate::telemetry::{create_session_span, generate_correlation_id};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read script {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid script: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptStep {
    SetUserPrompt {
        text: String,
    },
    SetClarifyingQuestions {
        questions: Vec<ClarifyingQuestion>,
    },
    SetClarifyingAnswers {
        answers: BTreeMap<String, String>,
    },
    ConfirmUnderstanding {
        text: String,
    },
    SetRequiredCredentials {
        names: Vec<String>,
    },
    SetProvidedCredentials {
        credentials: BTreeMap<String, String>,
    },
    StartBuilding,
    SetWorkflowBlueprint {
        blueprint: Blueprint,
    },
    MarkWorkflowBuilt {
        blueprint: Blueprint,
    },
    MarkWaitingForConfirmation,
    ConfirmWorkflow,
    RejectWorkflow,
    MoveToValidationFromConfirmed,
    AddValidationError {
        issue: ValidationIssue,
    },
    ClearValidationErrors,
    MarkWorkflowReady,
    RetryBuilding,
    Reset,
    TransitionTo {
        target: PipelineState,
        #[serde(default)]
        reason: String,
    },
    HandleError {
        message: String,
    },
    EnsureStateForBuilding,
    MoveToValidation {
        blueprint: Blueprint,
        #[serde(default)]
        skip_confirmation: bool,
    },
    MoveToReady,
}

impl ScriptStep {
    /// The `op` tag this step serializes under
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetUserPrompt { .. } => "set_user_prompt",
            Self::SetClarifyingQuestions { .. } => "set_clarifying_questions",
            Self::SetClarifyingAnswers { .. } => "set_clarifying_answers",
            Self::ConfirmUnderstanding { .. } => "confirm_understanding",
            Self::SetRequiredCredentials { .. } => "set_required_credentials",
            Self::SetProvidedCredentials { .. } => "set_provided_credentials",
            Self::StartBuilding => "start_building",
            Self::SetWorkflowBlueprint { .. } => "set_workflow_blueprint",
            Self::MarkWorkflowBuilt { .. } => "mark_workflow_built",
            Self::MarkWaitingForConfirmation => "mark_waiting_for_confirmation",
            Self::ConfirmWorkflow => "confirm_workflow",
            Self::RejectWorkflow => "reject_workflow",
            Self::MoveToValidationFromConfirmed => "move_to_validation_from_confirmed",
            Self::AddValidationError { .. } => "add_validation_error",
            Self::ClearValidationErrors => "clear_validation_errors",
            Self::MarkWorkflowReady => "mark_workflow_ready",
            Self::RetryBuilding => "retry_building",
            Self::Reset => "reset",
            Self::TransitionTo { .. } => "transition_to",
            Self::HandleError { .. } => "handle_error",
            Self::EnsureStateForBuilding => "ensure_state_for_building",
            Self::MoveToValidation { .. } => "move_to_validation",
            Self::MoveToReady => "move_to_ready",
        }
    }

    /// Run the step. Operations that return a value report it as `detail`.
    pub fn apply(self, machine: &mut PipelineMachine) -> PipelineResult<Option<String>> {
        match self {
            Self::SetUserPrompt { text } => machine.set_user_prompt(text)?,
            Self::SetClarifyingQuestions { questions } => {
                machine.set_clarifying_questions(questions)?
            }
            Self::SetClarifyingAnswers { answers } => machine.set_clarifying_answers(answers)?,
            Self::ConfirmUnderstanding { text } => machine.confirm_understanding(text)?,
            Self::SetRequiredCredentials { names } => machine.set_required_credentials(names)?,
            Self::SetProvidedCredentials { credentials } => {
                machine.set_provided_credentials(credentials)?
            }
            Self::StartBuilding => machine.start_building()?,
            Self::SetWorkflowBlueprint { blueprint } => machine.set_workflow_blueprint(blueprint)?,
            Self::MarkWorkflowBuilt { blueprint } => machine.mark_workflow_built(blueprint)?,
            Self::MarkWaitingForConfirmation => machine.mark_waiting_for_confirmation()?,
            Self::ConfirmWorkflow => machine.confirm_workflow()?,
            Self::RejectWorkflow => machine.reject_workflow()?,
            Self::MoveToValidationFromConfirmed => machine.move_to_validation_from_confirmed()?,
            Self::AddValidationError { issue } => machine.add_validation_error(issue)?,
            Self::ClearValidationErrors => machine.clear_validation_errors()?,
            Self::MarkWorkflowReady => machine.mark_workflow_ready()?,
            Self::RetryBuilding => {
                let attempts = machine.retry_building()?;
                return Ok(Some(format!("retry {attempts}")));
            }
            Self::Reset => machine.reset()?,
            Self::TransitionTo { target, reason } => machine.transition_to(target, &reason)?,
            Self::HandleError { message } => machine.handle_error(message)?,
            Self::EnsureStateForBuilding => machine.ensure_state_for_building()?,
            Self::MoveToValidation {
                blueprint,
                skip_confirmation,
            } => {
                let reached = machine.move_to_validation(blueprint, skip_confirmation)?;
                return Ok(Some(format!("reached {reached}")));
            }
            Self::MoveToReady => machine.move_to_ready()?,
        }
        Ok(None)
    }
}

/// What one step did to the machine
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: &'static str,
    pub ok: bool,
    pub state_after: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<StepOutcome>,
    pub failures: usize,
    pub status: PipelineStatusReport,
    /// Final snapshot with credential values masked
    pub snapshot: PipelineSnapshot,
}

pub fn parse_script(json: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_script<P: AsRef<Path>>(path: P) -> Result<Vec<ScriptStep>, ScriptError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&content)
}

/// Apply `steps` in order to `machine`
pub fn replay(machine: &mut PipelineMachine, steps: Vec<ScriptStep>) -> ReplayReport {
    let correlation_id = generate_correlation_id();
    let span = create_session_span("replay", Some(machine.session_id()), Some(&correlation_id));
    let _entered = span.enter();

    let mut outcomes = Vec::with_capacity(steps.len());
    for (index, step) in steps.into_iter().enumerate() {
        let op = step.name();
        let outcome = match step.apply(machine) {
            Ok(detail) => StepOutcome {
                index,
                op,
                ok: true,
                state_after: machine.current_state(),
                detail,
                error: None,
                error_kind: None,
            },
            Err(err) => StepOutcome {
                index,
                op,
                ok: false,
                state_after: machine.current_state(),
                detail: None,
                error: Some(err.to_string()),
                error_kind: Some(err.kind()),
            },
        };
        debug!(index, op, ok = outcome.ok, state = %outcome.state_after, "Script step applied");
        outcomes.push(outcome);
    }

    let failures = outcomes.iter().filter(|o| !o.ok).count();
    info!(
        steps = outcomes.len(),
        failures,
        final_state = %machine.current_state(),
        "Script replay finished"
    );

    ReplayReport {
        steps: outcomes,
        failures,
        status: machine.status_report(),
        snapshot: machine.snapshot().redacted(),
    }
}
