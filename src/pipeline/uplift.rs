// Uplift: walk the pipeline forward when the caller is ahead of the machine

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::engine::PipelineMachine;
use super::errors::{PipelineError, PipelineResult};
use super::state::PipelineState;
use super::types::Blueprint;

/// Whether uplift may stand in for a missing understanding confirmation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpliftPolicy {
    /// Adopt the raw prompt as the understanding and keep going
    #[default]
    Lenient,
    /// Stop with `ConfirmationRequired`
    Strict,
}

const UPLIFT_SOURCES: &[PipelineState] = &[
    PipelineState::PromptReceived,
    PipelineState::ClarificationActive,
    PipelineState::UnderstandingConfirmed,
    PipelineState::CredentialCollection,
    PipelineState::ErrorHandling,
];

impl PipelineMachine {
    /// Advance to `Building` through whatever optional stages are outstanding.
    ///
    /// Already at or past `Building` (other than `Rejected`) is a successful
    /// no-op. Credentials are never bypassed.
    pub fn ensure_state_for_building(&mut self) -> PipelineResult {
        let state = self.snapshot.current_state;
        if state.is_at_or_past_building() {
            debug!(session_id = %self.session_id, state = %state, "Already past build entry");
            return Ok(());
        }
        if !UPLIFT_SOURCES.contains(&state) {
            return self.reject(PipelineError::wrong_stage(
                "ensure_state_for_building",
                UPLIFT_SOURCES,
                state,
            ));
        }

        let needs_confirmation = matches!(
            state,
            PipelineState::PromptReceived
                | PipelineState::ClarificationActive
                | PipelineState::ErrorHandling
        ) && !self.snapshot.has_confirmed_understanding();

        if needs_confirmation
            && (self.settings.uplift_policy == UpliftPolicy::Strict
                || self.snapshot.user_prompt.trim().is_empty())
        {
            return self.reject(PipelineError::ConfirmationRequired);
        }

        if state == PipelineState::ErrorHandling {
            self.transition_to(PipelineState::ClarificationActive, "Recovering from error for build")?;
        }

        if self.snapshot.current_state.precedes_confirmation() {
            if needs_confirmation {
                warn!(
                    session_id = %self.session_id,
                    state = %self.snapshot.current_state,
                    "Building without a confirmed understanding; using the prompt as-is"
                );
                self.snapshot.final_understanding = self.snapshot.user_prompt.trim().to_string();
            }
            self.transition_to(
                PipelineState::UnderstandingConfirmed,
                "Understanding accepted for build",
            )?;
        }

        self.start_building()
    }

    /// Attach a blueprint from wherever the build entry is reachable.
    ///
    /// With `skip_confirmation` the machine ends in `Validation`; otherwise it
    /// stops at `WaitingConfirmation`. Returns the state reached. Nothing is
    /// committed unless every step succeeds.
    pub fn move_to_validation(
        &mut self,
        blueprint: Blueprint,
        skip_confirmation: bool,
    ) -> PipelineResult<PipelineState> {
        self.transactional("move_to_validation", move |machine| {
            machine.ensure_state_for_building()?;
            if skip_confirmation {
                machine.set_workflow_blueprint(blueprint)?;
            } else {
                machine.mark_workflow_built(blueprint)?;
                machine.mark_waiting_for_confirmation()?;
            }
            Ok(machine.current_state())
        })
    }

    /// Finish from `Validation`, `Confirmed` or `WorkflowBuilt`, or anywhere
    /// `mark_workflow_ready` can uplift from. All-or-nothing.
    pub fn move_to_ready(&mut self) -> PipelineResult {
        self.transactional("move_to_ready", |machine| {
            match machine.current_state() {
                PipelineState::Confirmed => machine.move_to_validation_from_confirmed()?,
                PipelineState::WorkflowBuilt => machine.transition_to(
                    PipelineState::Validation,
                    "Confirmation checkpoint skipped",
                )?,
                _ => {}
            }
            machine.mark_workflow_ready()
        })
    }

    /// Run `operation` on a working copy and keep the result only on success
    fn transactional<T>(
        &mut self,
        name: &'static str,
        operation: impl FnOnce(&mut PipelineMachine) -> PipelineResult<T>,
    ) -> PipelineResult<T> {
        let mut working = self.clone();
        match operation(&mut working) {
            Ok(value) => {
                *self = working;
                Ok(value)
            }
            Err(err) => {
                warn!(
                    session_id = %self.session_id,
                    operation = name,
                    state = %self.snapshot.current_state,
                    error = %err,
                    "Composite operation failed; nothing committed"
                );
                Err(err)
            }
        }
    }
}
