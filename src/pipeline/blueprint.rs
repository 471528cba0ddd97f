// Blueprint, confirmation checkpoint, validation, retry and reset

use tracing::{info, warn};

use super::engine::PipelineMachine;
use super::errors::{PipelineError, PipelineResult};
use super::state::PipelineState;
use super::types::{Blueprint, PipelineSnapshot, ValidationIssue};
use super::uplift::UpliftPolicy;
use crate::observability::pipeline_metrics;

impl PipelineMachine {
    /// Attach the builder's blueprint and move on to validation.
    ///
    /// Outside `Building` the machine first tries to uplift into it.
    pub fn set_workflow_blueprint(&mut self, blueprint: Blueprint) -> PipelineResult {
        if self.snapshot.current_state != PipelineState::Building {
            self.ensure_state_for_building()?;
            self.require_state("set_workflow_blueprint", &[PipelineState::Building])?;
        }

        let reason = format!(
            "Blueprint attached ({} nodes, {} edges)",
            blueprint.nodes.len(),
            blueprint.edges.len()
        );
        self.snapshot.blueprint = blueprint;
        self.transition_to(PipelineState::Validation, &reason)
    }

    /// Attach the blueprint but stop at the confirm-before-validate checkpoint
    pub fn mark_workflow_built(&mut self, blueprint: Blueprint) -> PipelineResult {
        self.require_state("mark_workflow_built", &[PipelineState::Building])?;

        let reason = format!("Workflow built ({} nodes)", blueprint.nodes.len());
        self.snapshot.blueprint = blueprint;
        self.transition_to(PipelineState::WorkflowBuilt, &reason)
    }

    pub fn mark_waiting_for_confirmation(&mut self) -> PipelineResult {
        self.require_state("mark_waiting_for_confirmation", &[PipelineState::WorkflowBuilt])?;
        self.transition_to(PipelineState::WaitingConfirmation, "Awaiting user confirmation")
    }

    pub fn confirm_workflow(&mut self) -> PipelineResult {
        self.require_state("confirm_workflow", &[PipelineState::WaitingConfirmation])?;
        self.transition_to(PipelineState::Confirmed, "Workflow confirmed by user")
    }

    /// Reject the built workflow. `Rejected` is terminal; only `reset` leaves it.
    pub fn reject_workflow(&mut self) -> PipelineResult {
        self.require_state("reject_workflow", &[PipelineState::WaitingConfirmation])?;
        self.transition_to(PipelineState::Rejected, "Workflow rejected by user")
    }

    pub fn move_to_validation_from_confirmed(&mut self) -> PipelineResult {
        self.require_state("move_to_validation_from_confirmed", &[PipelineState::Confirmed])?;
        self.transition_to(PipelineState::Validation, "Validating confirmed workflow")
    }

    pub fn add_validation_error(&mut self, issue: ValidationIssue) -> PipelineResult {
        self.snapshot.validation_errors.push(issue);
        Ok(())
    }

    pub fn clear_validation_errors(&mut self) -> PipelineResult {
        self.snapshot.validation_errors.clear();
        Ok(())
    }

    /// Finish the pipeline.
    ///
    /// Requires `Validation`, no outstanding validation errors and at least one
    /// node. Under the lenient policy a machine still in
    /// `UnderstandingConfirmed`, `CredentialCollection` or `Building` that
    /// already holds a blueprint is first moved to `Validation`.
    pub fn mark_workflow_ready(&mut self) -> PipelineResult {
        let state = self.snapshot.current_state;
        let behind_validation = matches!(
            state,
            PipelineState::UnderstandingConfirmed
                | PipelineState::CredentialCollection
                | PipelineState::Building
        );
        if behind_validation
            && self.snapshot.blueprint.has_nodes()
            && self.settings.uplift_policy == UpliftPolicy::Lenient
        {
            self.uplift_to_validation()?;
        }

        self.require_state("mark_workflow_ready", &[PipelineState::Validation])?;

        let outstanding = self.snapshot.validation_errors.len();
        if outstanding > 0 {
            return self.reject(PipelineError::ValidationOutstanding { count: outstanding });
        }
        if !self.snapshot.blueprint.has_nodes() {
            return self.reject(PipelineError::EmptyBlueprint);
        }

        self.transition_to(PipelineState::Ready, "Workflow validated and ready")
    }

    fn uplift_to_validation(&mut self) -> PipelineResult {
        warn!(
            session_id = %self.session_id,
            from_state = %self.snapshot.current_state,
            nodes = self.snapshot.blueprint.nodes.len(),
            "Blueprint present before validation; advancing automatically"
        );

        if self.snapshot.current_state != PipelineState::Building {
            self.transition_to(PipelineState::Building, "Blueprint present; build assumed started")?;
        }
        self.transition_to(PipelineState::Validation, "Blueprint present; build assumed complete")
    }

    /// Count another build attempt, discarding the previous blueprint.
    ///
    /// Never transitions. Once the budget is spent the error asks the caller
    /// to divert with `transition_to_error`.
    pub fn retry_building(&mut self) -> PipelineResult<u32> {
        self.require_state("retry_building", &[PipelineState::Building])?;

        let max = self.settings.max_build_retries;
        if self.snapshot.retry_count >= max {
            warn!(
                session_id = %self.session_id,
                attempts = self.snapshot.retry_count,
                "Build retries exhausted"
            );
            return self.reject(PipelineError::RetryExhausted {
                attempts: self.snapshot.retry_count,
            });
        }

        self.snapshot.retry_count += 1;
        self.snapshot.blueprint = Blueprint::default();
        self.snapshot.validation_errors.clear();
        pipeline_metrics().record_retry();

        info!(
            session_id = %self.session_id,
            attempt = self.snapshot.retry_count,
            max_attempts = max,
            "Retrying workflow build"
        );
        Ok(self.snapshot.retry_count)
    }

    /// Discard everything and start over at `Idle`. Allowed from any state.
    pub fn reset(&mut self) -> PipelineResult {
        info!(
            session_id = %self.session_id,
            from_state = %self.snapshot.current_state,
            "Resetting pipeline"
        );
        pipeline_metrics().record_reset();
        self.snapshot = PipelineSnapshot::new();
        Ok(())
    }
}
