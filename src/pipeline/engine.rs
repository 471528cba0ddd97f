use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::credentials::CredentialMatcher;
use super::errors::{PipelineError, PipelineResult};
use super::state::{PipelineState, TRANSITION_TABLE};
use super::types::{HistoryEntry, PipelineSnapshot};
use super::uplift::UpliftPolicy;
use super::wizard::WizardStep;
use crate::config::PipelineConfig;
use crate::observability::pipeline_metrics;
use crate::session::SessionId;

pub const DEFAULT_MAX_BUILD_RETRIES: u32 = 3;

/// Outcome of a legality query against the transition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCheck {
    pub valid: bool,
    pub reason: Option<String>,
}

/// Per-machine behavior knobs, usually derived from configuration
#[derive(Debug, Clone)]
pub struct MachineSettings {
    pub uplift_policy: UpliftPolicy,
    pub max_build_retries: u32,
    pub credentials: CredentialMatcher,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            uplift_policy: UpliftPolicy::Lenient,
            max_build_retries: DEFAULT_MAX_BUILD_RETRIES,
            credentials: CredentialMatcher::new(),
        }
    }
}

impl MachineSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            uplift_policy: config.uplift_policy,
            max_build_retries: config.max_build_retries,
            credentials: CredentialMatcher::with_extra_aliases(&config.credential_aliases),
        }
    }

    pub fn strict() -> Self {
        Self {
            uplift_policy: UpliftPolicy::Strict,
            ..Self::default()
        }
    }
}

/// Workflow-generation state machine for one session.
///
/// Owns its snapshot exclusively. Every public operation either applies a
/// table-legal transition, diverts to `ErrorHandling`, or returns an error
/// without touching state.
#[derive(Debug, Clone)]
pub struct PipelineMachine {
    pub(crate) session_id: SessionId,
    pub(crate) snapshot: PipelineSnapshot,
    pub(crate) settings: MachineSettings,
}

impl PipelineMachine {
    pub fn new() -> Self {
        Self::with_settings(MachineSettings::default())
    }

    pub fn with_settings(settings: MachineSettings) -> Self {
        Self {
            session_id: SessionId::new(),
            snapshot: PipelineSnapshot::new(),
            settings,
        }
    }

    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    /// Rebuild a machine around a previously exported snapshot
    pub fn from_snapshot(snapshot: PipelineSnapshot, settings: MachineSettings) -> PipelineResult<Self> {
        if let Some(violation) = snapshot.invariant_violation_for(snapshot.current_state) {
            return Err(PipelineError::Internal { message: violation });
        }
        Ok(Self {
            session_id: SessionId::new(),
            snapshot,
            settings,
        })
    }

    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn can_transition_to(&self, target: PipelineState) -> TransitionCheck {
        let from = self.snapshot.current_state;
        if TRANSITION_TABLE.is_legal(from, target) {
            TransitionCheck {
                valid: true,
                reason: None,
            }
        } else {
            TransitionCheck {
                valid: false,
                reason: Some(format!(
                    "Cannot transition from {from} to {target}; allowed: [{}]",
                    TRANSITION_TABLE
                        .allowed_from(from)
                        .iter()
                        .map(|s| s.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
            }
        }
    }

    /// Apply a table transition, diverting to `ErrorHandling` when it is illegal
    pub fn transition_to(&mut self, target: PipelineState, reason: &str) -> PipelineResult {
        let from = self.snapshot.current_state;
        let check = self.can_transition_to(target);

        if !check.valid {
            let err = PipelineError::InvalidTransition { from, to: target };
            let detail = check.reason.unwrap_or_else(|| err.to_string());

            // Already diverted: refresh the message without a second history entry
            if from == PipelineState::ErrorHandling {
                warn!(
                    session_id = %self.session_id,
                    to_state = %target,
                    "Illegal transition requested while already handling an error"
                );
                pipeline_metrics().record_invalid_transition();
                self.snapshot.last_error = Some(format!("{detail} ({reason})"));
                return Err(err);
            }

            pipeline_metrics().record_invalid_transition();
            self.transition_to_error(format!("{detail} ({reason})"))?;
            return Err(err);
        }

        if target == PipelineState::ErrorHandling {
            return self.transition_to_error(reason);
        }

        if let Some(violation) = self.snapshot.invariant_violation_for(target) {
            let message = format!("Transition {from} -> {target} rejected: {violation}");
            self.transition_to_error(message.clone())?;
            return Err(PipelineError::Internal { message });
        }

        self.record_transition(target, reason.to_string());
        Ok(())
    }

    /// Divert to `ErrorHandling`, recording one history entry per call
    pub fn transition_to_error(&mut self, message: impl Into<String>) -> PipelineResult {
        let message = message.into();
        let from = self.snapshot.current_state;

        error!(
            session_id = %self.session_id,
            from_state = %from,
            error = %message,
            "Pipeline diverted to error handling"
        );

        pipeline_metrics().record_divergence();
        self.snapshot.last_error = Some(message.clone());
        self.record_transition(PipelineState::ErrorHandling, message);
        Ok(())
    }

    pub fn handle_error(&mut self, message: impl Into<String>) -> PipelineResult {
        self.transition_to_error(message)
    }

    fn record_transition(&mut self, to: PipelineState, reason: String) {
        let from = self.snapshot.current_state;
        info!(
            session_id = %self.session_id,
            from_state = %from,
            to_state = %to,
            reason = %reason,
            "Pipeline state transition"
        );

        pipeline_metrics().record_transition();
        self.snapshot.history.push(HistoryEntry::new(to, reason));
        self.snapshot.current_state = to;
    }

    /// Log and count a guard failure that leaves state untouched
    pub(crate) fn reject<T>(&self, err: PipelineError) -> PipelineResult<T> {
        debug!(
            session_id = %self.session_id,
            state = %self.snapshot.current_state,
            error = %err,
            "Pipeline operation rejected"
        );
        pipeline_metrics().record_precondition_failure();
        Err(err)
    }

    pub(crate) fn require_state(
        &self,
        operation: &'static str,
        expected: &[PipelineState],
    ) -> PipelineResult {
        let actual = self.snapshot.current_state;
        if expected.contains(&actual) {
            Ok(())
        } else {
            self.reject(PipelineError::wrong_stage(operation, expected, actual))
        }
    }

    pub fn current_state(&self) -> PipelineState {
        self.snapshot.current_state
    }

    /// Owned copy of the full snapshot
    pub fn execution_state(&self) -> PipelineSnapshot {
        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> &PipelineSnapshot {
        &self.snapshot
    }

    pub fn state_history(&self) -> &[HistoryEntry] {
        &self.snapshot.history
    }

    pub fn is_terminal_state(&self) -> bool {
        self.snapshot.current_state.is_terminal()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.snapshot.last_error.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.snapshot.retry_count
    }

    pub fn wizard_step(&self) -> WizardStep {
        WizardStep::from(self.snapshot.current_state)
    }

    /// One line per history entry, oldest first
    pub fn describe_history(&self) -> String {
        self.snapshot
            .history
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                format!(
                    "{i:>3} {} {:<22} {}",
                    entry.timestamp.format("%H:%M:%S%.3f"),
                    entry.state.to_string(),
                    entry.reason
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Generate status report for monitoring
    pub fn status_report(&self) -> PipelineStatusReport {
        PipelineStatusReport {
            session_id: self.session_id,
            current_state: self.snapshot.current_state,
            wizard_step: self.wizard_step(),
            is_terminal: self.is_terminal_state(),
            retry_count: self.snapshot.retry_count,
            retries_remaining: self
                .settings
                .max_build_retries
                .saturating_sub(self.snapshot.retry_count),
            validation_errors: self.snapshot.validation_errors.len(),
            last_error: self.snapshot.last_error.clone(),
            transitions_count: self.snapshot.history.len() - 1,
            last_transition: self.snapshot.history.last().map(|entry| entry.timestamp),
        }
    }
}

impl Default for PipelineMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Status report for driving a UI or monitoring a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatusReport {
    pub session_id: SessionId,
    pub current_state: PipelineState,
    pub wizard_step: WizardStep,
    pub is_terminal: bool,
    pub retry_count: u32,
    pub retries_remaining: u32,
    pub validation_errors: usize,
    pub last_error: Option<String>,
    pub transitions_count: usize,
    pub last_transition: Option<DateTime<Utc>>,
}
