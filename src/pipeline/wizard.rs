// Mapping between pipeline states and the wizard steps a UI renders

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::state::PipelineState;

/// Step vocabulary of the generation wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    Idle,
    Analyzing,
    Questioning,
    Confirming,
    Credentials,
    Building,
    Review,
    Rejected,
    Validating,
    Complete,
    Error,
}

impl WizardStep {
    pub const ALL: [WizardStep; 11] = [
        WizardStep::Idle,
        WizardStep::Analyzing,
        WizardStep::Questioning,
        WizardStep::Confirming,
        WizardStep::Credentials,
        WizardStep::Building,
        WizardStep::Review,
        WizardStep::Rejected,
        WizardStep::Validating,
        WizardStep::Complete,
        WizardStep::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WizardStep::Idle => "idle",
            WizardStep::Analyzing => "analyzing",
            WizardStep::Questioning => "questioning",
            WizardStep::Confirming => "confirming",
            WizardStep::Credentials => "credentials",
            WizardStep::Building => "building",
            WizardStep::Review => "review",
            WizardStep::Rejected => "rejected",
            WizardStep::Validating => "validating",
            WizardStep::Complete => "complete",
            WizardStep::Error => "error",
        }
    }
}

impl From<PipelineState> for WizardStep {
    fn from(state: PipelineState) -> Self {
        match state {
            PipelineState::Idle => WizardStep::Idle,
            PipelineState::PromptReceived => WizardStep::Analyzing,
            PipelineState::ClarificationActive => WizardStep::Questioning,
            PipelineState::UnderstandingConfirmed => WizardStep::Confirming,
            PipelineState::CredentialCollection => WizardStep::Credentials,
            PipelineState::Building => WizardStep::Building,
            PipelineState::WorkflowBuilt
            | PipelineState::WaitingConfirmation
            | PipelineState::Confirmed => WizardStep::Review,
            PipelineState::Rejected => WizardStep::Rejected,
            PipelineState::Validation => WizardStep::Validating,
            PipelineState::Ready => WizardStep::Complete,
            PipelineState::ErrorHandling => WizardStep::Error,
        }
    }
}

impl From<WizardStep> for PipelineState {
    // `review` covers three states; the checkpoint itself is the representative.
    fn from(step: WizardStep) -> Self {
        match step {
            WizardStep::Idle => PipelineState::Idle,
            WizardStep::Analyzing => PipelineState::PromptReceived,
            WizardStep::Questioning => PipelineState::ClarificationActive,
            WizardStep::Confirming => PipelineState::UnderstandingConfirmed,
            WizardStep::Credentials => PipelineState::CredentialCollection,
            WizardStep::Building => PipelineState::Building,
            WizardStep::Review => PipelineState::WaitingConfirmation,
            WizardStep::Rejected => PipelineState::Rejected,
            WizardStep::Validating => PipelineState::Validation,
            WizardStep::Complete => PipelineState::Ready,
            WizardStep::Error => PipelineState::ErrorHandling,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown wizard step: {0}")]
pub struct UnknownWizardStep(pub String);

impl FromStr for WizardStep {
    type Err = UnknownWizardStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        WizardStep::ALL
            .into_iter()
            .find(|step| step.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownWizardStep(s.to_string()))
    }
}

impl PipelineState {
    /// Resolve a wizard step name, falling back to `Idle` for unknown names
    pub fn from_step_name(name: &str) -> PipelineState {
        name.parse::<WizardStep>()
            .map(PipelineState::from)
            .unwrap_or(PipelineState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_state_maps_to_a_step_and_back_to_a_state_with_that_step() {
        for state in PipelineState::ALL {
            let step = WizardStep::from(state);
            assert_eq!(WizardStep::from(PipelineState::from(step)), step);
        }
    }

    #[test]
    fn test_every_step_is_used() {
        for step in WizardStep::ALL {
            assert!(
                PipelineState::ALL.iter().any(|s| WizardStep::from(*s) == step),
                "step {step} has no state"
            );
        }
    }

    #[test]
    fn test_step_names_round_trip() {
        for step in WizardStep::ALL {
            assert_eq!(step.as_str().parse::<WizardStep>().unwrap(), step);
            assert_eq!(serde_json::to_string(&step).unwrap(), format!("\"{}\"", step.as_str()));
        }
    }

    #[test]
    fn test_known_pairs() {
        assert_eq!(PipelineState::from_step_name("idle"), PipelineState::Idle);
        assert_eq!(PipelineState::from_step_name("questioning"), PipelineState::ClarificationActive);
        assert_eq!(PipelineState::from_step_name("building"), PipelineState::Building);
        assert_eq!(PipelineState::from_step_name("Complete"), PipelineState::Ready);
    }

    #[test]
    fn test_unknown_step_defaults_to_idle() {
        assert_eq!(PipelineState::from_step_name("deploying"), PipelineState::Idle);
        assert_eq!(PipelineState::from_step_name(""), PipelineState::Idle);
        assert!("deploying".parse::<WizardStep>().is_err());
    }
}
