// Pipeline states and the static transition table

use serde::{Deserialize, Serialize};
use std::fmt;

use PipelineState as S;

/// Stages a workflow-generation session moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing received yet
    Idle,
    /// A user prompt has been stored
    PromptReceived,
    /// Clarifying questions are being answered
    ClarificationActive,
    /// The refined understanding of the prompt has been confirmed
    UnderstandingConfirmed,
    /// Waiting for the user to supply required credentials
    CredentialCollection,
    /// The builder collaborator is generating a blueprint
    Building,
    /// A blueprint exists and awaits the legacy confirmation checkpoint
    WorkflowBuilt,
    WaitingConfirmation,
    Confirmed,
    /// The user rejected the built workflow (terminal)
    Rejected,
    /// The validator collaborator is inspecting the blueprint
    Validation,
    /// Workflow is validated and executable (terminal)
    Ready,
    /// Divergence target for illegal requests and failures
    ErrorHandling,
}

impl PipelineState {
    pub const ALL: [PipelineState; 13] = [
        PipelineState::Idle,
        PipelineState::PromptReceived,
        PipelineState::ClarificationActive,
        PipelineState::UnderstandingConfirmed,
        PipelineState::CredentialCollection,
        PipelineState::Building,
        PipelineState::WorkflowBuilt,
        PipelineState::WaitingConfirmation,
        PipelineState::Confirmed,
        PipelineState::Rejected,
        PipelineState::Validation,
        PipelineState::Ready,
        PipelineState::ErrorHandling,
    ];

    /// A state with no legal outgoing transitions.
    ///
    /// `ErrorHandling` is not terminal: it can recover to `ClarificationActive`
    /// or restart at `Idle`.
    pub fn is_terminal(self) -> bool {
        TRANSITION_TABLE.allowed_from(self).is_empty()
    }

    /// States on which a confirmed understanding may still be missing
    pub fn precedes_confirmation(self) -> bool {
        matches!(
            self,
            PipelineState::Idle | PipelineState::PromptReceived | PipelineState::ClarificationActive
        )
    }

    /// Whether the pipeline has reached or passed `Building` on its forward path
    pub fn is_at_or_past_building(self) -> bool {
        matches!(
            self,
            PipelineState::Building
                | PipelineState::WorkflowBuilt
                | PipelineState::WaitingConfirmation
                | PipelineState::Confirmed
                | PipelineState::Validation
                | PipelineState::Ready
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "Idle",
            PipelineState::PromptReceived => "PromptReceived",
            PipelineState::ClarificationActive => "ClarificationActive",
            PipelineState::UnderstandingConfirmed => "UnderstandingConfirmed",
            PipelineState::CredentialCollection => "CredentialCollection",
            PipelineState::Building => "Building",
            PipelineState::WorkflowBuilt => "WorkflowBuilt",
            PipelineState::WaitingConfirmation => "WaitingConfirmation",
            PipelineState::Confirmed => "Confirmed",
            PipelineState::Rejected => "Rejected",
            PipelineState::Validation => "Validation",
            PipelineState::Ready => "Ready",
            PipelineState::ErrorHandling => "ErrorHandling",
        };
        f.write_str(name)
    }
}

/// Immutable mapping from each state to the ordered states it may move to.
///
/// ```text
/// Idle                   -> PromptReceived | ErrorHandling
/// PromptReceived         -> ClarificationActive | UnderstandingConfirmed | ErrorHandling
/// ClarificationActive    -> UnderstandingConfirmed | ErrorHandling
/// UnderstandingConfirmed -> CredentialCollection | Building | ErrorHandling
/// CredentialCollection   -> Building | ErrorHandling
/// Building               -> WorkflowBuilt | Validation | CredentialCollection | ErrorHandling
/// WorkflowBuilt          -> WaitingConfirmation | Validation | ErrorHandling
/// WaitingConfirmation    -> Confirmed | Rejected | ErrorHandling
/// Confirmed              -> Validation | ErrorHandling
/// Rejected               -> (none)
/// Validation             -> Ready | ErrorHandling
/// Ready                  -> (none)
/// ErrorHandling          -> ClarificationActive | Idle
/// ```
#[derive(Debug)]
pub struct TransitionTable {
    edges: [(PipelineState, &'static [PipelineState]); 13],
}

/// Process-wide table; read-only, shared by every session
pub static TRANSITION_TABLE: TransitionTable = TransitionTable {
    edges: [
        (S::Idle, &[S::PromptReceived, S::ErrorHandling]),
        (S::PromptReceived, &[S::ClarificationActive, S::UnderstandingConfirmed, S::ErrorHandling]),
        (S::ClarificationActive, &[S::UnderstandingConfirmed, S::ErrorHandling]),
        (S::UnderstandingConfirmed, &[S::CredentialCollection, S::Building, S::ErrorHandling]),
        (S::CredentialCollection, &[S::Building, S::ErrorHandling]),
        (S::Building, &[S::WorkflowBuilt, S::Validation, S::CredentialCollection, S::ErrorHandling]),
        (S::WorkflowBuilt, &[S::WaitingConfirmation, S::Validation, S::ErrorHandling]),
        (S::WaitingConfirmation, &[S::Confirmed, S::Rejected, S::ErrorHandling]),
        (S::Confirmed, &[S::Validation, S::ErrorHandling]),
        (S::Rejected, &[]),
        (S::Validation, &[S::Ready, S::ErrorHandling]),
        (S::Ready, &[]),
        (S::ErrorHandling, &[S::ClarificationActive, S::Idle]),
    ],
};

impl TransitionTable {
    /// Ordered targets reachable from `from` in one step
    pub fn allowed_from(&self, from: PipelineState) -> &'static [PipelineState] {
        self.edges
            .iter()
            .find(|(state, _)| *state == from)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn is_legal(&self, from: PipelineState, to: PipelineState) -> bool {
        self.allowed_from(from).contains(&to)
    }

    /// Iterate over every `(from, targets)` row in declaration order
    pub fn rows(&self) -> impl Iterator<Item = (PipelineState, &'static [PipelineState])> + '_ {
        self.edges.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_state_has_a_row() {
        for state in PipelineState::ALL {
            assert_eq!(
                TRANSITION_TABLE.rows().filter(|(from, _)| *from == state).count(),
                1,
                "state {state} must appear exactly once"
            );
        }
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = PipelineState::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![PipelineState::Rejected, PipelineState::Ready]);
        assert!(!PipelineState::ErrorHandling.is_terminal());
    }

    #[test]
    fn test_building_has_no_self_loop() {
        assert!(!TRANSITION_TABLE.is_legal(PipelineState::Building, PipelineState::Building));
    }

    #[test]
    fn test_error_handling_reachable_from_all_non_terminal_states() {
        for state in PipelineState::ALL {
            if state.is_terminal() || state == PipelineState::ErrorHandling {
                continue;
            }
            assert!(TRANSITION_TABLE.is_legal(state, PipelineState::ErrorHandling));
        }
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&PipelineState::UnderstandingConfirmed).unwrap();
        assert_eq!(json, "\"understanding_confirmed\"");
    }
}
