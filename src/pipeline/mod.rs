// Workflow-generation pipeline state machine
//
// A prompt becomes an executable workflow through a fixed table of stages.
// Callers drive one guarded operation per user action and perform all I/O
// themselves; the machine only records and enforces progress.

pub mod blueprint;
pub mod credentials;
pub mod engine;
pub mod errors;
pub mod stages;
pub mod state;
pub mod types;
pub mod uplift;
pub mod wizard;

pub use credentials::{CredentialKey, CredentialMatcher, KNOWN_CREDENTIALS};
pub use engine::{MachineSettings, PipelineMachine, PipelineStatusReport, TransitionCheck, DEFAULT_MAX_BUILD_RETRIES};
pub use errors::{ErrorKind, PipelineError, PipelineResult};
pub use state::{PipelineState, TransitionTable, TRANSITION_TABLE};
pub use types::{
    Blueprint, ClarifyingQuestion, CredentialValue, HistoryEntry, PipelineSnapshot, ValidationIssue,
    ValidationIssueKind,
};
pub use uplift::UpliftPolicy;
pub use wizard::{UnknownWizardStep, WizardStep};
