// Workflow Forge Library - prompt-to-workflow pipeline state machine
// This exposes the core components for testing and integration

pub mod config;
pub mod observability;
pub mod pipeline;
pub mod script;
pub mod session;
pub mod telemetry;

// Re-export key types for easy access
pub use config::{config, init_config, ForgeConfig, ObservabilityConfig, PipelineConfig};
pub use observability::{pipeline_metrics, PipelineMetrics, PipelineStats};
pub use pipeline::{
    Blueprint, ClarifyingQuestion, CredentialValue, ErrorKind, HistoryEntry, MachineSettings,
    PipelineError, PipelineMachine, PipelineResult, PipelineSnapshot, PipelineState,
    PipelineStatusReport, UpliftPolicy, ValidationIssue, ValidationIssueKind, WizardStep,
    TRANSITION_TABLE,
};
pub use script::{load_script, parse_script, replay, ReplayReport, ScriptError, ScriptStep};
pub use session::{SessionError, SessionId, SessionRegistry};
pub use telemetry::{create_session_span, generate_correlation_id, init_telemetry};
