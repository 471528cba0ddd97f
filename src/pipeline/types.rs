// Snapshot and supporting data types for the generation pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::state::PipelineState;

pub const INITIAL_HISTORY_REASON: &str = "Initialized";
const REDACTED: &str = "***";

/// One applied transition, diversions to `ErrorHandling` included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub state: PipelineState,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

impl HistoryEntry {
    pub fn new(state: PipelineState, reason: impl Into<String>) -> Self {
        Self {
            state,
            timestamp: Utc::now(),
            reason: reason.into(),
        }
    }
}

/// Question produced by the prompt-analysis collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyingQuestion {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Node/edge graph produced by the builder collaborator.
///
/// Records are opaque here; only emptiness is ever inspected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub nodes: Vec<serde_json::Value>,
    #[serde(default)]
    pub edges: Vec<serde_json::Value>,
}

impl Blueprint {
    pub fn new(nodes: Vec<serde_json::Value>, edges: Vec<serde_json::Value>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssueKind {
    Structure,
    Connection,
    Parameter,
    Credential,
    Other,
}

/// Problem reported by the validator collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: ValidationIssueKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl ValidationIssue {
    pub fn new(kind: ValidationIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            node_id: None,
        }
    }

    pub fn for_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }
}

/// Secret supplied by the user; never shown by `Debug`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialValue(String);

impl CredentialValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for CredentialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialValue(***)")
    }
}

impl From<&str> for CredentialValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CredentialValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The single mutable aggregate of one generation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub current_state: PipelineState,
    pub user_prompt: String,
    pub clarifying_questions: Vec<ClarifyingQuestion>,
    pub clarifying_answers: BTreeMap<String, String>,
    /// Empty means "not confirmed"
    pub final_understanding: String,
    pub credentials_required: BTreeSet<String>,
    pub credentials_provided: BTreeMap<String, CredentialValue>,
    pub blueprint: Blueprint,
    pub validation_errors: Vec<ValidationIssue>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub history: Vec<HistoryEntry>,
}

impl PipelineSnapshot {
    pub fn new() -> Self {
        Self {
            current_state: PipelineState::Idle,
            user_prompt: String::new(),
            clarifying_questions: Vec::new(),
            clarifying_answers: BTreeMap::new(),
            final_understanding: String::new(),
            credentials_required: BTreeSet::new(),
            credentials_provided: BTreeMap::new(),
            blueprint: Blueprint::default(),
            validation_errors: Vec::new(),
            retry_count: 0,
            last_error: None,
            history: vec![HistoryEntry::new(PipelineState::Idle, INITIAL_HISTORY_REASON)],
        }
    }

    pub fn has_confirmed_understanding(&self) -> bool {
        !self.final_understanding.trim().is_empty()
    }

    /// Check the invariants that must hold if the snapshot were in `state`.
    ///
    /// Returns a description of the first violation found.
    pub fn invariant_violation_for(&self, state: PipelineState) -> Option<String> {
        if state != PipelineState::ErrorHandling
            && !state.precedes_confirmation()
            && !self.has_confirmed_understanding()
        {
            return Some(format!(
                "state {state} requires a confirmed understanding but none is recorded"
            ));
        }
        if self.history.is_empty() {
            return Some("history must never be empty".to_string());
        }
        None
    }

    /// Copy with every provided credential value masked, for printing
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for value in copy.credentials_provided.values_mut() {
            *value = CredentialValue::new(REDACTED);
        }
        copy
    }
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
