// Session ownership: one pipeline machine per generation session
//
// Each machine sits behind its own mutex so calls into one session are
// serialized while separate sessions proceed independently.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::pipeline::{MachineSettings, PipelineMachine, PipelineStatusReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
}

pub type SharedMachine = Arc<Mutex<PipelineMachine>>;

/// Live generation sessions keyed by id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    settings: MachineSettings,
    sessions: RwLock<HashMap<SessionId, SharedMachine>>,
}

impl SessionRegistry {
    pub fn new(settings: MachineSettings) -> Self {
        Self {
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a fresh session and return its id
    pub async fn create(&self) -> SessionId {
        let machine = PipelineMachine::with_settings(self.settings.clone());
        let id = machine.session_id();

        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(machine)));

        info!(session_id = %id, "Pipeline session created");
        id
    }

    pub async fn get(&self, id: SessionId) -> Result<SharedMachine, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    /// Run one operation under the session's lock
    pub async fn with_session<T>(
        &self,
        id: SessionId,
        operation: impl FnOnce(&mut PipelineMachine) -> T,
    ) -> Result<T, SessionError> {
        let machine = self.get(id).await?;
        let mut guard = machine.lock().await;
        Ok(operation(&mut *guard))
    }

    pub async fn status(&self, id: SessionId) -> Result<PipelineStatusReport, SessionError> {
        self.with_session(id, |machine| machine.status_report()).await
    }

    /// Drop a session; returns whether it existed
    pub async fn abandon(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Pipeline session abandoned");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineState;

    #[test]
    fn test_session_id_parse_round_trip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_sessions_are_isolated() {
        tokio_test::block_on(async {
            let registry = SessionRegistry::new(MachineSettings::default());
            let first = registry.create().await;
            let second = registry.create().await;

            registry
                .with_session(first, |m| m.set_user_prompt("first prompt"))
                .await
                .unwrap()
                .unwrap();

            let first_state = registry.with_session(first, |m| m.current_state()).await.unwrap();
            let second_state = registry.with_session(second, |m| m.current_state()).await.unwrap();
            assert_eq!(first_state, PipelineState::PromptReceived);
            assert_eq!(second_state, PipelineState::Idle);
        });
    }

    #[test]
    fn test_abandon_removes_session() {
        tokio_test::block_on(async {
            let registry = SessionRegistry::new(MachineSettings::default());
            let id = registry.create().await;
            assert_eq!(registry.len().await, 1);

            assert!(registry.abandon(id).await);
            assert!(!registry.abandon(id).await);
            assert!(matches!(registry.status(id).await, Err(SessionError::NotFound(_))));
            assert!(registry.is_empty().await);
        });
    }
}
