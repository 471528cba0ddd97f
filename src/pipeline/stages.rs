// Guarded stage operations: prompt intake through the start of the build

use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use super::engine::PipelineMachine;
use super::errors::{PipelineError, PipelineResult};
use super::state::PipelineState;
use super::types::{ClarifyingQuestion, CredentialValue};

impl PipelineMachine {
    pub fn set_user_prompt(&mut self, text: impl Into<String>) -> PipelineResult {
        self.require_state("set_user_prompt", &[PipelineState::Idle])?;

        self.snapshot.user_prompt = text.into();
        self.transition_to(PipelineState::PromptReceived, "User prompt received")
    }

    /// Store questions from the prompt-analysis collaborator.
    ///
    /// Safe to call repeatedly; only the first call from `PromptReceived`
    /// moves the machine.
    pub fn set_clarifying_questions(&mut self, questions: Vec<ClarifyingQuestion>) -> PipelineResult {
        let count = questions.len();
        self.snapshot.clarifying_questions = questions;

        if self.snapshot.current_state == PipelineState::PromptReceived {
            return self.transition_to(
                PipelineState::ClarificationActive,
                &format!("{count} clarifying question(s) issued"),
            );
        }
        Ok(())
    }

    pub fn set_clarifying_answers(&mut self, answers: BTreeMap<String, String>) -> PipelineResult {
        self.snapshot.clarifying_answers = answers;
        Ok(())
    }

    pub fn confirm_understanding(&mut self, text: impl Into<String>) -> PipelineResult {
        self.require_state(
            "confirm_understanding",
            &[PipelineState::PromptReceived, PipelineState::ClarificationActive],
        )?;

        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return self.reject(PipelineError::EmptyInput {
                field: "final_understanding",
            });
        }

        self.snapshot.final_understanding = trimmed.to_string();
        self.transition_to(PipelineState::UnderstandingConfirmed, "Understanding confirmed")
    }

    /// Store the credential names the discovery collaborator found.
    ///
    /// A non-empty requirement arriving during `Building` sends the machine
    /// back to `CredentialCollection`.
    pub fn set_required_credentials<I, S>(&mut self, names: I) -> PipelineResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|name| -> String { name.into() })
            .filter(|name| !name.trim().is_empty())
            .collect();
        let has_requirements = !names.is_empty();
        self.snapshot.credentials_required = names;

        match self.snapshot.current_state {
            PipelineState::UnderstandingConfirmed => self.transition_to(
                PipelineState::CredentialCollection,
                "Collecting required credentials",
            ),
            PipelineState::Building if has_requirements => {
                warn!(
                    session_id = %self.session_id,
                    required = ?self.snapshot.credentials_required,
                    "Credentials discovered during build"
                );
                self.transition_to(
                    PipelineState::CredentialCollection,
                    "Credentials discovered during build",
                )
            }
            _ => Ok(()),
        }
    }

    pub fn set_provided_credentials<I, K, V>(&mut self, credentials: I) -> PipelineResult
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CredentialValue>,
    {
        self.snapshot.credentials_provided = credentials
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Ok(())
    }

    /// Required credential names that are not yet satisfied
    pub fn missing_credentials(&self) -> Vec<String> {
        self.settings.credentials.missing(
            &self.snapshot.credentials_required,
            &self.snapshot.credentials_provided,
        )
    }

    /// Enter `Building` once understanding and credentials are in place.
    ///
    /// Gates are checked in a fixed order so callers can route on the error:
    /// confirmation, then credentials, then stage.
    pub fn start_building(&mut self) -> PipelineResult {
        if !self.snapshot.has_confirmed_understanding() {
            return self.reject(PipelineError::ConfirmationRequired);
        }

        let missing = self.missing_credentials();
        if !missing.is_empty() {
            return self.reject(PipelineError::MissingCredentials { missing });
        }

        self.require_state(
            "start_building",
            &[PipelineState::UnderstandingConfirmed, PipelineState::CredentialCollection],
        )?;

        info!(
            session_id = %self.session_id,
            credentials = self.snapshot.credentials_required.len(),
            "Starting workflow build"
        );
        self.transition_to(PipelineState::Building, "Build started")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::errors::ErrorKind;

    fn confirmed_machine() -> PipelineMachine {
        let mut machine = PipelineMachine::new();
        machine.set_user_prompt("build a slack bot").unwrap();
        machine.confirm_understanding("post to slack daily").unwrap();
        machine
    }

    #[test]
    fn test_set_user_prompt_outside_idle_is_rejected_without_transition() {
        let mut machine = PipelineMachine::new();
        machine.set_user_prompt("first").unwrap();
        let history_len = machine.state_history().len();

        let err = machine.set_user_prompt("second").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailure);
        assert_eq!(machine.current_state(), PipelineState::PromptReceived);
        assert_eq!(machine.snapshot().user_prompt, "first");
        assert_eq!(machine.state_history().len(), history_len);
    }

    #[test]
    fn test_clarifying_questions_only_transition_from_prompt_received() {
        let mut machine = PipelineMachine::new();
        machine.set_user_prompt("prompt").unwrap();

        let question = ClarifyingQuestion {
            id: "q1".to_string(),
            text: "Which channel?".to_string(),
            options: vec!["#general".to_string()],
        };
        machine.set_clarifying_questions(vec![question.clone()]).unwrap();
        assert_eq!(machine.current_state(), PipelineState::ClarificationActive);

        machine.set_clarifying_questions(vec![question.clone(), question]).unwrap();
        assert_eq!(machine.current_state(), PipelineState::ClarificationActive);
        assert_eq!(machine.snapshot().clarifying_questions.len(), 2);
        assert_eq!(machine.state_history().len(), 3);
    }

    #[test]
    fn test_answers_are_stored_without_transition() {
        let mut machine = PipelineMachine::new();
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), "#general".to_string());

        machine.set_clarifying_answers(answers).unwrap();
        assert_eq!(machine.current_state(), PipelineState::Idle);
        assert_eq!(machine.snapshot().clarifying_answers["q1"], "#general");
    }

    #[test]
    fn test_confirm_understanding_rejects_blank_text() {
        let mut machine = PipelineMachine::new();
        machine.set_user_prompt("prompt").unwrap();

        let err = machine.confirm_understanding("   ").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput { .. }));
        assert_eq!(machine.current_state(), PipelineState::PromptReceived);
    }

    #[test]
    fn test_confirm_understanding_requires_prompt_stage() {
        let mut machine = PipelineMachine::new();
        let err = machine.confirm_understanding("text").unwrap_err();
        assert!(matches!(err, PipelineError::WrongStage { .. }));
        assert!(machine.snapshot().final_understanding.is_empty());
    }

    #[test]
    fn test_required_credentials_move_to_collection() {
        let mut machine = confirmed_machine();
        machine.set_required_credentials(["SLACK_TOKEN"]).unwrap();
        assert_eq!(machine.current_state(), PipelineState::CredentialCollection);

        let err = machine.start_building().unwrap_err();
        assert_eq!(err.missing_credentials(), Some(&["SLACK_TOKEN".to_string()][..]));
        assert!(err.to_string().contains("SLACK_TOKEN"));
    }

    #[test]
    fn test_provided_alias_satisfies_requirement() {
        let mut machine = confirmed_machine();
        machine.set_required_credentials(["SLACK_TOKEN"]).unwrap();
        machine
            .set_provided_credentials([("slack_bot_token", "xoxb-1")])
            .unwrap();

        machine.start_building().unwrap();
        assert_eq!(machine.current_state(), PipelineState::Building);
    }

    #[test]
    fn test_late_credential_requirement_diverts_back_from_building() {
        let mut machine = confirmed_machine();
        machine.start_building().unwrap();

        machine.set_required_credentials(["NOTION_API_KEY"]).unwrap();
        assert_eq!(machine.current_state(), PipelineState::CredentialCollection);

        machine
            .set_provided_credentials([("NOTION_API_KEY", "secret")])
            .unwrap();
        machine.start_building().unwrap();
        assert_eq!(machine.current_state(), PipelineState::Building);
    }

    #[test]
    fn test_empty_requirement_during_build_stays_in_building() {
        let mut machine = confirmed_machine();
        machine.start_building().unwrap();
        machine.set_required_credentials(Vec::<String>::new()).unwrap();
        assert_eq!(machine.current_state(), PipelineState::Building);
    }

    #[test]
    fn test_start_building_requires_confirmation_first() {
        let mut machine = PipelineMachine::new();
        machine.set_user_prompt("prompt").unwrap();
        machine.set_required_credentials(["SLACK_TOKEN"]).unwrap();

        let err = machine.start_building().unwrap_err();
        assert!(err.requires_confirmation());
        assert_eq!(machine.current_state(), PipelineState::PromptReceived);
    }

    #[test]
    fn test_start_building_wrong_stage() {
        let mut machine = confirmed_machine();
        machine.start_building().unwrap();

        let err = machine.start_building().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::WrongStage {
                actual: PipelineState::Building,
                ..
            }
        ));
    }
}
