// Credential name matching between discovered requirements and user input

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::types::CredentialValue;

/// Spellings the credential-discovery collaborator and the UI are known to
/// produce for the same secret, keyed by canonical name.
pub const KNOWN_CREDENTIALS: &[(&str, &[&str])] = &[
    ("slack_token", &["SLACK_TOKEN", "SLACK_BOT_TOKEN", "SLACK_API_TOKEN", "slackToken"]),
    ("openai_api_key", &["OPENAI_API_KEY", "OPENAI_KEY", "openaiApiKey"]),
    ("anthropic_api_key", &["ANTHROPIC_API_KEY", "anthropicApiKey"]),
    ("github_token", &["GITHUB_TOKEN", "GH_TOKEN", "githubToken", "github_access_token"]),
    ("google_api_key", &["GOOGLE_API_KEY", "googleApiKey"]),
    ("notion_api_key", &["NOTION_API_KEY", "NOTION_TOKEN", "notionApiKey"]),
    ("airtable_api_key", &["AIRTABLE_API_KEY", "AIRTABLE_TOKEN", "airtableApiKey"]),
    ("discord_bot_token", &["DISCORD_BOT_TOKEN", "DISCORD_TOKEN", "discordBotToken"]),
    ("stripe_secret_key", &["STRIPE_SECRET_KEY", "STRIPE_API_KEY", "stripeSecretKey"]),
    ("sendgrid_api_key", &["SENDGRID_API_KEY", "sendgridApiKey"]),
    ("twilio_auth_token", &["TWILIO_AUTH_TOKEN", "twilioAuthToken"]),
    ("telegram_bot_token", &["TELEGRAM_BOT_TOKEN", "telegramBotToken"]),
];

/// Resolved identity of a credential name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CredentialKey {
    /// Listed in the alias table
    Known(String),
    /// Not listed; compared ignoring case, `_` and `-`
    Custom(String),
}

/// Matches required credential names against provided ones
#[derive(Debug, Clone)]
pub struct CredentialMatcher {
    aliases: BTreeMap<String, String>,
}

impl CredentialMatcher {
    pub fn new() -> Self {
        let mut matcher = Self {
            aliases: BTreeMap::new(),
        };
        for (canonical, spellings) in KNOWN_CREDENTIALS {
            matcher.register(canonical, spellings.iter().copied());
        }
        matcher
    }

    /// Built-in table extended with configured aliases
    pub fn with_extra_aliases(extra: &BTreeMap<String, Vec<String>>) -> Self {
        let mut matcher = Self::new();
        for (canonical, spellings) in extra {
            matcher.register(canonical, spellings.iter().map(String::as_str));
        }
        matcher
    }

    // Keys are folded so listed names keep case and separator insensitivity
    fn register<'a>(&mut self, canonical: &str, spellings: impl Iterator<Item = &'a str>) {
        let canonical = canonical.trim().to_ascii_lowercase();
        self.aliases.insert(fold(&canonical), canonical.clone());
        for spelling in spellings {
            self.aliases.insert(fold(spelling.trim()), canonical.clone());
        }
    }

    pub fn resolve(&self, name: &str) -> CredentialKey {
        let folded = fold(name.trim());
        match self.aliases.get(&folded) {
            Some(canonical) => CredentialKey::Known(canonical.clone()),
            None => CredentialKey::Custom(folded),
        }
    }

    pub fn matches(&self, required: &str, provided: &str) -> bool {
        self.resolve(required) == self.resolve(provided)
    }

    /// Required names with no non-blank provided counterpart, in the
    /// order of `required`
    pub fn missing(
        &self,
        required: &BTreeSet<String>,
        provided: &BTreeMap<String, CredentialValue>,
    ) -> Vec<String> {
        let satisfied: BTreeSet<CredentialKey> = provided
            .iter()
            .filter(|(_, value)| !value.is_blank())
            .map(|(name, _)| self.resolve(name))
            .collect();

        required
            .iter()
            .filter(|name| !satisfied.contains(&self.resolve(name)))
            .cloned()
            .collect()
    }
}

impl Default for CredentialMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provided(entries: &[(&str, &str)]) -> BTreeMap<String, CredentialValue> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), CredentialValue::new(*v)))
            .collect()
    }

    fn required(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_every_table_spelling_resolves_to_its_canonical_key() {
        let matcher = CredentialMatcher::new();
        for (canonical, spellings) in KNOWN_CREDENTIALS {
            assert_eq!(
                matcher.resolve(canonical),
                CredentialKey::Known(canonical.to_string())
            );
            for spelling in *spellings {
                assert_eq!(
                    matcher.resolve(spelling),
                    CredentialKey::Known(canonical.to_string()),
                    "{spelling} should resolve to {canonical}"
                );
            }
        }
    }

    #[test]
    fn test_aliases_do_not_collide_across_providers() {
        let mut seen = BTreeMap::new();
        for (canonical, spellings) in KNOWN_CREDENTIALS {
            for spelling in std::iter::once(canonical).chain(spellings.iter()) {
                if let Some(previous) = seen.insert(fold(spelling), *canonical) {
                    if previous != *canonical {
                        panic!("{spelling} listed for both {previous} and {canonical}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_custom_names_fold_case_and_separators() {
        let matcher = CredentialMatcher::new();
        assert!(matcher.matches("MY_CUSTOM_KEY", "my-custom-key"));
        assert!(matcher.matches("MyCustomKey", "MY_CUSTOM_KEY"));
        assert!(!matcher.matches("MY_CUSTOM_KEY", "MY_OTHER_KEY"));
    }

    #[test]
    fn test_known_alias_satisfies_requirement() {
        let matcher = CredentialMatcher::new();
        let missing = matcher.missing(
            &required(&["SLACK_TOKEN", "OPENAI_API_KEY"]),
            &provided(&[("slackToken", "xoxb-1")]),
        );
        assert_eq!(missing, vec!["OPENAI_API_KEY".to_string()]);
    }

    #[test]
    fn test_listed_names_ignore_case_and_separators() {
        let matcher = CredentialMatcher::new();
        assert_eq!(
            matcher.resolve("Slack-Token"),
            CredentialKey::Known("slack_token".to_string())
        );

        let missing = matcher.missing(&required(&["SLACK_TOKEN"]), &provided(&[("slack-token", "xoxb-1")]));
        assert!(missing.is_empty());

        let missing = matcher.missing(&required(&["Slack-Token"]), &provided(&[("SLACK_TOKEN", "xoxb-1")]));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_service_specific_key_is_not_satisfied_by_generic_one() {
        let matcher = CredentialMatcher::new();
        assert!(!matcher.matches("GOOGLE_SHEETS_API_KEY", "GOOGLE_API_KEY"));

        let missing = matcher.missing(
            &required(&["GOOGLE_SHEETS_API_KEY"]),
            &provided(&[("GOOGLE_API_KEY", "AIza-1")]),
        );
        assert_eq!(missing, vec!["GOOGLE_SHEETS_API_KEY".to_string()]);
    }

    #[test]
    fn test_blank_values_do_not_count() {
        let matcher = CredentialMatcher::new();
        let missing = matcher.missing(&required(&["SLACK_TOKEN"]), &provided(&[("SLACK_TOKEN", "  ")]));
        assert_eq!(missing, vec!["SLACK_TOKEN".to_string()]);
    }

    #[test]
    fn test_extra_aliases_extend_table() {
        let mut extra = BTreeMap::new();
        extra.insert("hubspot_token".to_string(), vec!["HUBSPOT_PRIVATE_APP_TOKEN".to_string()]);
        let matcher = CredentialMatcher::with_extra_aliases(&extra);

        assert!(matcher.matches("hubspot_token", "HUBSPOT_PRIVATE_APP_TOKEN"));
        assert!(matcher.matches("SLACK_TOKEN", "SLACK_BOT_TOKEN"));
    }
}
