//! Credential and environment configuration

use serde::{Deserialize, Serialize};

/// Read a non-empty environment variable
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// API credentials used by the dashboard.
///
/// Every key is optional: a missing key disables the provider that needs it
/// and the affected report fields render as unavailable.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Hosted assistant API key (`OPENAI_API_KEY`)
    pub openai_api_key: Option<String>,
    /// Finnhub market data key (`FINNHUB_API_KEY`)
    pub finnhub_api_key: Option<String>,
    /// NewsAPI key (`NEWS_API_KEY`)
    pub news_api_key: Option<String>,
    /// Assistant (agent) identifier (`ASSISTANT_ID`)
    pub assistant_id: Option<String>,
}

impl Credentials {
    /// Load all credentials from the process environment
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_var("OPENAI_API_KEY"),
            finnhub_api_key: env_var("FINNHUB_API_KEY"),
            news_api_key: env_var("NEWS_API_KEY"),
            assistant_id: env_var("ASSISTANT_ID"),
        }
    }

    /// Names of the credentials that are not set
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        if self.finnhub_api_key.is_none() {
            missing.push("FINNHUB_API_KEY");
        }
        if self.news_api_key.is_none() {
            missing.push("NEWS_API_KEY");
        }
        if self.assistant_id.is_none() {
            missing.push("ASSISTANT_ID");
        }
        missing
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(v: Option<&String>) -> &'static str {
            if v.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Credentials")
            .field("openai_api_key", &mask(self.openai_api_key.as_ref()))
            .field("finnhub_api_key", &mask(self.finnhub_api_key.as_ref()))
            .field("news_api_key", &mask(self.news_api_key.as_ref()))
            .field("assistant_id", &self.assistant_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_unset_keys() {
        let creds = Credentials {
            finnhub_api_key: Some("fh".to_string()),
            ..Default::default()
        };
        assert_eq!(
            creds.missing(),
            vec!["OPENAI_API_KEY", "NEWS_API_KEY", "ASSISTANT_ID"]
        );
    }

    #[test]
    fn test_debug_masks_secrets() {
        let creds = Credentials {
            openai_api_key: Some("sk-secret".to_string()),
            assistant_id: Some("asst_1".to_string()),
            ..Default::default()
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("<set>"));
        assert!(shown.contains("asst_1"));
    }

    #[test]
    fn test_env_var_missing() {
        assert_eq!(env_var("ALTARA_TEST_DEFINITELY_NOT_SET_42"), None);
    }
}
