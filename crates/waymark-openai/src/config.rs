//! Backend settings.

use std::time::Duration;

/// Settings for [`OpenAiProvider`](crate::OpenAiProvider).
///
/// Any service speaking the Chat Completions protocol works; point
/// `base_url` at it.
///
/// ```rust
/// use waymark_openai::OpenAiConfig;
///
/// let config = OpenAiConfig {
///     api_key: "sk-...".into(),
///     base_url: "http://localhost:8080/v1".into(),
///     ..Default::default()
/// };
/// assert_eq!(config.model, "gpt-5-mini");
/// ```
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Bearer token. Never printed by `Debug`.
    pub api_key: String,
    /// Model name sent with every request.
    pub model: String,
    /// API root, without `/chat/completions`.
    pub base_url: String,
    /// Whole-request timeout. `None` leaves reqwest's default in place.
    pub timeout: Option<Duration>,
    /// Shared HTTP client; one is built when `None`.
    pub client: Option<reqwest::Client>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-5-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            timeout: None,
            client: None,
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.api_key.is_empty() { "<unset>" } else { "[REDACTED]" };
        f.debug_struct("OpenAiConfig")
            .field("api_key", &key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("shared_client", &self.client.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_public_api() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert!(config.api_key.is_empty());
        assert!(config.client.is_none());
    }

    #[test]
    fn test_debug_hides_key() {
        let config = OpenAiConfig {
            api_key: "sk-super-secret".into(),
            ..Default::default()
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("sk-super-secret"));
        assert!(shown.contains("[REDACTED]"));
        assert!(format!("{:?}", OpenAiConfig::default()).contains("<unset>"));
    }
}
