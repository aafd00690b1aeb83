//! The Chat Completions backend.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, instrument};
use waymark_core::ChatResponse;
use waymark_core::error::LlmError;
use waymark_core::provider::{ChatParams, Provider, ProviderMetadata};
use waymark_core::stream::ChatStream;

use crate::config::OpenAiConfig;
use crate::convert;
use crate::types::Completion;

/// A [`Provider`] talking to `POST {base_url}/chat/completions`.
///
/// ```rust,no_run
/// use waymark_core::{ChatMessage, ChatParams, Provider};
/// use waymark_openai::{OpenAiConfig, OpenAiProvider};
///
/// # async fn example() -> Result<(), waymark_core::LlmError> {
/// let provider = OpenAiProvider::new(OpenAiConfig {
///     api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
///     ..Default::default()
/// })?;
/// let reply = provider
///     .generate(&ChatParams {
///         messages: vec![ChatMessage::user("Where is Merlion Park?")],
///         ..Default::default()
///     })
///     .await?;
/// println!("{:?}", reply.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Builds the backend, reusing `config.client` when set.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = if let Some(client) = &config.client {
            client.clone()
        } else {
            config
                .timeout
                .into_iter()
                .fold(reqwest::Client::builder(), reqwest::ClientBuilder::timeout)
                .build()
                .map_err(|e| LlmError::Http {
                    status: None,
                    message: format!("failed to build HTTP client: {e}"),
                })?
        };
        Ok(Self { config, client })
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| LlmError::Auth("API key contains invalid header characters".into()))?;
        Ok(HeaderMap::from_iter([
            (AUTHORIZATION, bearer),
            (CONTENT_TYPE, HeaderValue::from_static("application/json")),
        ]))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Posts a completion request. Non-success statuses become errors.
    async fn post_completion(
        &self,
        params: &ChatParams,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = convert::build_request(params, &self.config, stream);
        let req = self
            .client
            .post(self.completions_url())
            .headers(self.headers()?)
            .json(&body);

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    elapsed_ms: millis(self.config.timeout.unwrap_or_default()),
                }
            } else {
                LlmError::Http {
                    status: e.status(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, %body, "completion request refused");
        Err(convert::http_error(status, &body))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Provider for OpenAiProvider {
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn generate(&self, params: &ChatParams) -> Result<ChatResponse, LlmError> {
        let body = self
            .post_completion(params, false)
            .await?
            .text()
            .await
            .map_err(|e| LlmError::ResponseFormat {
                message: format!("reading completion body: {e}"),
                raw: String::new(),
            })?;
        match serde_json::from_str::<Completion>(&body) {
            Ok(completion) => Ok(convert::from_completion(completion)),
            Err(e) => Err(LlmError::ResponseFormat {
                message: format!("decoding completion: {e}"),
                raw: body,
            }),
        }
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn stream(&self, params: &ChatParams) -> Result<ChatStream, LlmError> {
        self.post_completion(params, true)
            .await
            .map(crate::stream::into_stream)
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "openai".into(),
            model: self.config.model.clone(),
        }
    }
}
