//! Adapter error type.

/// Failures of a geodata adapter call.
///
/// The `Display` text of each variant is what the model and the user
/// end up reading, so messages are written as plain sentences.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlacesError {
    /// A required setting (usually a credential) is missing.
    #[error("{0}")]
    Configuration(String),

    /// The provider answered with a non-success status.
    #[error("{service} error: {status} - {body}")]
    Upstream {
        /// Which lookup failed, e.g. `"Places search"`.
        service: &'static str,
        /// The HTTP status code returned.
        status: u16,
        /// The response body, as text.
        body: String,
    },

    /// The call exceeded its deadline and was cancelled.
    #[error("Request timed out. Please try again.")]
    Timeout,

    /// The request could not be sent or the response not received.
    #[error("Network error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("Unexpected response from provider: {0}")]
    Decode(String),
}

impl PlacesError {
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    pub(crate) fn upstream(service: &'static str, status: reqwest::StatusCode, body: String) -> Self {
        Self::Upstream {
            service,
            status: status.as_u16(),
            body,
        }
    }
}
