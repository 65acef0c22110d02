// error.rs - Flow Error Taxonomy
// Every failure a command flow can hit maps onto one of these variants.
// Command handlers catch them at the top and turn them into a chat reply;
// nothing here is retried except through the poller and the converter's
// single fallback host.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// No image, prompt or URL was supplied.
    #[error("{0}")]
    MissingInput(String),

    /// An option was outside its allowed set (e.g. video quality).
    #[error("{0}")]
    InvalidOption(String),

    /// A wait on a remote service ran past its attempt budget or deadline.
    #[error("{0}")]
    UpstreamTimeout(String),

    /// The remote service reported a failure or returned an unusable payload.
    #[error("{0}")]
    UpstreamFailure(String),

    /// Network or HTTP-level failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local staging I/O (temporary upload files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        FlowError::UpstreamFailure(format!("malformed response: {}", e))
    }
}

impl FlowError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        FlowError::UpstreamFailure(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        FlowError::UpstreamTimeout(msg.into())
    }
}

/// Errors raised by the chat host adapter (sending replies, downloading attachments).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("chat platform error: {0}")]
    Platform(#[from] serenity::Error),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_verbatim() {
        let err = FlowError::UpstreamFailure("Conversion failed".to_string());
        assert_eq!(err.to_string(), "Conversion failed");

        let err = FlowError::timeout("Job timeout");
        assert_eq!(err.to_string(), "Job timeout");
    }

    #[test]
    fn test_json_error_maps_to_upstream_failure() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: FlowError = json_err.into();
        assert!(matches!(err, FlowError::UpstreamFailure(_)));
        assert!(err.to_string().starts_with("malformed response"));
    }
}
