use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Source API error: {0}")]
    Api(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether another attempt could succeed. Rate limits, server errors and transport
    /// failures can; client errors, API rejections and bad payloads won't change.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::Http { status, .. } => *status == 429 || *status >= 500,
            GatewayError::Api(_) | GatewayError::JsonParse(_) | GatewayError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> GatewayError {
        GatewayError::Http {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(GatewayError::Network("reset".into()).is_retryable());
        assert!(http(429).is_retryable());
        assert!(http(503).is_retryable());

        assert!(!http(400).is_retryable());
        assert!(!http(404).is_retryable());
        assert!(!GatewayError::Api("Invalid API key".into()).is_retryable());
        assert!(!GatewayError::JsonParse("eof".into()).is_retryable());
        assert!(!GatewayError::Config("no key".into()).is_retryable());
    }
}
