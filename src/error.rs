use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Configuration errors
    ConfigInvalidUrl,
    ConfigMissingProject,
    ConfigInvalidInterval,

    // Network errors
    NetworkError,
    NetworkTimeout,

    // HTTP errors
    HttpBadStatus,
    HttpInvalidResponse,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidUrl => "CONFIG_INVALID_URL",
            ErrorCode::ConfigMissingProject => "CONFIG_MISSING_PROJECT",
            ErrorCode::ConfigInvalidInterval => "CONFIG_INVALID_INTERVAL",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::NetworkTimeout => "NETWORK_TIMEOUT",
            ErrorCode::HttpBadStatus => "HTTP_BAD_STATUS",
            ErrorCode::HttpInvalidResponse => "HTTP_INVALID_RESPONSE",
        }
    }

    /// Whether a retry of the same operation can reasonably succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError
                | ErrorCode::NetworkTimeout
                | ErrorCode::HttpBadStatus
                | ErrorCode::HttpInvalidResponse
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("[{code}] {message}")]
pub struct FlagGateError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FlagGateError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConfigInvalidUrl
                | ErrorCode::ConfigMissingProject
                | ErrorCode::ConfigInvalidInterval
        )
    }
}

pub type Result<T> = std::result::Result<T, FlagGateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_code_and_message() {
        let err = FlagGateError::new(ErrorCode::HttpBadStatus, "unexpected status code 503");
        assert_eq!(err.to_string(), "[HTTP_BAD_STATUS] unexpected status code 503");
    }

    #[test]
    fn network_errors_are_recoverable() {
        assert!(ErrorCode::NetworkTimeout.is_recoverable());
        assert!(ErrorCode::NetworkError.is_recoverable());
        assert!(!ErrorCode::ConfigInvalidUrl.is_recoverable());
    }

    #[test]
    fn config_errors_are_classified() {
        let err = FlagGateError::config_error(ErrorCode::ConfigMissingProject, "project is required");
        assert!(err.is_config_error());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = FlagGateError::with_source(ErrorCode::NetworkError, "connection failed", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
