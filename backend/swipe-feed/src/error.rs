/// Error types for the swipe feed core
use thiserror::Error;

/// A content record that cannot be scored.
///
/// Records failing validation are dropped from assembly, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Content {content_id} is missing {field}")]
    MissingField {
        content_id: String,
        field: &'static str,
    },
}

/// Failure reported by an external collaborator (content store, interaction
/// store, social graph).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    #[error("{service} rejected request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

impl ClientError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn rejected(service: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            message: message.into(),
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            Self::Unavailable { service, .. } | Self::Rejected { service, .. } => service,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    /// A collaborator call failed. Local state is left at its last-known-good value.
    #[error("Fetch from {service} failed: {message}")]
    Fetch {
        service: &'static str,
        message: String,
    },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Content not in feed: {0}")]
    UnknownContent(String),
}

impl FeedError {
    /// Network-class failures: the caller may retry the same operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FeedError::Fetch { .. })
    }
}

impl From<ClientError> for FeedError {
    fn from(err: ClientError) -> Self {
        let service = err.service();
        FeedError::Fetch {
            service,
            message: err.to_string(),
        }
    }
}

impl From<crate::config::ConfigError> for FeedError {
    fn from(err: crate::config::ConfigError) -> Self {
        FeedError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_maps_to_fetch() {
        let err: FeedError = ClientError::unavailable("content-store", "connection reset").into();

        match &err {
            FeedError::Fetch { service, message } => {
                assert_eq!(*service, "content-store");
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected fetch error, got {:?}", other),
        }
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_validation_error_is_not_recoverable() {
        let err: FeedError = ValidationError::MissingField {
            content_id: "c1".to_string(),
            field: "brand",
        }
        .into();

        assert!(!err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "Validation failed: Content c1 is missing brand"
        );
    }
}
