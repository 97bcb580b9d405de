use thiserror::Error;

/// Failure reported by a fetch or mutation function.
///
/// Cloneable because every caller joined on the same in-flight request
/// receives the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{entity} not found")]
    NotFound { entity: String, id: Option<String> },
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("request aborted: {message}")]
    Aborted { message: String },
}

impl ApiError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: None,
        }
    }

    pub fn not_found_with_id(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: Some(id.into()),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Identifier the server reported as missing, if any.
    pub fn missing_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}
