use std::error::Error as StdError;

use thiserror::Error;

use crate::cache::CacheKey;
use crate::config::LoadError;
use crate::infra::error::InfraError;

/// Flattened error chain, logged when startup or registration fails.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no loader registered for cache key `{cache_key}`")]
    MissingLoader { cache_key: CacheKey },
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl AppError {
    pub fn missing_loader(cache_key: &CacheKey) -> Self {
        Self::MissingLoader {
            cache_key: cache_key.clone(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}
