//! Cache configuration.
//!
//! Store-level defaults applied to loaders that do not override them.

use serde::Deserialize;

use crate::domain::entity::UniqueIdentifier;

use super::keys::ALL_TAG;

const DEFAULT_UNIQUE_IDENTIFIER: &str = "id";

/// Cache configuration from the `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default caching mode for loaders. Disabled loaders replace their
    /// collection on every fetch.
    pub enabled: bool,
    /// Parameter value meaning "every subset" (e.g. all clusters).
    pub all_key: String,
    /// Identifier path used when a loader names none.
    pub unique_identifier: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            all_key: ALL_TAG.to_string(),
            unique_identifier: DEFAULT_UNIQUE_IDENTIFIER.to_string(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            all_key: settings.all_key.clone(),
            unique_identifier: settings.unique_identifier.clone(),
        }
    }
}

impl CacheConfig {
    pub fn default_identifier(&self) -> UniqueIdentifier {
        UniqueIdentifier::Path(self.unique_identifier.clone())
    }
}
