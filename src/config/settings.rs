//! Settings types for the promotion engine.

use crate::error::{ConfigError, Result};
use crate::resource::ResourceType;
use crate::sync::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};

/// Tunable settings of the promotion engine.
///
/// These map to `skald.promote.yaml`. Every field has a default, so promoting
/// without a settings file works out of the box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromotionSettings {
    /// Number of plan entries executed per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Whether delete proposals are applied.
    #[serde(default)]
    pub prune: bool,
    /// How long a publish waits for a contended target lock, in seconds.
    /// Zero fails immediately.
    #[serde(default = "default_lock_wait_secs")]
    pub lock_wait_secs: u64,
    /// How long an acquired target lock lives without a release, in seconds.
    #[serde(default = "default_lock_expiry_secs")]
    pub lock_expiry_secs: u64,
    /// Restricts promotions to these resource types. `None` promotes every
    /// registered type.
    #[serde(default)]
    pub types: Option<Vec<ResourceType>>,
}

impl Default for PromotionSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            prune: false,
            lock_wait_secs: default_lock_wait_secs(),
            lock_expiry_secs: default_lock_expiry_secs(),
            types: None,
        }
    }
}

impl PromotionSettings {
    /// Validates the settings values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size must be at least 1", "batch_size").into());
        }
        if self.lock_expiry_secs == 0 {
            return Err(ConfigError::invalid(
                "lock_expiry_secs must be at least 1",
                "lock_expiry_secs",
            )
            .into());
        }
        if let Some(types) = &self.types
            && types.is_empty()
        {
            return Err(ConfigError::invalid(
                "types must name at least one resource type when set",
                "types",
            )
            .into());
        }
        Ok(())
    }
}

/// Default number of entries per execution batch.
const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Default lock wait, in seconds.
const fn default_lock_wait_secs() -> u64 {
    5
}

/// Default lock expiry, in seconds.
const fn default_lock_expiry_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = PromotionSettings::default();

        assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
        assert!(!settings.prune);
        assert_eq!(settings.lock_wait_secs, 5);
        assert_eq!(settings.lock_expiry_secs, 300);
        assert!(settings.types.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let settings = PromotionSettings {
            batch_size: 0,
            ..PromotionSettings::default()
        };

        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_empty_type_restriction_is_rejected() {
        let settings = PromotionSettings {
            types: Some(Vec::new()),
            ..PromotionSettings::default()
        };

        assert!(settings.validate().is_err());

        let restricted = PromotionSettings {
            types: Some(vec![ResourceType::Workflow]),
            ..PromotionSettings::default()
        };
        assert!(restricted.validate().is_ok());
    }
}
