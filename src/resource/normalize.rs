//! Payload normalization into canonical snapshots.

use crate::change::flatten;
use crate::error::{PlanningError, Result};
use crate::resource::{CanonicalSnapshot, ResourceRecord, TypeProfile};
use serde_json::Value;

/// Turns live payloads into comparable [`CanonicalSnapshot`]s by flattening,
/// stripping environment-bound fields, and extracting the business key, all
/// as directed by one [`TypeProfile`].
#[derive(Debug, Clone)]
pub struct Normalizer {
    profile: TypeProfile,
}

impl Normalizer {
    /// Creates a normalizer for one resource type.
    #[must_use]
    pub const fn new(profile: TypeProfile) -> Self {
        Self { profile }
    }

    /// The profile driving this normalizer.
    #[must_use]
    pub const fn profile(&self) -> &TypeProfile {
        &self.profile
    }

    /// Normalizes a live record.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanningError`] when the payload is not an object or its
    /// business key is missing, empty, or not a string.
    pub fn normalize(&self, record: &ResourceRecord) -> Result<CanonicalSnapshot> {
        self.normalize_payload(&record.payload, &record.id)
    }

    /// Normalizes a bare payload; `origin` names the resource in errors.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Normalizer::normalize`].
    pub fn normalize_payload(&self, payload: &Value, origin: &str) -> Result<CanonicalSnapshot> {
        if !payload.is_object() {
            return Err(PlanningError::UnreadableSnapshot {
                resource_type: self.profile.resource_type.to_string(),
                resource_id: origin.to_string(),
                reason: "payload is not an object".to_string(),
            }
            .into());
        }

        let mut fields = flatten(payload);
        fields.retain(|path, _| !self.profile.is_stripped(path));

        let business_key = match fields.get(&self.profile.key_path) {
            Some(Value::String(key)) if !key.is_empty() => key.clone(),
            _ => {
                return Err(PlanningError::MissingBusinessKey {
                    resource_type: self.profile.resource_type.to_string(),
                    resource_id: origin.to_string(),
                }
                .into());
            }
        };

        Ok(CanonicalSnapshot {
            business_key,
            resource_type: self.profile.resource_type,
            fields,
        })
    }
}
