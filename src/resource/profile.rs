//! Per-type normalization and reference profiles.
//!
//! A [`TypeProfile`] is plain data: where a resource type keeps its business
//! key, which payload fields are environment-local noise, and which fields
//! reference other resources by business key. All per-type behavior in the
//! engine enters through profiles, so supporting a new resource type means
//! registering a profile and an adapter rather than adding branches.

use crate::change::FieldPath;
use crate::resource::ResourceType;

/// Payload segments that bind a record to its environment. Any path
/// containing one of these at any depth is stripped during normalization.
const ENVIRONMENT_SEGMENTS: [&str; 9] = [
    "_id",
    "_environmentId",
    "_organizationId",
    "_creatorId",
    "_parentId",
    "createdAt",
    "updatedAt",
    "deleted",
    "__v",
];

/// A field pattern that references another resource by business key.
///
/// Patterns are dotted paths where `*` matches exactly one segment, so
/// `steps.*.template` matches `steps.0.template` and `steps.12.template`.
#[derive(Debug, Clone)]
pub struct ReferencePattern {
    /// The dotted pattern.
    pub pattern: String,
    /// Type of the referenced resource.
    pub target: ResourceType,
}

impl ReferencePattern {
    /// Tests whether a concrete path matches this pattern.
    #[must_use]
    pub fn matches(&self, path: &FieldPath) -> bool {
        let pattern: Vec<&str> = self.pattern.split('.').collect();
        let segments: Vec<&str> = path.segments().collect();
        pattern.len() == segments.len()
            && pattern
                .iter()
                .zip(&segments)
                .all(|(p, s)| *p == "*" || p == s)
    }
}

/// Normalization and reference rules for one resource type.
#[derive(Debug, Clone)]
pub struct TypeProfile {
    /// The canonical type this profile describes.
    pub resource_type: ResourceType,
    /// Path of the business key inside the payload.
    pub key_path: FieldPath,
    /// Extra segments stripped for this type on top of the global set.
    pub strip_segments: Vec<String>,
    /// Outgoing cross-resource references.
    pub references: Vec<ReferencePattern>,
}

impl TypeProfile {
    /// Creates a profile with no extra strips and no references.
    #[must_use]
    pub fn new(resource_type: ResourceType, key_path: impl Into<FieldPath>) -> Self {
        Self {
            resource_type: resource_type.canonical(),
            key_path: key_path.into(),
            strip_segments: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Adds a type-specific stripped segment.
    #[must_use]
    pub fn with_strip(mut self, segment: impl Into<String>) -> Self {
        self.strip_segments.push(segment.into());
        self
    }

    /// Adds an outgoing reference pattern.
    #[must_use]
    pub fn with_reference(mut self, pattern: impl Into<String>, target: ResourceType) -> Self {
        self.references.push(ReferencePattern {
            pattern: pattern.into(),
            target: target.canonical(),
        });
        self
    }

    /// The built-in profile for a resource type; aliases resolve to their
    /// canonical type's profile.
    #[must_use]
    pub fn builtin(resource_type: ResourceType) -> Self {
        match resource_type.canonical() {
            ResourceType::Workflow => Self::new(ResourceType::Workflow, "trigger.identifier")
                .with_strip("draft")
                .with_reference("group", ResourceType::NotificationGroup)
                .with_reference("steps.*.template", ResourceType::MessageTemplate)
                .with_reference("steps.*.controls.layout", ResourceType::Layout)
                .with_reference("steps.*.controls.feed", ResourceType::Feed),
            ResourceType::MessageTemplate => Self::new(ResourceType::MessageTemplate, "identifier")
                .with_reference("layout", ResourceType::Layout)
                .with_reference("feed", ResourceType::Feed),
            ResourceType::NotificationGroup => Self::new(ResourceType::NotificationGroup, "name"),
            ResourceType::Feed => Self::new(ResourceType::Feed, "identifier"),
            ResourceType::Translation => Self::new(ResourceType::Translation, "identifier")
                .with_reference("group", ResourceType::TranslationGroup),
            ResourceType::TranslationGroup => {
                Self::new(ResourceType::TranslationGroup, "identifier")
            }
            // canonical() already folded DefaultLayout into Layout
            ResourceType::Layout | ResourceType::DefaultLayout => {
                Self::new(ResourceType::Layout, "identifier")
            }
        }
    }

    /// Whether a flattened path is environment-local noise for this type.
    #[must_use]
    pub fn is_stripped(&self, path: &FieldPath) -> bool {
        path.segments().any(|segment| {
            ENVIRONMENT_SEGMENTS.contains(&segment)
                || self.strip_segments.iter().any(|s| s == segment)
        })
    }

    /// Resolves a path to the type it references, if any pattern matches.
    #[must_use]
    pub fn reference_target(&self, path: &FieldPath) -> Option<ResourceType> {
        self.references
            .iter()
            .find(|reference| reference.matches(path))
            .map(|reference| reference.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_matches_exactly_one_segment() {
        let profile = TypeProfile::builtin(ResourceType::Workflow);

        assert_eq!(
            profile.reference_target(&FieldPath::new("steps.0.template")),
            Some(ResourceType::MessageTemplate)
        );
        assert_eq!(
            profile.reference_target(&FieldPath::new("steps.12.controls.layout")),
            Some(ResourceType::Layout)
        );
        assert_eq!(
            profile.reference_target(&FieldPath::new("group")),
            Some(ResourceType::NotificationGroup)
        );
        // Too shallow and too deep both miss.
        assert_eq!(profile.reference_target(&FieldPath::new("steps.template")), None);
        assert_eq!(
            profile.reference_target(&FieldPath::new("steps.0.controls.layout.name")),
            None
        );
    }

    #[test]
    fn test_environment_segments_strip_at_any_depth() {
        let profile = TypeProfile::builtin(ResourceType::MessageTemplate);

        assert!(profile.is_stripped(&FieldPath::new("_id")));
        assert!(profile.is_stripped(&FieldPath::new("steps.0._environmentId")));
        assert!(profile.is_stripped(&FieldPath::new("meta.createdAt")));
        assert!(!profile.is_stripped(&FieldPath::new("identifier")));
        assert!(!profile.is_stripped(&FieldPath::new("body")));
    }

    #[test]
    fn test_workflow_strips_draft_buffer() {
        let workflow = TypeProfile::builtin(ResourceType::Workflow);
        let template = TypeProfile::builtin(ResourceType::MessageTemplate);

        assert!(workflow.is_stripped(&FieldPath::new("draft.steps.0.template")));
        assert!(!template.is_stripped(&FieldPath::new("draft")));
    }

    #[test]
    fn test_default_layout_profile_is_the_layout_profile() {
        let alias = TypeProfile::builtin(ResourceType::DefaultLayout);

        assert_eq!(alias.resource_type, ResourceType::Layout);
        assert_eq!(alias.key_path, FieldPath::new("identifier"));
    }
}
