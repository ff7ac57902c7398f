//! Promotable resource types and the live record envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The configuration resource types the engine promotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A notification workflow (trigger plus ordered delivery steps).
    Workflow,
    /// A channel message template referenced by workflow steps.
    MessageTemplate,
    /// A grouping workflows are filed under.
    NotificationGroup,
    /// An in-app feed.
    Feed,
    /// An email layout templates render inside.
    Layout,
    /// Legacy alias for the organization's default [`ResourceType::Layout`].
    DefaultLayout,
    /// A translation bundle.
    Translation,
    /// A grouping translation bundles are filed under.
    TranslationGroup,
}

/// Canonical promotion order: referenced types before referencing types.
const PROMOTION_ORDER: [ResourceType; 7] = [
    ResourceType::NotificationGroup,
    ResourceType::Feed,
    ResourceType::Layout,
    ResourceType::MessageTemplate,
    ResourceType::Workflow,
    ResourceType::TranslationGroup,
    ResourceType::Translation,
];

impl ResourceType {
    /// Resolves legacy aliases to the type the resource is stored under.
    #[must_use]
    pub const fn canonical(self) -> Self {
        match self {
            Self::DefaultLayout => Self::Layout,
            other => other,
        }
    }

    /// Returns the canonical types in promotion order.
    #[must_use]
    pub const fn promotion_order() -> &'static [Self] {
        &PROMOTION_ORDER
    }

    /// Position of the canonical type in the promotion order.
    #[must_use]
    pub const fn order_index(self) -> usize {
        match self.canonical() {
            Self::NotificationGroup => 0,
            Self::Feed => 1,
            Self::Layout => 2,
            Self::MessageTemplate => 3,
            Self::Workflow => 4,
            Self::TranslationGroup => 5,
            // canonical() never returns DefaultLayout
            Self::Translation | Self::DefaultLayout => 6,
        }
    }

    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::MessageTemplate => "message_template",
            Self::NotificationGroup => "notification_group",
            Self::Feed => "feed",
            Self::Layout => "layout",
            Self::DefaultLayout => "default_layout",
            Self::Translation => "translation",
            Self::TranslationGroup => "translation_group",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(Self::Workflow),
            "message_template" => Ok(Self::MessageTemplate),
            "notification_group" => Ok(Self::NotificationGroup),
            "feed" => Ok(Self::Feed),
            "layout" => Ok(Self::Layout),
            "default_layout" => Ok(Self::DefaultLayout),
            "translation" => Ok(Self::Translation),
            "translation_group" => Ok(Self::TranslationGroup),
            other => Err(format!("unknown resource type '{other}'")),
        }
    }
}

/// A live resource as persisted in one environment.
///
/// The envelope fields identify and place the resource; everything the
/// promotion engine compares lives in `payload`. `protected` marks resources
/// the engine must never delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Store-assigned id, unique within the environment.
    pub id: String,
    /// Owning organization.
    pub organization_id: String,
    /// Environment the record lives in.
    pub environment_id: String,
    /// Type of the resource.
    pub resource_type: ResourceType,
    /// Deletion guard; protected records survive prune runs.
    #[serde(default)]
    pub protected: bool,
    /// The resource content.
    pub payload: Value,
    /// Creation time in the owning store.
    pub created_at: DateTime<Utc>,
    /// Last write time in the owning store.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_resolves_to_layout() {
        assert_eq!(ResourceType::DefaultLayout.canonical(), ResourceType::Layout);
        assert_eq!(ResourceType::Workflow.canonical(), ResourceType::Workflow);
        assert_eq!(
            ResourceType::DefaultLayout.order_index(),
            ResourceType::Layout.order_index()
        );
    }

    #[test]
    fn test_promotion_order_lists_referenced_types_first() {
        let order = ResourceType::promotion_order();

        let position = |t: ResourceType| {
            order
                .iter()
                .position(|x| *x == t)
                .expect("type should be in promotion order")
        };

        assert!(position(ResourceType::Layout) < position(ResourceType::MessageTemplate));
        assert!(position(ResourceType::MessageTemplate) < position(ResourceType::Workflow));
        assert!(position(ResourceType::NotificationGroup) < position(ResourceType::Workflow));
        assert!(position(ResourceType::TranslationGroup) < position(ResourceType::Translation));
    }

    #[test]
    fn test_order_index_matches_promotion_order() {
        for (index, resource_type) in ResourceType::promotion_order().iter().enumerate() {
            assert_eq!(resource_type.order_index(), index);
        }
    }

    #[test]
    fn test_serde_uses_snake_case_names() {
        let json = serde_json::to_string(&ResourceType::MessageTemplate).expect("serialize");
        assert_eq!(json, "\"message_template\"");

        let parsed: ResourceType =
            serde_json::from_str("\"default_layout\"").expect("deserialize");
        assert_eq!(parsed, ResourceType::DefaultLayout);
    }

    #[test]
    fn test_from_str_accepts_wire_names() {
        for resource_type in ResourceType::promotion_order() {
            let parsed: ResourceType = resource_type
                .as_str()
                .parse()
                .expect("wire name should parse");
            assert_eq!(parsed, *resource_type);
        }

        assert_eq!(
            "default_layout".parse::<ResourceType>(),
            Ok(ResourceType::DefaultLayout)
        );
        assert!("pod".parse::<ResourceType>().is_err());
    }
}
