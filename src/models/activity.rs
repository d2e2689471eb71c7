use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{string_enum, Bilingual};

string_enum!(ActivityAction {
    Created => "created",
    Updated => "updated",
    Deleted => "deleted",
});

string_enum!(ResourceKind {
    Review => "review",
    Property => "property",
    City => "city",
    Amenity => "amenity",
    PropertyType => "property_type",
    Transaction => "transaction",
    User => "user",
});

/// One line of the admin activity feed, written alongside every mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub action: ActivityAction,
    pub resource: ResourceKind,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Bilingual>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// What the dashboard feed returns. Older stored entries only carry a
/// free-text `description`; those come back with `note` set instead of
/// `action`/`resource`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityFeedItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActivityAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Bilingual>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<ActivityEntry> for ActivityFeedItem {
    fn from(e: ActivityEntry) -> Self {
        Self {
            id: e.id,
            action: Some(e.action),
            resource: Some(e.resource),
            resource_id: Some(e.resource_id),
            subject: e.subject,
            note: None,
            created_at: e.created_at,
        }
    }
}
