use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Bilingual;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub message: Bilingual,
    #[serde(default)]
    pub read: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

impl NotificationList {
    pub fn new(notifications: Vec<Notification>) -> Self {
        let unread = notifications.iter().filter(|n| !n.read).count();
        Self {
            notifications,
            unread,
        }
    }
}
