use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::{info, warn};
use mongodb::bson::doc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::db;
use crate::envelope;
use crate::error::ApiResult;
use crate::models::notification::{Notification, NotificationList};
use crate::models::Bilingual;

/// Queues a notification for `user_id`. Failures are logged, never returned.
pub async fn notify(data: &AppState, user_id: &str, message: Bilingual) {
    let notification = Notification {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        message,
        read: false,
        created_at: Utc::now(),
    };
    let coll = data.mongodb.collection::<Notification>(db::NOTIFICATIONS);
    if let Err(e) = coll.insert_one(&notification).await {
        warn!("failed to notify user {}: {}", user_id, e);
    }
}

/// GET /api/users/notifications
pub async fn list_notifications(
    data: web::Data<AppState>,
    user: AuthUser,
) -> ApiResult<HttpResponse> {
    let notifications: Vec<Notification> = data
        .mongodb
        .collection::<Notification>(db::NOTIFICATIONS)
        .find(doc! { "user_id": &user.user_id })
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(envelope::ok(NotificationList::new(notifications)))
}

/// PUT /api/users/notifications/read-all
pub async fn mark_all_read(
    data: web::Data<AppState>,
    user: AuthUser,
) -> ApiResult<HttpResponse> {
    let res = data
        .mongodb
        .collection::<Notification>(db::NOTIFICATIONS)
        .update_many(
            doc! { "user_id": &user.user_id, "read": false },
            doc! { "$set": { "read": true } },
        )
        .await?;
    info!(
        "marked {} notifications read for {}",
        res.modified_count, user.user_id
    );
    Ok(envelope::done("All notifications marked as read"))
}

/// DELETE /api/users/notifications
pub async fn clear_all(data: web::Data<AppState>, user: AuthUser) -> ApiResult<HttpResponse> {
    let res = data
        .mongodb
        .collection::<Notification>(db::NOTIFICATIONS)
        .delete_many(doc! { "user_id": &user.user_id })
        .await?;
    info!(
        "cleared {} notifications for {}",
        res.deleted_count, user.user_id
    );
    Ok(envelope::done("All notifications cleared"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4().to_string(),
            user_id: "u1".into(),
            message: Bilingual::new("New review", "تقييم جديد"),
            read,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unread_count_drives_badge() {
        let list = NotificationList::new(vec![note(false), note(true), note(false)]);
        assert_eq!(list.unread, 2);
        assert_eq!(NotificationList::new(vec![]).unread, 0);
    }
}
