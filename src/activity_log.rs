use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use log::warn;
use mongodb::bson::{doc, from_document, Bson, Document};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db;
use crate::error::ApiResult;
use crate::models::activity::{ActivityAction, ActivityEntry, ActivityFeedItem, ResourceKind};
use crate::models::Bilingual;

pub const DEFAULT_FEED_LIMIT: i64 = 10;
pub const MAX_FEED_LIMIT: i64 = 50;

/// Appends an entry to the activity feed. Failures are logged, never returned.
pub async fn record(
    data: &AppState,
    action: ActivityAction,
    resource: ResourceKind,
    resource_id: &str,
    subject: Option<Bilingual>,
    actor_id: Option<&str>,
) {
    let entry = ActivityEntry {
        id: Uuid::new_v4().to_string(),
        action,
        resource,
        resource_id: resource_id.to_string(),
        subject,
        actor_id: actor_id.map(String::from),
        created_at: Utc::now(),
    };
    let coll = data.mongodb.collection::<ActivityEntry>(db::ACTIVITIES);
    if let Err(e) = coll.insert_one(&entry).await {
        warn!("failed to record {} {} activity: {}", action, resource, e);
    }
}

pub async fn recent(data: &AppState, limit: i64) -> ApiResult<Vec<ActivityFeedItem>> {
    let limit = limit.clamp(1, MAX_FEED_LIMIT);
    let docs: Vec<Document> = data
        .mongodb
        .collection::<Document>(db::ACTIVITIES)
        .aggregate(recent_pipeline(limit))
        .await?
        .try_collect()
        .await?;
    Ok(docs.into_iter().filter_map(feed_item).collect())
}

/// Legacy entries store `createdAt` as a BSON date and new ones as an
/// RFC 3339 string; both are converted to dates before sorting.
pub fn recent_pipeline(limit: i64) -> Vec<Document> {
    vec![
        doc! {
            "$addFields": {
                "_sortedAt": {
                    "$convert": { "input": "$createdAt", "to": "date", "onError": null, "onNull": null }
                }
            }
        },
        doc! { "$sort": { "_sortedAt": -1, "_id": -1 } },
        doc! { "$limit": limit },
        doc! { "$unset": "_sortedAt" },
    ]
}

/// Legacy ids are ObjectIds; new ones are UUID strings.
fn entry_id(raw: &Document) -> Option<String> {
    match raw.get("_id")? {
        Bson::String(id) => Some(id.clone()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        _ => None,
    }
}

/// Decodes a stored entry, upgrading documents written in the old free-text
/// format. Undecodable documents are skipped.
pub fn feed_item(raw: Document) -> Option<ActivityFeedItem> {
    if raw.contains_key("action") {
        return match from_document::<ActivityEntry>(raw) {
            Ok(entry) => Some(entry.into()),
            Err(e) => {
                warn!("skipping malformed activity entry: {}", e);
                None
            }
        };
    }

    let id = entry_id(&raw)?;
    let description = raw.get_str("description").unwrap_or_default();
    let created_at = raw
        .get_str("createdAt")
        .ok()
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
        .or_else(|| {
            raw.get_datetime("createdAt")
                .ok()
                .and_then(|d| DateTime::<Utc>::from_timestamp_millis(d.timestamp_millis()))
        })
        .unwrap_or_else(Utc::now);
    let (note, subject) = split_legacy_description(description);

    Some(ActivityFeedItem {
        id,
        action: None,
        resource: None,
        resource_id: None,
        subject,
        note: Some(note).filter(|n| !n.is_empty()),
        created_at,
    })
}

fn js_pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"["']?(en|ar)["']?\s*:\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
    })
}

/// Splits `Added property {"en":"Villa","ar":"فيلا"}` into the surrounding
/// text and the embedded bilingual value. The object may be strict JSON or a
/// JS literal (`{en: 'Villa', ar: 'فيلا'}`).
pub fn split_legacy_description(description: &str) -> (String, Option<Bilingual>) {
    let (Some(start), Some(end)) = (description.find('{'), description.rfind('}')) else {
        return (description.trim().to_string(), None);
    };
    if end < start {
        return (description.trim().to_string(), None);
    }

    let object = &description[start..=end];
    let note = format!("{} {}", &description[..start], &description[end + 1..])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if let Ok(value) = serde_json::from_str::<Bilingual>(object) {
        return (note, Some(value));
    }

    let mut value = Bilingual::default();
    let mut found = false;
    for caps in js_pair_regex().captures_iter(object) {
        let text = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        match &caps[1] {
            "en" => value.en = text,
            _ => value.ar = text,
        }
        found = true;
    }

    if found {
        (note, Some(value))
    } else {
        (description.trim().to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embedded_json() {
        let (note, subject) =
            split_legacy_description(r#"New property added: {"en":"Villa A","ar":"فيلا أ"}"#);
        assert_eq!(note, "New property added:");
        assert_eq!(subject, Some(Bilingual::new("Villa A", "فيلا أ")));
    }

    #[test]
    fn falls_back_to_js_literal() {
        let (note, subject) =
            split_legacy_description("City {en: 'Jeddah', ar: 'جدة'} was updated");
        assert_eq!(note, "City was updated");
        assert_eq!(subject, Some(Bilingual::new("Jeddah", "جدة")));
    }

    #[test]
    fn plain_text_stays_as_note() {
        assert_eq!(
            split_legacy_description("User logged in"),
            ("User logged in".to_string(), None)
        );
        assert_eq!(
            split_legacy_description("weird } order {"),
            ("weird } order {".to_string(), None)
        );
    }

    #[test]
    fn structured_entries_decode_directly() {
        let entry = ActivityEntry {
            id: "a1".into(),
            action: ActivityAction::Created,
            resource: ResourceKind::City,
            resource_id: "c1".into(),
            subject: Some(Bilingual::new("Riyadh", "الرياض")),
            actor_id: Some("admin".into()),
            created_at: Utc::now(),
        };
        let raw = mongodb::bson::to_document(&entry).unwrap();
        let item = feed_item(raw).unwrap();
        assert_eq!(item.action, Some(ActivityAction::Created));
        assert_eq!(item.resource_id.as_deref(), Some("c1"));
        assert_eq!(item.note, None);
    }

    #[test]
    fn legacy_documents_are_upgraded() {
        let raw = doc! {
            "_id": "old-1",
            "description": r#"Review on {"en":"Flat","ar":"شقة"}"#,
            "createdAt": "2024-03-01T10:00:00Z"
        };
        let item = feed_item(raw).unwrap();
        assert_eq!(item.action, None);
        assert_eq!(item.note.as_deref(), Some("Review on"));
        assert_eq!(item.subject, Some(Bilingual::new("Flat", "شقة")));
        assert_eq!(item.created_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn legacy_object_ids_and_dates_are_kept() {
        let oid = mongodb::bson::oid::ObjectId::new();
        let when = mongodb::bson::DateTime::from_millis(1_709_287_200_000);
        let raw = doc! {
            "_id": oid,
            "description": r#"New property added: {"en":"Villa A","ar":"فيلا أ"}"#,
            "createdAt": when
        };
        let item = feed_item(raw).unwrap();
        assert_eq!(item.id, oid.to_hex());
        assert_eq!(item.note.as_deref(), Some("New property added:"));
        assert_eq!(item.subject, Some(Bilingual::new("Villa A", "فيلا أ")));
        assert_eq!(item.created_at.timestamp_millis(), 1_709_287_200_000);
    }

    #[test]
    fn unusable_ids_are_skipped() {
        assert!(feed_item(doc! { "_id": 7, "description": "x" }).is_none());
        assert!(feed_item(doc! { "description": "x" }).is_none());
    }

    #[test]
    fn recent_sorts_on_a_normalised_date() {
        let pipeline = recent_pipeline(10);
        let add = pipeline[0].get_document("$addFields").unwrap();
        let convert = add
            .get_document("_sortedAt")
            .unwrap()
            .get_document("$convert")
            .unwrap();
        assert_eq!(convert.get_str("input").unwrap(), "$createdAt");
        assert_eq!(convert.get_str("to").unwrap(), "date");
        assert_eq!(pipeline[1], doc! { "$sort": { "_sortedAt": -1, "_id": -1 } });
        assert_eq!(pipeline[2], doc! { "$limit": 10_i64 });
    }
}
