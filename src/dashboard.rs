// src/dashboard.rs

use std::collections::BTreeMap;

use actix_web::{web, HttpResponse};
use chrono::{Duration, NaiveDate, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use serde::Deserialize;

use crate::activity_log;
use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::db;
use crate::envelope;
use crate::error::ApiResult;
use crate::models::dashboard::{
    CompletedTransactions, DashboardStats, DayViews, StatusCount, TotalViews,
};
use crate::models::property::PropertyStatus;
use crate::models::transaction::TransactionStatus;

pub const DEFAULT_DAYS: u32 = 30;
pub const MAX_DAYS: u32 = 365;

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

impl DaysQuery {
    pub fn days(&self) -> u32 {
        self.days
            .map(|d| d.clamp(1, MAX_DAYS as i64) as u32)
            .unwrap_or(DEFAULT_DAYS)
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Group sums come back as Int32, Int64 or Double depending on the inputs.
fn as_i64(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int32(n)) => *n as i64,
        Some(Bson::Int64(n)) => *n,
        Some(Bson::Double(n)) => *n as i64,
        _ => 0,
    }
}

fn as_f64(value: Option<&Bson>) -> f64 {
    match value {
        Some(Bson::Int32(n)) => *n as f64,
        Some(Bson::Int64(n)) => *n as f64,
        Some(Bson::Double(n)) => *n,
        _ => 0.0,
    }
}

/// One bucket per day from `today - days + 1` through `today`, oldest first.
/// Days without views are present with zero.
pub fn bucket_by_day(counts: &[(NaiveDate, u64)], today: NaiveDate, days: u32) -> Vec<DayViews> {
    let days = days.max(1);
    let start = today - Duration::days(days as i64 - 1);
    let mut buckets: BTreeMap<NaiveDate, u64> = start
        .iter_days()
        .take(days as usize)
        .map(|d| (d, 0))
        .collect();
    for (date, views) in counts {
        if let Some(count) = buckets.get_mut(date) {
            *count += views;
        }
    }
    buckets
        .into_iter()
        .map(|(date, views)| DayViews { date, views })
        .collect()
}

/// Counts view events per calendar day on the server. Stored timestamps are
/// RFC 3339 strings, so the first ten bytes are the UTC date.
pub fn views_by_day_pipeline(start: NaiveDate) -> Vec<Document> {
    vec![
        doc! { "$match": { "viewed_at": { "$gte": start.format("%Y-%m-%d").to_string() } } },
        doc! {
            "$group": {
                "_id": { "$substrBytes": ["$viewed_at", 0, 10] },
                "views": { "$sum": 1 }
            }
        },
    ]
}

/// Reads `{_id: "YYYY-MM-DD", views}` groups; unparseable days are skipped.
pub fn day_counts(groups: &[Document]) -> Vec<(NaiveDate, u64)> {
    groups
        .iter()
        .filter_map(|g| {
            let date = g.get_str("_id").ok()?.parse::<NaiveDate>().ok()?;
            Some((date, as_i64(g.get("views")).max(0) as u64))
        })
        .collect()
}

/// Counts per property status; every status is listed even when zero.
pub fn status_distribution(counts: &[(String, u64)]) -> Vec<StatusCount> {
    PropertyStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: counts
                .iter()
                .filter(|(s, _)| s == status.as_str())
                .map(|(_, n)| *n)
                .sum(),
        })
        .collect()
}

/// GET /api/dashboard/stats
pub async fn stats(data: web::Data<AppState>, _admin: AdminUser) -> ApiResult<HttpResponse> {
    let count = |name: &'static str| {
        let coll = data.mongodb.collection::<Document>(name);
        async move { coll.count_documents(doc! {}).await }
    };
    let (properties, users, transactions, reviews, agents, sellers, clients) = futures::try_join!(
        count(db::PROPERTIES),
        count(db::USERS),
        count(db::TRANSACTIONS),
        count(db::REVIEWS),
        count(db::AGENTS),
        count(db::SELLERS),
        count(db::CLIENTS)
    )?;
    Ok(envelope::ok(DashboardStats {
        properties,
        users,
        transactions,
        reviews,
        agents,
        sellers,
        clients,
    }))
}

/// GET /api/dashboard/total-views
pub async fn total_views(data: web::Data<AppState>, _admin: AdminUser) -> ApiResult<HttpResponse> {
    let pipeline = vec![doc! { "$group": { "_id": Bson::Null, "total": { "$sum": "$views" } } }];
    let groups: Vec<Document> = data
        .mongodb
        .collection::<Document>(db::PROPERTIES)
        .aggregate(pipeline)
        .await?
        .try_collect()
        .await?;
    let total_views = groups.first().map(|g| as_i64(g.get("total"))).unwrap_or(0);
    Ok(envelope::ok(TotalViews { total_views }))
}

/// GET /api/dashboard/views-over-time?days=N
pub async fn views_over_time(
    data: web::Data<AppState>,
    _admin: AdminUser,
    query: web::Query<DaysQuery>,
) -> ApiResult<HttpResponse> {
    let days = query.days();
    let today = Utc::now().date_naive();
    let start = today - Duration::days(days as i64 - 1);

    let groups: Vec<Document> = data
        .mongodb
        .collection::<Document>(db::PROPERTY_VIEWS)
        .aggregate(views_by_day_pipeline(start))
        .await?
        .try_collect()
        .await?;
    Ok(envelope::ok(bucket_by_day(&day_counts(&groups), today, days)))
}

/// GET /api/dashboard/completed-transactions
pub async fn completed_transactions(
    data: web::Data<AppState>,
    _admin: AdminUser,
) -> ApiResult<HttpResponse> {
    let pipeline = vec![
        doc! { "$match": { "status": TransactionStatus::Completed.as_str() } },
        doc! {
            "$group": {
                "_id": Bson::Null,
                "count": { "$sum": 1 },
                "total": { "$sum": "$sale_price" }
            }
        },
    ];
    let groups: Vec<Document> = data
        .mongodb
        .collection::<Document>(db::TRANSACTIONS)
        .aggregate(pipeline)
        .await?
        .try_collect()
        .await?;
    let summary = groups
        .first()
        .map(|g| CompletedTransactions {
            count: as_i64(g.get("count")).max(0) as u64,
            total_value: as_f64(g.get("total")),
        })
        .unwrap_or_default();
    Ok(envelope::ok(summary))
}

/// GET /api/dashboard/status-distribution
pub async fn status_distribution_handler(
    data: web::Data<AppState>,
    _admin: AdminUser,
) -> ApiResult<HttpResponse> {
    let pipeline = vec![doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } }];
    let groups: Vec<Document> = data
        .mongodb
        .collection::<Document>(db::PROPERTIES)
        .aggregate(pipeline)
        .await?
        .try_collect()
        .await?;
    let counts: Vec<(String, u64)> = groups
        .iter()
        .filter_map(|g| {
            let status = g.get_str("_id").ok()?;
            Some((status.to_string(), as_i64(g.get("count")).max(0) as u64))
        })
        .collect();
    Ok(envelope::ok(status_distribution(&counts)))
}

/// GET /api/dashboard/activity?limit=N
pub async fn activity(
    data: web::Data<AppState>,
    _admin: AdminUser,
    query: web::Query<LimitQuery>,
) -> ApiResult<HttpResponse> {
    let limit = query.limit.unwrap_or(activity_log::DEFAULT_FEED_LIMIT);
    Ok(envelope::ok(activity_log::recent(&data, limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn buckets_are_zero_filled_oldest_first() {
        let counts = vec![
            (day(2024, 3, 1), 2),
            (day(2024, 3, 3), 1),
            // outside the window
            (day(2024, 2, 20), 5),
        ];
        let buckets = bucket_by_day(&counts, day(2024, 3, 3), 4);
        let got: Vec<(NaiveDate, u64)> = buckets.iter().map(|b| (b.date, b.views)).collect();
        assert_eq!(
            got,
            vec![
                (day(2024, 2, 29), 0),
                (day(2024, 3, 1), 2),
                (day(2024, 3, 2), 0),
                (day(2024, 3, 3), 1),
            ]
        );
    }

    #[test]
    fn days_param_is_clamped() {
        assert_eq!(DaysQuery { days: None }.days(), 30);
        assert_eq!(DaysQuery { days: Some(0) }.days(), 1);
        assert_eq!(DaysQuery { days: Some(7) }.days(), 7);
        assert_eq!(DaysQuery { days: Some(9000) }.days(), 365);
    }

    #[test]
    fn every_status_is_reported() {
        let dist = status_distribution(&[("sold".into(), 4), ("archived".into(), 9)]);
        assert_eq!(
            dist,
            vec![
                StatusCount { status: PropertyStatus::Available, count: 0 },
                StatusCount { status: PropertyStatus::Rented, count: 0 },
                StatusCount { status: PropertyStatus::Sold, count: 4 },
            ]
        );
    }

    #[test]
    fn day_buckets_serialize_as_plain_dates() {
        let json = serde_json::to_value(DayViews { date: day(2024, 1, 5), views: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({ "date": "2024-01-05", "views": 3 }));
    }

    #[test]
    fn numeric_sums_accept_any_width() {
        assert_eq!(as_i64(Some(&Bson::Int32(5))), 5);
        assert_eq!(as_i64(Some(&Bson::Int64(7))), 7);
        assert_eq!(as_i64(None), 0);
        assert_eq!(as_f64(Some(&Bson::Double(2.5))), 2.5);
    }

    #[test]
    fn views_are_grouped_by_date_prefix() {
        let pipeline = views_by_day_pipeline(day(2024, 3, 1));
        assert_eq!(
            pipeline[0],
            doc! { "$match": { "viewed_at": { "$gte": "2024-03-01" } } }
        );
        let group = pipeline[1].get_document("$group").unwrap();
        assert_eq!(
            group.get_document("_id").unwrap(),
            &doc! { "$substrBytes": ["$viewed_at", 0, 10] }
        );

        let groups = vec![
            doc! { "_id": "2024-03-02", "views": 3 },
            doc! { "_id": "2024-03-01", "views": 4_i64 },
            doc! { "_id": "garbage", "views": 1 },
        ];
        assert_eq!(
            day_counts(&groups),
            vec![(day(2024, 3, 2), 3), (day(2024, 3, 1), 4)]
        );
    }
}
