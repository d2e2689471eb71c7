//! Chart series and feed lines for the admin dashboard, resolved to one language.

use chrono::{DateTime, Utc};

use crate::models::activity::{ActivityAction, ActivityFeedItem, ResourceKind};
use crate::models::dashboard::{
    CompletedTransactions, DashboardStats, DayViews, StatusCount, TotalViews,
};
use crate::models::property::PropertyStatus;
use crate::models::{Bilingual, Lang};

/// Raw panel payloads as fetched from `/api/dashboard/*`.
#[derive(Debug, Clone)]
pub struct DashboardParts {
    pub stats: DashboardStats,
    pub total_views: TotalViews,
    pub views: Vec<DayViews>,
    pub completed: CompletedTransactions,
    pub statuses: Vec<StatusCount>,
    pub activity: Vec<ActivityFeedItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub label: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value: u64,
    /// Fraction of the whole in `0.0..=1.0`; zero when the pie is empty.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityLine {
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub stats: DashboardStats,
    pub total_views: i64,
    pub completed: CompletedTransactions,
    pub views_series: Vec<SeriesPoint>,
    pub status_slices: Vec<PieSlice>,
    pub activity: Vec<ActivityLine>,
}

fn status_label(status: PropertyStatus) -> Bilingual {
    match status {
        PropertyStatus::Available => Bilingual::new("Available", "متاح"),
        PropertyStatus::Rented => Bilingual::new("Rented", "مؤجر"),
        PropertyStatus::Sold => Bilingual::new("Sold", "مباع"),
    }
}

fn action_label(action: ActivityAction) -> Bilingual {
    match action {
        ActivityAction::Created => Bilingual::new("Added", "إضافة"),
        ActivityAction::Updated => Bilingual::new("Updated", "تعديل"),
        ActivityAction::Deleted => Bilingual::new("Deleted", "حذف"),
    }
}

fn resource_label(resource: ResourceKind) -> Bilingual {
    match resource {
        ResourceKind::Review => Bilingual::new("review", "تقييم"),
        ResourceKind::Property => Bilingual::new("property", "عقار"),
        ResourceKind::City => Bilingual::new("city", "مدينة"),
        ResourceKind::Amenity => Bilingual::new("amenity", "مرفق"),
        ResourceKind::PropertyType => Bilingual::new("property type", "نوع عقار"),
        ResourceKind::Transaction => Bilingual::new("transaction", "معاملة"),
        ResourceKind::User => Bilingual::new("user", "مستخدم"),
    }
}

/// One feed line in `lang`. Structured entries read "Added property: Villa";
/// legacy entries keep their note with the embedded name re-attached.
pub fn activity_text(item: &ActivityFeedItem, lang: Lang) -> String {
    let subject = item.subject.as_ref().map(|s| s.get(lang).to_string());
    let head = match (item.action, item.resource) {
        (Some(action), Some(resource)) => format!(
            "{} {}",
            action_label(action).get(lang),
            resource_label(resource).get(lang)
        ),
        _ => item.note.clone().unwrap_or_default(),
    };
    match subject.filter(|s| !s.is_empty()) {
        Some(subject) if head.is_empty() => subject,
        Some(subject) if item.action.is_some() => format!("{}: {}", head, subject),
        Some(subject) => format!("{} {}", head, subject),
        None => head,
    }
}

impl DashboardView {
    pub fn assemble(parts: DashboardParts, lang: Lang) -> Self {
        let views_series = parts
            .views
            .iter()
            .map(|d| SeriesPoint {
                label: d.date.format("%m/%d").to_string(),
                value: d.views,
            })
            .collect();

        let total: u64 = parts.statuses.iter().map(|s| s.count).sum();
        let status_slices = parts
            .statuses
            .iter()
            .map(|s| PieSlice {
                label: status_label(s.status).get(lang).to_string(),
                value: s.count,
                share: if total == 0 {
                    0.0
                } else {
                    s.count as f64 / total as f64
                },
            })
            .collect();

        let activity = parts
            .activity
            .iter()
            .map(|item| ActivityLine {
                text: activity_text(item, lang),
                at: item.created_at,
            })
            .collect();

        Self {
            stats: parts.stats,
            total_views: parts.total_views.total_views,
            completed: parts.completed,
            views_series,
            status_slices,
            activity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn item(
        action: Option<ActivityAction>,
        resource: Option<ResourceKind>,
        subject: Option<Bilingual>,
        note: Option<&str>,
    ) -> ActivityFeedItem {
        ActivityFeedItem {
            id: "a1".into(),
            action,
            resource,
            resource_id: None,
            subject,
            note: note.map(String::from),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn structured_entries_read_in_either_language() {
        let entry = item(
            Some(ActivityAction::Created),
            Some(ResourceKind::Property),
            Some(Bilingual::new("Villa", "فيلا")),
            None,
        );
        assert_eq!(activity_text(&entry, Lang::En), "Added property: Villa");
        assert_eq!(activity_text(&entry, Lang::Ar), "إضافة عقار: فيلا");
    }

    #[test]
    fn legacy_entries_keep_their_note() {
        let entry = item(None, None, Some(Bilingual::new("Villa", "فيلا")), Some("Added property"));
        assert_eq!(activity_text(&entry, Lang::Ar), "Added property فيلا");

        let bare = item(None, None, None, Some("Server restarted"));
        assert_eq!(activity_text(&bare, Lang::En), "Server restarted");
    }

    #[test]
    fn assembles_series_and_slices() {
        let parts = DashboardParts {
            stats: DashboardStats::default(),
            total_views: TotalViews { total_views: 12 },
            views: vec![DayViews {
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                views: 5,
            }],
            completed: CompletedTransactions::default(),
            statuses: vec![
                StatusCount { status: PropertyStatus::Available, count: 3 },
                StatusCount { status: PropertyStatus::Rented, count: 1 },
                StatusCount { status: PropertyStatus::Sold, count: 0 },
            ],
            activity: vec![],
        };
        let view = DashboardView::assemble(parts, Lang::Ar);
        assert_eq!(view.total_views, 12);
        assert_eq!(view.views_series, vec![SeriesPoint { label: "03/01".into(), value: 5 }]);
        assert_eq!(view.status_slices[0].label, "متاح");
        assert_eq!(view.status_slices[0].share, 0.75);
        assert_eq!(view.status_slices[2].share, 0.0);
    }
}
