use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::property::PropertyRef;
use super::user::UserSummary;
use super::Validation;
use crate::error::{ApiError, ApiResult};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: String,
    pub rating: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub property_id: String,
    pub user_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// A review with its property (and the property's city) and author resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewView {
    #[serde(rename = "_id")]
    pub id: String,
    pub rating: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub property_id: Option<PropertyRef>,
    #[serde(default)]
    pub user_id: Option<UserSummary>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
    pub property_id: Option<String>,
    pub user_id: Option<String>,
}

impl CreateReviewRequest {
    pub fn into_review(self, id: String, now: DateTime<Utc>) -> ApiResult<Review> {
        let mut v = Validation::new("Review");
        let rating = v.required("rating", self.rating);
        if let Some(r) = rating {
            v.range_i32("rating", r, MIN_RATING, MAX_RATING);
        }
        let property_id = v.required_text("property_id", self.property_id.as_deref());
        let user_id = v.required_text("user_id", self.user_id.as_deref());
        v.finish()?;

        match (rating, property_id, user_id) {
            (Some(rating), Some(property_id), Some(user_id)) => Ok(Review {
                id,
                rating,
                comment: normalize_comment(self.comment),
                property_id,
                user_id,
                created_at: now,
                updated_at: now,
            }),
            _ => Err(ApiError::Internal("review fields missing after validation".into())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

impl UpdateReviewRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validation::new("Review");
        if let Some(r) = self.rating {
            v.range_i32("rating", r, MIN_RATING, MAX_RATING);
        }
        v.finish()
    }

    pub fn comment(&self) -> Option<String> {
        normalize_comment(self.comment.clone())
    }
}

fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rating: i32) -> CreateReviewRequest {
        CreateReviewRequest {
            rating: Some(rating),
            comment: Some("  Lovely view ".into()),
            property_id: Some("p1".into()),
            user_id: Some("u1".into()),
        }
    }

    #[test]
    fn every_rating_in_bounds_is_accepted() {
        for rating in MIN_RATING..=MAX_RATING {
            let review = request(rating).into_review("r".into(), Utc::now()).unwrap();
            assert_eq!(review.rating, rating);
            assert_eq!(review.comment.as_deref(), Some("Lovely view"));
        }
    }

    #[test]
    fn ratings_out_of_bounds_are_rejected() {
        for rating in [-3, 0, 6, 100] {
            match request(rating).into_review("r".into(), Utc::now()) {
                Err(ApiError::Validation(msg)) => {
                    assert!(msg.starts_with("Review validation failed: rating:"), "{}", msg)
                }
                other => panic!("rating {} gave {:?}", rating, other),
            }
        }
    }

    #[test]
    fn missing_foreign_keys_are_reported() {
        let req = CreateReviewRequest {
            rating: Some(4),
            ..Default::default()
        };
        let msg = req.into_review("r".into(), Utc::now()).unwrap_err().to_string();
        assert!(msg.contains("property_id: Path `property_id` is required."));
        assert!(msg.contains("user_id: Path `user_id` is required."));
    }

    #[test]
    fn update_checks_rating_only_when_present() {
        assert!(UpdateReviewRequest::default().validate().is_ok());
        let bad = UpdateReviewRequest {
            rating: Some(7),
            comment: None,
        };
        assert!(bad.validate().is_err());
    }
}
