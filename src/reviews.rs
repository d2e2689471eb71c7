// src/reviews.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::ReturnDocument;
use uuid::Uuid;

use crate::activity_log;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::db;
use crate::envelope;
use crate::error::{ApiError, ApiResult};
use crate::models::activity::{ActivityAction, ResourceKind};
use crate::models::property::Property;
use crate::models::review::{CreateReviewRequest, Review, ReviewView, UpdateReviewRequest};
use crate::models::Bilingual;
use crate::notifications;
use crate::populate;

/// GET /api/reviews
/// Every review, newest first, with its property (and city) and author.
pub async fn list_reviews(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let coll = data.mongodb.collection::<Document>(db::REVIEWS);
    let reviews: Vec<ReviewView> =
        populate::aggregate_as(&coll, populate::review_pipeline(doc! {})).await?;
    Ok(envelope::ok(reviews))
}

/// POST /api/reviews
pub async fn add_review(
    data: web::Data<AppState>,
    user: AuthUser,
    payload: web::Json<CreateReviewRequest>,
) -> ApiResult<HttpResponse> {
    let mut payload = payload.into_inner();
    if payload.user_id.is_none() {
        payload.user_id = Some(user.user_id.clone());
    }
    let review = payload.into_review(Uuid::new_v4().to_string(), Utc::now())?;
    if !user.can_act_for(&review.user_id) {
        return Err(ApiError::Forbidden);
    }

    let property = data
        .mongodb
        .collection::<Property>(db::PROPERTIES)
        .find_one(doc! { "_id": &review.property_id })
        .await?
        .ok_or(ApiError::NotFound("Property"))?;

    data.mongodb
        .collection::<Review>(db::REVIEWS)
        .insert_one(&review)
        .await?;
    info!("review {} added to property {}", review.id, property.id);

    activity_log::record(
        &data,
        ActivityAction::Created,
        ResourceKind::Review,
        &review.id,
        Some(property.title.clone()),
        Some(&user.user_id),
    )
    .await;
    if let Some(seller) = property.seller.as_deref().filter(|s| *s != review.user_id) {
        let message = Bilingual::new(
            format!(
                "New {}-star review on \"{}\"",
                review.rating, property.title.en
            ),
            format!(
                "تقييم جديد ({} نجوم) على \"{}\"",
                review.rating, property.title.ar
            ),
        );
        notifications::notify(&data, seller, message).await;
    }

    Ok(envelope::created(review))
}

async fn find_review(data: &AppState, id: &str) -> ApiResult<Review> {
    data.mongodb
        .collection::<Review>(db::REVIEWS)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("Review"))
}

/// PUT /api/reviews/{id}
pub async fn update_review(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    payload: web::Json<UpdateReviewRequest>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    payload.validate()?;
    let existing = find_review(&data, &id).await?;
    if !user.can_act_for(&existing.user_id) {
        return Err(ApiError::Forbidden);
    }

    let mut set = doc! { "updatedAt": to_bson(&Utc::now())? };
    if let Some(rating) = payload.rating {
        set.insert("rating", rating);
    }
    let mut update = Document::new();
    match (payload.comment.is_some(), payload.comment()) {
        (_, Some(comment)) => {
            set.insert("comment", comment);
        }
        (true, None) => {
            update.insert("$unset", doc! { "comment": "" });
        }
        (false, None) => {}
    }
    update.insert("$set", set);

    let updated = data
        .mongodb
        .collection::<Review>(db::REVIEWS)
        .find_one_and_update(doc! { "_id": &id }, update)
        .return_document(ReturnDocument::After)
        .await?
        .ok_or(ApiError::NotFound("Review"))?;

    activity_log::record(
        &data,
        ActivityAction::Updated,
        ResourceKind::Review,
        &id,
        None,
        Some(&user.user_id),
    )
    .await;
    Ok(envelope::ok(updated))
}

/// DELETE /api/reviews/{id}
pub async fn delete_review(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let existing = find_review(&data, &id).await?;
    if !user.can_act_for(&existing.user_id) {
        return Err(ApiError::Forbidden);
    }

    let deleted = data
        .mongodb
        .collection::<Review>(db::REVIEWS)
        .find_one_and_delete(doc! { "_id": &id })
        .await?
        .ok_or(ApiError::NotFound("Review"))?;
    info!("review {} deleted", deleted.id);

    activity_log::record(
        &data,
        ActivityAction::Deleted,
        ResourceKind::Review,
        &id,
        None,
        Some(&user.user_id),
    )
    .await;
    Ok(envelope::done("Review deleted"))
}
