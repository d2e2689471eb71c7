//! Handlers shared by the cities, amenities and property-types resources.
//! Each route is the generic handler instantiated for one entry type.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::info;
use mongodb::bson::{doc, to_bson};
use mongodb::options::ReturnDocument;
use uuid::Uuid;

use crate::activity_log;
use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::db;
use crate::envelope;
use crate::error::{ApiError, ApiResult};
use crate::models::activity::ActivityAction;
use crate::models::catalog::{referencing_filter, CatalogEntry, CatalogPayload};
use crate::models::LangQuery;

/// GET /api/{resource}?lang=
pub async fn list_entries<T: CatalogEntry>(
    data: web::Data<AppState>,
    query: web::Query<LangQuery>,
) -> ApiResult<HttpResponse> {
    let sort_key = format!("name.{}", query.lang().as_str());
    let entries: Vec<T> = data
        .mongodb
        .collection::<T>(T::COLLECTION)
        .find(doc! {})
        .sort(doc! { sort_key: 1 })
        .await?
        .try_collect()
        .await?;
    Ok(envelope::ok(entries))
}

/// POST /api/{resource}
pub async fn add_entry<T: CatalogEntry>(
    data: web::Data<AppState>,
    admin: AdminUser,
    payload: web::Json<CatalogPayload>,
) -> ApiResult<HttpResponse> {
    let entry = T::create(Uuid::new_v4().to_string(), payload.into_inner(), Utc::now())?;
    let id = entry.id().to_string();
    data.mongodb
        .collection::<T>(T::COLLECTION)
        .insert_one(&entry)
        .await?;
    info!("{} {} created", T::MODEL, id);

    activity_log::record(
        &data,
        ActivityAction::Created,
        T::RESOURCE,
        &id,
        Some(entry.name().clone()),
        Some(&admin.0.user_id),
    )
    .await;
    Ok(envelope::created(entry))
}

/// PUT /api/{resource}/{id}
pub async fn update_entry<T: CatalogEntry>(
    data: web::Data<AppState>,
    admin: AdminUser,
    path: web::Path<String>,
    payload: web::Json<CatalogPayload>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let mut set = T::changes(&payload)?;
    set.insert("updatedAt", to_bson(&Utc::now())?);

    let updated = data
        .mongodb
        .collection::<T>(T::COLLECTION)
        .find_one_and_update(doc! { "_id": &id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or(ApiError::NotFound(T::MODEL))?;

    activity_log::record(
        &data,
        ActivityAction::Updated,
        T::RESOURCE,
        &id,
        Some(updated.name().clone()),
        Some(&admin.0.user_id),
    )
    .await;
    Ok(envelope::ok(updated))
}

/// DELETE /api/{resource}/{id}
/// Refused while any listing still references the entry.
pub async fn delete_entry<T: CatalogEntry>(
    data: web::Data<AppState>,
    admin: AdminUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let in_use = data
        .mongodb
        .collection::<mongodb::bson::Document>(db::PROPERTIES)
        .count_documents(referencing_filter(T::PROPERTY_FIELD, &id))
        .await?;
    if in_use > 0 {
        // a missing id is still a 404, even if dangling listings point at it
        let exists = data
            .mongodb
            .collection::<T>(T::COLLECTION)
            .find_one(doc! { "_id": &id })
            .await?
            .is_some();
        if !exists {
            return Err(ApiError::NotFound(T::MODEL));
        }
        return Err(ApiError::Conflict(format!(
            "{} is used by {} properties",
            T::MODEL,
            in_use
        )));
    }

    let deleted = data
        .mongodb
        .collection::<T>(T::COLLECTION)
        .find_one_and_delete(doc! { "_id": &id })
        .await?
        .ok_or(ApiError::NotFound(T::MODEL))?;
    info!("{} {} deleted", T::MODEL, id);

    activity_log::record(
        &data,
        ActivityAction::Deleted,
        T::RESOURCE,
        &id,
        Some(deleted.name().clone()),
        Some(&admin.0.user_id),
    )
    .await;
    Ok(envelope::done(&format!("{} deleted", T::MODEL)))
}
