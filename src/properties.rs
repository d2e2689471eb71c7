// src/properties.rs

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{info, warn};
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
use crate::models::property::{managed_by_filter, Parties, Property, PropertyView, ViewEvent};
use crate::models::user::Role;
use crate::models::Validation;
use crate::populate;
use crate::uploads;

fn can_list(user: &AuthUser) -> bool {
    user.is_admin || user.has_role(Role::Seller) || user.has_role(Role::Agent)
}

async fn populated(data: &AppState, filter: Document) -> ApiResult<Vec<PropertyView>> {
    let coll = data.mongodb.collection::<Document>(db::PROPERTIES);
    populate::aggregate_as(&coll, populate::property_pipeline(filter)).await
}

async fn find_property(data: &AppState, id: &str) -> ApiResult<Property> {
    data.mongodb
        .collection::<Property>(db::PROPERTIES)
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(ApiError::NotFound("Property"))
}

/// Rejects references to cities or property types that do not exist.
async fn check_references(data: &AppState, city: Option<&str>, kind: Option<&str>) -> ApiResult<()> {
    let mut v = Validation::new("Property");
    if let Some(city) = city {
        let found = data
            .mongodb
            .collection::<Document>(db::CITIES)
            .count_documents(doc! { "_id": city })
            .await?;
        if found == 0 {
            v.invalid("city", &format!("City `{}` does not exist.", city));
        }
    }
    if let Some(kind) = kind {
        let found = data
            .mongodb
            .collection::<Document>(db::PROPERTY_TYPES)
            .count_documents(doc! { "_id": kind })
            .await?;
        if found == 0 {
            v.invalid(
                "propertyType",
                &format!("Property type `{}` does not exist.", kind),
            );
        }
    }
    v.finish()
}

/// Rejects `seller`/`agent` ids that name no user.
async fn check_parties(data: &AppState, seller: Option<&str>, agent: Option<&str>) -> ApiResult<()> {
    let mut v = Validation::new("Property");
    for (path, id) in [("seller", seller), ("agent", agent)] {
        let Some(id) = id else { continue };
        let found = data
            .mongodb
            .collection::<Document>(db::USERS)
            .count_documents(doc! { "_id": id })
            .await?;
        if found == 0 {
            v.invalid(path, &format!("User `{}` does not exist.", id));
        }
    }
    v.finish()
}

/// A non-admin's listing belongs to them, as seller and/or agent by role.
/// Admins name the parties in the form.
fn assigned_parties(user: &AuthUser) -> Option<Parties> {
    if user.is_admin {
        return None;
    }
    Some(Parties {
        seller: user.has_role(Role::Seller).then(|| user.user_id.clone()),
        agent: user.has_role(Role::Agent).then(|| user.user_id.clone()),
    })
}

/// GET /api/products
pub async fn list_properties(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    Ok(envelope::ok(populated(&data, doc! {}).await?))
}

/// GET /api/products/mine
pub async fn my_properties(data: web::Data<AppState>, user: AuthUser) -> ApiResult<HttpResponse> {
    Ok(envelope::ok(
        populated(&data, managed_by_filter(&user.user_id)).await?,
    ))
}

/// GET /api/products/{id}
/// Counts the view before returning the populated listing.
pub async fn get_property(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    data.mongodb
        .collection::<Property>(db::PROPERTIES)
        .find_one_and_update(doc! { "_id": &id }, doc! { "$inc": { "views": 1_i64 } })
        .await?
        .ok_or(ApiError::NotFound("Property"))?;

    let event = ViewEvent {
        id: Uuid::new_v4().to_string(),
        property_id: id.clone(),
        viewed_at: Utc::now(),
    };
    if let Err(e) = data
        .mongodb
        .collection::<ViewEvent>(db::PROPERTY_VIEWS)
        .insert_one(&event)
        .await
    {
        warn!("failed to record view of {}: {}", id, e);
    }

    let view = populated(&data, doc! { "_id": &id })
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::NotFound("Property"))?;
    Ok(envelope::ok(view))
}

/// POST /api/products (multipart)
pub async fn add_property(
    data: web::Data<AppState>,
    user: AuthUser,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    if !can_list(&user) {
        return Err(ApiError::Forbidden);
    }
    let upload_dir = data.config.upload_dir.clone();
    let form = uploads::read_property_form(payload, &upload_dir).await?;
    let images = form.images.clone();

    let result = async {
        let property =
            form.into_property(Uuid::new_v4().to_string(), assigned_parties(&user), Utc::now())?;
        check_references(&data, Some(&property.city), Some(&property.property_type)).await?;
        if user.is_admin {
            check_parties(&data, property.seller.as_deref(), property.agent.as_deref()).await?;
        }
        data.mongodb
            .collection::<Property>(db::PROPERTIES)
            .insert_one(&property)
            .await?;
        Ok::<_, ApiError>(property)
    }
    .await;

    let property = match result {
        Ok(p) => p,
        Err(e) => {
            uploads::discard_images(&images, &upload_dir).await;
            return Err(e);
        }
    };
    info!("property {} listed by {}", property.id, user.user_id);

    activity_log::record(
        &data,
        ActivityAction::Created,
        ResourceKind::Property,
        &property.id,
        Some(property.title.clone()),
        Some(&user.user_id),
    )
    .await;
    Ok(envelope::created(property))
}

/// PUT /api/products/{id} (multipart)
pub async fn update_property(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let upload_dir = data.config.upload_dir.clone();
    let form = uploads::read_property_form(payload, &upload_dir).await?;

    let result = async {
        let existing = find_property(&data, &id).await?;
        if !(user.is_admin || existing.is_managed_by(&user.user_id)) {
            return Err(ApiError::Forbidden);
        }
        check_references(&data, form.text("city"), form.text("propertyType")).await?;
        if user.is_admin {
            check_parties(&data, form.text("seller"), form.text("agent")).await?;
        }

        let mut set = form.changes(user.is_admin)?;
        set.insert("updatedAt", to_bson(&Utc::now())?);
        let updated = data
            .mongodb
            .collection::<Property>(db::PROPERTIES)
            .find_one_and_update(doc! { "_id": &id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or(ApiError::NotFound("Property"))?;
        Ok::<_, ApiError>((existing, updated))
    }
    .await;

    let (existing, updated) = match result {
        Ok(pair) => pair,
        Err(e) => {
            uploads::discard_images(&form.images, &upload_dir).await;
            return Err(e);
        }
    };
    if !form.images.is_empty() {
        let dropped: Vec<String> = existing
            .image
            .into_iter()
            .filter(|old| !updated.image.contains(old))
            .collect();
        uploads::discard_images(&dropped, &upload_dir).await;
    }

    activity_log::record(
        &data,
        ActivityAction::Updated,
        ResourceKind::Property,
        &id,
        Some(updated.title.clone()),
        Some(&user.user_id),
    )
    .await;
    Ok(envelope::ok(updated))
}

/// DELETE /api/products/{id}
/// Also removes the listing's reviews, view history and image files.
pub async fn delete_property(
    data: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let existing = find_property(&data, &id).await?;
    if !(user.is_admin || existing.is_managed_by(&user.user_id)) {
        return Err(ApiError::Forbidden);
    }

    let deleted = data
        .mongodb
        .collection::<Property>(db::PROPERTIES)
        .find_one_and_delete(doc! { "_id": &id })
        .await?
        .ok_or(ApiError::NotFound("Property"))?;

    let reviews = data
        .mongodb
        .collection::<Document>(db::REVIEWS)
        .delete_many(doc! { "property_id": &id })
        .await?;
    if let Err(e) = data
        .mongodb
        .collection::<Document>(db::PROPERTY_VIEWS)
        .delete_many(doc! { "property_id": &id })
        .await
    {
        warn!("failed to clear view history of {}: {}", id, e);
    }
    uploads::discard_images(&deleted.image, &data.config.upload_dir).await;
    info!(
        "property {} deleted with {} reviews",
        id, reviews.deleted_count
    );

    activity_log::record(
        &data,
        ActivityAction::Deleted,
        ResourceKind::Property,
        &id,
        Some(deleted.title),
        Some(&user.user_id),
    )
    .await;
    Ok(envelope::done("Property deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(is_admin: bool, roles: Vec<Role>) -> AuthUser {
        AuthUser {
            user_id: "u1".into(),
            is_admin,
            roles,
        }
    }

    #[test]
    fn only_sellers_agents_and_admins_list() {
        assert!(can_list(&caller(true, vec![])));
        assert!(can_list(&caller(false, vec![Role::Seller])));
        assert!(can_list(&caller(false, vec![Role::Client, Role::Agent])));
        assert!(!can_list(&caller(false, vec![Role::Client])));
    }

    #[test]
    fn non_admins_own_what_they_list() {
        let parties = assigned_parties(&caller(false, vec![Role::Seller])).unwrap();
        assert_eq!(parties.seller.as_deref(), Some("u1"));
        assert_eq!(parties.agent, None);

        let parties = assigned_parties(&caller(false, vec![Role::Agent, Role::Seller])).unwrap();
        assert_eq!(parties.seller.as_deref(), Some("u1"));
        assert_eq!(parties.agent.as_deref(), Some("u1"));

        assert_eq!(assigned_parties(&caller(true, vec![Role::Seller])), None);
    }
}
