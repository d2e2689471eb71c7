// src/transactions.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::ReturnDocument;
use uuid::Uuid;

use crate::activity_log;
use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::db;
use crate::envelope;
use crate::error::{ApiError, ApiResult};
use crate::models::activity::{ActivityAction, ResourceKind};
use crate::models::property::Property;
use crate::models::transaction::{Transaction, TransactionRequest, TransactionView};
use crate::models::Bilingual;
use crate::notifications;
use crate::populate;

/// GET /api/transactions
pub async fn list_transactions(
    data: web::Data<AppState>,
    _admin: AdminUser,
) -> ApiResult<HttpResponse> {
    let coll = data.mongodb.collection::<Document>(db::TRANSACTIONS);
    let transactions: Vec<TransactionView> =
        populate::aggregate_as(&coll, populate::transaction_pipeline(doc! {})).await?;
    Ok(envelope::ok(transactions))
}

/// POST /api/transactions
pub async fn add_transaction(
    data: web::Data<AppState>,
    admin: AdminUser,
    payload: web::Json<TransactionRequest>,
) -> ApiResult<HttpResponse> {
    let transaction = payload
        .into_inner()
        .into_transaction(Uuid::new_v4().to_string(), Utc::now())?;

    let property = data
        .mongodb
        .collection::<Property>(db::PROPERTIES)
        .find_one(doc! { "_id": &transaction.property })
        .await?
        .ok_or(ApiError::NotFound("Property"))?;

    data.mongodb
        .collection::<Transaction>(db::TRANSACTIONS)
        .insert_one(&transaction)
        .await?;
    info!(
        "transaction {} recorded for property {}",
        transaction.id, property.id
    );

    activity_log::record(
        &data,
        ActivityAction::Created,
        ResourceKind::Transaction,
        &transaction.id,
        Some(property.title.clone()),
        Some(&admin.0.user_id),
    )
    .await;

    let message = Bilingual::new(
        format!(
            "A {} deal for \"{}\" was recorded ({})",
            transaction.deal_type, property.title.en, transaction.status
        ),
        format!("تم تسجيل صفقة على \"{}\"", property.title.ar),
    );
    for party in [&transaction.seller, &transaction.buyer] {
        notifications::notify(&data, party, message.clone()).await;
    }

    Ok(envelope::created(transaction))
}

/// PUT /api/transactions/{id}
pub async fn update_transaction(
    data: web::Data<AppState>,
    admin: AdminUser,
    path: web::Path<String>,
    payload: web::Json<TransactionRequest>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let mut set = payload.changes()?;
    set.insert("updatedAt", to_bson(&Utc::now())?);

    let updated = data
        .mongodb
        .collection::<Transaction>(db::TRANSACTIONS)
        .find_one_and_update(doc! { "_id": &id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await?
        .ok_or(ApiError::NotFound("Transaction"))?;

    activity_log::record(
        &data,
        ActivityAction::Updated,
        ResourceKind::Transaction,
        &id,
        None,
        Some(&admin.0.user_id),
    )
    .await;
    Ok(envelope::ok(updated))
}

/// DELETE /api/transactions/{id}
pub async fn delete_transaction(
    data: web::Data<AppState>,
    admin: AdminUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    data.mongodb
        .collection::<Transaction>(db::TRANSACTIONS)
        .find_one_and_delete(doc! { "_id": &id })
        .await?
        .ok_or(ApiError::NotFound("Transaction"))?;
    info!("transaction {} deleted", id);

    activity_log::record(
        &data,
        ActivityAction::Deleted,
        ResourceKind::Transaction,
        &id,
        None,
        Some(&admin.0.user_id),
    )
    .await;
    Ok(envelope::done("Transaction deleted"))
}
