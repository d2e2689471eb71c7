//! Aggregation stages that resolve stored `_id` references into documents.

use futures::stream::TryStreamExt;
use mongodb::bson::{doc, from_document, Document};
use mongodb::Collection;
use serde::de::DeserializeOwned;

use crate::db;
use crate::error::ApiResult;

fn unwind(field: &str) -> Document {
    doc! {
        "$unwind": { "path": format!("${}", field), "preserveNullAndEmptyArrays": true }
    }
}

/// Replaces `field` with the referenced document from `from` (or drops it
/// when the reference dangles).
pub fn lookup_one(from: &str, field: &str) -> Vec<Document> {
    vec![
        doc! {
            "$lookup": { "from": from, "localField": field, "foreignField": "_id", "as": field }
        },
        unwind(field),
    ]
}

/// Resolves an array of references in place.
pub fn lookup_many(from: &str, field: &str) -> Document {
    doc! {
        "$lookup": { "from": from, "localField": field, "foreignField": "_id", "as": field }
    }
}

/// Like [`lookup_one`] for a user reference, keeping only public fields.
pub fn lookup_user(field: &str) -> Vec<Document> {
    vec![
        doc! {
            "$lookup": {
                "from": db::USERS,
                "let": { "ref": format!("${}", field) },
                "pipeline": [
                    { "$match": { "$expr": { "$eq": ["$_id", "$$ref"] } } },
                    { "$project": { "name": 1, "email": 1, "phone": 1 } }
                ],
                "as": field
            }
        },
        unwind(field),
    ]
}

/// Resolves a property reference together with the property's city.
pub fn lookup_property_with_city(field: &str) -> Vec<Document> {
    vec![
        doc! {
            "$lookup": {
                "from": db::PROPERTIES,
                "let": { "ref": format!("${}", field) },
                "pipeline": [
                    { "$match": { "$expr": { "$eq": ["$_id", "$$ref"] } } },
                    { "$lookup": { "from": db::CITIES, "localField": "city", "foreignField": "_id", "as": "city" } },
                    { "$unwind": { "path": "$city", "preserveNullAndEmptyArrays": true } }
                ],
                "as": field
            }
        },
        unwind(field),
    ]
}

fn newest_first(filter: Document) -> Vec<Document> {
    vec![doc! { "$match": filter }, doc! { "$sort": { "createdAt": -1 } }]
}

pub fn property_pipeline(filter: Document) -> Vec<Document> {
    let mut pipeline = newest_first(filter);
    pipeline.extend(lookup_one(db::CITIES, "city"));
    pipeline.extend(lookup_one(db::PROPERTY_TYPES, "propertyType"));
    pipeline.push(lookup_many(db::AMENITIES, "amenities"));
    pipeline.extend(lookup_user("seller"));
    pipeline.extend(lookup_user("agent"));
    pipeline
}

pub fn review_pipeline(filter: Document) -> Vec<Document> {
    let mut pipeline = newest_first(filter);
    pipeline.extend(lookup_property_with_city("property_id"));
    pipeline.extend(lookup_user("user_id"));
    pipeline
}

pub fn transaction_pipeline(filter: Document) -> Vec<Document> {
    let mut pipeline = newest_first(filter);
    pipeline.extend(lookup_property_with_city("property"));
    for field in ["seller", "buyer", "agent"] {
        pipeline.extend(lookup_user(field));
    }
    pipeline
}

/// Runs `pipeline` and decodes every resulting document as `T`.
pub async fn aggregate_as<T: DeserializeOwned>(
    coll: &Collection<Document>,
    pipeline: Vec<Document>,
) -> ApiResult<Vec<T>> {
    let docs: Vec<Document> = coll.aggregate(pipeline).await?.try_collect().await?;
    docs.into_iter()
        .map(|d| from_document::<T>(d).map_err(Into::into))
        .collect()
}
