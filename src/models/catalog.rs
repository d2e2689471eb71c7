//! Listing metadata: cities, amenities and property types.

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::activity::ResourceKind;
use super::{string_enum, Bilingual, Validation};
use crate::db;
use crate::error::{ApiError, ApiResult};

string_enum!(PropertyCategory {
    Residential => "Residential",
    Commercial => "Commercial",
    Land => "Land",
    Industrial => "Industrial",
});

/// Add/edit form body shared by the three catalog pages.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPayload {
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub category: Option<String>,
}

pub trait CatalogEntry: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const COLLECTION: &'static str;
    const MODEL: &'static str;
    const RESOURCE: ResourceKind;
    /// Field on a property document that references entries of this kind.
    const PROPERTY_FIELD: &'static str;

    fn create(id: String, payload: CatalogPayload, now: DateTime<Utc>) -> ApiResult<Self>;

    /// `$set` fields for a partial edit.
    fn changes(payload: &CatalogPayload) -> ApiResult<Document>;

    fn id(&self) -> &str;

    fn name(&self) -> &Bilingual;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct City {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Bilingual,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Amenity {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Bilingual,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyType {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Bilingual,
    pub category: PropertyCategory,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

fn validated_name(model: &'static str, payload: &CatalogPayload) -> ApiResult<Bilingual> {
    let mut v = Validation::new(model);
    let name = Bilingual::from_pair(
        &mut v,
        "name",
        payload.name_en.as_deref(),
        payload.name_ar.as_deref(),
    );
    v.finish()?;
    name.ok_or_else(|| ApiError::Internal(format!("{} name missing after validation", model)))
}

/// Name sides present in the payload must not be blank.
fn name_changes(v: &mut Validation, payload: &CatalogPayload) -> Document {
    let mut set = Document::new();
    if let Some(en) = payload.name_en.as_deref() {
        if let Some(en) = v.required_text("name.en", Some(en)) {
            set.insert("name.en", en);
        }
    }
    if let Some(ar) = payload.name_ar.as_deref() {
        if let Some(ar) = v.required_text("name.ar", Some(ar)) {
            set.insert("name.ar", ar);
        }
    }
    set
}

impl CatalogEntry for City {
    const COLLECTION: &'static str = db::CITIES;
    const MODEL: &'static str = "City";
    const RESOURCE: ResourceKind = ResourceKind::City;
    const PROPERTY_FIELD: &'static str = "city";

    fn create(id: String, payload: CatalogPayload, now: DateTime<Utc>) -> ApiResult<Self> {
        Ok(City {
            id,
            name: validated_name(Self::MODEL, &payload)?,
            created_at: now,
            updated_at: now,
        })
    }

    fn changes(payload: &CatalogPayload) -> ApiResult<Document> {
        let mut v = Validation::new(Self::MODEL);
        let set = name_changes(&mut v, payload);
        v.finish()?;
        Ok(set)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &Bilingual {
        &self.name
    }
}

impl CatalogEntry for Amenity {
    const COLLECTION: &'static str = db::AMENITIES;
    const MODEL: &'static str = "Amenity";
    const RESOURCE: ResourceKind = ResourceKind::Amenity;
    const PROPERTY_FIELD: &'static str = "amenities";

    fn create(id: String, payload: CatalogPayload, now: DateTime<Utc>) -> ApiResult<Self> {
        Ok(Amenity {
            id,
            name: validated_name(Self::MODEL, &payload)?,
            created_at: now,
            updated_at: now,
        })
    }

    fn changes(payload: &CatalogPayload) -> ApiResult<Document> {
        let mut v = Validation::new(Self::MODEL);
        let set = name_changes(&mut v, payload);
        v.finish()?;
        Ok(set)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &Bilingual {
        &self.name
    }
}

impl CatalogEntry for PropertyType {
    const COLLECTION: &'static str = db::PROPERTY_TYPES;
    const MODEL: &'static str = "PropertyType";
    const RESOURCE: ResourceKind = ResourceKind::PropertyType;
    const PROPERTY_FIELD: &'static str = "propertyType";

    fn create(id: String, payload: CatalogPayload, now: DateTime<Utc>) -> ApiResult<Self> {
        let mut v = Validation::new(Self::MODEL);
        let name = Bilingual::from_pair(
            &mut v,
            "name",
            payload.name_en.as_deref(),
            payload.name_ar.as_deref(),
        );
        let category = v
            .required_text("category", payload.category.as_deref())
            .and_then(|raw| v.parse_enum::<PropertyCategory>("category", &raw));
        v.finish()?;

        match (name, category) {
            (Some(name), Some(category)) => Ok(PropertyType {
                id,
                name,
                category,
                created_at: now,
                updated_at: now,
            }),
            _ => Err(ApiError::Internal(
                "property type fields missing after validation".into(),
            )),
        }
    }

    fn changes(payload: &CatalogPayload) -> ApiResult<Document> {
        let mut v = Validation::new(Self::MODEL);
        let mut set = name_changes(&mut v, payload);
        if let Some(raw) = payload.category.as_deref() {
            if let Some(category) = v.parse_enum::<PropertyCategory>("category", raw.trim()) {
                set.insert("category", category.as_str());
            }
        }
        v.finish()?;
        Ok(set)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &Bilingual {
        &self.name
    }
}

/// Filter matching properties that reference `id` through `field`.
pub fn referencing_filter(field: &str, id: &str) -> Document {
    doc! { field: id }
}
