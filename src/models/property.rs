use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use super::catalog::{Amenity, City, PropertyType};
use super::user::UserSummary;
use super::{string_enum, Bilingual, Validation};
use crate::error::{ApiError, ApiResult};

string_enum!(Availability {
    Rent => "rent",
    Buy => "buy",
});

string_enum!(PropertyStatus {
    Available => "available",
    Rented => "rented",
    Sold => "sold",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Bilingual,
    pub description: Bilingual,
    #[serde(rename = "propertyType")]
    pub property_type: String,
    pub city: String,
    #[serde(default)]
    pub seller: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    pub price: f64,
    pub beds: i32,
    pub baths: i32,
    pub sqft: f64,
    pub availability: Availability,
    pub status: PropertyStatus,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub views: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Sellers and agents may edit the listings they are attached to.
    pub fn is_managed_by(&self, user_id: &str) -> bool {
        self.seller.as_deref() == Some(user_id) || self.agent.as_deref() == Some(user_id)
    }
}

/// A listing with every reference resolved, as the list and detail pages show it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Bilingual,
    pub description: Bilingual,
    #[serde(rename = "propertyType", default)]
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub city: Option<City>,
    #[serde(default)]
    pub seller: Option<UserSummary>,
    #[serde(default)]
    pub agent: Option<UserSummary>,
    pub price: f64,
    pub beds: i32,
    pub baths: i32,
    pub sqft: f64,
    pub availability: Availability,
    pub status: PropertyStatus,
    #[serde(default)]
    pub amenities: Vec<Amenity>,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub views: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// The part of a listing embedded into reviews and transactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Bilingual,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub city: Option<City>,
}

/// One detail-page view, kept for the views-over-time chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewEvent {
    #[serde(rename = "_id")]
    pub id: String,
    pub property_id: String,
    pub viewed_at: DateTime<Utc>,
}

/// Text fields and stored image paths of an add/edit listing form.
#[derive(Debug, Default)]
pub struct PropertyForm {
    pub fields: HashMap<String, String>,
    /// `None` when the form carried no amenity fields at all.
    pub amenities: Option<Vec<String>>,
    pub images: Vec<String>,
}

struct Numbers {
    price: Option<f64>,
    beds: Option<i32>,
    baths: Option<i32>,
    sqft: Option<f64>,
}

/// Who a listing belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parties {
    pub seller: Option<String>,
    pub agent: Option<String>,
}

impl PropertyForm {
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn numbers(&self, v: &mut Validation) -> Numbers {
        let price = self.text("price").and_then(|raw| v.parse_number::<f64>("price", raw));
        let beds = self.text("beds").and_then(|raw| v.parse_number::<i32>("beds", raw));
        let baths = self.text("baths").and_then(|raw| v.parse_number::<i32>("baths", raw));
        let sqft = self.text("sqft").and_then(|raw| v.parse_number::<f64>("sqft", raw));
        if let Some(p) = price {
            v.min_f64("price", p, 0.0);
        }
        if let Some(b) = beds {
            v.range_i32("beds", b, 0, i32::MAX);
        }
        if let Some(b) = baths {
            v.range_i32("baths", b, 0, i32::MAX);
        }
        if let Some(s) = sqft {
            v.min_f64("sqft", s, 0.0);
        }
        Numbers {
            price,
            beds,
            baths,
            sqft,
        }
    }

    fn availability(&self, v: &mut Validation) -> Option<Availability> {
        self.text("availability")
            .and_then(|raw| v.parse_enum("availability", raw))
    }

    fn status(&self, v: &mut Validation) -> Option<PropertyStatus> {
        self.text("status").and_then(|raw| v.parse_enum("status", raw))
    }

    /// A new listing. With `assigned` set, the form's `seller`/`agent` are
    /// ignored and the listing goes to those parties instead.
    pub fn into_property(
        self,
        id: String,
        assigned: Option<Parties>,
        now: DateTime<Utc>,
    ) -> ApiResult<Property> {
        let mut v = Validation::new("Property");
        let title = Bilingual::from_pair(&mut v, "title", self.text("titleEn"), self.text("titleAr"));
        let description = Bilingual::from_pair(
            &mut v,
            "description",
            self.text("descriptionEn"),
            self.text("descriptionAr"),
        );
        let property_type = v.required_text("propertyType", self.text("propertyType"));
        let city = v.required_text("city", self.text("city"));
        let numbers = self.numbers(&mut v);
        let price = v.required("price", numbers.price);
        let availability = self.availability(&mut v);
        let availability = v.required("availability", availability);
        let status = self.status(&mut v).unwrap_or(PropertyStatus::Available);
        v.finish()?;

        let (Some(title), Some(description), Some(property_type), Some(city), Some(price), Some(availability)) =
            (title, description, property_type, city, price, availability)
        else {
            return Err(ApiError::Internal("property fields missing after validation".into()));
        };
        let parties = assigned.unwrap_or_else(|| Parties {
            seller: self.text("seller").map(String::from),
            agent: self.text("agent").map(String::from),
        });

        Ok(Property {
            id,
            title,
            description,
            property_type,
            city,
            seller: parties.seller,
            agent: parties.agent,
            price,
            beds: numbers.beds.unwrap_or(0),
            baths: numbers.baths.unwrap_or(0),
            sqft: numbers.sqft.unwrap_or(0.0),
            availability,
            status,
            amenities: self.amenities.unwrap_or_default(),
            image: self.images,
            views: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// `$set` fields for an edit. Only fields present in the form change;
    /// images are replaced only when new ones were uploaded. `seller` and
    /// `agent` are reassigned only when `reassign` is set.
    pub fn changes(&self, reassign: bool) -> ApiResult<Document> {
        let mut v = Validation::new("Property");
        let mut set = Document::new();

        for (form_key, path) in [
            ("titleEn", "title.en"),
            ("titleAr", "title.ar"),
            ("descriptionEn", "description.en"),
            ("descriptionAr", "description.ar"),
            ("propertyType", "propertyType"),
            ("city", "city"),
        ] {
            if let Some(value) = self.text(form_key) {
                set.insert(path, value);
            }
        }
        if reassign {
            for key in ["seller", "agent"] {
                if let Some(value) = self.text(key) {
                    set.insert(key, value);
                }
            }
        }

        let numbers = self.numbers(&mut v);
        if let Some(price) = numbers.price {
            set.insert("price", price);
        }
        if let Some(beds) = numbers.beds {
            set.insert("beds", beds);
        }
        if let Some(baths) = numbers.baths {
            set.insert("baths", baths);
        }
        if let Some(sqft) = numbers.sqft {
            set.insert("sqft", sqft);
        }
        if let Some(a) = self.availability(&mut v) {
            set.insert("availability", a.as_str());
        }
        if let Some(s) = self.status(&mut v) {
            set.insert("status", s.as_str());
        }
        if let Some(amenities) = &self.amenities {
            set.insert("amenities", amenities.clone());
        }
        if !self.images.is_empty() {
            set.insert("image", self.images.clone());
        }
        v.finish()?;
        Ok(set)
    }
}

/// Listings where the user is the seller or the agent.
pub fn managed_by_filter(user_id: &str) -> Document {
    doc! { "$or": [ { "seller": user_id }, { "agent": user_id } ] }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> PropertyForm {
        PropertyForm {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            amenities: Some(vec!["pool".into(), "gym".into()]),
            images: vec!["uploads/a.jpg".into()],
        }
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            ("titleEn", "Villa A"),
            ("titleAr", "فيلا أ"),
            ("descriptionEn", "Sea view"),
            ("descriptionAr", "إطلالة بحرية"),
            ("propertyType", "type-villa"),
            ("city", "city-jeddah"),
            ("price", "1250000"),
            ("beds", "4"),
            ("baths", "3"),
            ("sqft", "320.5"),
            ("availability", "buy"),
        ]
    }

    #[test]
    fn builds_listing_with_defaults() {
        let p = form(&complete())
            .into_property(
                "p1".into(),
                Some(Parties {
                    seller: Some("seller-1".into()),
                    agent: None,
                }),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(p.status, PropertyStatus::Available);
        assert_eq!(p.seller.as_deref(), Some("seller-1"));
        assert_eq!(p.amenities, vec!["pool".to_string(), "gym".to_string()]);
        assert_eq!(p.views, 0);
        assert_eq!(p.sqft, 320.5);
    }

    #[test]
    fn rejects_bad_numbers_and_enums() {
        let mut pairs = complete();
        pairs.retain(|(k, _)| *k != "price" && *k != "availability");
        pairs.push(("price", "a lot"));
        pairs.push(("availability", "lease"));
        let msg = form(&pairs)
            .into_property("p1".into(), None, Utc::now())
            .unwrap_err()
            .to_string();
        assert!(msg.contains("Cast to Number failed for value \"a lot\""), "{}", msg);
        assert!(msg.contains("`lease` is not a valid enum value for path `availability`."));
    }

    #[test]
    fn edit_keeps_images_unless_new_ones_sent() {
        let mut f = form(&[("price", "900"), ("status", "sold")]);
        f.images.clear();
        let set = f.changes(false).unwrap();
        assert_eq!(set.get_f64("price").unwrap(), 900.0);
        assert_eq!(set.get_str("status").unwrap(), "sold");
        assert!(set.get("image").is_none());
    }

    #[test]
    fn negative_price_is_rejected() {
        let f = form(&[("price", "-1")]);
        assert!(f.changes(false).is_err());
    }

    #[test]
    fn assigned_parties_override_the_form() {
        let mut pairs = complete();
        pairs.push(("seller", "someone-else"));
        pairs.push(("agent", "another-agent"));
        let mine = Parties {
            seller: Some("caller".into()),
            agent: None,
        };
        let p = form(&pairs)
            .into_property("p1".into(), Some(mine.clone()), Utc::now())
            .unwrap();
        assert_eq!(p.seller.as_deref(), Some("caller"));
        assert_eq!(p.agent, None);

        let p = form(&pairs).into_property("p2".into(), None, Utc::now()).unwrap();
        assert_eq!(p.seller.as_deref(), Some("someone-else"));
        assert_eq!(p.agent.as_deref(), Some("another-agent"));
    }

    #[test]
    fn edits_reassign_owners_only_when_allowed() {
        let f = form(&[("seller", "someone-else"), ("agent", "another-agent"), ("beds", "2")]);
        let set = f.changes(false).unwrap();
        assert!(set.get("seller").is_none());
        assert!(set.get("agent").is_none());
        assert_eq!(set.get_i32("beds").unwrap(), 2);

        let set = f.changes(true).unwrap();
        assert_eq!(set.get_str("seller").unwrap(), "someone-else");
        assert_eq!(set.get_str("agent").unwrap(), "another-agent");
    }
}
