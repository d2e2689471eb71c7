//! Per-city market summary behind the "location trends" display.

use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, from_document, Document};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::db;
use crate::envelope;
use crate::error::ApiResult;
use crate::models::catalog::City;
use crate::models::property::Availability;
use crate::models::{Lang, LangQuery};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityTrend {
    pub city_id: String,
    /// Name in the requested language; the id when the city no longer exists.
    pub city: String,
    pub listings: u64,
    pub average_price: f64,
    pub total_views: i64,
    pub for_rent: u64,
    pub for_sale: u64,
}

/// Per-city totals as the `$group` stage returns them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CityGroup {
    #[serde(rename = "_id")]
    pub city_id: String,
    pub listings: u64,
    #[serde(default)]
    pub average_price: Option<f64>,
    #[serde(default)]
    pub total_views: i64,
    #[serde(default)]
    pub for_rent: u64,
    #[serde(default)]
    pub for_sale: u64,
}

fn count_where(field: &str, value: &str) -> Document {
    doc! { "$sum": { "$cond": [ { "$eq": [format!("${}", field), value] }, 1, 0 ] } }
}

pub fn city_group_pipeline() -> Vec<Document> {
    vec![doc! {
        "$group": {
            "_id": "$city",
            "listings": { "$sum": 1 },
            "average_price": { "$avg": "$price" },
            "total_views": { "$sum": "$views" },
            "for_rent": count_where("availability", Availability::Rent.as_str()),
            "for_sale": count_where("availability", Availability::Buy.as_str()),
        }
    }]
}

/// Names each city group, most listed city first. Ties keep name order.
pub fn city_trends(groups: Vec<CityGroup>, cities: &[City], lang: Lang) -> Vec<CityTrend> {
    let names: HashMap<&str, &City> = cities.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut trends: Vec<CityTrend> = groups
        .into_iter()
        .map(|g| {
            let city = names
                .get(g.city_id.as_str())
                .map(|c| c.name.get(lang).to_string())
                .unwrap_or_else(|| g.city_id.clone());
            CityTrend {
                city,
                city_id: g.city_id,
                listings: g.listings,
                average_price: g.average_price.unwrap_or(0.0),
                total_views: g.total_views,
                for_rent: g.for_rent,
                for_sale: g.for_sale,
            }
        })
        .collect();
    trends.sort_by(|a, b| b.listings.cmp(&a.listings).then_with(|| a.city.cmp(&b.city)));
    trends
}

/// GET /api/products/trends?lang=
pub async fn location_trends(
    data: web::Data<AppState>,
    query: web::Query<LangQuery>,
) -> ApiResult<HttpResponse> {
    let raw: Vec<Document> = data
        .mongodb
        .collection::<Document>(db::PROPERTIES)
        .aggregate(city_group_pipeline())
        .await?
        .try_collect()
        .await?;
    let groups = raw
        .into_iter()
        .map(from_document::<CityGroup>)
        .collect::<Result<Vec<_>, _>>()?;
    let cities: Vec<City> = data
        .mongodb
        .collection::<City>(db::CITIES)
        .find(doc! {})
        .await?
        .try_collect()
        .await?;
    Ok(envelope::ok(city_trends(groups, &cities, query.lang())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bilingual;
    use chrono::Utc;

    fn group(city_id: &str, listings: u64, average_price: f64, total_views: i64, rent: u64) -> CityGroup {
        CityGroup {
            city_id: city_id.into(),
            listings,
            average_price: Some(average_price),
            total_views,
            for_rent: rent,
            for_sale: listings - rent,
        }
    }

    fn city(id: &str, en: &str, ar: &str) -> City {
        City {
            id: id.into(),
            name: Bilingual::new(en, ar),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn summarises_each_city() {
        let groups = vec![group("jeddah", 1, 50.0, 0, 1), group("riyadh", 2, 200.0, 6, 1)];
        let cities = vec![city("riyadh", "Riyadh", "الرياض"), city("jeddah", "Jeddah", "جدة")];

        let trends = city_trends(groups, &cities, Lang::Ar);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].city, "الرياض");
        assert_eq!(trends[0].listings, 2);
        assert_eq!(trends[0].average_price, 200.0);
        assert_eq!(trends[0].total_views, 6);
        assert_eq!((trends[0].for_rent, trends[0].for_sale), (1, 1));
        assert_eq!(trends[1].city_id, "jeddah");
    }

    #[test]
    fn unknown_city_falls_back_to_id() {
        let trends = city_trends(vec![group("gone", 1, 10.0, 0, 0)], &[], Lang::En);
        assert_eq!(trends[0].city, "gone");
    }

    #[test]
    fn groups_decode_from_aggregate_output() {
        let raw = doc! {
            "_id": "riyadh",
            "listings": 3,
            "average_price": 150.5,
            "total_views": 12_i64,
            "for_rent": 1,
            "for_sale": 2,
        };
        let g: CityGroup = from_document(raw).unwrap();
        assert_eq!(g.listings, 3);
        assert_eq!(g.average_price, Some(150.5));
        assert_eq!(g.for_sale, 2);

        let pipeline = city_group_pipeline();
        let stage = pipeline[0].get_document("$group").unwrap();
        assert_eq!(stage.get_str("_id").unwrap(), "$city");
        assert_eq!(
            stage.get_document("for_rent").unwrap(),
            &doc! { "$sum": { "$cond": [ { "$eq": ["$availability", "rent"] }, 1, 0 ] } }
        );
    }
}
