//! In-memory search, status filter and sort for the list pages.

use chrono::{DateTime, Utc};

use crate::models::catalog::{Amenity, City, PropertyType};
use crate::models::property::{Property, PropertyStatus, PropertyView};
use crate::models::{Bilingual, Lang};

/// Anything searched by a bilingual display name.
pub trait Titled {
    fn title(&self) -> &Bilingual;
}

/// A listing row the properties pages can filter and sort.
pub trait Listing: Titled {
    fn status(&self) -> PropertyStatus;
    fn price(&self) -> f64;
    fn created_at(&self) -> DateTime<Utc>;
    fn views(&self) -> i64;
}

macro_rules! listing_impl {
    ($ty:ty) => {
        impl Titled for $ty {
            fn title(&self) -> &Bilingual {
                &self.title
            }
        }

        impl Listing for $ty {
            fn status(&self) -> PropertyStatus {
                self.status
            }
            fn price(&self) -> f64 {
                self.price
            }
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
            fn views(&self) -> i64 {
                self.views
            }
        }
    };
}

listing_impl!(Property);
listing_impl!(PropertyView);

impl Titled for City {
    fn title(&self) -> &Bilingual {
        &self.name
    }
}

impl Titled for Amenity {
    fn title(&self) -> &Bilingual {
        &self.name
    }
}

impl Titled for PropertyType {
    fn title(&self) -> &Bilingual {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    PriceLowToHigh,
    PriceHighToLow,
    Newest,
    MostViewed,
}

pub fn search<'a, T: Titled>(items: &'a [T], term: &str, lang: Lang) -> Vec<&'a T> {
    items.iter().filter(|i| i.title().matches(term, lang)).collect()
}

pub fn sort_listings<T: Listing>(items: &mut [&T], key: SortKey) {
    match key {
        SortKey::PriceLowToHigh => items.sort_by(|a, b| a.price().total_cmp(&b.price())),
        SortKey::PriceHighToLow => items.sort_by(|a, b| b.price().total_cmp(&a.price())),
        SortKey::Newest => items.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        SortKey::MostViewed => items.sort_by(|a, b| b.views().cmp(&a.views())),
    }
}

/// Current toolbar state of a properties page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    pub search: String,
    pub status: Option<PropertyStatus>,
    pub sort: Option<SortKey>,
}

impl ListingFilter {
    pub fn apply<'a, T: Listing>(&self, items: &'a [T], lang: Lang) -> Vec<&'a T> {
        let mut shown: Vec<&T> = search(items, &self.search, lang)
            .into_iter()
            .filter(|i| self.status.map_or(true, |s| i.status() == s))
            .collect();
        if let Some(key) = self.sort {
            sort_listings(&mut shown, key);
        }
        shown
    }
}
