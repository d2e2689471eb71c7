//! Typed HTTP access to the marketplace API.

use std::time::Duration;

use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use super::dashboard::{DashboardParts, DashboardView};
use super::session::{Session, SessionStore};
use crate::envelope::Envelope;
use crate::models::activity::ActivityFeedItem;
use crate::models::dashboard::{
    CompletedTransactions, DashboardStats, DayViews, StatusCount, TotalViews,
};
use crate::models::notification::NotificationList;
use crate::models::property::{Availability, Property, PropertyStatus};
use crate::models::user::{AuthResponse, LoginRequest};
use crate::models::{Bilingual, Lang};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with `success: false`.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("response carried no data")]
    EmptyResponse,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            ClientError::EmptyResponse => None,
        }
    }
}

/// REST collections the admin panel works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Reviews,
    Cities,
    Amenities,
    PropertyTypes,
    Products,
    Transactions,
    Users,
}

impl Resource {
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Reviews => "/api/reviews",
            Resource::Cities => "/api/cities",
            Resource::Amenities => "/api/amenities",
            Resource::PropertyTypes => "/api/property-types",
            Resource::Products => "/api/products",
            Resource::Transactions => "/api/transactions",
            Resource::Users => "/api/users",
        }
    }
}

/// Turns a response body into its payload. Bodies that are not an envelope
/// at all (a proxy error page, say) become an `Api` error carrying the status.
pub fn decode_envelope<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<Option<T>, ClientError> {
    match serde_json::from_slice::<Envelope<T>>(body) {
        Ok(envelope) => envelope
            .into_result()
            .map_err(|message| ClientError::Api { status, message }),
        Err(e) => {
            debug!("undecodable response ({}): {}", status, e);
            Err(ClientError::Api {
                status,
                message: format!("Unexpected response (HTTP {})", status),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The add/edit listing form as the admin pages submit it.
#[derive(Debug, Clone)]
pub struct PropertyDraft {
    pub title: Bilingual,
    pub description: Bilingual,
    pub property_type: String,
    pub city: String,
    pub price: f64,
    pub beds: i32,
    pub baths: i32,
    pub sqft: f64,
    pub availability: Availability,
    pub status: PropertyStatus,
    pub agent: Option<String>,
    pub seller: Option<String>,
    pub amenities: Vec<String>,
    pub images: Vec<ImageUpload>,
}

impl PropertyDraft {
    /// Text parts in the field names the server reads.
    pub fn text_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("titleEn".to_string(), self.title.en.clone()),
            ("titleAr".to_string(), self.title.ar.clone()),
            ("descriptionEn".to_string(), self.description.en.clone()),
            ("descriptionAr".to_string(), self.description.ar.clone()),
            ("propertyType".to_string(), self.property_type.clone()),
            ("city".to_string(), self.city.clone()),
            ("price".to_string(), self.price.to_string()),
            ("beds".to_string(), self.beds.to_string()),
            ("baths".to_string(), self.baths.to_string()),
            ("sqft".to_string(), self.sqft.to_string()),
            ("availability".to_string(), self.availability.to_string()),
            ("status".to_string(), self.status.to_string()),
        ];
        if let Some(agent) = &self.agent {
            fields.push(("agent".to_string(), agent.clone()));
        }
        if let Some(seller) = &self.seller {
            fields.push(("seller".to_string(), seller.clone()));
        }
        for (i, amenity) in self.amenities.iter().enumerate() {
            fields.push((format!("amenities[{}]", i), amenity.clone()));
        }
        fields
    }

    fn into_form(self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for (name, value) in self.text_fields() {
            form = form.text(name, value);
        }
        for (i, image) in self.images.into_iter().enumerate() {
            let part = Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.content_type)?;
            form = form.part(format!("image{}", i + 1), part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Option<T>, ClientError> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        decode_envelope(status, &body)
    }

    async fn fetch<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ClientError> {
        Self::send(builder).await?.ok_or(ClientError::EmptyResponse)
    }

    async fn execute(builder: RequestBuilder) -> Result<(), ClientError> {
        Self::send::<serde_json::Value>(builder).await.map(|_| ())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse =
            Self::fetch(self.request(Method::POST, "/api/users/login").json(&body)).await?;
        let session = Session {
            token: auth.token,
            user: auth.user,
        };
        self.session.sign_in(session.clone());
        Ok(session)
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    pub async fn list<T: DeserializeOwned>(
        &self,
        resource: Resource,
        lang: Lang,
    ) -> Result<Vec<T>, ClientError> {
        let builder = self
            .request(Method::GET, resource.path())
            .query(&[("lang", lang.as_str())]);
        Self::fetch(builder).await
    }

    pub async fn get<T: DeserializeOwned>(&self, resource: Resource, id: &str) -> Result<T, ClientError> {
        let path = format!("{}/{}", resource.path(), id);
        Self::fetch(self.request(Method::GET, &path)).await
    }

    pub async fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        resource: Resource,
        body: &B,
    ) -> Result<T, ClientError> {
        Self::fetch(self.request(Method::POST, resource.path()).json(body)).await
    }

    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        resource: Resource,
        id: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let path = format!("{}/{}", resource.path(), id);
        Self::fetch(self.request(Method::PUT, &path).json(body)).await
    }

    pub async fn delete(&self, resource: Resource, id: &str) -> Result<(), ClientError> {
        let path = format!("{}/{}", resource.path(), id);
        Self::execute(self.request(Method::DELETE, &path)).await
    }

    pub async fn create_property(&self, draft: PropertyDraft) -> Result<Property, ClientError> {
        let form = draft.into_form()?;
        Self::fetch(self.request(Method::POST, Resource::Products.path()).multipart(form)).await
    }

    pub async fn update_property(&self, id: &str, draft: PropertyDraft) -> Result<Property, ClientError> {
        let form = draft.into_form()?;
        let path = format!("{}/{}", Resource::Products.path(), id);
        Self::fetch(self.request(Method::PUT, &path).multipart(form)).await
    }

    pub async fn notifications(&self) -> Result<NotificationList, ClientError> {
        Self::fetch(self.request(Method::GET, "/api/users/notifications")).await
    }

    pub async fn mark_all_read(&self) -> Result<(), ClientError> {
        Self::execute(self.request(Method::PUT, "/api/users/notifications/read-all")).await
    }

    pub async fn clear_all(&self) -> Result<(), ClientError> {
        Self::execute(self.request(Method::DELETE, "/api/users/notifications")).await
    }

    /// Loads every dashboard panel concurrently; the first failure wins.
    pub async fn dashboard(
        &self,
        days: u32,
        activity_limit: i64,
        lang: Lang,
    ) -> Result<DashboardView, ClientError> {
        let get = |path: String| self.request(Method::GET, &path);
        let (stats, total_views, views, completed, statuses, activity) = futures::try_join!(
            Self::fetch::<DashboardStats>(get("/api/dashboard/stats".into())),
            Self::fetch::<TotalViews>(get("/api/dashboard/total-views".into())),
            Self::fetch::<Vec<DayViews>>(get(format!(
                "/api/dashboard/views-over-time?days={}",
                days
            ))),
            Self::fetch::<CompletedTransactions>(get(
                "/api/dashboard/completed-transactions".into()
            )),
            Self::fetch::<Vec<StatusCount>>(get("/api/dashboard/status-distribution".into())),
            Self::fetch::<Vec<ActivityFeedItem>>(get(format!(
                "/api/dashboard/activity?limit={}",
                activity_limit
            )))
        )?;
        Ok(DashboardView::assemble(
            DashboardParts {
                stats,
                total_views,
                views,
                completed,
                statuses,
                activity,
            },
            lang,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_keeps_status_and_message() {
        let err = decode_envelope::<u8>(404, br#"{"success":false,"message":"City not found"}"#)
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "City not found");
    }

    #[test]
    fn non_envelope_bodies_are_errors() {
        let err = decode_envelope::<u8>(502, b"<html>Bad Gateway</html>").unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn message_only_success_has_no_data() {
        let data = decode_envelope::<u8>(200, br#"{"success":true,"message":"Review deleted"}"#)
            .unwrap();
        assert_eq!(data, None);
    }

    #[test]
    fn draft_uses_server_field_names() {
        let draft = PropertyDraft {
            title: Bilingual::new("Villa A", "فيلا أ"),
            description: Bilingual::new("Sea view", "إطلالة"),
            property_type: "t1".into(),
            city: "c1".into(),
            price: 1500.0,
            beds: 3,
            baths: 2,
            sqft: 210.5,
            availability: Availability::Rent,
            status: PropertyStatus::Available,
            agent: None,
            seller: Some("s1".into()),
            amenities: vec!["pool".into(), "gym".into()],
            images: vec![],
        };
        let fields = draft.text_fields();
        let get = |k: &str| {
            fields
                .iter()
                .find(|(name, _)| name == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("titleAr"), Some("فيلا أ"));
        assert_eq!(get("availability"), Some("rent"));
        assert_eq!(get("amenities[1]"), Some("gym"));
        assert_eq!(get("seller"), Some("s1"));
        assert_eq!(get("agent"), None);
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let api = ApiClient::new("http://localhost:8080/", SessionStore::new()).unwrap();
        assert_eq!(api.base_url, "http://localhost:8080");
    }
}
