// src/lib.rs

pub mod activity_log;
pub mod app_state;
pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod envelope;
pub mod error;
pub mod models;
pub mod notifications;
pub mod populate;
pub mod properties;
pub mod reviews;
pub mod transactions;
pub mod trends;
pub mod uploads;
pub mod users;

use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::models::catalog::{Amenity, City, CatalogEntry, PropertyType};

const JSON_LIMIT: usize = 1024 * 1024;

fn catalog_scope<T: CatalogEntry>(path: &str) -> actix_web::Scope {
    web::scope(path)
        .route("", web::get().to(catalog::list_entries::<T>))
        .route("", web::post().to(catalog::add_entry::<T>))
        .route("/{id}", web::put().to(catalog::update_entry::<T>))
        .route("/{id}", web::delete().to(catalog::delete_entry::<T>))
}

async fn no_route() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("Route"))
}

/// Registers every route plus extractor error handlers that answer with the
/// JSON envelope instead of actix's plain-text bodies.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT)
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .service(
                web::scope("/reviews")
                    .route("", web::get().to(reviews::list_reviews))
                    .route("", web::post().to(reviews::add_review))
                    .route("/{id}", web::put().to(reviews::update_review))
                    .route("/{id}", web::delete().to(reviews::delete_review)),
            )
            .service(catalog_scope::<City>("/cities"))
            .service(catalog_scope::<Amenity>("/amenities"))
            .service(catalog_scope::<PropertyType>("/property-types"))
            .service(
                web::scope("/products")
                    .route("", web::get().to(properties::list_properties))
                    .route("", web::post().to(properties::add_property))
                    .route("/mine", web::get().to(properties::my_properties))
                    .route("/trends", web::get().to(trends::location_trends))
                    .route("/{id}", web::get().to(properties::get_property))
                    .route("/{id}", web::put().to(properties::update_property))
                    .route("/{id}", web::delete().to(properties::delete_property)),
            )
            .service(
                web::scope("/transactions")
                    .route("", web::get().to(transactions::list_transactions))
                    .route("", web::post().to(transactions::add_transaction))
                    .route("/{id}", web::put().to(transactions::update_transaction))
                    .route("/{id}", web::delete().to(transactions::delete_transaction)),
            )
            .service(
                web::scope("/users")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/me", web::get().to(users::me))
                    .route("/notifications", web::get().to(notifications::list_notifications))
                    .route("/notifications", web::delete().to(notifications::clear_all))
                    .route(
                        "/notifications/read-all",
                        web::put().to(notifications::mark_all_read),
                    )
                    .route("", web::get().to(users::list_users))
                    .route("", web::post().to(users::add_user))
                    .route("/{id}", web::put().to(users::update_user))
                    .route("/{id}", web::delete().to(users::delete_user)),
            )
            .service(
                web::scope("/dashboard")
                    .route("/stats", web::get().to(dashboard::stats))
                    .route("/total-views", web::get().to(dashboard::total_views))
                    .route("/views-over-time", web::get().to(dashboard::views_over_time))
                    .route(
                        "/completed-transactions",
                        web::get().to(dashboard::completed_transactions),
                    )
                    .route(
                        "/status-distribution",
                        web::get().to(dashboard::status_distribution_handler),
                    )
                    .route("/activity", web::get().to(dashboard::activity)),
            )
            .default_service(web::to(no_route)),
    )
    .route("/uploads/{file}", web::get().to(uploads::serve_upload));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::auth::{create_jwt, Authentication};
    use crate::config::Config;
    use crate::db::MongoDB;
    use crate::models::user::{Role, User};
    use actix_web::{http::header, test, App};
    use chrono::Utc;
    use std::sync::Arc;

    // The driver connects lazily; none of these requests reach the store.
    async fn state() -> AppState {
        let config = Config::for_tests();
        let mongodb = MongoDB::init(&config.mongo_uri, &config.database_name)
            .await
            .unwrap();
        AppState {
            mongodb: Arc::new(mongodb),
            config,
        }
    }

    fn token(is_admin: bool, roles: Vec<Role>) -> String {
        let user = User {
            id: "u1".into(),
            name: "T".into(),
            email: "t@example.com".into(),
            phone: None,
            password: String::new(),
            is_admin,
            roles,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        create_jwt(&user, &Config::for_tests().jwt_secret, 1).unwrap()
    }

    macro_rules! app {
        () => {{
            let state = state().await;
            test::init_service(
                App::new()
                    .wrap(Authentication::new(state.config.jwt_secret.clone()))
                    .app_data(web::Data::new(state))
                    .configure(configure),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn dashboard_needs_an_admin() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/dashboard/stats").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({ "success": false, "message": "Not authorized" }));

        let req = test::TestRequest::get()
            .uri("/api/dashboard/activity")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token(false, vec![Role::Agent]))))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);
    }

    #[actix_web::test]
    async fn catalog_writes_need_an_admin() {
        let app = app!();
        let req = test::TestRequest::delete()
            .uri("/api/cities/c1")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token(false, vec![Role::Client]))))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);
    }

    #[actix_web::test]
    async fn malformed_json_is_a_400_envelope() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/reviews")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token(false, vec![Role::Client]))))
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{\"rating\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn unknown_api_paths_are_404_envelopes() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/nothing-here").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Route not found");
    }

    #[actix_web::test]
    async fn uploads_reject_path_tricks() {
        let app = app!();
        let req = test::TestRequest::get().uri("/uploads/.env").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }
}
