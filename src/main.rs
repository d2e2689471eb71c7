// src/main.rs

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{info, warn};

use estate_marketplace::app_state::AppState;
use estate_marketplace::auth::{bootstrap_admin, Authentication};
use estate_marketplace::config::Config;
use estate_marketplace::configure;
use estate_marketplace::db::MongoDB;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mongodb = MongoDB::init(&config.mongo_uri, &config.database_name)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    if let Err(e) = mongodb.ensure_indexes().await {
        warn!("could not create indexes: {}", e);
    }

    let state = AppState {
        mongodb: Arc::new(mongodb),
        config: config.clone(),
    };
    if let Err(e) = bootstrap_admin(&state).await {
        warn!("could not create bootstrap admin: {}", e);
    }

    info!("Server running at http://{}", config.bind_addr);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    let jwt_secret = config.jwt_secret.clone();
    let frontend_origin = config.frontend_origin.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication::new(jwt_secret.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
