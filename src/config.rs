use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub frontend_origin: String,
    pub bind_addr: String,
    pub upload_dir: String,
    /// Seeded on startup when no admin exists yet.
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let jwt_ttl_hours = match env::var("JWT_TTL_HOURS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "JWT_TTL_HOURS",
                value: raw,
            })?,
            Err(_) => 24,
        };

        let bootstrap_admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        Ok(Self {
            mongo_uri: env::var("MONGO_URI").map_err(|_| ConfigError::Missing("MONGO_URI"))?,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "estate_db".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            jwt_ttl_hours,
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            bootstrap_admin,
        })
    }

    /// Settings for handler tests that never reach the store.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            database_name: "estate_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_ttl_hours: 1,
            frontend_origin: "http://localhost:5173".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            upload_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            bootstrap_admin: None,
        }
    }
}
