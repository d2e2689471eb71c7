use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http, web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures::future::{ok, ready, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db;
use crate::envelope::{self, Envelope};
use crate::error::{ApiError, ApiResult};
use crate::models::user::{
    AuthResponse, CreateUserRequest, LoginRequest, PublicUser, Role, User,
};
use crate::users;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// The caller behind a verified bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: String,
    pub is_admin: bool,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Admins may act on anything; everyone else only on what they own.
    pub fn can_act_for(&self, owner_id: &str) -> bool {
        self.is_admin || self.user_id == owner_id
    }
}

impl From<Claims> for AuthUser {
    fn from(c: Claims) -> Self {
        Self {
            user_id: c.sub,
            is_admin: c.is_admin,
            roles: c.roles,
        }
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or(ApiError::Unauthorized),
        )
    }
}

/// An authenticated caller with the `isAdmin` flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequest for AdminUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = match req.extensions().get::<AuthUser>() {
            Some(user) if user.is_admin => Ok(AdminUser(user.clone())),
            Some(_) => Err(ApiError::Forbidden),
            None => Err(ApiError::Unauthorized),
        };
        ready(result)
    }
}

// JWT Creation
pub fn create_jwt(user: &User, secret: &str, ttl_hours: i64) -> ApiResult<String> {
    let expiration = Utc::now() + Duration::hours(ttl_hours);
    let claims = Claims {
        sub: user.id.clone(),
        exp: expiration.timestamp() as usize,
        is_admin: user.is_admin,
        roles: user.roles.clone(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| ApiError::Internal(format!("token encode error: {}", e)))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub async fn hash_password(password: String) -> ApiResult<String> {
    web::block(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("hash task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("error hashing password: {}", e)))
}

pub async fn verify_password(password: String, hashed: String) -> bool {
    web::block(move || verify(password, &hashed).unwrap_or(false))
        .await
        .unwrap_or(false)
}

/// Verifies `Authorization: Bearer <token>` and stores the caller as an
/// [`AuthUser`] request extension. Requests without the header pass through
/// anonymous; a bad token is rejected here with 401.
#[derive(Debug, Clone)]
pub struct Authentication {
    secret: String,
}

impl Authentication {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service,
            secret: self.secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string());

        if let Some(token) = bearer {
            match validate_jwt(&token, &self.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(AuthUser::from(claims));
                }
                Err(e) => {
                    warn!("rejected bearer token: {}", e);
                    let (req_parts, _payload) = req.into_parts();
                    let resp = HttpResponse::Unauthorized()
                        .json(Envelope::<()>::failure("Invalid token"))
                        .map_into_boxed_body();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

/// POST /api/users/register
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<CreateUserRequest>,
) -> ApiResult<HttpResponse> {
    let mut payload = payload.into_inner();
    // self sign-up never grants admin
    payload.is_admin = false;
    let new_user = payload.validate()?;

    let user = users::insert_user(&data, new_user, &payload.profile).await?;
    let token = create_jwt(&user, &data.config.jwt_secret, data.config.jwt_ttl_hours)?;
    info!("user registered: {}", user.id);

    Ok(envelope::created(AuthResponse {
        token,
        user: PublicUser::from(user),
    }))
}

/// POST /api/users/login
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let users_collection = data.mongodb.collection::<User>(db::USERS);
    let email = crate::models::user::normalize_email(&payload.email);
    let user = users_collection
        .find_one(doc! { "email": &email })
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(payload.password.clone(), user.password.clone()).await {
        return Err(ApiError::Unauthorized);
    }

    let token = create_jwt(&user, &data.config.jwt_secret, data.config.jwt_ttl_hours)?;
    let mut public = PublicUser::from(user);
    public.profiles = users::load_profiles(&data, &public.id, &public.roles).await?;
    Ok(envelope::ok(AuthResponse {
        token,
        user: public,
    }))
}

/// Creates the configured admin account when no admin exists yet.
pub async fn bootstrap_admin(data: &AppState) -> ApiResult<()> {
    let Some((email, password)) = data.config.bootstrap_admin.clone() else {
        return Ok(());
    };
    let users_collection = data.mongodb.collection::<User>(db::USERS);
    if users_collection
        .find_one(doc! { "isAdmin": true })
        .await?
        .is_some()
    {
        return Ok(());
    }

    let now = Utc::now();
    let admin = User {
        id: Uuid::new_v4().to_string(),
        name: "Administrator".to_string(),
        email: crate::models::user::normalize_email(&email),
        phone: None,
        password: hash_password(password).await?,
        is_admin: true,
        roles: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    users_collection.insert_one(&admin).await?;
    info!("bootstrap admin created: {}", admin.email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    const SECRET: &str = "test-secret";

    fn user(is_admin: bool, roles: Vec<Role>) -> User {
        User {
            id: "user-1".into(),
            name: "Test".into(),
            email: "t@example.com".into(),
            phone: None,
            password: String::new(),
            is_admin,
            roles,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.user_id)
    }

    async fn admin_only(_admin: AdminUser) -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    async fn public() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .wrap(Authentication::new(SECRET))
                    .route("/public", web::get().to(public))
                    .route("/whoami", web::get().to(whoami))
                    .route("/admin", web::get().to(admin_only)),
            )
            .await
        };
    }

    fn bearer(token: &str) -> (http::header::HeaderName, String) {
        (http::header::AUTHORIZATION, format!("Bearer {}", token))
    }

    #[actix_web::test]
    async fn claims_round_trip() {
        let token = create_jwt(&user(true, vec![Role::Agent]), SECRET, 1).unwrap();
        let claims = validate_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert!(claims.is_admin);
        assert_eq!(claims.roles, vec![Role::Agent]);
        assert!(validate_jwt(&token, "other-secret").is_err());
    }

    #[actix_web::test]
    async fn anonymous_requests_reach_public_routes() {
        let app = app!();
        let resp = test::call_service(&app, test::TestRequest::get().uri("/public").to_request()).await;
        assert_eq!(resp.status(), 200);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/whoami").to_request()).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn invalid_token_is_rejected_by_middleware() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/public")
            .insert_header(bearer("not-a-jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid token");
    }

    #[actix_web::test]
    async fn valid_token_identifies_caller() {
        let app = app!();
        let token = create_jwt(&user(false, vec![Role::Client]), SECRET, 1).unwrap();
        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(bearer(&token))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, web::Bytes::from_static(b"user-1"));
    }

    #[actix_web::test]
    async fn admin_routes_need_the_admin_flag() {
        let app = app!();
        let client = create_jwt(&user(false, vec![Role::Seller]), SECRET, 1).unwrap();
        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header(bearer(&client))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let admin = create_jwt(&user(true, vec![]), SECRET, 1).unwrap();
        let req = test::TestRequest::get()
            .uri("/admin")
            .insert_header(bearer(&admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }

    #[actix_web::test]
    async fn owners_and_admins_can_act() {
        let caller = AuthUser {
            user_id: "u1".into(),
            is_admin: false,
            roles: vec![],
        };
        assert!(caller.can_act_for("u1"));
        assert!(!caller.can_act_for("u2"));
        let admin = AuthUser {
            is_admin: true,
            ..caller
        };
        assert!(admin.can_act_for("u2"));
    }
}
