// src/users.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures::stream::TryStreamExt;
use log::{info, warn};
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::ReturnDocument;
use uuid::Uuid;

use crate::activity_log;
use crate::app_state::AppState;
use crate::auth::{hash_password, AdminUser, AuthUser};
use crate::db;
use crate::envelope;
use crate::error::{ApiError, ApiResult};
use crate::models::activity::{ActivityAction, ResourceKind};
use crate::models::user::{
    role_changes, CreateUserRequest, NewUser, Profile, ProfileFields, PublicUser, Role,
    RoleProfiles, UpdateUserRequest, User,
};
use crate::models::Bilingual;

const EMAIL_TAKEN: &str = "Email already registered";

async fn email_taken(data: &AppState, email: &str, except: Option<&str>) -> ApiResult<bool> {
    let mut filter = doc! { "email": email };
    if let Some(id) = except {
        filter.insert("_id", doc! { "$ne": id });
    }
    let n = data
        .mongodb
        .collection::<Document>(db::USERS)
        .count_documents(filter)
        .await?;
    Ok(n > 0)
}

/// Hashes the password, stores the account and one profile per role.
pub async fn insert_user(
    data: &AppState,
    new_user: NewUser,
    fields: &ProfileFields,
) -> ApiResult<User> {
    if email_taken(data, &new_user.email, None).await? {
        return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
    }
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: new_user.name,
        email: new_user.email,
        phone: new_user.phone,
        password: hash_password(new_user.password).await?,
        is_admin: new_user.is_admin,
        roles: new_user.roles,
        created_at: now,
        updated_at: now,
    };
    data.mongodb
        .collection::<User>(db::USERS)
        .insert_one(&user)
        .await
        .map_err(ApiError::duplicate_as(EMAIL_TAKEN))?;
    create_profiles(data, &user.id, &user.roles, fields).await?;
    Ok(user)
}

pub async fn create_profiles(
    data: &AppState,
    user_id: &str,
    roles: &[Role],
    fields: &ProfileFields,
) -> ApiResult<()> {
    for role in roles {
        let profile = Profile::new(Uuid::new_v4().to_string(), user_id, *role, fields);
        data.mongodb
            .collection::<Profile>(role.profile_collection())
            .insert_one(&profile)
            .await?;
    }
    Ok(())
}

pub async fn load_profiles(data: &AppState, user_id: &str, roles: &[Role]) -> ApiResult<RoleProfiles> {
    let mut profiles = RoleProfiles::default();
    for role in roles {
        let profile = data
            .mongodb
            .collection::<Profile>(role.profile_collection())
            .find_one(doc! { "user_id": user_id })
            .await?;
        profiles.set(*role, profile);
    }
    Ok(profiles)
}

/// The profile fields a role stores, limited to those actually sent.
fn profile_set(role: Role, fields: &ProfileFields) -> Document {
    let sent = |v: &Option<String>| v.as_deref().map(str::trim).map(str::to_string);
    let mut set = Document::new();
    let pairs = match role {
        Role::Agent => vec![
            ("agency", sent(&fields.agency)),
            ("license_number", sent(&fields.license_number)),
        ],
        Role::Seller => vec![("company", sent(&fields.company))],
        Role::Client => vec![("preferred_city", sent(&fields.preferred_city))],
    };
    for (key, value) in pairs {
        if let Some(value) = value {
            set.insert(key, value);
        }
    }
    set
}

/// Brings the role collections in line with `new` roles: new roles get a
/// profile, dropped roles lose theirs, kept roles take any sent fields.
pub async fn sync_profiles(
    data: &AppState,
    user_id: &str,
    old: &[Role],
    new: &[Role],
    fields: &ProfileFields,
) -> ApiResult<()> {
    let changes = role_changes(old, new);
    create_profiles(data, user_id, &changes.added, fields).await?;
    for role in &changes.removed {
        data.mongodb
            .collection::<Profile>(role.profile_collection())
            .delete_one(doc! { "user_id": user_id })
            .await?;
    }
    for role in new.iter().filter(|r| !changes.added.contains(r)) {
        let set = profile_set(*role, fields);
        if set.is_empty() {
            continue;
        }
        data.mongodb
            .collection::<Profile>(role.profile_collection())
            .update_one(doc! { "user_id": user_id }, doc! { "$set": set })
            .await?;
    }
    Ok(())
}

async fn with_profiles(data: &AppState, user: User) -> ApiResult<PublicUser> {
    let mut public = PublicUser::from(user);
    public.profiles = load_profiles(data, &public.id, &public.roles).await?;
    Ok(public)
}

/// GET /api/users/me
pub async fn me(data: web::Data<AppState>, user: AuthUser) -> ApiResult<HttpResponse> {
    let found = data
        .mongodb
        .collection::<User>(db::USERS)
        .find_one(doc! { "_id": &user.user_id })
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(envelope::ok(with_profiles(&data, found).await?))
}

/// GET /api/users
pub async fn list_users(data: web::Data<AppState>, _admin: AdminUser) -> ApiResult<HttpResponse> {
    let users: Vec<User> = data
        .mongodb
        .collection::<User>(db::USERS)
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;

    let mut out = Vec::with_capacity(users.len());
    for user in users {
        out.push(with_profiles(&data, user).await?);
    }
    Ok(envelope::ok(out))
}

/// POST /api/users
pub async fn add_user(
    data: web::Data<AppState>,
    admin: AdminUser,
    payload: web::Json<CreateUserRequest>,
) -> ApiResult<HttpResponse> {
    let new_user = payload.validate()?;
    let user = insert_user(&data, new_user, &payload.profile).await?;
    info!("user {} created by admin {}", user.id, admin.0.user_id);

    activity_log::record(
        &data,
        ActivityAction::Created,
        ResourceKind::User,
        &user.id,
        Some(Bilingual::new(user.name.clone(), user.name.clone())),
        Some(&admin.0.user_id),
    )
    .await;
    Ok(envelope::created(with_profiles(&data, user).await?))
}

/// PUT /api/users/{id}
/// Admins may edit anyone; other users only themselves, and never their
/// own `isAdmin` flag or roles.
pub async fn update_user(
    data: web::Data<AppState>,
    caller: AuthUser,
    path: web::Path<String>,
    payload: web::Json<UpdateUserRequest>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if !caller.can_act_for(&id) || (payload.is_privileged() && !caller.is_admin) {
        return Err(ApiError::Forbidden);
    }
    let changes = payload.validate()?;

    let users = data.mongodb.collection::<User>(db::USERS);
    let existing = users
        .find_one(doc! { "_id": &id })
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let mut set = doc! { "updatedAt": to_bson(&Utc::now())? };
    if let Some(name) = changes.name {
        set.insert("name", name);
    }
    if let Some(email) = changes.email {
        if email != existing.email && email_taken(&data, &email, Some(&id)).await? {
            return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
        }
        set.insert("email", email);
    }
    if let Some(phone) = changes.phone {
        set.insert("phone", phone);
    }
    if let Some(password) = changes.password {
        set.insert("password", hash_password(password).await?);
    }
    if let Some(is_admin) = changes.is_admin {
        set.insert("isAdmin", is_admin);
    }
    if let Some(roles) = &changes.roles {
        set.insert("roles", to_bson(roles)?);
    }

    let updated = users
        .find_one_and_update(doc! { "_id": &id }, doc! { "$set": set })
        .return_document(ReturnDocument::After)
        .await
        .map_err(ApiError::duplicate_as(EMAIL_TAKEN))?
        .ok_or(ApiError::NotFound("User"))?;

    sync_profiles(
        &data,
        &id,
        &existing.roles,
        &updated.roles,
        &payload.profile,
    )
    .await?;
    if existing.roles != updated.roles {
        info!(
            "user {} roles changed from {:?} to {:?}",
            id, existing.roles, updated.roles
        );
    }

    activity_log::record(
        &data,
        ActivityAction::Updated,
        ResourceKind::User,
        &id,
        Some(Bilingual::new(updated.name.clone(), updated.name.clone())),
        Some(&caller.user_id),
    )
    .await;
    Ok(envelope::ok(with_profiles(&data, updated).await?))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    data: web::Data<AppState>,
    admin: AdminUser,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let deleted = data
        .mongodb
        .collection::<User>(db::USERS)
        .find_one_and_delete(doc! { "_id": &id })
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    for role in Role::ALL {
        if let Err(e) = data
            .mongodb
            .collection::<Profile>(role.profile_collection())
            .delete_one(doc! { "user_id": &id })
            .await
        {
            warn!("failed to remove {} profile of {}: {}", role, id, e);
        }
    }
    info!("user {} deleted by admin {}", id, admin.0.user_id);

    activity_log::record(
        &data,
        ActivityAction::Deleted,
        ResourceKind::User,
        &id,
        Some(Bilingual::new(deleted.name.clone(), deleted.name)),
        Some(&admin.0.user_id),
    )
    .await;
    Ok(envelope::done("User deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_updates_only_touch_role_fields() {
        let fields = ProfileFields {
            agency: Some(" Dar Realty ".into()),
            company: Some("Acme".into()),
            ..Default::default()
        };
        let agent = profile_set(Role::Agent, &fields);
        assert_eq!(agent.get_str("agency").unwrap(), "Dar Realty");
        assert!(!agent.contains_key("company"));
        assert!(!agent.contains_key("license_number"));

        assert!(profile_set(Role::Client, &fields).is_empty());
        assert_eq!(
            profile_set(Role::Seller, &fields).get_str("company").unwrap(),
            "Acme"
        );
    }
}
