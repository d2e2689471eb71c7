use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{string_enum, Validation};
use crate::db;
use crate::error::{ApiError, ApiResult};

pub const MIN_PASSWORD_LEN: usize = 6;

string_enum!(
    /// Marketplace roles besides `isAdmin`. Each one owns a profile document.
    Role {
        Agent => "agent",
        Seller => "seller",
        Client => "client",
    }
);

impl Role {
    pub fn profile_collection(&self) -> &'static str {
        match self {
            Role::Agent => db::AGENTS,
            Role::Seller => db::SELLERS,
            Role::Client => db::CLIENTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// The slice of a user embedded into populated listings, reviews and deals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Role-specific details. Each role collection stores the fields relevant to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_city: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFields {
    pub agency: Option<String>,
    pub license_number: Option<String>,
    pub company: Option<String>,
    pub preferred_city: Option<String>,
}

impl Profile {
    pub fn new(id: String, user_id: &str, role: Role, fields: &ProfileFields) -> Self {
        let mut profile = Profile {
            id,
            user_id: user_id.to_string(),
            ..Default::default()
        };
        match role {
            Role::Agent => {
                profile.agency = fields.agency.clone();
                profile.license_number = fields.license_number.clone();
            }
            Role::Seller => profile.company = fields.company.clone(),
            Role::Client => profile.preferred_city = fields.preferred_city.clone(),
        }
        profile
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoleProfiles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Profile>,
}

impl RoleProfiles {
    pub fn set(&mut self, role: Role, profile: Option<Profile>) {
        match role {
            Role::Agent => self.agent = profile,
            Role::Seller => self.seller = profile,
            Role::Client => self.client = profile,
        }
    }
}

/// A user as sent over the wire: never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub profiles: RoleProfiles,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            phone: u.phone,
            is_admin: u.is_admin,
            roles: u.roles,
            profiles: RoleProfiles::default(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleChanges {
    pub added: Vec<Role>,
    pub removed: Vec<Role>,
}

/// Profiles to create and delete when a user's roles go from `old` to `new`.
pub fn role_changes(old: &[Role], new: &[Role]) -> RoleChanges {
    RoleChanges {
        added: new.iter().filter(|r| !old.contains(r)).copied().collect(),
        removed: old.iter().filter(|r| !new.contains(r)).copied().collect(),
    }
}

/// Parses role names, dropping duplicates but keeping order.
pub fn parse_roles(v: &mut Validation, raw: &[String]) -> Vec<Role> {
    let mut roles = Vec::new();
    for name in raw {
        if let Some(role) = v.parse_enum::<Role>("roles", name.trim()) {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
    }
    roles
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(v: &mut Validation, email: Option<&str>) -> Option<String> {
    let email = v.required_text("email", email)?;
    let email = normalize_email(&email);
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Some(email),
        _ => {
            v.invalid("email", "Path `email` is invalid.");
            None
        }
    }
}

fn check_password(v: &mut Validation, password: Option<&str>) -> Option<String> {
    let password = v.required("password", password)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        v.invalid(
            "password",
            &format!(
                "Path `password` is shorter than the minimum allowed length ({}).",
                MIN_PASSWORD_LEN
            ),
        );
        return None;
    }
    Some(password.to_string())
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Fields for a new account, from self sign-up or the admin Users page.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub profile: ProfileFields,
}

/// A validated account, password still in clear text.
#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub is_admin: bool,
    pub roles: Vec<Role>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> ApiResult<NewUser> {
        let mut v = Validation::new("User");
        let name = v.required_text("name", self.name.as_deref());
        let email = check_email(&mut v, self.email.as_deref());
        let password = check_password(&mut v, self.password.as_deref());
        let roles = parse_roles(&mut v, &self.roles);
        v.finish()?;

        match (name, email, password) {
            (Some(name), Some(email), Some(password)) => Ok(NewUser {
                name,
                email,
                password,
                phone: clean(self.phone.clone()),
                is_admin: self.is_admin,
                roles: if roles.is_empty() && !self.is_admin {
                    vec![Role::Client]
                } else {
                    roles
                },
            }),
            _ => Err(ApiError::Internal("user fields missing after validation".into())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "isAdmin")]
    pub is_admin: Option<bool>,
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub profile: ProfileFields,
}

#[derive(Debug, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub is_admin: Option<bool>,
    pub roles: Option<Vec<Role>>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> ApiResult<UserChanges> {
        let mut v = Validation::new("User");
        let mut changes = UserChanges {
            phone: clean(self.phone.clone()),
            is_admin: self.is_admin,
            ..Default::default()
        };
        if let Some(name) = self.name.as_deref() {
            changes.name = v.required_text("name", Some(name));
        }
        if let Some(email) = self.email.as_deref() {
            changes.email = check_email(&mut v, Some(email));
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            changes.password = check_password(&mut v, Some(password));
        }
        if let Some(raw) = &self.roles {
            changes.roles = Some(parse_roles(&mut v, raw));
        }
        v.finish()?;
        Ok(changes)
    }

    /// Whether the request touches fields only an admin may change.
    pub fn is_privileged(&self) -> bool {
        self.is_admin.is_some() || self.roles.is_some()
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_changes_lists_exact_difference() {
        let changes = role_changes(&[Role::Client, Role::Seller], &[Role::Seller, Role::Agent]);
        assert_eq!(changes.added, vec![Role::Agent]);
        assert_eq!(changes.removed, vec![Role::Client]);

        assert_eq!(role_changes(&[Role::Agent], &[Role::Agent]), RoleChanges::default());
    }

    #[test]
    fn sign_up_defaults_to_client_role() {
        let req = CreateUserRequest {
            name: Some("Sara".into()),
            email: Some("  Sara@Example.COM ".into()),
            password: Some("secret1".into()),
            ..Default::default()
        };
        let user = req.validate().unwrap();
        assert_eq!(user.email, "sara@example.com");
        assert_eq!(user.roles, vec![Role::Client]);
    }

    #[test]
    fn unknown_roles_and_short_passwords_fail() {
        let req = CreateUserRequest {
            name: Some("Omar".into()),
            email: Some("omar@example.com".into()),
            password: Some("123".into()),
            roles: vec!["landlord".into()],
            ..Default::default()
        };
        let msg = req.validate().unwrap_err().to_string();
        assert!(msg.contains("shorter than the minimum allowed length (6)"), "{}", msg);
        assert!(msg.contains("`landlord` is not a valid enum value for path `roles`."));
    }

    #[test]
    fn duplicate_roles_collapse() {
        let mut v = Validation::new("User");
        let roles = parse_roles(&mut v, &["agent".into(), "agent".into(), "seller".into()]);
        assert_eq!(roles, vec![Role::Agent, Role::Seller]);
    }

    #[test]
    fn profile_keeps_only_role_fields() {
        let fields = ProfileFields {
            agency: Some("Dar".into()),
            company: Some("Acme".into()),
            ..Default::default()
        };
        let agent = Profile::new("p".into(), "u", Role::Agent, &fields);
        assert_eq!(agent.agency.as_deref(), Some("Dar"));
        assert_eq!(agent.company, None);
    }

    #[test]
    fn password_never_serialized_for_public_user() {
        let user = User {
            id: "u".into(),
            name: "N".into(),
            email: "n@example.com".into(),
            phone: None,
            password: "$2b$hash".into(),
            is_admin: false,
            roles: vec![Role::Client],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["roles"], serde_json::json!(["client"]));
    }
}
