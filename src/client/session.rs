//! Signed-in state of the admin panel.

use std::sync::{Arc, RwLock};

use crate::models::user::{PublicUser, Role};
use crate::models::Bilingual;

/// A signed-in caller: the bearer token and the account it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.user.roles.contains(&role)
    }

    pub fn can_manage_listings(&self) -> bool {
        self.is_admin() || self.has_role(Role::Agent) || self.has_role(Role::Seller)
    }
}

/// Shared, clonable holder of the current [`Session`]. Every clone sees the
/// same state, so a logout anywhere stops every component sending the token.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, session: Session) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(session);
        }
    }

    pub fn logout(&self) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = None;
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.read().ok().and_then(|s| s.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.token.clone()))
    }

    pub fn is_signed_in(&self) -> bool {
        self.token().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavItem {
    Home,
    Listings,
    MyListings,
    AddListing,
    Dashboard,
    Properties,
    Reviews,
    Transactions,
    Users,
    Cities,
    Amenities,
    PropertyTypes,
}

impl NavItem {
    pub fn path(&self) -> &'static str {
        match self {
            NavItem::Home => "/",
            NavItem::Listings => "/listings",
            NavItem::MyListings => "/my-listings",
            NavItem::AddListing => "/listings/new",
            NavItem::Dashboard => "/admin",
            NavItem::Properties => "/admin/properties",
            NavItem::Reviews => "/admin/reviews",
            NavItem::Transactions => "/admin/transactions",
            NavItem::Users => "/admin/users",
            NavItem::Cities => "/admin/cities",
            NavItem::Amenities => "/admin/amenities",
            NavItem::PropertyTypes => "/admin/property-types",
        }
    }

    pub fn label(&self) -> Bilingual {
        let (en, ar) = match self {
            NavItem::Home => ("Home", "الرئيسية"),
            NavItem::Listings => ("Listings", "العقارات"),
            NavItem::MyListings => ("My listings", "عقاراتي"),
            NavItem::AddListing => ("Add listing", "إضافة عقار"),
            NavItem::Dashboard => ("Dashboard", "لوحة التحكم"),
            NavItem::Properties => ("Properties", "العقارات"),
            NavItem::Reviews => ("Reviews", "التقييمات"),
            NavItem::Transactions => ("Transactions", "المعاملات"),
            NavItem::Users => ("Users", "المستخدمون"),
            NavItem::Cities => ("Cities", "المدن"),
            NavItem::Amenities => ("Amenities", "المرافق"),
            NavItem::PropertyTypes => ("Property types", "أنواع العقارات"),
        };
        Bilingual::new(en, ar)
    }
}

const PUBLIC: &[NavItem] = &[NavItem::Home, NavItem::Listings];
const LISTING_MANAGEMENT: &[NavItem] = &[NavItem::MyListings, NavItem::AddListing];
const ADMIN: &[NavItem] = &[
    NavItem::Dashboard,
    NavItem::Properties,
    NavItem::Reviews,
    NavItem::Transactions,
    NavItem::Users,
    NavItem::Cities,
    NavItem::Amenities,
    NavItem::PropertyTypes,
];

/// Navigation entries the caller may see. Anonymous callers and clients get
/// the public pages only.
pub fn nav_items(session: Option<&Session>) -> Vec<NavItem> {
    let mut items = PUBLIC.to_vec();
    let Some(session) = session else {
        return items;
    };
    if session.can_manage_listings() {
        items.extend_from_slice(LISTING_MANAGEMENT);
    }
    if session.is_admin() {
        items.extend_from_slice(ADMIN);
    }
    items
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::user::RoleProfiles;
    use chrono::Utc;

    pub(crate) fn session(is_admin: bool, roles: Vec<Role>) -> Session {
        Session {
            token: "tok".into(),
            user: PublicUser {
                id: "u1".into(),
                name: "Test".into(),
                email: "t@example.com".into(),
                phone: None,
                is_admin,
                roles,
                profiles: RoleProfiles::default(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    #[test]
    fn navigation_follows_roles() {
        assert_eq!(nav_items(None), vec![NavItem::Home, NavItem::Listings]);

        let client = session(false, vec![Role::Client]);
        assert_eq!(nav_items(Some(&client)), vec![NavItem::Home, NavItem::Listings]);

        let agent = session(false, vec![Role::Agent]);
        let items = nav_items(Some(&agent));
        assert!(items.contains(&NavItem::MyListings));
        assert!(!items.contains(&NavItem::Users));

        let admin = session(true, vec![]);
        let items = nav_items(Some(&admin));
        assert!(items.contains(&NavItem::Dashboard));
        assert!(items.contains(&NavItem::PropertyTypes));
    }

    #[test]
    fn logout_is_seen_by_every_clone() {
        let store = SessionStore::new();
        let shared = store.clone();
        store.sign_in(session(false, vec![Role::Seller]));
        assert_eq!(shared.token().as_deref(), Some("tok"));

        shared.logout();
        assert!(!store.is_signed_in());
        assert_eq!(store.current(), None);
    }
}
