//! The admin panel's side of the API: typed requests, page state, the
//! notification poller and dashboard assembly. Rendering is left to the UI.

pub mod api;
pub mod dashboard;
pub mod filters;
pub mod page;
pub mod poller;
pub mod session;

pub use api::{ApiClient, ClientError, PropertyDraft, Resource};
pub use dashboard::DashboardView;
pub use page::{ListPage, Modal, Overlay, PageState};
pub use poller::NotificationPoller;
pub use session::{nav_items, NavItem, Session, SessionStore};
