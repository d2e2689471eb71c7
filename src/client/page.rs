//! State machine behind every admin list/CRUD page.

use async_trait::async_trait;
use log::warn;

use super::api::{ApiClient, ClientError, Resource};
use crate::models::catalog::{Amenity, City, PropertyType};
use crate::models::property::{Property, PropertyView};
use crate::models::review::{Review, ReviewView};
use crate::models::transaction::{Transaction, TransactionView};
use crate::models::user::PublicUser;
use crate::models::Lang;

pub trait Identified {
    fn id(&self) -> &str;
}

macro_rules! identified {
    ($($ty:ty),+ $(,)?) => {
        $(impl Identified for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })+
    };
}

identified!(
    Review,
    ReviewView,
    City,
    Amenity,
    PropertyType,
    Property,
    PropertyView,
    Transaction,
    TransactionView,
    PublicUser,
);

/// Where a page gets its rows from and sends deletes to.
#[async_trait]
pub trait ListSource<T: Send + 'static>: Send + Sync {
    async fn list(&self, lang: Lang) -> Result<Vec<T>, ClientError>;
    async fn delete(&self, id: &str) -> Result<(), ClientError>;
}

/// One REST collection seen through an [`ApiClient`].
pub struct ResourceSource<'a> {
    pub api: &'a ApiClient,
    pub resource: Resource,
}

#[async_trait]
impl<'a, T> ListSource<T> for ResourceSource<'a>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    async fn list(&self, lang: Lang) -> Result<Vec<T>, ClientError> {
        self.api.list(self.resource, lang).await
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.api.delete(self.resource, id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Add,
    Edit(String),
    View(String),
    ConfirmDelete(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    Idle,
    Modal(Modal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageState<T> {
    Loading,
    Loaded { items: Vec<T>, overlay: Overlay },
    Failed(String),
}

#[derive(Debug)]
pub struct ListPage<T> {
    lang: Lang,
    state: PageState<T>,
}

impl<T: Identified + Send + 'static> ListPage<T> {
    /// A page waiting for its first fetch.
    pub fn new(lang: Lang) -> Self {
        Self {
            lang,
            state: PageState::Loading,
        }
    }

    /// Builds the page and performs the initial fetch.
    pub async fn open_with<S: ListSource<T>>(source: &S, lang: Lang) -> Self {
        let mut page = Self::new(lang);
        page.refresh(source).await;
        page
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    pub fn state(&self) -> &PageState<T> {
        &self.state
    }

    pub fn items(&self) -> &[T] {
        match &self.state {
            PageState::Loaded { items, .. } => items,
            _ => &[],
        }
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        match &self.state {
            PageState::Loaded { overlay, .. } => Some(overlay),
            _ => None,
        }
    }

    /// Switches language. Rows carry server-side ordering for the language,
    /// so a change drops them and the page loads again.
    pub fn set_lang(&mut self, lang: Lang) -> bool {
        if lang == self.lang {
            return false;
        }
        self.lang = lang;
        self.state = PageState::Loading;
        true
    }

    /// The retry button: back to `Loading` from any state.
    pub fn reload(&mut self) {
        self.state = PageState::Loading;
    }

    /// Applies a fetch result. Ignored unless the page is loading.
    pub fn finish_load(&mut self, result: Result<Vec<T>, String>) {
        if !matches!(self.state, PageState::Loading) {
            return;
        }
        self.state = match result {
            Ok(items) => PageState::Loaded {
                items,
                overlay: Overlay::Idle,
            },
            Err(message) => PageState::Failed(message),
        };
    }

    /// Fetches with the current language if the page is loading.
    pub async fn refresh<S: ListSource<T>>(&mut self, source: &S) {
        if !matches!(self.state, PageState::Loading) {
            return;
        }
        let result = source.list(self.lang).await.map_err(|e| {
            warn!("list fetch failed: {}", e);
            e.to_string()
        });
        self.finish_load(result);
    }

    /// Opens a modal over a loaded page. Returns whether it opened.
    pub fn open(&mut self, modal: Modal) -> bool {
        match &mut self.state {
            PageState::Loaded { overlay, .. } => {
                *overlay = Overlay::Modal(modal);
                true
            }
            _ => false,
        }
    }

    pub fn close(&mut self) {
        if let PageState::Loaded { overlay, .. } = &mut self.state {
            *overlay = Overlay::Idle;
        }
    }

    fn pending_delete(&self) -> Option<String> {
        match self.overlay() {
            Some(Overlay::Modal(Modal::ConfirmDelete(id))) => Some(id.clone()),
            _ => None,
        }
    }

    /// Issues the delete the confirmation dialog is showing, if any.
    /// Returns the deleted id; the row is dropped only once the server agrees.
    pub async fn confirm_delete<S: ListSource<T>>(
        &mut self,
        source: &S,
    ) -> Result<Option<String>, ClientError> {
        let Some(id) = self.pending_delete() else {
            return Ok(None);
        };
        source.delete(&id).await?;
        self.remove(&id);
        self.close();
        Ok(Some(id))
    }

    /// Replaces the row with the same id or puts it first, then closes the form.
    pub fn upsert(&mut self, item: T) {
        if let PageState::Loaded { items, overlay } = &mut self.state {
            match items.iter_mut().find(|i| i.id() == item.id()) {
                Some(slot) => *slot = item,
                None => items.insert(0, item),
            }
            *overlay = Overlay::Idle;
        }
    }

    pub fn remove(&mut self, id: &str) {
        if let PageState::Loaded { items, .. } = &mut self.state {
            items.retain(|i| i.id() != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: String,
        label: String,
    }

    impl Identified for Row {
        fn id(&self) -> &str {
            &self.id
        }
    }

    #[derive(Default)]
    struct FakeSource {
        fail_list: bool,
        listed: Mutex<Vec<Lang>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ListSource<Row> for FakeSource {
        async fn list(&self, lang: Lang) -> Result<Vec<Row>, ClientError> {
            self.listed.lock().unwrap().push(lang);
            if self.fail_list {
                return Err(ClientError::Api {
                    status: 500,
                    message: "Server error".into(),
                });
            }
            Ok(vec![
                Row { id: "1".into(), label: format!("one-{}", lang.as_str()) },
                Row { id: "2".into(), label: format!("two-{}", lang.as_str()) },
            ])
        }

        async fn delete(&self, id: &str) -> Result<(), ClientError> {
            self.deleted.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn loads_on_open_and_refetches_on_language_change() {
        let source = FakeSource::default();
        let mut page = ListPage::<Row>::open_with(&source, Lang::En).await;
        assert_eq!(page.items()[0].label, "one-en");
        assert_eq!(page.overlay(), Some(&Overlay::Idle));

        assert!(page.set_lang(Lang::Ar));
        assert_eq!(page.state(), &PageState::Loading);
        page.refresh(&source).await;
        assert_eq!(page.items()[0].label, "one-ar");
        assert_eq!(*source.listed.lock().unwrap(), vec![Lang::En, Lang::Ar]);

        // same language, nothing to do
        assert!(!page.set_lang(Lang::Ar));
        page.refresh(&source).await;
        assert_eq!(source.listed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_can_be_retried() {
        let failing = FakeSource {
            fail_list: true,
            ..Default::default()
        };
        let mut page = ListPage::<Row>::open_with(&failing, Lang::En).await;
        assert_eq!(page.state(), &PageState::Failed("Server error".into()));
        assert!(!page.open(Modal::Add));

        page.reload();
        page.refresh(&FakeSource::default()).await;
        assert_eq!(page.items().len(), 2);
    }

    #[tokio::test]
    async fn delete_only_from_confirmation() {
        let source = FakeSource::default();
        let mut page = ListPage::<Row>::open_with(&source, Lang::En).await;

        assert!(page.open(Modal::Edit("1".into())));
        assert_eq!(page.confirm_delete(&source).await.unwrap(), None);
        assert!(source.deleted.lock().unwrap().is_empty());

        page.open(Modal::ConfirmDelete("1".into()));
        assert_eq!(page.confirm_delete(&source).await.unwrap(), Some("1".into()));
        assert_eq!(*source.deleted.lock().unwrap(), vec!["1".to_string()]);
        assert_eq!(page.items().len(), 1);
        assert_eq!(page.overlay(), Some(&Overlay::Idle));

        // dialog already closed
        assert_eq!(page.confirm_delete(&source).await.unwrap(), None);
        assert_eq!(source.deleted.lock().unwrap().len(), 1);
    }

    #[test]
    fn upsert_replaces_or_prepends() {
        let mut page = ListPage::<Row>::new(Lang::En);
        page.finish_load(Ok(vec![Row { id: "1".into(), label: "a".into() }]));
        page.open(Modal::Add);
        page.upsert(Row { id: "2".into(), label: "b".into() });
        page.upsert(Row { id: "1".into(), label: "a2".into() });
        let labels: Vec<&str> = page.items().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a2"]);
        assert_eq!(page.overlay(), Some(&Overlay::Idle));
    }
}
