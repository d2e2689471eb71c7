//! Background refresh of the navbar notification badge.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::api::{ApiClient, ClientError};
use crate::models::notification::NotificationList;

pub const POLL_INTERVAL: Duration = Duration::from_millis(30_000);

#[async_trait]
pub trait NotificationSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<NotificationList, ClientError>;
    async fn mark_all_read(&self) -> Result<(), ClientError>;
    async fn clear_all(&self) -> Result<(), ClientError>;
}

#[async_trait]
impl NotificationSource for ApiClient {
    async fn fetch(&self) -> Result<NotificationList, ClientError> {
        self.notifications().await
    }

    async fn mark_all_read(&self) -> Result<(), ClientError> {
        ApiClient::mark_all_read(self).await
    }

    async fn clear_all(&self) -> Result<(), ClientError> {
        ApiClient::clear_all(self).await
    }
}

/// Fetches notifications once on start and then every [`POLL_INTERVAL`]
/// until stopped or dropped. Failed fetches keep the last known list.
pub struct NotificationPoller<S: NotificationSource> {
    source: Arc<S>,
    state: Arc<watch::Sender<NotificationList>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<S: NotificationSource> NotificationPoller<S> {
    /// Spawns the polling task on the current tokio runtime.
    pub fn start(source: Arc<S>) -> Self {
        let (state, _) = watch::channel(NotificationList::default());
        let state = Arc::new(state);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll(source.clone(), state.clone(), cancel.clone()));
        Self {
            source,
            state,
            cancel,
            task: Some(task),
        }
    }

    pub fn snapshot(&self) -> NotificationList {
        self.state.borrow().clone()
    }

    /// Badge count.
    pub fn unread(&self) -> usize {
        self.state.borrow().unread
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationList> {
        self.state.subscribe()
    }

    /// Marks everything read locally once the server has done so.
    pub async fn mark_all_read(&self) -> Result<(), ClientError> {
        self.source.mark_all_read().await?;
        self.state.send_modify(|list| {
            for n in &mut list.notifications {
                n.read = true;
            }
            list.unread = 0;
        });
        Ok(())
    }

    /// Empties the local list once the server has done so.
    pub async fn clear_all(&self) -> Result<(), ClientError> {
        self.source.clear_all().await?;
        self.state.send_replace(NotificationList::default());
        Ok(())
    }

    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.task.take();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl<S: NotificationSource> Drop for NotificationPoller<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll<S: NotificationSource>(
    source: Arc<S>,
    state: Arc<watch::Sender<NotificationList>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match source.fetch().await {
                    Ok(list) => {
                        state.send_replace(list);
                    }
                    Err(e) => warn!("notification poll failed: {}", e),
                }
            }
        }
    }
    debug!("notification poller stopped");
}
