//! Client-side notification list, kept in step with the remote table.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{watch, RwLock};

use super::{LoginState, SessionStore};
use crate::models::{Notification, NOTIFICATIONS};
use crate::query::{filter_eq, to_row, FetchAll, QueryLayer, QueryResult, RequestSequencer};
use crate::remote::TableClient;

const REFRESH_SLOT: &str = "notifications";

/// Outcome of a successful [`NotificationStore::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The list was replaced and now holds this many rows.
    Applied(usize),
    /// A newer refresh, a reset or a mark-all-read happened meanwhile; this
    /// response was dropped.
    Superseded,
}

#[derive(Default)]
struct Local {
    items: Vec<Notification>,
    /// Rows added since the latest refresh ticket was issued. A snapshot
    /// fetched under that ticket may predate them.
    added: Vec<Notification>,
}

fn same_row(a: &Notification, b: &Notification) -> bool {
    match (&a.id, &b.id) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

pub struct NotificationStore<C> {
    query: QueryLayer<C>,
    local: RwLock<Local>,
    loaded: AtomicBool,
    sequencer: RequestSequencer,
}

impl<C: TableClient> NotificationStore<C> {
    pub fn new(query: QueryLayer<C>) -> Self {
        Self {
            query,
            local: RwLock::new(Local::default()),
            loaded: AtomicBool::new(false),
            sequencer: RequestSequencer::new(),
        }
    }

    /// Replaces the local list with the remote one, newest first. Rows added
    /// locally while the fetch was in flight are kept on top.
    pub async fn refresh(&self) -> QueryResult<Refresh> {
        let ticket = {
            let mut local = self.local.write().await;
            local.added.clear();
            self.sequencer.issue(REFRESH_SLOT)
        };
        let fetched = self
            .query
            .fetch_all_as::<Notification>(
                &FetchAll::new(NOTIFICATIONS)
                    .order_by("created_at")
                    .descending(),
            )
            .await?;

        let mut local = self.local.write().await;
        let Some(mut fetched) = self.sequencer.accept(&ticket, fetched) else {
            log::debug!("dropping superseded notification refresh #{}", ticket.seq());
            return Ok(Refresh::Superseded);
        };
        let added = std::mem::take(&mut local.added);
        for row in added {
            if !fetched.iter().any(|f| same_row(f, &row)) {
                fetched.insert(0, row);
            }
        }
        let count = fetched.len();
        local.items = fetched;
        self.loaded.store(true, Ordering::Release);
        Ok(Refresh::Applied(count))
    }

    /// Loads once; later calls are no-ops until [`NotificationStore::reset`].
    pub async fn ensure_loaded(&self) -> QueryResult<()> {
        if !self.loaded.load(Ordering::Acquire) {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Like [`NotificationStore::ensure_loaded`] but a failed fetch leaves the
    /// list as it was (empty on first load) and is only logged.
    pub async fn load_or_empty(&self) {
        if let Err(e) = self.ensure_loaded().await {
            log::warn!("notification fetch failed, showing none: {e}");
        }
    }

    /// Inserts remotely, then prepends the echoed row.
    pub async fn add_notification(&self, title: &str, content: &str) -> QueryResult<Notification> {
        let record = to_row(&json!({
            "title": title,
            "content": content,
            "read": false,
            "created_at": Utc::now(),
        }))?;
        let created: Notification = self.query.insert_one_as(NOTIFICATIONS, &record).await?;
        let mut local = self.local.write().await;
        local.items.insert(0, created.clone());
        local.added.push(created.clone());
        Ok(created)
    }

    /// Flips every unread row remotely, then every local row. A refresh still
    /// in flight would bring back the old flags, so it is superseded.
    pub async fn mark_all_as_read(&self) -> QueryResult<()> {
        let patch = to_row(&json!({ "read": true }))?;
        self.query
            .update_matching(NOTIFICATIONS, &filter_eq("read", false), &patch)
            .await?;
        let mut local = self.local.write().await;
        self.sequencer.issue(REFRESH_SLOT);
        local.added.clear();
        for n in local.items.iter_mut() {
            n.read = true;
        }
        Ok(())
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.local.read().await.items.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.local.read().await.items.iter().filter(|n| !n.read).count()
    }

    /// Teardown: forget everything and reload on next use. A refresh still in
    /// flight from before the reset is dropped when it lands.
    pub async fn reset(&self) {
        let mut local = self.local.write().await;
        self.sequencer.issue(REFRESH_SLOT);
        local.items.clear();
        local.added.clear();
        self.loaded.store(false, Ordering::Release);
    }
}

/// Follows login changes: reset on logout, lenient load on login. Returns
/// when the session store is dropped.
pub async fn follow_session<C: TableClient>(
    mut changes: watch::Receiver<LoginState>,
    notifications: Arc<NotificationStore<C>>,
) {
    while changes.changed().await.is_ok() {
        let state = *changes.borrow_and_update();
        match state {
            LoginState::Known(true) => notifications.load_or_empty().await,
            LoginState::Known(false) => notifications.reset().await,
            LoginState::Unknown => {}
        }
    }
}

impl SessionStore {
    /// Convenience for [`follow_session`] on this store's change feed.
    pub fn follow<C: TableClient>(
        &self,
        notifications: Arc<NotificationStore<C>>,
    ) -> impl std::future::Future<Output = ()> {
        follow_session(self.subscribe(), notifications)
    }
}
