//! Everything a request handler needs, built once in `main`.

use std::sync::Arc;

use crate::auth::AuthClient;
use crate::query::QueryLayer;
use crate::remote::{Backend, TableClient};
use crate::session::{NotificationStore, SessionStore};

pub struct AppState<C = Backend> {
    pub query: QueryLayer<C>,
    pub session: Arc<SessionStore>,
    pub notifications: Arc<NotificationStore<C>>,
    /// `None` when no hosted auth provider is configured.
    pub auth: Option<AuthClient>,
}

impl<C: TableClient> AppState<C> {
    pub fn new(client: C, session: Arc<SessionStore>, auth: Option<AuthClient>) -> Self {
        let query = QueryLayer::new(client);
        let notifications = Arc::new(NotificationStore::new(query.clone()));
        Self {
            query,
            session,
            notifications,
            auth,
        }
    }
}
