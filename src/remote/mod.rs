//! Table-scoped primitives of the remote store.
//!
//! Everything above this module talks to a [`TableClient`]; which provider
//! actually answers (the hosted REST endpoint, Postgres directly, or the
//! in-process tables) is decided once at start-up through [`Backend`].

pub mod memory;
pub mod postgres;
pub mod rest;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::Value;
use thiserror::Error;

use crate::config::{BackendKind, Settings};
use crate::session::SessionStore;

pub use memory::MemoryClient;
pub use postgres::PgClient;
pub use rest::RestClient;

/// One record: a flat field-name → value mapping.
pub type Row = serde_json::Map<String, Value>;

/// Column → required scalar value, combined by logical AND.
pub type Filter = BTreeMap<String, Value>;

/// Half-open slice `offset..offset + limit` of an ordered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A fully resolved read against one table.
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub table: String,
    pub filter: Filter,
    pub order: Option<Order>,
    pub window: Option<Window>,
}

/// Failure reported by a provider, before the query layer classifies it.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network trouble, 5xx, undecodable payloads.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The provider understood the request and refused it (constraint,
    /// policy, unknown column, ...).
    #[error("rejected by provider: {0}")]
    Rejected(String),

    /// A single-row read matched zero or several rows.
    #[error("expected exactly one row: {0}")]
    NotSingle(String),
}

/// Read/write primitives every provider exposes.
pub trait TableClient: Send + Sync {
    fn select(&self, query: &Select)
        -> impl Future<Output = Result<Vec<Row>, ProviderError>> + Send;

    /// Same filter semantics as [`TableClient::select`] but the match must be
    /// unique.
    fn select_single(
        &self,
        table: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Row, ProviderError>> + Send;

    /// Inserts one record and echoes the stored row(s).
    fn insert(
        &self,
        table: &str,
        record: &Row,
    ) -> impl Future<Output = Result<Vec<Row>, ProviderError>> + Send;

    /// Applies `patch` to every row matching `filter`; echoes updated rows.
    fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: &Row,
    ) -> impl Future<Output = Result<Vec<Row>, ProviderError>> + Send;

    /// Removes every row matching `filter`. Zero matches is success.
    fn delete(
        &self,
        table: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// The provider picked by configuration.
#[derive(Clone)]
pub enum Backend {
    Rest(RestClient),
    Postgres(PgClient),
    Memory(MemoryClient),
}

impl Backend {
    /// Builds the provider named by `settings.backend`.
    pub async fn from_settings(
        settings: &Settings,
        session: Arc<SessionStore>,
    ) -> anyhow::Result<Self> {
        match settings.backend {
            BackendKind::Rest => {
                let Some((url, key)) = settings.supabase() else {
                    bail!("BACKEND=rest needs SUPABASE_URL and SUPABASE_ANON_KEY");
                };
                let http = rest::http_client(Duration::from_secs(settings.http_timeout_secs))
                    .context("building HTTP client")?;
                let client = RestClient::new(http, url, key)
                    .context("parsing SUPABASE_URL")?
                    .with_session(session);
                Ok(Backend::Rest(client))
            }
            BackendKind::Postgres => {
                let Some(url) = &settings.database_url else {
                    bail!("BACKEND=postgres needs DATABASE_URL");
                };
                let client = PgClient::connect(url, settings.db_max_connections)
                    .await
                    .context("connecting to Postgres")?;
                Ok(Backend::Postgres(client))
            }
            BackendKind::Memory => Ok(Backend::Memory(MemoryClient::default())),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Rest(_) => BackendKind::Rest,
            Backend::Postgres(_) => BackendKind::Postgres,
            Backend::Memory(_) => BackendKind::Memory,
        }
    }
}

impl TableClient for Backend {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, ProviderError> {
        match self {
            Backend::Rest(c) => c.select(query).await,
            Backend::Postgres(c) => c.select(query).await,
            Backend::Memory(c) => c.select(query).await,
        }
    }

    async fn select_single(&self, table: &str, filter: &Filter) -> Result<Row, ProviderError> {
        match self {
            Backend::Rest(c) => c.select_single(table, filter).await,
            Backend::Postgres(c) => c.select_single(table, filter).await,
            Backend::Memory(c) => c.select_single(table, filter).await,
        }
    }

    async fn insert(&self, table: &str, record: &Row) -> Result<Vec<Row>, ProviderError> {
        match self {
            Backend::Rest(c) => c.insert(table, record).await,
            Backend::Postgres(c) => c.insert(table, record).await,
            Backend::Memory(c) => c.insert(table, record).await,
        }
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: &Row,
    ) -> Result<Vec<Row>, ProviderError> {
        match self {
            Backend::Rest(c) => c.update(table, filter, patch).await,
            Backend::Postgres(c) => c.update(table, filter, patch).await,
            Backend::Memory(c) => c.update(table, filter, patch).await,
        }
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<(), ProviderError> {
        match self {
            Backend::Rest(c) => c.delete(table, filter).await,
            Backend::Postgres(c) => c.delete(table, filter).await,
            Backend::Memory(c) => c.delete(table, filter).await,
        }
    }
}
