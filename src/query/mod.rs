//! Generic record query/mutation layer.
//!
//! One parameterised shape for every table: equality filters ANDed together,
//! an optional sort key, an optional window, and the four write primitives.
//! Provider failures are classified into [`QueryError`] and never swallowed.

pub mod error;
pub mod sequence;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::remote::{Filter, Order, ProviderError, Row, Select, TableClient, Window};

pub use error::{QueryError, QueryResult};
pub use sequence::{RequestSequencer, Ticket};

/// Page size used when an offset is given without a limit.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Declarative read: table + filter/sort/window options.
#[derive(Debug, Clone)]
pub struct FetchAll {
    pub table: String,
    pub filter: Filter,
    pub order_by: Option<String>,
    pub ascending: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl FetchAll {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Filter::new(),
            order_by: None,
            ascending: true,
            limit: None,
            offset: None,
        }
    }

    /// Adds `column = value` to the conjunction.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(column.into(), value.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter.extend(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    pub fn descending(self) -> Self {
        self.ascending(false)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Resolves `limit`/`offset` into the slice actually requested.
    ///
    /// An offset alone selects a fixed page of [`DEFAULT_PAGE_SIZE`] rows.
    pub fn window(&self) -> Option<Window> {
        match (self.offset, self.limit) {
            (None, None) => None,
            (None, Some(limit)) => Some(Window { offset: 0, limit }),
            (Some(offset), Some(limit)) => Some(Window { offset, limit }),
            (Some(offset), None) => Some(Window {
                offset,
                limit: DEFAULT_PAGE_SIZE,
            }),
        }
    }

    fn to_select(&self) -> Select {
        Select {
            table: self.table.clone(),
            filter: self.filter.clone(),
            order: self.order_by.as_ref().map(|column| Order {
                column: column.clone(),
                ascending: self.ascending,
            }),
            window: self.window(),
        }
    }
}

/// Builds a one-column filter, mostly for `id` lookups.
pub fn filter_eq(column: impl Into<String>, value: impl Into<Value>) -> Filter {
    let mut filter = Filter::new();
    filter.insert(column.into(), value.into());
    filter
}

/// Serialises a struct or `json!` object into a [`Row`].
pub fn to_row<T: Serialize + ?Sized>(value: &T) -> QueryResult<Row> {
    match serde_json::to_value(value) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(QueryError::InvalidInput(format!(
            "record must be an object, got {other}"
        ))),
        Err(e) => Err(QueryError::InvalidInput(e.to_string())),
    }
}

pub fn decode<T: DeserializeOwned>(table: &str, row: Row) -> QueryResult<T> {
    serde_json::from_value(Value::Object(row)).map_err(|e| QueryError::Decode {
        table: table.to_string(),
        detail: e.to_string(),
    })
}

pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Row>) -> QueryResult<Vec<T>> {
    rows.into_iter().map(|row| decode(table, row)).collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_ident(kind: &str, name: &str) -> QueryResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(QueryError::InvalidInput(format!("{kind} name `{name}`")))
    }
}

fn check_filter(filter: &Filter) -> QueryResult<()> {
    for (column, value) in filter {
        check_ident("column", column)?;
        if value.is_array() || value.is_object() {
            return Err(QueryError::InvalidInput(format!(
                "filter on `{column}` must be a scalar"
            )));
        }
    }
    Ok(())
}

fn check_columns(row: &Row) -> QueryResult<()> {
    row.keys().try_for_each(|k| check_ident("column", k))
}

fn check_id(id: &Value) -> QueryResult<()> {
    if id.is_null() || id.is_array() || id.is_object() {
        Err(QueryError::InvalidInput(format!("id must be a scalar, got {id}")))
    } else {
        Ok(())
    }
}

fn read_error(table: &str, err: ProviderError) -> QueryError {
    match err {
        ProviderError::NotSingle(detail) => QueryError::NotFoundOrAmbiguous {
            table: table.to_string(),
            detail,
        },
        other => QueryError::RemoteQuery {
            table: table.to_string(),
            detail: other.to_string(),
        },
    }
}

fn write_error(table: &str, err: ProviderError) -> QueryError {
    QueryError::WriteRejected {
        table: table.to_string(),
        detail: err.to_string(),
    }
}

/// The query layer over one provider. Cloning shares the provider.
pub struct QueryLayer<C> {
    client: Arc<C>,
}

impl<C> Clone for QueryLayer<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: TableClient> QueryLayer<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Rows matching every filter pair, sorted and windowed as requested.
    /// No match is an empty vector, not an error.
    pub async fn fetch_all(&self, query: &FetchAll) -> QueryResult<Vec<Row>> {
        check_ident("table", &query.table)?;
        check_filter(&query.filter)?;
        if let Some(column) = &query.order_by {
            check_ident("column", column)?;
        }

        log::debug!(
            "fetch_all {} filter={:?} order={:?} window={:?}",
            query.table,
            query.filter,
            query.order_by,
            query.window()
        );
        self.client
            .select(&query.to_select())
            .await
            .map_err(|e| read_error(&query.table, e))
    }

    pub async fn fetch_all_as<T: DeserializeOwned>(&self, query: &FetchAll) -> QueryResult<Vec<T>> {
        let rows = self.fetch_all(query).await?;
        decode_rows(&query.table, rows)
    }

    /// The unique row whose `id` equals `id`.
    pub async fn fetch_by_id(&self, table: &str, id: impl Into<Value>) -> QueryResult<Row> {
        let id = id.into();
        check_ident("table", table)?;
        check_id(&id)?;
        self.client
            .select_single(table, &filter_eq("id", id))
            .await
            .map_err(|e| read_error(table, e))
    }

    pub async fn fetch_by_id_as<T: DeserializeOwned>(
        &self,
        table: &str,
        id: impl Into<Value>,
    ) -> QueryResult<T> {
        let row = self.fetch_by_id(table, id).await?;
        decode(table, row)
    }

    /// Inserts `record`; returns the provider's echo.
    pub async fn insert_record(&self, table: &str, record: &Row) -> QueryResult<Vec<Row>> {
        check_ident("table", table)?;
        check_columns(record)?;
        log::debug!("insert into {table}");
        self.client
            .insert(table, record)
            .await
            .map_err(|e| write_error(table, e))
    }

    /// Inserts and decodes the first echoed row.
    pub async fn insert_one_as<T: DeserializeOwned>(&self, table: &str, record: &Row) -> QueryResult<T> {
        let row = self
            .insert_record(table, record)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::WriteRejected {
                table: table.to_string(),
                detail: "insert echoed no row".into(),
            })?;
        decode(table, row)
    }

    /// Applies `patch` to the row with `id`. A missing row is a rejection.
    pub async fn update_record(
        &self,
        table: &str,
        id: impl Into<Value>,
        patch: &Row,
    ) -> QueryResult<Vec<Row>> {
        let id = id.into();
        check_ident("table", table)?;
        check_id(&id)?;
        check_columns(patch)?;
        if patch.is_empty() {
            return Err(QueryError::InvalidInput("empty patch".into()));
        }

        let updated = self
            .client
            .update(table, &filter_eq("id", id.clone()), patch)
            .await
            .map_err(|e| write_error(table, e))?;
        if updated.is_empty() {
            return Err(QueryError::WriteRejected {
                table: table.to_string(),
                detail: format!("no row with id {id}"),
            });
        }
        Ok(updated)
    }

    /// Removes the row with `id`; removing an absent id succeeds.
    pub async fn delete_record(&self, table: &str, id: impl Into<Value>) -> QueryResult<()> {
        let id = id.into();
        check_ident("table", table)?;
        check_id(&id)?;
        self.client
            .delete(table, &filter_eq("id", id))
            .await
            .map_err(|e| write_error(table, e))
    }

    /// Bulk update of every row matching `filter`. Zero matches is fine.
    pub async fn update_matching(
        &self,
        table: &str,
        filter: &Filter,
        patch: &Row,
    ) -> QueryResult<Vec<Row>> {
        check_ident("table", table)?;
        check_filter(filter)?;
        check_columns(patch)?;
        if patch.is_empty() {
            return Err(QueryError::InvalidInput("empty patch".into()));
        }
        self.client
            .update(table, filter, patch)
            .await
            .map_err(|e| write_error(table, e))
    }

    /// Bulk delete. An empty filter would wipe the table and is refused.
    pub async fn delete_matching(&self, table: &str, filter: &Filter) -> QueryResult<()> {
        check_ident("table", table)?;
        check_filter(filter)?;
        if filter.is_empty() {
            return Err(QueryError::InvalidInput(
                "bulk delete needs at least one filter".into(),
            ));
        }
        self.client
            .delete(table, filter)
            .await
            .map_err(|e| write_error(table, e))
    }
}
