//! In-process tables backed by `DashMap`.
//!
//! Behaves like a small PostgREST: equality filters, nulls sort last on
//! ascending order, integer `id`s are assigned when a record has none and
//! duplicates are refused.

use std::cmp::Ordering;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde_json::Value;

use super::{Filter, ProviderError, Row, Select, TableClient};

#[derive(Default)]
struct MemTable {
    rows: Vec<Row>,
    next_id: i64,
}

/// Cheap to clone; clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryClient {
    tables: Arc<DashMap<String, MemTable>>,
    offline: Arc<DashSet<String>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rows verbatim (no id assignment beyond bumping the counter).
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut t = self.tables.entry(table.to_string()).or_default();
        for value in rows {
            if let Value::Object(row) = value {
                if let Some(id) = row.get("id").and_then(Value::as_i64) {
                    t.next_id = t.next_id.max(id);
                }
                t.rows.push(row);
            }
        }
    }

    /// Snapshot of a table in storage order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Makes every call touching `table` fail with a transport error until
    /// [`MemoryClient::set_online`] is called.
    pub fn set_offline(&self, table: &str) {
        self.offline.insert(table.to_string());
    }

    pub fn set_online(&self, table: &str) {
        self.offline.remove(table);
    }

    fn reachable(&self, table: &str) -> Result<(), ProviderError> {
        if self.offline.contains(table) {
            Err(ProviderError::Transport(format!("table `{table}` unreachable")))
        } else {
            Ok(())
        }
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(col, want)| scalar_eq(row.get(col).unwrap_or(&Value::Null), want))
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

/// Ascending comparison with nulls (and missing fields) last.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

impl TableClient for MemoryClient {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, ProviderError> {
        self.reachable(&query.table)?;
        let mut rows: Vec<Row> = self
            .tables
            .get(&query.table)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|r| matches(r, &query.filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        if let Some(w) = query.window {
            rows = rows
                .into_iter()
                .skip(w.offset as usize)
                .take(w.limit as usize)
                .collect();
        }
        Ok(rows)
    }

    async fn select_single(&self, table: &str, filter: &Filter) -> Result<Row, ProviderError> {
        self.reachable(table)?;
        let mut found: Vec<Row> = self
            .tables
            .get(table)
            .map(|t| t.rows.iter().filter(|r| matches(r, filter)).cloned().collect())
            .unwrap_or_default();
        match found.len() {
            1 => Ok(found.remove(0)),
            n => Err(ProviderError::NotSingle(format!("{n} rows matched in `{table}`"))),
        }
    }

    async fn insert(&self, table: &str, record: &Row) -> Result<Vec<Row>, ProviderError> {
        self.reachable(table)?;
        let mut t = self.tables.entry(table.to_string()).or_default();
        let mut row = record.clone();

        match row.get("id").cloned() {
            Some(id) if !id.is_null() => {
                if t.rows.iter().any(|r| r.get("id").is_some_and(|v| scalar_eq(v, &id))) {
                    return Err(ProviderError::Rejected(format!(
                        "duplicate key value violates unique constraint \"{table}_pkey\""
                    )));
                }
                if let Some(n) = id.as_i64() {
                    t.next_id = t.next_id.max(n);
                }
            }
            _ => {
                t.next_id += 1;
                row.insert("id".into(), Value::from(t.next_id));
            }
        }

        t.rows.push(row.clone());
        Ok(vec![row])
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: &Row,
    ) -> Result<Vec<Row>, ProviderError> {
        self.reachable(table)?;
        let Some(mut t) = self.tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::new();
        for row in t.rows.iter_mut().filter(|r| matches(r, filter)) {
            for (k, v) in patch {
                row.insert(k.clone(), v.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<(), ProviderError> {
        self.reachable(table)?;
        if let Some(mut t) = self.tables.get_mut(table) {
            t.rows.retain(|r| !matches(r, filter));
        }
        Ok(())
    }
}
