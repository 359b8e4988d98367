//! Direct access to the hosted Postgres instance.
//!
//! Schema-agnostic: rows travel as `jsonb` (`to_jsonb(t)`), equality filters
//! become a containment test (`to_jsonb(t) @> $filter`) and writes go through
//! `jsonb_populate_record` so Postgres does the type coercion.

use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row as _};

use super::{Filter, ProviderError, Row, Select, TableClient, Window};

#[derive(Clone)]
pub struct PgClient {
    pool: PgPool,
}

impl PgClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Double-quotes an identifier. Names are validated upstream; quoting keeps
/// case and reserved words intact.
fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list(row: &Row) -> String {
    row.keys().map(|k| quote(k)).collect::<Vec<_>>().join(", ")
}

fn provider_error(e: sqlx::Error) -> ProviderError {
    match e {
        sqlx::Error::Database(db) => ProviderError::Rejected(db.message().to_string()),
        sqlx::Error::RowNotFound => ProviderError::NotSingle("no rows returned".into()),
        other => ProviderError::Transport(other.to_string()),
    }
}

fn decode(rows: Vec<PgRow>) -> Result<Vec<Row>, ProviderError> {
    rows.iter()
        .map(|r| {
            r.try_get::<Json<Row>, _>("row")
                .map(|Json(row)| row)
                .map_err(|e| ProviderError::Transport(format!("undecodable row: {e}")))
        })
        .collect()
}

fn select_sql<'a>(query: &'a Select, window: Option<Window>) -> QueryBuilder<'a, Postgres> {
    let table = quote(&query.table);
    let mut sql = QueryBuilder::new(format!(
        "SELECT to_jsonb(t) AS row FROM {table} AS t WHERE to_jsonb(t) @> "
    ));
    sql.push_bind(Json(&query.filter));
    if let Some(order) = &query.order {
        let dir = if order.ascending { "ASC" } else { "DESC" };
        sql.push(format!(" ORDER BY t.{} {dir}", quote(&order.column)));
    }
    if let Some(w) = window {
        sql.push(" LIMIT ")
            .push_bind(w.limit as i64)
            .push(" OFFSET ")
            .push_bind(w.offset as i64);
    }
    sql
}

impl TableClient for PgClient {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, ProviderError> {
        let rows = select_sql(query, query.window)
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(provider_error)?;
        decode(rows)
    }

    async fn select_single(&self, table: &str, filter: &Filter) -> Result<Row, ProviderError> {
        let query = Select {
            table: table.to_string(),
            filter: filter.clone(),
            ..Default::default()
        };
        // Two rows are enough to tell "unique" from "ambiguous".
        let window = Some(Window {
            offset: 0,
            limit: 2,
        });
        let rows = select_sql(&query, window)
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(provider_error)?;
        let mut rows = decode(rows)?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(ProviderError::NotSingle(format!("no row matched in `{table}`"))),
            _ => Err(ProviderError::NotSingle(format!(
                "several rows matched in `{table}`"
            ))),
        }
    }

    async fn insert(&self, table: &str, record: &Row) -> Result<Vec<Row>, ProviderError> {
        let table = quote(table);
        let mut sql: QueryBuilder<Postgres> = if record.is_empty() {
            QueryBuilder::new(format!("INSERT INTO {table} DEFAULT VALUES"))
        } else {
            let cols = column_list(record);
            let mut b = QueryBuilder::new(format!(
                "INSERT INTO {table} ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::{table}, "
            ));
            b.push_bind(Json(record)).push(")");
            b
        };
        sql.push(format!(" RETURNING to_jsonb({table}) AS row"));

        let rows = sql
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(provider_error)?;
        decode(rows)
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: &Row,
    ) -> Result<Vec<Row>, ProviderError> {
        if patch.is_empty() {
            return Err(ProviderError::Rejected("empty patch".into()));
        }
        let table = quote(table);
        let cols = column_list(patch);
        let target = if patch.len() == 1 {
            cols.clone()
        } else {
            format!("({cols})")
        };

        let mut sql = QueryBuilder::<Postgres>::new(format!(
            "UPDATE {table} SET {target} = (SELECT {cols} FROM jsonb_populate_record(NULL::{table}, "
        ));
        sql.push_bind(Json(patch))
            .push(format!(")) WHERE to_jsonb({table}) @> "))
            .push_bind(Json(filter))
            .push(format!(" RETURNING to_jsonb({table}) AS row"));

        let rows = sql
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(provider_error)?;
        decode(rows)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<(), ProviderError> {
        let table = quote(table);
        let mut sql =
            QueryBuilder::<Postgres>::new(format!("DELETE FROM {table} WHERE to_jsonb({table}) @> "));
        sql.push_bind(Json(filter));
        sql.build()
            .execute(&self.pool)
            .await
            .map_err(provider_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Order;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote("friends"), "\"friends\"");
        assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn select_sql_orders_and_windows() {
        let query = Select {
            table: "tournaments".into(),
            filter: Filter::new(),
            order: Some(Order {
                column: "start_time".into(),
                ascending: false,
            }),
            window: None,
        };
        let window = Some(Window {
            offset: 10,
            limit: 5,
        });
        let sql = select_sql(&query, window).into_sql();
        assert_eq!(
            sql,
            "SELECT to_jsonb(t) AS row FROM \"tournaments\" AS t WHERE to_jsonb(t) @> $1 \
             ORDER BY t.\"start_time\" DESC LIMIT $2 OFFSET $3"
        );
    }
}
