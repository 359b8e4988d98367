//! PostgREST client for the hosted backend (`/rest/v1/{table}`).

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use url::Url;

use super::{Filter, ProviderError, Row, Select, TableClient};
use crate::session::SessionStore;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_ROWS: &str = "return=representation";

/// Shared `reqwest` client with the configured timeout.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

#[derive(Clone)]
pub struct RestClient {
    http: Client,
    rest_root: Url,
    api_key: String,
    session: Option<Arc<SessionStore>>,
}

impl RestClient {
    pub fn new(http: Client, base_url: &str, api_key: &str) -> Result<Self, url::ParseError> {
        let rest_root = Url::parse(base_url)?.join("rest/v1/")?;
        Ok(Self {
            http,
            rest_root,
            api_key: api_key.to_string(),
            session: None,
        })
    }

    /// Authorise requests with the logged-in user's token instead of the
    /// anonymous key, so row-level policies apply.
    pub fn with_session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    fn table_url(&self, table: &str) -> Result<Url, ProviderError> {
        self.rest_root
            .join(table)
            .map_err(|e| ProviderError::Transport(format!("bad table url: {e}")))
    }

    fn authorised(&self, req: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .session
            .as_ref()
            .and_then(|s| s.token())
            .unwrap_or_else(|| self.api_key.clone());
        req.header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {bearer}"))
    }
}

/// Renders a scalar the way PostgREST expects after `eq.`.
fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `col=eq.value` pairs; `null` becomes `col=is.null`.
pub(crate) fn filter_params(filter: &Filter) -> Vec<(String, String)> {
    filter
        .iter()
        .map(|(col, value)| match value {
            Value::Null => (col.clone(), "is.null".to_string()),
            v => (col.clone(), format!("eq.{}", render_scalar(v))),
        })
        .collect()
}

pub(crate) fn select_params(query: &Select) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filter));
    if let Some(order) = &query.order {
        let dir = if order.ascending { "asc" } else { "desc" };
        params.push(("order".into(), format!("{}.{dir}", order.column)));
    }
    if let Some(w) = query.window {
        params.push(("offset".into(), w.offset.to_string()));
        params.push(("limit".into(), w.limit.to_string()));
    }
    params
}

/// Pulls PostgREST's `message` (plus `details`) out of an error body.
fn diagnostic(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => {
            let message = v.get("message").and_then(Value::as_str).unwrap_or(body);
            match v.get("details").and_then(Value::as_str) {
                Some(details) => format!("{status}: {message} ({details})"),
                None => format!("{status}: {message}"),
            }
        }
        Err(_) => format!("{status}: {body}"),
    }
}

async fn classify(resp: Response) -> Result<Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let msg = diagnostic(status, &body);
    Err(match status {
        StatusCode::NOT_ACCEPTABLE => ProviderError::NotSingle(msg),
        s if s.is_client_error() => ProviderError::Rejected(msg),
        _ => ProviderError::Transport(msg),
    })
}

async fn send(req: RequestBuilder) -> Result<Response, ProviderError> {
    let resp = req
        .send()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;
    classify(resp).await
}

async fn rows(resp: Response) -> Result<Vec<Row>, ProviderError> {
    resp.json::<Vec<Row>>()
        .await
        .map_err(|e| ProviderError::Transport(format!("undecodable rows: {e}")))
}

impl TableClient for RestClient {
    async fn select(&self, query: &Select) -> Result<Vec<Row>, ProviderError> {
        let url = self.table_url(&query.table)?;
        let req = self.authorised(self.http.get(url).query(&select_params(query)));
        rows(send(req).await?).await
    }

    async fn select_single(&self, table: &str, filter: &Filter) -> Result<Row, ProviderError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(filter));
        let req = self.authorised(
            self.http
                .get(self.table_url(table)?)
                .query(&params)
                .header(header::ACCEPT, SINGLE_OBJECT),
        );
        send(req)
            .await?
            .json::<Row>()
            .await
            .map_err(|e| ProviderError::Transport(format!("undecodable row: {e}")))
    }

    async fn insert(&self, table: &str, record: &Row) -> Result<Vec<Row>, ProviderError> {
        let req = self.authorised(
            self.http
                .post(self.table_url(table)?)
                .header("Prefer", RETURN_ROWS)
                .json(record),
        );
        rows(send(req).await?).await
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: &Row,
    ) -> Result<Vec<Row>, ProviderError> {
        let req = self.authorised(
            self.http
                .patch(self.table_url(table)?)
                .query(&filter_params(filter))
                .header("Prefer", RETURN_ROWS)
                .json(patch),
        );
        rows(send(req).await?).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<(), ProviderError> {
        let req = self.authorised(
            self.http
                .delete(self.table_url(table)?)
                .query(&filter_params(filter)),
        );
        send(req).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Order, Window};
    use serde_json::json;

    #[test]
    fn filters_render_as_equality_operators() {
        let mut filter = Filter::new();
        filter.insert("status".into(), json!("pending"));
        filter.insert("team_size".into(), json!(4));
        filter.insert("paid".into(), json!(true));
        filter.insert("deleted_at".into(), Value::Null);

        let params = filter_params(&filter);
        assert_eq!(
            params,
            vec![
                ("deleted_at".to_string(), "is.null".to_string()),
                ("paid".to_string(), "eq.true".to_string()),
                ("status".to_string(), "eq.pending".to_string()),
                ("team_size".to_string(), "eq.4".to_string()),
            ]
        );
    }

    #[test]
    fn select_carries_order_and_window() {
        let query = Select {
            table: "messages".into(),
            filter: Filter::new(),
            order: Some(Order {
                column: "timestamp".into(),
                ascending: false,
            }),
            window: Some(Window {
                offset: 20,
                limit: 100,
            }),
        };
        let params = select_params(&query);
        assert!(params.contains(&("order".into(), "timestamp.desc".into())));
        assert!(params.contains(&("offset".into(), "20".into())));
        assert!(params.contains(&("limit".into(), "100".into())));
    }

    #[test]
    fn rest_root_is_under_rest_v1() {
        let client = RestClient::new(Client::new(), "https://abc.supabase.co", "anon").unwrap();
        assert_eq!(
            client.table_url("friends").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/friends"
        );
    }

    #[test]
    fn postgrest_error_body_is_summarised() {
        let body = r#"{"code":"23505","message":"duplicate key","details":"Key (id)=(1) exists."}"#;
        let msg = diagnostic(StatusCode::CONFLICT, body);
        assert!(msg.contains("duplicate key"));
        assert!(msg.contains("Key (id)=(1) exists."));
    }
}
