//! Password auth against the hosted provider (`/auth/v1`).
//!
//! Tokens are issued and validated by the provider. This client only relays
//! credentials and hands the resulting token to the [`SessionStore`].

use std::sync::Arc;

use reqwest::{header, Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::session::{SessionError, SessionStore};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password, unconfirmed email, duplicate signup, ...
    #[error("{0}")]
    Rejected(String),

    #[error("auth provider unreachable: {0}")]
    Transport(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    user: AuthUser,
}

/// Signup answers with a session when confirmation is off, with the bare
/// user when a confirmation mail was sent.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpReply {
    WithSession { user: AuthUser },
    UserOnly(AuthUser),
}

impl SignUpReply {
    fn into_user(self) -> AuthUser {
        match self {
            SignUpReply::WithSession { user } => user,
            SignUpReply::UserOnly(user) => user,
        }
    }
}

#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    auth_root: Url,
    api_key: String,
    session: Arc<SessionStore>,
}

fn provider_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

async fn send(req: RequestBuilder) -> Result<Response, AuthError> {
    let resp = req
        .send()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status.is_client_error() {
        Err(AuthError::Rejected(provider_message(&body)))
    } else {
        Err(AuthError::Transport(format!("{status}: {}", provider_message(&body))))
    }
}

impl AuthClient {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: &str,
        session: Arc<SessionStore>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            http,
            auth_root: Url::parse(base_url)?.join("auth/v1/")?,
            api_key: api_key.to_string(),
            session,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.auth_root
            .join(path)
            .map_err(|e| AuthError::Transport(format!("bad auth url: {e}")))
    }

    fn request(&self, url: Url) -> RequestBuilder {
        self.http.post(url).header("apikey", &self.api_key)
    }

    /// Creates the account; the caller writes the matching profile row.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let req = self
            .request(self.endpoint("signup")?)
            .json(&json!({ "email": email, "password": password }));
        let reply: SignUpReply = send(req)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::Transport(format!("undecodable signup reply: {e}")))?;
        let user = reply.into_user();
        log::info!("signed up user {}", user.id);
        Ok(user)
    }

    /// Exchanges credentials for a token and stores it in the session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let req = self
            .request(url)
            .json(&json!({ "email": email, "password": password }));
        let grant: TokenGrant = send(req)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::Transport(format!("undecodable token grant: {e}")))?;

        self.session.store_session(&grant.access_token, Some(grant.user.id))?;
        log::info!("user {} signed in", grant.user.id);
        Ok(grant.user)
    }

    /// Revokes the token remotely when possible; the local token is cleared
    /// regardless.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(token) = self.session.token() {
            let req = self
                .request(self.endpoint("logout")?)
                .header(header::AUTHORIZATION, format!("Bearer {token}"));
            if let Err(e) = send(req).await {
                log::warn!("remote sign-out failed: {e}");
            }
        }
        self.session.logout()?;
        Ok(())
    }

    /// Asks the provider to mail a password-reset link.
    pub async fn recover(&self, email: &str) -> Result<(), AuthError> {
        let req = self
            .request(self.endpoint("recover")?)
            .json(&json!({ "email": email }));
        send(req).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_messages_are_extracted() {
        assert_eq!(
            provider_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(provider_message(r#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(provider_message("plain text"), "plain text");
    }

    #[test]
    fn signup_reply_shapes() {
        let id = Uuid::new_v4();
        let with_session: SignUpReply = serde_json::from_value(json!({
            "access_token": "t",
            "user": { "id": id, "email": "a@b.c" }
        }))
        .unwrap();
        assert_eq!(with_session.into_user().id, id);

        let bare: SignUpReply = serde_json::from_value(json!({ "id": id })).unwrap();
        assert_eq!(bare.into_user().id, id);
    }
}
