//! Runtime configuration for the Clutch Vault server.

use once_cell::sync::Lazy;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Which provider answers table calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Hosted PostgREST endpoint (`SUPABASE_URL`).
    Rest,
    /// Postgres directly (`DATABASE_URL`).
    Postgres,
    /// In-process tables; nothing survives a restart.
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" | "supabase" => Ok(BackendKind::Rest),
            "postgres" | "pg" => Ok(BackendKind::Postgres),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("unknown backend `{other}`")),
        }
    }
}

#[derive(Debug)]
pub struct Settings {
    pub backend: BackendKind,
    /// Project URL of the hosted backend; also used for auth.
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Where the session token is persisted between runs.
    pub session_file: PathBuf,
    /// The server acts for the one session persisted in `session_file`, so it
    /// is meant to listen on loopback only.
    pub server_addr: String,
    /// Per-request timeout of the outbound HTTP client (seconds).
    pub http_timeout_secs: u64,
}

impl Settings {
    fn from_env() -> Self {
        let backend = match env::var("BACKEND") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                log::warn!("{e}; falling back to rest");
                BackendKind::Rest
            }),
            Err(_) => BackendKind::Rest,
        };

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);

        let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let session_file = env::var("SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".clutch-vault/session.json"));

        Settings {
            backend,
            supabase_url: env::var("SUPABASE_URL").ok(),
            supabase_anon_key: env::var("SUPABASE_ANON_KEY").ok(),
            database_url: env::var("DATABASE_URL").ok(),
            db_max_connections,
            session_file,
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into()),
            http_timeout_secs,
        }
    }

    /// Both halves of the hosted-backend credentials, if configured.
    pub fn supabase(&self) -> Option<(&str, &str)> {
        match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(url), Some(key)) => Some((url, key)),
            _ => None,
        }
    }

    pub fn binds_loopback(&self) -> bool {
        is_loopback(&self.server_addr)
    }
}

/// `host:port` whose host is a loopback IP or `localhost`.
pub fn is_loopback(addr: &str) -> bool {
    if let Ok(sock) = addr.parse::<SocketAddr>() {
        return sock.ip().is_loopback();
    }
    match addr.rsplit_once(':') {
        Some((host, _)) => host.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

pub fn settings() -> &'static Settings {
    &SETTINGS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("REST".parse::<BackendKind>(), Ok(BackendKind::Rest));
        assert_eq!("pg".parse::<BackendKind>(), Ok(BackendKind::Postgres));
        assert_eq!("memory".parse::<BackendKind>(), Ok(BackendKind::Memory));
        assert!("sqlite".parse::<BackendKind>().is_err());
    }

    #[test]
    fn loopback_addresses() {
        assert!(is_loopback("127.0.0.1:8080"));
        assert!(is_loopback("[::1]:8080"));
        assert!(is_loopback("localhost:3000"));
        assert!(!is_loopback("0.0.0.0:8080"));
        assert!(!is_loopback("192.168.1.20:8080"));
        assert!(!is_loopback("example.com:80"));
    }
}
