//! Clutch Vault: tournament registration backend for a mobile-game community.
//!
//! Rows live in an external backend-as-a-service; this crate wraps its table
//! client in a generic query layer, keeps the local session and notification
//! state, and serves the JSON endpoints the browser UI binds to.

pub mod auth;
pub mod checkout;
pub mod config;
pub mod http;
pub mod metrics;
pub mod models;
pub mod query;
pub mod remote;
pub mod session;
pub mod state;
