//! JSON endpoints, one module per page of the app.

pub mod auth;
pub mod error;
pub mod friends;
pub mod health;
pub mod inbox;
pub mod notifications;
pub mod profile;
pub mod routes;
pub mod tournaments;
