//! HTTP status mapping for library errors.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

use crate::auth::AuthError;
use crate::checkout::CheckoutError;
use crate::query::QueryError;
use crate::session::SessionError;

fn json_error(status: StatusCode, message: String) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "error": message }))
}

impl ResponseError for QueryError {
    fn status_code(&self) -> StatusCode {
        match self {
            QueryError::NotFoundOrAmbiguous { .. } => StatusCode::NOT_FOUND,
            QueryError::WriteRejected { .. } => StatusCode::CONFLICT,
            QueryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            QueryError::RemoteQuery { .. } | QueryError::Decode { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        json_error(self.status_code(), self.to_string())
    }
}

impl ResponseError for CheckoutError {
    fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::TeamFull { .. } => StatusCode::BAD_REQUEST,
            CheckoutError::NotAccepting(_)
            | CheckoutError::OutOfOrder { .. }
            | CheckoutError::AlreadyRegistered => StatusCode::CONFLICT,
            CheckoutError::Query(e) => e.status_code(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        json_error(self.status_code(), self.to_string())
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Rejected(_) => StatusCode::UNAUTHORIZED,
            AuthError::Transport(_) => StatusCode::BAD_GATEWAY,
            AuthError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        json_error(self.status_code(), self.to_string())
    }
}

impl ResponseError for SessionError {
    fn error_response(&self) -> HttpResponse {
        json_error(self.status_code(), self.to_string())
    }
}

/// 400 with a JSON body, for request validation.
pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::BAD_REQUEST, message.into())
}

pub fn not_found(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::NOT_FOUND, message.into())
}

pub fn forbidden(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::FORBIDDEN, message.into())
}

pub fn conflict(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::CONFLICT, message.into())
}
