//! Player inbox: read, send, delete

use actix_web::{delete, get, post, web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::http::auth::CurrentUser;
use crate::http::error::bad_request;
use crate::models::{Message, RecordId, INBOX_CAPACITY, MESSAGES, PROFILES};
use crate::query::{filter_eq, to_row, FetchAll};
use crate::state::AppState;

const MAX_CONTENT_LEN: usize = 500;

//////////////////////////////////////////////////
// DTOs
//////////////////////////////////////////////////

#[derive(Deserialize)]
pub struct SendReq {
    pub recipient_id: Uuid,
    pub content: String,
}

#[derive(Serialize)]
pub struct InboxPage {
    pub messages: Vec<Message>,
    pub is_full: bool,
}

//////////////////////////////////////////////////
// GET /api/inbox
//////////////////////////////////////////////////
#[get("/inbox")]
pub async fn list(
    user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let messages: Vec<Message> = state
        .query
        .fetch_all_as(
            &FetchAll::new(MESSAGES)
                .eq("recipient_id", user.user_id.to_string())
                .order_by("timestamp")
                .descending(),
        )
        .await?;
    let is_full = messages.len() >= INBOX_CAPACITY;
    Ok(HttpResponse::Ok().json(InboxPage { messages, is_full }))
}

//////////////////////////////////////////////////
// POST /api/inbox
//////////////////////////////////////////////////
#[post("/inbox")]
pub async fn send(
    user: CurrentUser,
    info: web::Json<SendReq>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let content = info.content.trim();
    if content.is_empty() || content.chars().count() > MAX_CONTENT_LEN {
        return Ok(bad_request(format!("content length 1–{MAX_CONTENT_LEN} required")));
    }

    // Recipient must exist
    state
        .query
        .fetch_by_id(PROFILES, info.recipient_id.to_string())
        .await?;

    let record = to_row(&json!({
        "sender_id": user.user_id,
        "recipient_id": info.recipient_id,
        "content": content,
        "timestamp": Utc::now(),
    }))?;
    let sent: Message = state.query.insert_one_as(MESSAGES, &record).await?;
    Ok(HttpResponse::Created().json(sent))
}

//////////////////////////////////////////////////
// DELETE /api/inbox/{id}
//////////////////////////////////////////////////
#[delete("/inbox/{id}")]
pub async fn remove(
    user: CurrentUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = RecordId::parse(&path.into_inner());
    // Scoped to the recipient so nobody deletes another player's mail
    let mut filter = filter_eq("id", id);
    filter.insert("recipient_id".into(), user.user_id.to_string().into());
    state.query.delete_matching(MESSAGES, &filter).await?;
    Ok(HttpResponse::NoContent().finish())
}

//////////////////////////////////////////////////
// DELETE /api/inbox
//////////////////////////////////////////////////
#[delete("/inbox")]
pub async fn clear(
    user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    state
        .query
        .delete_matching(MESSAGES, &filter_eq("recipient_id", user.user_id.to_string()))
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list)
        .service(send)
        .service(remove)
        .service(clear);
}
