//! Notification bell: list, add, mark all read.

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::http::auth::CurrentUser;
use crate::http::error::bad_request;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddReq {
    pub title: String,
    pub content: String,
}

//////////////////////////////////////////////////
// GET /api/notifications
//////////////////////////////////////////////////
#[get("/notifications")]
pub async fn list(
    _user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    state.notifications.ensure_loaded().await?;
    Ok(HttpResponse::Ok().json(json!({
        "notifications": state.notifications.notifications().await,
        "unread_count": state.notifications.unread_count().await,
    })))
}

//////////////////////////////////////////////////
// POST /api/notifications
//////////////////////////////////////////////////
#[post("/notifications")]
pub async fn add(
    _user: CurrentUser,
    info: web::Json<AddReq>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    if info.title.trim().is_empty() {
        return Ok(bad_request("title is required"));
    }
    let created = state
        .notifications
        .add_notification(&info.title, &info.content)
        .await?;
    Ok(HttpResponse::Created().json(created))
}

//////////////////////////////////////////////////
// POST /api/notifications/read-all
//////////////////////////////////////////////////
#[post("/notifications/read-all")]
pub async fn read_all(
    _user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    state.notifications.mark_all_as_read().await?;
    Ok(HttpResponse::Ok().json(json!({ "unread_count": 0 })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list).service(add).service(read_all);
}
