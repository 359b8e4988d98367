//! The signed-in player's own profile.

use actix_web::{get, patch, web, HttpResponse};

use crate::http::auth::CurrentUser;
use crate::http::error::bad_request;
use crate::models::{Profile, ProfilePatch, PROFILES};
use crate::query::{decode, to_row};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 32;

/// GET /api/profile
#[get("/profile")]
pub async fn show(
    user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let profile: Profile = state
        .query
        .fetch_by_id_as(PROFILES, user.user_id.to_string())
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PATCH /api/profile (display name and avatar only)
#[patch("/profile")]
pub async fn update(
    user: CurrentUser,
    info: web::Json<ProfilePatch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let mut edit = info.into_inner();
    if edit.is_empty() {
        return Ok(bad_request("nothing to update"));
    }
    if let Some(name) = edit.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Ok(bad_request(format!("name must be 1–{MAX_NAME_LEN} characters")));
        }
    }

    let mut rows = state
        .query
        .update_record(PROFILES, user.user_id.to_string(), &to_row(&edit)?)
        .await?;
    let profile: Profile = decode(PROFILES, rows.remove(0))?;
    Ok(HttpResponse::Ok().json(profile))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(show).service(update);
}
