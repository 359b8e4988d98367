//! Simple liveness / readiness probe

use actix_web::{get, web, HttpResponse, Responder};

use crate::models::TOURNAMENTS;
use crate::query::FetchAll;
use crate::state::AppState;

#[get("/healthz")]
pub async fn healthz(state: web::Data<AppState>) -> impl Responder {
    // One-row read proves the backend answers
    if let Err(e) = state
        .query
        .fetch_all(&FetchAll::new(TOURNAMENTS).limit(1))
        .await
    {
        log::warn!("health probe failed: {e}");
        return HttpResponse::ServiceUnavailable().body("backend");
    }
    HttpResponse::Ok().body("ok")
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz);
}
