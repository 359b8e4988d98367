use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use clutch_vault::auth::AuthClient;
use clutch_vault::config::settings;
use clutch_vault::remote::{rest, Backend};
use clutch_vault::session::{FileTokenStorage, SessionStore};
use clutch_vault::state::AppState;
use clutch_vault::{http, metrics};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let settings = settings();

    // Session survives restarts through the token file
    let storage = Arc::new(FileTokenStorage::new(&settings.session_file));
    let session = Arc::new(SessionStore::new(storage));
    log::info!("session on startup: {:?}", session.check());

    let backend = Backend::from_settings(settings, session.clone()).await?;
    log::info!("table backend: {:?}", backend.kind());

    let auth = match settings.supabase() {
        Some((url, key)) => {
            let http = rest::http_client(Duration::from_secs(settings.http_timeout_secs))
                .context("building auth HTTP client")?;
            Some(AuthClient::new(http, url, key, session.clone()).context("parsing SUPABASE_URL")?)
        }
        None => {
            log::warn!("SUPABASE_URL/SUPABASE_ANON_KEY unset; auth endpoints disabled");
            None
        }
    };

    let state = web::Data::new(AppState::new(backend, session.clone(), auth));

    // Notifications follow login/logout for the lifetime of the process
    actix_web::rt::spawn(session.follow(state.notifications.clone()));
    if session.is_logged_in() {
        state.notifications.load_or_empty().await;
    }

    if !settings.binds_loopback() {
        log::warn!(
            "SERVER_ADDR {} is not loopback; every client acts as the stored session",
            settings.server_addr
        );
    }
    log::info!("listening on {}", settings.server_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(metrics::METRICS.clone())
            .app_data(state.clone())
            .configure(http::routes::init_routes)
    })
    .bind(&settings.server_addr)?
    .run()
    .await?;
    Ok(())
}
