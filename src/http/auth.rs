//! Signup / login / logout, plus the `CurrentUser` extractor.
//!
//! There is one session per process, read from the session store. Any caller
//! reaching the server is treated as that user, so bind it to loopback.

use actix_web::{error, get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthClient;
use crate::http::error::bad_request;
use crate::models::{Profile, PROFILES};
use crate::query::to_row;
use crate::state::AppState;

//////////////////////////////////////////////////
// Data structs
//////////////////////////////////////////////////

#[derive(Deserialize)]
pub struct SignUpReq {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub cod_uid: String,
    pub in_game_name: String,
}

#[derive(Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RecoverReq {
    pub email: String,
}

//////////////////////////////////////////////////
// ─────────────  CurrentUser extractor  ─────────────
//////////////////////////////////////////////////

pub mod extractor {
    use actix_web::{
        dev::Payload, error::ErrorInternalServerError, error::ErrorUnauthorized, web,
        FromRequest, HttpRequest, Result as ActixResult,
    };
    use futures_util::future::{ready, Ready};
    use uuid::Uuid;

    use crate::state::AppState;

    /// The signed-in user, as recorded by the session store.
    #[derive(Debug, Clone, Copy)]
    pub struct CurrentUser {
        pub user_id: Uuid,
    }

    impl FromRequest for CurrentUser {
        type Error = actix_web::Error;
        type Future = Ready<ActixResult<Self, Self::Error>>;

        fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
            let res = (|| {
                let state = req
                    .app_data::<web::Data<AppState>>()
                    .ok_or_else(|| ErrorInternalServerError("app state missing"))?;

                if !state.session.is_logged_in() {
                    return Err(ErrorUnauthorized("login required"));
                }
                let user_id = state
                    .session
                    .user_id()
                    .ok_or_else(|| ErrorUnauthorized("session carries no user id"))?;

                Ok(CurrentUser { user_id })
            })();

            ready(res)
        }
    }
}
pub use extractor::CurrentUser;

fn provider(state: &AppState) -> Result<&AuthClient, actix_web::Error> {
    state
        .auth
        .as_ref()
        .ok_or_else(|| error::ErrorServiceUnavailable("auth provider not configured"))
}

//////////////////////////////////////////////////
// POST /api/auth/signup
//////////////////////////////////////////////////
#[post("/auth/signup")]
pub async fn signup(
    info: web::Json<SignUpReq>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let info = info.into_inner();
    if !info.email.contains('@') {
        return Ok(bad_request("a valid email is required"));
    }
    if info.password.len() < 6 {
        return Ok(bad_request("password must be at least 6 characters"));
    }
    if info.cod_uid.trim().is_empty() || info.in_game_name.trim().is_empty() {
        return Ok(bad_request("cod_uid and in_game_name are required"));
    }

    let user = provider(&state)?.sign_up(&info.email, &info.password).await?;

    // Profile row keyed by the auth user id
    let profile = Profile {
        id: user.id,
        name: Some(info.in_game_name.clone()),
        avatar_url: None,
        cod_uid: Some(info.cod_uid.trim().to_string()),
        in_game_name: Some(info.in_game_name),
        first_name: info.first_name,
        last_name: info.last_name,
        email: Some(info.email),
    };
    let created: Profile = state
        .query
        .insert_one_as(PROFILES, &to_row(&profile)?)
        .await?;

    Ok(HttpResponse::Created().json(created))
}

//////////////////////////////////////////////////
// POST /api/auth/login
//////////////////////////////////////////////////
#[post("/auth/login")]
pub async fn login(
    info: web::Json<LoginReq>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let user = provider(&state)?
        .sign_in(&info.email, &info.password)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "user_id": user.id, "email": user.email })))
}

//////////////////////////////////////////////////
// POST /api/auth/logout
//////////////////////////////////////////////////
#[post("/auth/logout")]
pub async fn logout(state: web::Data<AppState>) -> Result<HttpResponse, actix_web::Error> {
    match &state.auth {
        Some(auth) => auth.sign_out().await?,
        None => state.session.logout()?,
    }
    Ok(HttpResponse::NoContent().finish())
}

//////////////////////////////////////////////////
// POST /api/auth/forgot-password
//////////////////////////////////////////////////
#[post("/auth/forgot-password")]
pub async fn forgot_password(
    info: web::Json<RecoverReq>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    provider(&state)?.recover(&info.email).await?;
    Ok(HttpResponse::Ok().body("Password reset link sent; check your email"))
}

//////////////////////////////////////////////////
// GET /api/auth/status
//////////////////////////////////////////////////
#[get("/auth/status")]
pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    let current = state.session.check();
    HttpResponse::Ok().json(json!({
        "login": current,
        "user_id": state.session.user_id(),
    }))
}

//////////////////////////////////////////////////
// Mount
//////////////////////////////////////////////////
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(signup)
        .service(login)
        .service(logout)
        .service(forgot_password)
        .service(status);
}
