//! Tournament listing, details, join-by-password and registration checkout.

use std::collections::HashSet;

use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::checkout::{summary, Checkout, Confirmation};
use crate::http::auth::CurrentUser;
use crate::http::error::{bad_request, not_found};
use crate::http::friends::accepted_friend_ids;
use crate::models::{RecordId, Registration, Tournament, REGISTRATIONS, TOURNAMENTS};
use crate::query::{FetchAll, QueryLayer, QueryResult};
use crate::remote::TableClient;
use crate::state::AppState;

//////////////////////////////////////////////////
// DTOs
//////////////////////////////////////////////////

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(Serialize)]
pub struct TournamentCard {
    #[serde(flatten)]
    pub tournament: Tournament,
    pub registered: bool,
}

#[derive(Deserialize)]
pub struct JoinReq {
    pub room_password: String,
}

#[derive(Deserialize)]
pub struct RegisterReq {
    #[serde(default)]
    pub teammates: Vec<Uuid>,
}

async fn my_registrations<C: TableClient>(
    query: &QueryLayer<C>,
    user: Uuid,
) -> QueryResult<Vec<Registration>> {
    query
        .fetch_all_as(&FetchAll::new(REGISTRATIONS).eq("user_id", user.to_string()))
        .await
}

async fn is_registered<C: TableClient>(
    query: &QueryLayer<C>,
    user: Uuid,
    tournament: &RecordId,
) -> QueryResult<bool> {
    let rows = query
        .fetch_all(
            &FetchAll::new(REGISTRATIONS)
                .eq("tournament_id", tournament)
                .eq("user_id", user.to_string())
                .limit(1),
        )
        .await?;
    Ok(!rows.is_empty())
}

//////////////////////////////////////////////////
// GET /api/tournaments?search=&status=
//////////////////////////////////////////////////
#[get("/tournaments")]
pub async fn list(
    user: CurrentUser,
    web::Query(params): web::Query<ListParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let mut fetch = FetchAll::new(TOURNAMENTS).order_by("start_time");
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        fetch = fetch.eq("status", status);
    }
    if let Some(limit) = params.limit {
        fetch = fetch.limit(limit);
    }
    if let Some(offset) = params.offset {
        fetch = fetch.offset(offset);
    }

    let tournaments: Vec<Tournament> = state.query.fetch_all_as(&fetch).await?;
    let registered: HashSet<RecordId> = my_registrations(&state.query, user.user_id)
        .await?
        .into_iter()
        .map(|r| r.tournament_id)
        .collect();

    let needle = params.search.unwrap_or_default();
    let cards: Vec<TournamentCard> = tournaments
        .into_iter()
        .filter(|t| t.name_contains(&needle))
        .map(|t| TournamentCard {
            registered: registered.contains(&t.id),
            tournament: t.redacted(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(cards))
}

//////////////////////////////////////////////////
// GET /api/tournaments/{id}
//////////////////////////////////////////////////
#[get("/tournaments/{id}")]
pub async fn details(
    user: CurrentUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = RecordId::parse(&path.into_inner());
    let tournament: Tournament = state.query.fetch_by_id_as(TOURNAMENTS, &id).await?;

    let mut body = summary(&tournament);
    let registered = is_registered(&state.query, user.user_id, &id).await?;
    body["registered"] = json!(registered);
    if registered {
        body["room"] = json!(tournament.credentials());
    }
    Ok(HttpResponse::Ok().json(body))
}

//////////////////////////////////////////////////
// POST /api/tournaments/join
//////////////////////////////////////////////////
#[post("/tournaments/join")]
pub async fn join(
    _user: CurrentUser,
    info: web::Json<JoinReq>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let password = info.room_password.trim();
    if password.is_empty() {
        return Ok(bad_request("room_password is required"));
    }

    let found: Vec<Tournament> = state
        .query
        .fetch_all_as(
            &FetchAll::new(TOURNAMENTS)
                .eq("room_password", password)
                .limit(1),
        )
        .await?;
    let Some(tournament) = found.into_iter().next() else {
        return Ok(not_found("no tournament uses that room password"));
    };

    Ok(HttpResponse::Ok().json(json!({
        "tournament": tournament.clone().redacted(),
        "room": tournament.credentials(),
    })))
}

//////////////////////////////////////////////////
// POST /api/tournaments/{id}/register
//////////////////////////////////////////////////
#[post("/tournaments/{id}/register")]
pub async fn register(
    user: CurrentUser,
    path: web::Path<String>,
    info: web::Json<RegisterReq>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = RecordId::parse(&path.into_inner());
    let me = user.user_id;

    // Teammates must be distinct accepted friends
    let friends: HashSet<Uuid> = accepted_friend_ids(&state.query, me)
        .await?
        .into_iter()
        .collect();
    let mut seen = HashSet::new();
    for mate in &info.teammates {
        if !seen.insert(*mate) {
            return Ok(bad_request(format!("teammate {mate} listed twice")));
        }
        if !friends.contains(mate) {
            return Ok(bad_request(format!("{mate} is not your friend")));
        }
    }

    let tournament: Tournament = state.query.fetch_by_id_as(TOURNAMENTS, &id).await?;
    let mut checkout = Checkout::start(tournament)?;
    if !info.teammates.is_empty() {
        checkout.choose_team()?;
        for mate in &info.teammates {
            checkout.toggle_teammate(*mate)?;
        }
    }
    checkout.proceed_to_payment()?;
    let room = checkout
        .complete(&state.query, &state.notifications, me)
        .await?;

    Ok(HttpResponse::Created().json(Confirmation::new(&checkout, room)))
}

//////////////////////////////////////////////////
// GET /api/registrations
//////////////////////////////////////////////////
#[get("/registrations")]
pub async fn registrations(
    user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let mine = my_registrations(&state.query, user.user_id).await?;
    Ok(HttpResponse::Ok().json(mine))
}

//////////////////////////////////////////////////
// Mount
//////////////////////////////////////////////////
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // `join` before `{id}` so it is not captured as an id
    cfg.service(list)
        .service(join)
        .service(details)
        .service(register)
        .service(registrations);
}
