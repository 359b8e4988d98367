//! Friend list, requests and search.

use actix_web::{delete, get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::http::auth::CurrentUser;
use crate::http::error::{bad_request, conflict, forbidden};
use crate::models::{FriendEdge, FriendStatus, Profile, RecordId, FRIENDS, PROFILES};
use crate::query::{decode, filter_eq, to_row, FetchAll, QueryLayer, QueryResult};
use crate::remote::TableClient;
use crate::state::AppState;

//////////////////////////////////////////////////
// DTOs
//////////////////////////////////////////////////

#[derive(Serialize)]
pub struct FriendsPage {
    pub friends: Vec<FriendEdge>,
    /// Requests waiting for this user's answer.
    pub incoming: Vec<FriendEdge>,
    /// Requests this user sent.
    pub outgoing: Vec<FriendEdge>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub cod_uid: String,
}

#[derive(Deserialize)]
pub struct RequestReq {
    pub friend_id: Uuid,
}

//////////////////////////////////////////////////
// Helpers
//////////////////////////////////////////////////

async fn edges<C: TableClient>(
    query: &QueryLayer<C>,
    column: &str,
    user: Uuid,
    status: FriendStatus,
) -> QueryResult<Vec<FriendEdge>> {
    query
        .fetch_all_as(
            &FetchAll::new(FRIENDS)
                .eq(column, user.to_string())
                .eq("status", status.as_str()),
        )
        .await
}

/// Accepted friends of `user`, whichever side sent the request.
pub async fn accepted_friends<C: TableClient>(
    query: &QueryLayer<C>,
    user: Uuid,
) -> QueryResult<Vec<FriendEdge>> {
    let mut all = edges(query, "user_id", user, FriendStatus::Accepted).await?;
    all.extend(edges(query, "friend_id", user, FriendStatus::Accepted).await?);
    Ok(all)
}

pub async fn accepted_friend_ids<C: TableClient>(
    query: &QueryLayer<C>,
    user: Uuid,
) -> QueryResult<Vec<Uuid>> {
    Ok(accepted_friends(query, user)
        .await?
        .iter()
        .map(|e| e.other(user))
        .collect())
}

/// The edge with `id` if it exists; deleting a missing edge is not an error.
async fn find_edge(state: &AppState, id: &RecordId) -> QueryResult<Option<FriendEdge>> {
    match state.query.fetch_by_id_as::<FriendEdge>(FRIENDS, id).await {
        Ok(edge) => Ok(Some(edge)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

//////////////////////////////////////////////////
// GET /api/friends
//////////////////////////////////////////////////
#[get("/friends")]
pub async fn list(
    user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let me = user.user_id;
    let page = FriendsPage {
        friends: accepted_friends(&state.query, me).await?,
        incoming: edges(&state.query, "friend_id", me, FriendStatus::Pending).await?,
        outgoing: edges(&state.query, "user_id", me, FriendStatus::Pending).await?,
    };
    Ok(HttpResponse::Ok().json(page))
}

//////////////////////////////////////////////////
// GET /api/friends/search?cod_uid=...
//////////////////////////////////////////////////
#[get("/friends/search")]
pub async fn search(
    user: CurrentUser,
    web::Query(params): web::Query<SearchParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let uid = params.cod_uid.trim();
    if uid.is_empty() {
        return Ok(bad_request("cod_uid is required"));
    }
    let found: Vec<Profile> = state
        .query
        .fetch_all_as(&FetchAll::new(PROFILES).eq("cod_uid", uid))
        .await?;
    let found: Vec<Profile> = found
        .into_iter()
        .filter(|p| p.id != user.user_id)
        .map(Profile::public)
        .collect();
    Ok(HttpResponse::Ok().json(found))
}

//////////////////////////////////////////////////
// POST /api/friends/requests
//////////////////////////////////////////////////
#[post("/friends/requests")]
pub async fn send_request(
    user: CurrentUser,
    info: web::Json<RequestReq>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let me = user.user_id;
    let them = info.friend_id;
    if me == them {
        return Ok(bad_request("cannot befriend yourself"));
    }

    // Target must exist
    state
        .query
        .fetch_by_id(PROFILES, them.to_string())
        .await?;

    // No second edge between the same pair, in either direction
    for (from, to) in [(me, them), (them, me)] {
        let existing = state
            .query
            .fetch_all(
                &FetchAll::new(FRIENDS)
                    .eq("user_id", from.to_string())
                    .eq("friend_id", to.to_string())
                    .limit(1),
            )
            .await?;
        if !existing.is_empty() {
            return Ok(conflict("already friends or request pending"));
        }
    }

    let record = to_row(&json!({
        "user_id": me,
        "friend_id": them,
        "status": FriendStatus::Pending,
    }))?;
    let edge: FriendEdge = state.query.insert_one_as(FRIENDS, &record).await?;
    Ok(HttpResponse::Created().json(edge))
}

//////////////////////////////////////////////////
// POST /api/friends/{id}/accept
//////////////////////////////////////////////////
#[post("/friends/{id}/accept")]
pub async fn accept(
    user: CurrentUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = RecordId::parse(&path.into_inner());
    let edge: FriendEdge = state.query.fetch_by_id_as(FRIENDS, &id).await?;

    if edge.friend_id != user.user_id {
        return Ok(forbidden("only the recipient may accept"));
    }
    if edge.status == FriendStatus::Accepted {
        return Ok(conflict("already accepted"));
    }

    let patch = to_row(&json!({ "status": FriendStatus::Accepted }))?;
    let mut rows = state.query.update_record(FRIENDS, &id, &patch).await?;
    let edge: FriendEdge = decode(FRIENDS, rows.remove(0))?;

    if let Err(e) = state
        .notifications
        .add_notification(
            "Friend Request Accepted",
            &format!("You are now friends with {}.", edge.user_id),
        )
        .await
    {
        log::warn!("friend notice not stored: {e}");
    }

    Ok(HttpResponse::Ok().json(edge))
}

//////////////////////////////////////////////////
// DELETE /api/friends/{id}   (reject or unfriend)
//////////////////////////////////////////////////
#[delete("/friends/{id}")]
pub async fn remove(
    user: CurrentUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let id = RecordId::parse(&path.into_inner());
    if let Some(edge) = find_edge(&state, &id).await? {
        if !edge.involves(user.user_id) {
            return Ok(forbidden("not your friendship"));
        }
        state.query.delete_record(FRIENDS, &id).await?;
    }
    Ok(HttpResponse::NoContent().finish())
}

//////////////////////////////////////////////////
// DELETE /api/friends   (every accepted friend)
//////////////////////////////////////////////////
#[delete("/friends")]
pub async fn remove_all(
    user: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let me = user.user_id.to_string();
    for column in ["user_id", "friend_id"] {
        let mut filter = filter_eq(column, me.clone());
        filter.insert("status".into(), FriendStatus::Accepted.as_str().into());
        state.query.delete_matching(FRIENDS, &filter).await?;
    }
    Ok(HttpResponse::NoContent().finish())
}

//////////////////////////////////////////////////
// Mount
//////////////////////////////////////////////////
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // `search` before the `{id}` routes so it is not captured as an id
    cfg.service(list)
        .service(search)
        .service(send_request)
        .service(accept)
        .service(remove)
        .service(remove_all);
}
