use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use clutch_vault::http::routes;
use clutch_vault::models::{FRIENDS, MESSAGES, PROFILES, REGISTRATIONS, TOURNAMENTS};
use clutch_vault::remote::{Backend, MemoryClient};
use clutch_vault::session::{MemoryTokenStorage, SessionStore};
use clutch_vault::state::AppState;
use serde_json::{json, Value};
use uuid::Uuid;

struct Fixture {
    client: MemoryClient,
    state: web::Data<AppState>,
    me: Uuid,
    other: Uuid,
}

impl Fixture {
    fn new() -> Self {
        let client = MemoryClient::new();
        let session = Arc::new(SessionStore::new(Arc::new(MemoryTokenStorage::new())));
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        client.seed(
            PROFILES,
            [
                json!({"id": me, "name": "me", "cod_uid": "111", "email": "me@x.io"}),
                json!({"id": other, "name": "other", "cod_uid": "222", "email": "o@x.io"}),
            ],
        );
        client.seed(
            TOURNAMENTS,
            [
                json!({"id": 1, "name": "Weekend Cup", "team_size": 2, "status": "Open",
                       "room_code": "WC", "room_password": "alpha"}),
                json!({"id": 2, "name": "Closed Classic", "team_size": 1, "status": "Closed",
                       "room_code": "CC", "room_password": "beta"}),
            ],
        );
        let state = web::Data::new(AppState::new(
            Backend::Memory(client.clone()),
            session,
            None,
        ));
        Self {
            client,
            state,
            me,
            other,
        }
    }

    fn login_as(&self, user: Uuid) {
        self.state
            .session
            .store_session(&format!("token-{user}"), Some(user))
            .unwrap();
    }
}

macro_rules! app {
    ($fx:expr) => {
        test::init_service(
            App::new()
                .app_data($fx.state.clone())
                .configure(routes::init_routes),
        )
        .await
    };
}

#[actix_rt::test]
async fn login_required_endpoints_reject_anonymous_callers() {
    let fx = Fixture::new();
    let app = app!(fx);

    for uri in ["/api/profile", "/api/friends", "/api/tournaments", "/api/inbox"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[actix_rt::test]
async fn auth_endpoints_without_provider() {
    let fx = Fixture::new();
    fx.login_as(fx.me);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "me@x.io", "password": "hunter22"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let req = test::TestRequest::get().uri("/api/auth/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["user_id"], json!(fx.me));
    assert_eq!(body["login"], json!({"state": "known", "logged_in": true}));

    // Logout still clears the local session
    let req = test::TestRequest::post().uri("/api/auth/logout").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri("/api/profile").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/api/auth/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["login"], json!({"state": "known", "logged_in": false}));
    assert!(body["user_id"].is_null());
}

#[actix_rt::test]
async fn profile_patch_edits_name_only() {
    let fx = Fixture::new();
    fx.login_as(fx.me);
    let app = app!(fx);

    let req = test::TestRequest::patch()
        .uri("/api/profile")
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::patch()
        .uri("/api/profile")
        .set_json(json!({"name": "  Renamed  ", "cod_uid": "999"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["cod_uid"], "111");
}

#[actix_rt::test]
async fn friend_request_accept_and_unfriend() {
    let fx = Fixture::new();
    fx.login_as(fx.me);
    let app = app!(fx);

    // Search hides private fields and the caller
    let req = test::TestRequest::get()
        .uri("/api/friends/search?cod_uid=222")
        .to_request();
    let found: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found.as_array().map(Vec::len), Some(1));
    assert!(found[0].get("email").is_none());

    let req = test::TestRequest::post()
        .uri("/api/friends/requests")
        .set_json(json!({"friend_id": fx.other}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let edge: Value = test::read_body_json(resp).await;
    let edge_id = edge["id"].as_i64().unwrap();

    // A second request in either direction conflicts
    let req = test::TestRequest::post()
        .uri("/api/friends/requests")
        .set_json(json!({"friend_id": fx.other}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    // Only the recipient may accept
    let req = test::TestRequest::post()
        .uri(&format!("/api/friends/{edge_id}/accept"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    fx.login_as(fx.other);
    let req = test::TestRequest::get().uri("/api/friends").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["incoming"].as_array().map(Vec::len), Some(1));

    let req = test::TestRequest::post()
        .uri(&format!("/api/friends/{edge_id}/accept"))
        .to_request();
    let accepted: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(accepted["status"], "accepted");

    fx.login_as(fx.me);
    let req = test::TestRequest::get().uri("/api/friends").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["friends"].as_array().map(Vec::len), Some(1));
    assert_eq!(page["outgoing"].as_array().map(Vec::len), Some(0));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/friends/{edge_id}"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    assert!(fx.client.rows(FRIENDS).is_empty());

    // Already gone: still fine
    let req = test::TestRequest::delete()
        .uri(&format!("/api/friends/{edge_id}"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
}

#[actix_rt::test]
async fn tournament_list_redacts_and_searches() {
    let fx = Fixture::new();
    fx.login_as(fx.me);
    let app = app!(fx);

    let req = test::TestRequest::get()
        .uri("/api/tournaments?search=weekend")
        .to_request();
    let cards: Value = test::call_and_read_body_json(&app, req).await;
    let cards = cards.as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["name"], "Weekend Cup");
    assert_eq!(cards[0]["registered"], false);
    assert!(cards[0].get("room_password").is_none());

    let req = test::TestRequest::get()
        .uri("/api/tournaments?status=Closed")
        .to_request();
    let cards: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(cards[0]["name"], "Closed Classic");

    let req = test::TestRequest::get().uri("/api/tournaments/1").to_request();
    let details: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(details["max_teammates"], 1);
    assert!(details.get("room").is_none());

    let req = test::TestRequest::get().uri("/api/tournaments/404").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn join_by_room_password() {
    let fx = Fixture::new();
    fx.login_as(fx.me);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/tournaments/join")
        .set_json(json!({"room_password": "alpha"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["room"]["room_code"], "WC");

    let req = test::TestRequest::post()
        .uri("/api/tournaments/join")
        .set_json(json!({"room_password": "nope"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn registration_checkout() {
    let fx = Fixture::new();
    fx.client.seed(
        FRIENDS,
        [json!({"id": 1, "user_id": fx.me, "friend_id": fx.other, "status": "accepted"})],
    );
    fx.login_as(fx.me);
    let app = app!(fx);

    // Strangers cannot be teammates
    let req = test::TestRequest::post()
        .uri("/api/tournaments/1/register")
        .set_json(json!({"teammates": [Uuid::new_v4()]}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/tournaments/1/register")
        .set_json(json!({"teammates": [fx.other]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let confirmation: Value = test::read_body_json(resp).await;
    assert_eq!(confirmation["step"], "confirmation");
    assert_eq!(confirmation["room"]["room_password"], "alpha");
    assert_eq!(fx.client.rows(REGISTRATIONS).len(), 1);

    let req = test::TestRequest::post()
        .uri("/api/tournaments/1/register")
        .set_json(json!({"teammates": []}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/tournaments/2/register")
        .set_json(json!({}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get().uri("/api/tournaments/1").to_request();
    let details: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(details["registered"], true);
    assert_eq!(details["room"]["room_code"], "WC");

    let req = test::TestRequest::get().uri("/api/registrations").to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
}

#[actix_rt::test]
async fn inbox_send_list_and_clear() {
    let fx = Fixture::new();
    fx.login_as(fx.me);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/inbox")
        .set_json(json!({"recipient_id": fx.other, "content": "   "}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    for text in ["first", "second"] {
        let req = test::TestRequest::post()
            .uri("/api/inbox")
            .set_json(json!({"recipient_id": fx.other, "content": text}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    fx.login_as(fx.other);
    let req = test::TestRequest::get().uri("/api/inbox").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["is_full"], false);
    assert_eq!(page["messages"].as_array().map(Vec::len), Some(2));

    let req = test::TestRequest::delete().uri("/api/inbox").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    assert!(fx.client.rows(MESSAGES).is_empty());
}

#[actix_rt::test]
async fn inbox_reports_full_at_capacity() {
    let fx = Fixture::new();
    let me = fx.me;
    fx.client.seed(
        MESSAGES,
        (1..=100).map(|i| {
            json!({"id": i, "sender_id": Uuid::new_v4(), "recipient_id": me,
                   "content": "hi", "timestamp": "2024-01-01T00:00:00Z"})
        }),
    );
    fx.login_as(me);
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/api/inbox").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["is_full"], true);

    // Another player's delete does not touch my mail
    fx.login_as(fx.other);
    let req = test::TestRequest::delete().uri("/api/inbox/1").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(fx.client.rows(MESSAGES).len(), 100);
}

#[actix_rt::test]
async fn notifications_list_add_and_read_all() {
    let fx = Fixture::new();
    fx.login_as(fx.me);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/notifications")
        .set_json(json!({"title": "Welcome", "content": "Glad you are here"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/api/notifications").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["unread_count"], 1);

    let req = test::TestRequest::post()
        .uri("/api/notifications/read-all")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/notifications").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["unread_count"], 0);
}

#[actix_rt::test]
async fn health_probe_tracks_backend() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/healthz").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    fx.client.set_offline(TOURNAMENTS);
    let req = test::TestRequest::get().uri("/healthz").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}
