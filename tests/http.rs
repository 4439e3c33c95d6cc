mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{dispatcher, fixture};
use folio_mvc::session::{parse_cookie, SessionStore};
use folio_mvc::{app, AppState, MemorySessionStore};
use std::sync::Arc;
use tower::ServiceExt;

fn router(state: AppState) -> Router {
    app(state)
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_route_bypasses_the_dispatcher() {
    let fx = fixture();
    let state = AppState::with_memory_sessions(dispatcher(fx.config.clone()));
    let response = router(state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn unknown_path_is_a_rendered_404() {
    let fx = fixture();
    let state = AppState::with_memory_sessions(dispatcher(fx.config.clone()));
    let response = router(state)
        .oneshot(Request::get("/nowhere?x=1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("/nowhere"));
}

#[tokio::test]
async fn untouched_session_sets_no_cookie() {
    let fx = fixture();
    let store = Arc::new(MemorySessionStore::new());
    let state = AppState::new(dispatcher(fx.config.clone()), store.clone());
    let response = router(state)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn login_round_trip_persists_identity_and_flash_once() {
    let fx = fixture();
    let store = Arc::new(MemorySessionStore::new());
    let state = AppState::new(dispatcher(fx.config.clone()), store.clone());

    let login = router(state.clone())
        .oneshot(
            Request::post("/admin/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("user=admin&password=secret"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::FOUND);
    assert_eq!(login.headers()[header::LOCATION], "/admin");
    let cookie = login.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.contains("HttpOnly"));
    let id = parse_cookie(&cookie, "folio.sid").unwrap();
    assert_eq!(store.len().await, 1);

    let stored = store.load(&id).await.unwrap().unwrap();
    assert_eq!(stored["AuthIdentity"]["storage"], "admin");
    assert_eq!(stored["FlashMessenger"]["success"][0], "Welcome back");
    assert_eq!(stored["id"], id.as_str());
    assert!(stored["cookie"].is_object());

    let dashboard = router(state.clone())
        .oneshot(
            Request::get("/admin")
                .header(header::COOKIE, format!("theme=dark; folio.sid={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(dashboard.status(), StatusCode::OK);
    assert!(dashboard.headers().get(header::SET_COOKIE).is_none());
    let html = body_text(dashboard).await;
    assert!(html.contains("Dashboard admin"), "{}", html);
    assert!(html.contains("<p class=\"flash\">Welcome back</p>"));

    let stored = store.load(&id).await.unwrap().unwrap();
    assert!(stored["FlashMessenger"].get("success").is_none());
    assert_eq!(stored["AuthIdentity"]["storage"], "admin");
}

#[tokio::test]
async fn json_bodies_are_accepted() {
    let fx = fixture();
    let state = AppState::with_memory_sessions(dispatcher(fx.config.clone()));
    let response = router(state)
        .oneshot(
            Request::post("/admin/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"user":"admin","password":"nope"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let fx = fixture();
    let state = AppState::with_memory_sessions(dispatcher(fx.config.clone()));
    let response = router(state)
        .oneshot(
            Request::post("/admin/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Returns whatever was saved, expired or not, like a store without its own TTL.
#[derive(Default)]
struct RetainingStore(std::sync::Mutex<std::collections::HashMap<String, folio_mvc::session::SessionData>>);

#[async_trait::async_trait]
impl SessionStore for RetainingStore {
    async fn load(&self, id: &str) -> Result<Option<folio_mvc::session::SessionData>, folio_mvc::SessionError> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }

    async fn save(&self, id: &str, data: &folio_mvc::session::SessionData) -> Result<(), folio_mvc::SessionError> {
        self.0.lock().unwrap().insert(id.to_string(), data.clone());
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), folio_mvc::SessionError> {
        self.0.lock().unwrap().remove(id);
        Ok(())
    }
}

#[tokio::test]
async fn expired_session_cookie_starts_over() {
    let fx = fixture();
    let store = Arc::new(RetainingStore::default());
    let stale = serde_json::json!({
        "cookie": {"expires": "2000-01-01T00:00:00+00:00"},
        "AuthIdentity": {"storage": "admin"}
    });
    store
        .save("stale", stale.as_object().unwrap())
        .await
        .unwrap();
    let state = AppState::new(dispatcher(fx.config.clone()), store.clone());

    let response = router(state)
        .oneshot(
            Request::get("/admin")
                .header(header::COOKIE, "folio.sid=stale")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/admin/login");
    assert!(store.load("stale").await.unwrap().is_none());
}

#[tokio::test]
async fn encoded_route_params_reach_the_action_decoded() {
    let fx = fixture();
    let state = AppState::with_memory_sessions(dispatcher(fx.config.clone()));
    let response = router(state)
        .oneshot(Request::get("/blog/caf%C3%A9%20au%20lait").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<article>café au lait</article>"));
}
