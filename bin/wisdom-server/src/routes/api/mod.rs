pub mod account;
pub mod chat;
pub mod like;
pub mod saved;
pub mod wisdom;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::state::AppState;

/// Routes nested under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(chat::router())
        .merge(account::router())
        .merge(like::router())
        .merge(saved::router())
        .merge(wisdom::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut doc = Api::openapi();
    doc.merge(chat::ChatApi::openapi());
    doc.merge(account::AccountApi::openapi());
    doc.merge(like::LikeApi::openapi());
    doc.merge(saved::SavedApi::openapi());
    doc.merge(wisdom::WisdomApi::openapi());
    doc
}

/// JSON body that has passed its `validator` rules.
///
/// Malformed JSON and rule violations are both answered with a 400 JSON error.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::handlers::test_support::{CountingOracle, app_state};
    use crate::routes;

    async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn post(uri: &str, session: Option<&str>, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(session) = session {
            builder = builder.header("session-id", session);
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn app_with(oracle: CountingOracle) -> (axum::Router, Arc<CountingOracle>, tempfile::TempDir) {
        let oracle = Arc::new(oracle);
        let (state, dir) = app_state(oracle.clone()).await;
        (routes::build(state), oracle, dir)
    }

    #[tokio::test]
    async fn chat_requires_session_header() {
        let (app, oracle, _dir) = app_with(CountingOracle::default()).await;
        let (status, body) = send(&app, post("/api/chat", None, None, json!({ "message": "Hello?" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("session-id"));

        let (status, _) = send(&app, post("/api/chat", Some("default-session"), None, json!({ "message": "Hello?" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn chat_is_unavailable_when_session_state_cannot_be_read() {
        let oracle = Arc::new(CountingOracle::default());
        let (state, _dir) = app_state(oracle.clone()).await;
        state.store.relational().unwrap().close().await;
        let app = routes::build(state);

        let session = Uuid::new_v4().to_string();
        let (status, body) = send(&app, post("/api/chat", Some(&session), None, json!({ "message": "Hello?" }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().is_some_and(|m| !m.is_empty()));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn chat_rejects_blank_and_invalid_bodies() {
        let (app, _oracle, _dir) = app_with(CountingOracle::default()).await;
        let session = Uuid::new_v4().to_string();
        let (status, _) = send(&app, post("/api/chat", Some(&session), None, json!({ "message": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = send(&app, post("/api/chat", Some(&session), None, json!({ "text": "hi" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        let bad_email = json!({ "message": "hi", "email": "not-an-email" });
        let (status, _) = send(&app, post("/api/chat", Some(&session), None, bad_email)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn question_count_is_monotonic_and_capped() {
        let (app, oracle, _dir) = app_with(CountingOracle::default()).await;
        let session = Uuid::new_v4().to_string();
        let mut last = 0;
        for i in 0..5 {
            let question = json!({ "message": format!("Question number {i}?") });
            let (status, body) = send(&app, post("/api/chat", Some(&session), None, question)).await;
            assert_eq!(status, StatusCode::OK);
            let count = body["questionCount"].as_u64().unwrap();
            assert!(count >= last && count <= 3);
            assert_eq!(body["remainingQuestions"].as_u64().unwrap(), 3 - count);
            last = count;
            if i >= 3 {
                assert_eq!(body["limitReached"], true);
                assert!(body["messageId"].is_null());
            }
        }
        assert_eq!(last, 3);
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn oracle_failure_yields_localized_fallback() {
        let (app, _oracle, _dir) = app_with(CountingOracle { fail: true, ..Default::default() }).await;
        let session = Uuid::new_v4().to_string();
        let (status, body) = send(&app, post("/api/chat", Some(&session), None, json!({ "message": "¿Cómo estás?" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fallback"], true);
        assert_eq!(body["language"], "spanish");
        let message = body["message"].as_str().unwrap();
        assert!(message.starts_with("Lo siento"));
        assert_eq!(body["questionCount"], 1);
    }

    #[tokio::test]
    async fn concurrent_double_submit_counts_once() {
        let oracle = CountingOracle { delay: Some(Duration::from_millis(50)), ..Default::default() };
        let (app, oracle, _dir) = app_with(oracle).await;
        let session = Uuid::new_v4().to_string();
        let question = json!({ "message": "What is my purpose?" });

        let (a, b) = tokio::join!(
            send(&app, post("/api/chat", Some(&session), None, question.clone())),
            send(&app, post("/api/chat", Some(&session), None, question.clone())),
        );
        assert_eq!(a.0, StatusCode::OK);
        assert_eq!(b.0, StatusCode::OK);
        assert_eq!(a.1["questionCount"], 1);
        assert_eq!(b.1["questionCount"], 1);
        assert_eq!(a.1["message"], b.1["message"]);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn liking_twice_counts_once() {
        let (app, _oracle, _dir) = app_with(CountingOracle::default()).await;
        let session = Uuid::new_v4().to_string();
        let (_, reply) = send(&app, post("/api/chat", Some(&session), None, json!({ "message": "Guide me." }))).await;
        let like = json!({
            "messageId": reply["messageId"],
            "conversationId": reply["conversationId"],
            "messageContent": reply["message"],
        });

        let (status, first) = send(&app, post("/api/like", Some(&session), None, like.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["alreadyLiked"], false);
        let (_, second) = send(&app, post("/api/like", Some(&session), None, like)).await;
        assert_eq!(second["alreadyLiked"], true);

        let (status, popular) = send(&app, get("/api/popular-wisdom?limit=5", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(popular["messages"][0]["likeCount"], 1);
        assert_eq!(popular["messages"][0]["messageId"], reply["messageId"]);
    }

    #[tokio::test]
    async fn popular_wisdom_limit_is_bounded() {
        let (app, _oracle, _dir) = app_with(CountingOracle::default()).await;
        let (status, _) = send(&app, get("/api/popular-wisdom?limit=0", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, get("/api/popular-wisdom?limit=51", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = send(&app, get("/api/popular-wisdom", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"], json!([]));
    }

    #[tokio::test]
    async fn register_links_session_and_unlocks_saving() {
        let (app, _oracle, _dir) = app_with(CountingOracle::default()).await;
        let session = Uuid::new_v4().to_string();
        let (_, reply) = send(&app, post("/api/chat", Some(&session), None, json!({ "message": "What is bhakti?" }))).await;
        let conversation_id = reply["conversationId"].as_str().unwrap().to_owned();

        let registration = json!({ "email": "arjuna@example.com", "name": "Arjuna", "sessionId": session });
        let (status, body) = send(&app, post("/api/register", None, None, registration)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["email"], "arjuna@example.com");
        let token = body["token"].as_str().unwrap().to_owned();

        let uri = format!("/api/conversations/{conversation_id}/messages");
        let (status, messages) = send(&app, get(&uri, Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(messages["messages"].as_array().unwrap().len() >= 2);

        // The counter carries on after registration.
        let (_, next) = send(&app, post("/api/chat", Some(&session), None, json!({ "message": "And karma?" }))).await;
        assert_eq!(next["questionCount"], 2);

        let (status, saved) = send(&app, post("/api/save-chat", None, Some(&token), json!({ "sessionId": session }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["success"], true);

        let (status, chats) = send(&app, get("/api/saved-chats", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(chats["chats"][0]["id"], conversation_id.as_str());
        assert_eq!(chats["chats"][0]["questionsAsked"], 2);
        assert_eq!(chats["chats"][0]["lastQuestion"], "And karma?");

        let (status, profile) = send(&app, get("/api/profile", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["user"]["conversations"], 1);
        assert_eq!(profile["user"]["messages"], 4);
    }

    #[tokio::test]
    async fn account_endpoints_need_a_valid_token() {
        let (app, _oracle, _dir) = app_with(CountingOracle::default()).await;
        let (status, body) = send(&app, post("/api/save-chat", None, None, json!({ "sessionId": Uuid::new_v4() }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, get("/api/saved-chats", Some("forged"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn other_users_cannot_read_a_conversation() {
        let (app, _oracle, _dir) = app_with(CountingOracle::default()).await;
        let session = Uuid::new_v4().to_string();
        let ask = json!({ "message": "Am I on the right path?", "email": "owner@example.com" });
        let (_, reply) = send(&app, post("/api/chat", Some(&session), None, ask)).await;

        let (_, other) = send(&app, post("/api/register", None, None, json!({ "email": "other@example.com" }))).await;
        let token = other["token"].as_str().unwrap();
        let uri = format!("/api/conversations/{}/messages", reply["conversationId"].as_str().unwrap());
        let (status, _) = send(&app, get(&uri, Some(token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
