//! Turn pipeline tests against a mock answer/history service.

use shopchat::chat::{ChatContext, TurnContext};
use shopchat::config::Config;
use shopchat::message::Role;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header_exists, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn context_for(server: &MockServer, temp: &TempDir) -> ChatContext {
    let config = Config {
        service_base_url: server.uri(),
        ..Default::default()
    };
    ChatContext::with_storage_dir(config, temp.path().to_path_buf()).unwrap()
}

fn answer_mock(body: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/ai/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
}

#[tokio::test]
async fn test_turn_appends_user_then_assistant() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("Hello!").mount(&server).await;

    let mut ctx = context_for(&server, &temp);
    let answer = ctx.ask("hi", &TurnContext::default()).await.unwrap();

    assert_eq!(answer, "Hello!");
    let messages = ctx.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hello!");
}

#[tokio::test]
async fn test_fragment_callback_concatenates_to_answer() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("Hello, world").mount(&server).await;

    let mut ctx = context_for(&server, &temp);
    let mut pieces = Vec::new();
    let answer = ctx
        .ask_with("hi", &TurnContext::default(), |piece| {
            pieces.push(piece.to_string());
        })
        .await
        .unwrap();

    assert_eq!(pieces.concat(), answer);
}

#[tokio::test]
async fn test_leading_whitespace_is_stripped() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("\n\n  Hello there").mount(&server).await;

    let mut ctx = context_for(&server, &temp);
    let answer = ctx.ask("hi", &TurnContext::default()).await.unwrap();

    assert_eq!(answer, "Hello there");
}

#[tokio::test]
async fn test_trailing_whitespace_is_trimmed_interior_kept() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("line one\n\nline two\n\n").mount(&server).await;

    let mut ctx = context_for(&server, &temp);
    let answer = ctx.ask("hi", &TurnContext::default()).await.unwrap();

    assert_eq!(answer, "line one\n\nline two");
}

#[tokio::test]
async fn test_all_whitespace_answer_is_empty_not_an_error() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("  \n\t ").mount(&server).await;

    let mut ctx = context_for(&server, &temp);
    let answer = ctx.ask("hi", &TurnContext::default()).await.unwrap();

    assert_eq!(answer, "");
    assert_eq!(ctx.messages()[1].content, "");
}

#[tokio::test]
async fn test_http_failure_keeps_question_and_shows_diagnostic() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/ai/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let mut ctx = context_for(&server, &temp);
    let err = ctx.ask("hi", &TurnContext::default()).await.unwrap_err();

    assert!(err.to_string().contains("overloaded"));
    let messages = ctx.messages();
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "overloaded");
}

#[tokio::test]
async fn test_empty_body_surfaces_as_error() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("").mount(&server).await;

    let mut ctx = context_for(&server, &temp);
    let err = ctx.ask("hi", &TurnContext::default()).await.unwrap_err();

    assert!(err.to_string().contains("empty"));
    // The apology entry is the error message, the question survives
    assert_eq!(ctx.messages()[0].content, "hi");
    assert!(!ctx.messages()[1].content.is_empty());
}

#[tokio::test]
async fn test_request_carries_identity_context_and_trace() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/ai/chat"))
        .and(header_exists("X-Trace-ID"))
        .and(body_partial_json(serde_json::json!({
            "question": "any stock?",
            "userId": "u-7",
            "productId": "42",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("Yes"))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        service_base_url: server.uri(),
        user_id: Some("u-7".to_string()),
        ..Default::default()
    };
    let mut ctx = ChatContext::with_storage_dir(config, temp.path().to_path_buf()).unwrap();
    ctx.ask("any stock?", &TurnContext::product("42"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_session_id_is_reused_across_turns() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("ok").mount(&server).await;

    let mut ctx = context_for(&server, &temp);
    ctx.ask("one", &TurnContext::default()).await.unwrap();
    ctx.ask("two", &TurnContext::default()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let first: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(first["sessionId"], second["sessionId"]);
    assert!(!first["sessionId"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_log_stays_within_window_across_turns() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("answer").mount(&server).await;

    let config = Config {
        service_base_url: server.uri(),
        history_pairs: 2,
        ..Default::default()
    };
    let mut ctx = ChatContext::with_storage_dir(config, temp.path().to_path_buf()).unwrap();
    for i in 0..3 {
        ctx.ask(&format!("q{i}"), &TurnContext::default())
            .await
            .unwrap();
    }

    let messages = ctx.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].content, "q1");
}

#[tokio::test]
async fn test_load_history_replaces_local_log() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path_regex(r"^/ai/chat/history/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello"},
        ])))
        .mount(&server)
        .await;

    let mut ctx = context_for(&server, &temp);
    ctx.load_history().await.unwrap();

    let messages = ctx.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].content, "hello");
}

#[tokio::test]
async fn test_load_history_failure_without_snapshot_leaves_log_empty() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path_regex(r"^/ai/chat/history/.+$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut ctx = context_for(&server, &temp);

    assert!(ctx.load_history().await.is_err());
    assert!(ctx.messages().is_empty());
}

#[tokio::test]
async fn test_load_history_failure_falls_back_to_local_snapshot() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("saved answer").mount(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/ai/chat/history/.+$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut ctx = context_for(&server, &temp);
    ctx.ask("hi", &TurnContext::default()).await.unwrap();

    ctx.load_history().await.unwrap();

    let messages = ctx.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].content, "saved answer");
}

#[tokio::test]
async fn test_snapshot_survives_context_restart() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("remembered").mount(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/ai/chat/history/.+$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    {
        let mut ctx = context_for(&server, &temp);
        ctx.ask("hi", &TurnContext::default()).await.unwrap();
    }

    // A fresh context over the same storage recovers the transcript offline
    let mut ctx = context_for(&server, &temp);
    ctx.load_history().await.unwrap();
    assert_eq!(ctx.messages().len(), 2);
    assert_eq!(ctx.messages()[1].content, "remembered");
}

#[tokio::test]
async fn test_clear_discards_local_snapshot() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("gone soon").mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/ai/chat/clear-history"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"cleared": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/ai/chat/history/.+$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut ctx = context_for(&server, &temp);
    ctx.ask("hi", &TurnContext::default()).await.unwrap();
    ctx.clear().await;

    // No snapshot left to fall back on
    assert!(ctx.load_history().await.is_err());
    assert!(ctx.messages().is_empty());
}

#[tokio::test]
async fn test_clear_purges_backend_and_rotates_session() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/ai/chat/clear-history"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"cleared": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut ctx = context_for(&server, &temp);
    let before = ctx.session_id();
    ctx.clear().await;
    let after = ctx.session_id();

    assert_ne!(before, after);
    assert!(ctx.messages().is_empty());
}

#[tokio::test]
async fn test_clear_succeeds_locally_when_purge_fails() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    answer_mock("answer").mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/ai/chat/clear-history"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut ctx = context_for(&server, &temp);
    ctx.ask("hi", &TurnContext::default()).await.unwrap();
    ctx.clear().await;

    assert!(ctx.messages().is_empty());
}
