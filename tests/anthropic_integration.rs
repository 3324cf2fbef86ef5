//! End-to-end tests against a local axum mock of the Anthropic Messages
//! API, exercising the public crate surface rather than `providers::anthropic`
//! internals directly (spec.md §8's literal scenarios 1–3, 6).

use axum::Router;
use axum::response::IntoResponse;
use axum::routing::post;
use futures::StreamExt;
use indoc::indoc;
use llm_client::message::StreamEvent;
use llm_client::{Config, Message, Provider};

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn non_stream_chat_joins_text_and_sums_usage() {
    async fn handler(body: axum::Json<serde_json::Value>) -> impl IntoResponse {
        assert_eq!(body.0["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(body.0["max_tokens"], 1024);
        assert_eq!(body.0["stream"], false);
        axum::Json(serde_json::json!({
            "id": "msg_1",
            "model": "claude-3-5-sonnet-20241022",
            "content": [{"type": "text", "text": "hello"}],
            "usage": {"input_tokens": 5, "output_tokens": 1}
        }))
    }

    let app = Router::new().route("/messages", post(handler));
    let base_url = spawn(app).await;

    let config = Config::new(base_url, "claude-3-5-sonnet-20241022").with_api_key("k");
    let provider = llm_client::registry().create_provider("anthropic", config).unwrap();

    let response = provider.chat(vec![Message::user("hi")]).await.unwrap();
    assert_eq!(response.text.as_deref(), Some("hello"));
    assert_eq!(response.usage.total_tokens, Some(6));
}

#[tokio::test]
async fn tool_use_stream_emits_single_tool_call_delta_then_completion() {
    async fn handler() -> impl IntoResponse {
        let body = indoc! {r#"
            event: content_block_start
            data: {"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"t1","name":"add"}}

            data: {"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"a\":1,"}}

            data: {"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"\"b\":2}"}}

            data: {"type":"content_block_stop","index":0}

            data: {"type":"message_stop"}

        "#};
        ([(axum::http::header::CONTENT_TYPE, "text/event-stream")], body)
    }

    let app = Router::new().route("/messages", post(handler));
    let base_url = spawn(app).await;

    let config = Config::new(base_url, "claude-3-5-sonnet-20241022").with_api_key("k");
    let provider = llm_client::registry().create_provider("anthropic", config).unwrap();

    let events: Vec<StreamEvent> = provider.chat_stream(vec![Message::user("add 1 and 2")]).await.unwrap().collect().await;

    assert_eq!(events.len(), 2);
    match &events[0] {
        StreamEvent::ToolCallDelta(call) => {
            assert_eq!(call.id, "t1");
            assert_eq!(call.function.name, "add");
            assert_eq!(call.function.arguments, "{\"a\":1,\"b\":2}");
        }
        other => panic!("expected ToolCallDelta, got {other:?}"),
    }
    assert!(matches!(&events[1], StreamEvent::Completion(_)));
}

#[tokio::test]
async fn auth_error_status_maps_to_auth_variant() {
    async fn handler() -> impl IntoResponse {
        (axum::http::StatusCode::UNAUTHORIZED, "invalid x-api-key")
    }

    let app = Router::new().route("/messages", post(handler));
    let base_url = spawn(app).await;

    let config = Config::new(base_url, "claude-3-5-sonnet-20241022").with_api_key("bad-key");
    let provider = llm_client::registry().create_provider("anthropic", config).unwrap();

    let err = provider.chat(vec![Message::user("hi")]).await.unwrap_err();
    assert!(matches!(err, llm_client::LlmError::Auth(_)));
}

#[tokio::test]
async fn rate_limit_status_carries_retry_after() {
    async fn handler() -> impl IntoResponse {
        (
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            [(axum::http::header::RETRY_AFTER, "7")],
            "slow down",
        )
    }

    let app = Router::new().route("/messages", post(handler));
    let base_url = spawn(app).await;

    let config = Config::new(base_url, "claude-3-5-sonnet-20241022").with_api_key("k");
    let provider = llm_client::registry().create_provider("anthropic", config).unwrap();

    let err = provider.chat(vec![Message::user("hi")]).await.unwrap_err();
    match err {
        llm_client::LlmError::RateLimit { retry_after, .. } => {
            assert_eq!(retry_after.map(|d| d.as_secs()), Some(7));
        }
        other => panic!("expected RateLimit, got {other:?}"),
    }
}
