//! End-to-end tests against a local axum mock of the OpenAI Chat
//! Completions API, exercising the public crate surface (spec.md §8
//! scenario 5: rate-limit retry-after propagation).

use axum::Router;
use axum::response::IntoResponse;
use axum::routing::post;
use llm_client::{Config, LlmError, Message, Provider};
use llm_client::capabilities::embeddings::EmbeddingRequest;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn non_stream_chat_parses_text_and_usage() {
    async fn handler(body: axum::Json<serde_json::Value>) -> impl IntoResponse {
        assert_eq!(body.0["model"], "gpt-4o-mini");
        axum::Json(serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hi there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }))
    }

    let app = Router::new().route("/chat/completions", post(handler));
    let base_url = spawn(app).await;

    let config = Config::new(base_url, "gpt-4o-mini").with_api_key("k");
    let provider = llm_client::registry().create_provider("openai", config).unwrap();

    let response = provider.chat(vec![Message::user("hi")]).await.unwrap();
    assert_eq!(response.text.as_deref(), Some("hi there"));
    assert_eq!(response.usage.total_tokens, Some(5));
}

#[tokio::test]
async fn rate_limit_status_carries_retry_after_seconds() {
    async fn handler() -> impl IntoResponse {
        (
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            [(axum::http::header::RETRY_AFTER, "7")],
            axum::Json(serde_json::json!({"error": {"message": "rate limited"}})),
        )
    }

    let app = Router::new().route("/chat/completions", post(handler));
    let base_url = spawn(app).await;

    let config = Config::new(base_url, "gpt-4o-mini").with_api_key("k");
    let provider = llm_client::registry().create_provider("openai", config).unwrap();

    let err = provider.chat(vec![Message::user("hi")]).await.unwrap_err();
    match err {
        LlmError::RateLimit { retry_after, .. } => {
            assert_eq!(retry_after.map(|d| d.as_secs()), Some(7));
        }
        other => panic!("expected RateLimit, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_choices_is_response_format_error() {
    async fn handler() -> impl IntoResponse {
        axum::Json(serde_json::json!({"id": "chatcmpl-2", "model": "gpt-4o-mini", "choices": []}))
    }

    let app = Router::new().route("/chat/completions", post(handler));
    let base_url = spawn(app).await;

    let config = Config::new(base_url, "gpt-4o-mini").with_api_key("k");
    let provider = llm_client::registry().create_provider("openai", config).unwrap();

    let err = provider.chat(vec![Message::user("hi")]).await.unwrap_err();
    assert!(matches!(err, LlmError::ResponseFormat { .. }));
}

#[tokio::test]
async fn reasoning_model_omits_temperature_and_top_p() {
    async fn handler(body: axum::Json<serde_json::Value>) -> impl IntoResponse {
        assert!(body.0.get("temperature").is_none());
        assert!(body.0.get("top_p").is_none());
        axum::Json(serde_json::json!({
            "id": "chatcmpl-3",
            "model": "o1-preview",
            "choices": [{"message": {"role": "assistant", "content": "ok"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        }))
    }

    let app = Router::new().route("/chat/completions", post(handler));
    let base_url = spawn(app).await;

    let mut config = Config::new(base_url, "o1-preview").with_api_key("k");
    config.temperature = Some(0.5);
    config.top_p = Some(0.9);
    let provider = llm_client::registry().create_provider("openai", config).unwrap();

    let response = provider.chat(vec![Message::user("hi")]).await.unwrap();
    assert_eq!(response.text.as_deref(), Some("ok"));
}

#[tokio::test]
async fn embeddings_round_trip_preserves_input_order() {
    async fn handler(body: axum::Json<serde_json::Value>) -> impl IntoResponse {
        assert_eq!(body.0["input"], serde_json::json!(["a", "b"]));
        axum::Json(serde_json::json!({
            "model": "text-embedding-3-small",
            "data": [
                {"index": 0, "embedding": [0.1, 0.2]},
                {"index": 1, "embedding": [0.3, 0.4]}
            ],
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }))
    }

    let app = Router::new().route("/embeddings", post(handler));
    let base_url = spawn(app).await;

    let config = Config::new(base_url, "text-embedding-3-small").with_api_key("k");
    let provider = llm_client::registry().create_provider("openai", config).unwrap();
    let embeddings = provider.as_embeddings().expect("openai supports embeddings");

    let response = embeddings
        .embed(EmbeddingRequest::new(vec!["a".to_string(), "b".to_string()]))
        .await
        .unwrap();

    assert_eq!(response.embeddings, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    assert_eq!(response.usage.total_tokens, Some(4));
}
