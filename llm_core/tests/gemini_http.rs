//! Drives the real Gemini client against a local axum server speaking the
//! same REST shapes.

use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures::StreamExt;
use llm_core::{Content, GeminiClient, GeminiSettings, GenerationClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::net::TcpListener;

const KEY: &str = "test-key";

async fn spawn_server() -> String {
    let app = Router::new().route("/v1beta/models/{action}", post(handle));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn handle(
    Path(action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(KEY) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    let (model, method) = action.split_once(':').unwrap_or((action.as_str(), ""));
    if model == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    if model == "plain-json" {
        // a JSON array instead of an event stream
        return Json(json!([
            { "candidates": [{ "content": { "role": "model", "parts": [{ "text": "Hi" }] } }] }
        ]))
        .into_response();
    }

    let contents = body["contents"].as_array().map(|c| c.len()).unwrap_or(0);
    let last = body["contents"][contents.saturating_sub(1)]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let has_instruction = body["systemInstruction"]["parts"][0]["text"].is_string();
    let top_k = body["generationConfig"]["topK"].as_u64().unwrap_or(0);

    match method {
        "generateContent" => {
            let text = format!("contents={contents} last={last} instruction={has_instruction} topK={top_k}");
            Json(json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
            }))
            .into_response()
        }
        "streamGenerateContent" if query.get("alt").map(String::as_str) == Some("sse") => {
            let mut sse = String::new();
            for text in ["Hi", "", " there"] {
                let chunk = json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }] });
                sse.push_str(&format!("data: {chunk}\r\n\r\n"));
            }
            sse.push_str("data: {\"candidates\":[{\"finishReason\":\"STOP\"}]}\r\n\r\n");
            ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
        }
        _ => (StatusCode::NOT_FOUND, "unknown method").into_response(),
    }
}

fn client(base_url: String, model: &str, api_key: Option<&str>) -> GeminiClient {
    GeminiClient::new(GeminiSettings {
        api_key: api_key.map(str::to_string),
        model: model.to_string(),
        base_url,
        ..GeminiSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_generate_sends_history_prompt_and_config() {
    let base = spawn_server().await;
    let client = client(base, "test-model", Some(KEY));
    let history = vec![Content::model("Hello!"), Content::user("Hi")];

    let reply = client.generate("Loan info?", &history).await.unwrap();

    assert_eq!(reply, "contents=3 last=Loan info? instruction=true topK=40");
}

#[tokio::test]
async fn test_generate_streaming_yields_chunks_in_order() {
    let base = spawn_server().await;
    let client = client(base, "test-model", Some(KEY));

    let mut stream = client.generate_streaming("Hello", &[]).await.unwrap();
    let mut texts = Vec::new();
    while let Some(chunk) = stream.next().await {
        texts.push(chunk.unwrap().text);
    }

    assert_eq!(texts, vec!["Hi", "", " there", ""]);
    assert_eq!(texts.concat(), "Hi there");
}

#[tokio::test]
async fn test_error_status_is_a_failure() {
    let base = spawn_server().await;
    let client = client(base, "broken", Some(KEY));

    let err = client.generate("Hello", &[]).await.unwrap_err();
    assert!(err.to_string().contains("500"));
    assert!(client.generate_streaming("Hello", &[]).await.is_err());
}

#[tokio::test]
async fn test_body_without_events_is_a_failure() {
    let base = spawn_server().await;
    let client = client(base, "plain-json", Some(KEY));

    let mut stream = client.generate_streaming("Hello", &[]).await.unwrap();
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }

    assert_eq!(items.len(), 1);
    let err = items.pop().unwrap().unwrap_err();
    assert!(err.to_string().contains("no events"));
}

#[tokio::test]
async fn test_wrong_key_is_a_failure() {
    let base = spawn_server().await;
    let client = client(base, "test-model", Some("nope"));

    let err = client.generate("Hello", &[]).await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_failure() {
    // Port 9 (discard) is not expected to be listening on loopback
    let client = client("http://127.0.0.1:9".to_string(), "test-model", Some(KEY));
    assert!(client.generate_streaming("Hello", &[]).await.is_err());
}
