//! The reqwest transport against a mock HTTP server.

use ai_chat_core::{ChatClient, ChatConfig, ErrorOutcome, Message};
use mockito::{Matcher, Server};
use serde_json::json;
use std::io::Write;
use std::time::Duration;

fn client_for(base_url: &str) -> ChatClient {
    ChatClient::builder()
        .base_url(format!("{}/v1", base_url))
        .model("gpt-4o-mini")
        .api_key("sk-test")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_buffered_completion() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_header("x-request-id", Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}}]})
                .to_string(),
        )
        .create_async()
        .await;

    let client = client_for(&server.url());
    let options = client.default_options().streaming(false);
    let completion = client
        .dispatcher()
        .start(vec![Message::user("hi")], &options)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(completion.content.to_text(), "hello");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_sse_stream() {
    let mut server = Server::new_async().await;
    let body = [
        r#"data: {"choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"content":"Hel"}}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"content":"lo"}}]}"#,
        "data: [DONE]",
    ]
    .iter()
    .map(|line| format!("{}\n\n", line))
    .collect::<String>();

    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("accept", "text/event-stream")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let mut chat = ai_chat_core::Orchestrator::new(&client);
    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;

    assert_eq!(chat.messages()[1], Message::assistant("Hello"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limited_is_client_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_body(r#"{"error":{"message":"slow down","type":"rate_limit_exceeded"}}"#)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let options = client.default_options().streaming(false);
    let result = client
        .dispatcher()
        .start(vec![Message::user("hi")], &options)
        .unwrap()
        .wait()
        .await;

    assert_eq!(result, Err(ErrorOutcome::ClientError { status: 429 }));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Nothing listens on the discard port.
    let client = client_for("http://127.0.0.1:9");
    let result = client
        .dispatcher()
        .start(vec![Message::user("hi")], &client.default_options())
        .unwrap()
        .wait()
        .await;

    assert_eq!(result, Err(ErrorOutcome::NetworkError));
}

#[tokio::test]
async fn test_builder_request_timeout_reaches_transport() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_chunked_body(|w| {
            // Slower than the configured timeout, faster than the override.
            std::thread::sleep(Duration::from_millis(1500));
            w.write_all(
                json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": "late"}}]})
                    .to_string()
                    .as_bytes(),
            )
        })
        .create_async()
        .await;

    let config = ChatConfig {
        request_timeout_secs: 1,
        ..ChatConfig::default()
    };
    let client = ChatClient::builder()
        .config(config)
        .base_url(format!("{}/v1", server.url()))
        .api_key("sk-test")
        .request_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let options = client.default_options().streaming(false);
    let completion = client
        .dispatcher()
        .start(vec![Message::user("hi")], &options)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(completion.content.to_text(), "late");
}
