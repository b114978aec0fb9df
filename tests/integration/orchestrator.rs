//! Conversation scenarios end to end over the scripted transport.

use crate::scripted_transport::{
    client, completion_body, content_line, done_line, role_line, ScriptedTransport, READ_TIMEOUT,
};
use ai_chat_core::conversation::{CANCELLED_MARKER, ERROR_MARKER, PLACEHOLDER_TEXT};
use ai_chat_core::{
    Conversation, ConversationStore, Error, ErrorOutcome, ExchangeState, InMemoryStore, Message,
    MessageRole, Orchestrator,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn error_text(outcome: &ErrorOutcome) -> String {
    format!("{} {}", ERROR_MARKER, outcome.message())
}

async fn wait_for_state(chat: &Orchestrator, state: ExchangeState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while chat.exchange_state() != Some(state) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
}

fn non_streaming(chat: Orchestrator) -> Orchestrator {
    let options = chat.options().clone().streaming(false);
    chat.with_options(options)
}

#[tokio::test]
async fn test_non_streaming_hi_hello() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, completion_body("hello"));
    let mut chat = non_streaming(Orchestrator::new(&client(&transport)));

    chat.submit_user_turn("hi", None).unwrap();
    assert_eq!(
        chat.messages(),
        &[Message::user("hi"), Message::assistant(PLACEHOLDER_TEXT)]
    );

    chat.run_until_idle().await;
    assert_eq!(
        chat.messages(),
        &[Message::user("hi"), Message::assistant("hello")]
    );
    assert!(!chat.is_busy());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].body,
        json!({
            "model": "test-model",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": false
        })
    );
    assert_eq!(requests[0].url, "http://scripted.test/v1/chat/completions");
    assert_eq!(requests[0].header("authorization"), Some("Bearer sk-test"));
    assert!(requests[0].header("x-request-id").is_some());
}

#[tokio::test]
async fn test_streaming_hi_exclamation() {
    let transport = ScriptedTransport::new();
    transport.push_lines(
        200,
        vec![
            role_line(),
            content_line("h"),
            content_line("i"),
            content_line("!"),
            done_line(),
        ],
    );
    let mut chat = Orchestrator::new(&client(&transport));
    let messages_rx = chat.subscribe_messages();

    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;

    let expected = [Message::user("hi"), Message::assistant("hi!")];
    assert_eq!(chat.messages(), &expected);
    assert_eq!(messages_rx.borrow().as_slice(), &expected);
    assert_eq!(transport.requests()[0].body["stream"], json!(true));
    assert_eq!(
        transport.requests()[0].header("accept"),
        Some("text/event-stream")
    );
}

#[tokio::test]
async fn test_streaming_deltas_replace_one_turn() {
    let transport = ScriptedTransport::new();
    transport.push_lines(200, vec![content_line("Hel"), content_line("lo"), done_line()]);
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("greet me", None).unwrap();

    assert!(chat.process_next_update().await);
    assert_eq!(chat.messages().len(), 2);
    assert_eq!(chat.messages()[1], Message::assistant("Hel"));

    assert!(chat.process_next_update().await);
    assert_eq!(chat.messages()[1], Message::assistant("Hello"));

    chat.run_until_idle().await;
    assert_eq!(
        chat.messages(),
        &[Message::user("greet me"), Message::assistant("Hello")]
    );
    assert!(!chat.process_next_update().await);
}

#[tokio::test]
async fn test_submit_while_pending_is_rejected() {
    let transport = ScriptedTransport::new();
    let _lines = transport.push_stream(200);
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("first", None).unwrap();
    let before = chat.messages().to_vec();

    let err = chat.submit_user_turn("second", None).unwrap_err();
    assert!(matches!(err, Error::Busy));
    assert_eq!(chat.messages(), before.as_slice());
    assert_eq!(transport.requests().len(), 1);

    chat.cancel_current_request();
    chat.run_until_idle().await;
}

#[tokio::test]
async fn test_stream_timeout_before_any_bytes() {
    let transport = ScriptedTransport::new();
    transport.push_hang();
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;

    assert_eq!(chat.messages().len(), 2);
    assert_eq!(chat.messages()[1], Message::assistant(error_text(&ErrorOutcome::Timeout)));
}

#[tokio::test]
async fn test_read_timeout_mid_stream_keeps_partial_text() {
    let transport = ScriptedTransport::new();
    let lines = transport.push_stream(200);
    lines.send(Ok(content_line("partial"))).unwrap();
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;

    assert_eq!(
        chat.messages()[1].text(),
        format!("partial\n\n{}", error_text(&ErrorOutcome::Timeout))
    );
    drop(lines);
}

#[tokio::test]
async fn test_keep_alive_comments_reset_read_timeout() {
    let transport = ScriptedTransport::new();
    let lines = transport.push_stream(200);
    let mut chat = Orchestrator::new(&client(&transport));

    // Silent for longer than the read timeout overall, but never between two lines.
    tokio::spawn(async move {
        for _ in 0..5 {
            tokio::time::sleep(READ_TIMEOUT / 2).await;
            let _ = lines.send(Ok(": keep-alive".to_string()));
        }
        let _ = lines.send(Ok(String::new()));
        let _ = lines.send(Ok(content_line("ok")));
        let _ = lines.send(Ok(done_line()));
    });

    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;

    assert_eq!(chat.messages(), &[Message::user("hi"), Message::assistant("ok")]);
}

#[tokio::test]
async fn test_non_streaming_wall_clock_timeout() {
    let transport = ScriptedTransport::new();
    transport.push_hang();
    let mut chat = non_streaming(Orchestrator::new(&client(&transport)));

    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;

    assert_eq!(chat.messages().len(), 2);
    assert_eq!(chat.messages()[1].text(), error_text(&ErrorOutcome::Timeout));
}

#[tokio::test]
async fn test_cancel_after_two_of_five_chunks() {
    let transport = ScriptedTransport::new();
    let lines = transport.push_stream(200);
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("count", None).unwrap();
    lines.send(Ok(content_line("one "))).unwrap();
    lines.send(Ok(content_line("two "))).unwrap();
    assert!(chat.process_next_update().await);
    assert!(chat.process_next_update().await);
    assert_eq!(chat.messages()[1].text(), "one two ");

    chat.cancel_current_request();
    for word in ["three ", "four ", "five"] {
        let _ = lines.send(Ok(content_line(word)));
    }
    let _ = lines.send(Ok(done_line()));
    chat.run_until_idle().await;

    assert_eq!(chat.messages().len(), 2);
    assert_eq!(
        chat.messages()[1].text(),
        format!("one two \n\n{}", CANCELLED_MARKER)
    );
    assert!(!chat.is_busy());
    // The response body was dropped with the exchange.
    assert!(lines.is_closed());
}

#[tokio::test]
async fn test_cancel_twice_equals_once() {
    let transport = ScriptedTransport::new();
    let lines = transport.push_stream(200);
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("hi", None).unwrap();
    wait_for_state(&chat, ExchangeState::Streaming).await;
    chat.cancel_current_request();
    chat.cancel_current_request();
    chat.run_until_idle().await;

    assert_eq!(
        chat.messages(),
        &[Message::user("hi"), Message::assistant(CANCELLED_MARKER)]
    );
    assert!(lines.is_closed());

    // Idle again: cancelling is a no-op and a new turn is accepted.
    chat.cancel_current_request();
    transport.push_lines(200, vec![content_line("ok"), done_line()]);
    chat.submit_user_turn("again", None).unwrap();
    chat.run_until_idle().await;
    assert_eq!(chat.messages().len(), 4);
    assert_eq!(chat.messages()[3], Message::assistant("ok"));
}

#[tokio::test]
async fn test_malformed_chunk_is_skipped() {
    let transport = ScriptedTransport::new();
    transport.push_lines(
        200,
        vec![
            content_line("valid"),
            "data: {not json".to_string(),
            done_line(),
        ],
    );
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;

    assert_eq!(chat.messages()[1], Message::assistant("valid"));
}

#[tokio::test]
async fn test_server_errors_become_assistant_turns() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        500,
        json!({"error": {"message": "internal", "type": "server_error"}}),
    );
    let mut chat = non_streaming(Orchestrator::new(&client(&transport)));
    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;
    assert_eq!(
        chat.messages()[1].text(),
        error_text(&ErrorOutcome::ServerError { status: 500 })
    );

    let transport = ScriptedTransport::new();
    transport.push_lines(
        401,
        vec![r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#.to_string()],
    );
    let mut chat = Orchestrator::new(&client(&transport));
    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;
    assert_eq!(
        chat.messages()[1].text(),
        error_text(&ErrorOutcome::ClientError { status: 401 })
    );
}

#[tokio::test]
async fn test_inband_stream_error_appends_marker() {
    let transport = ScriptedTransport::new();
    transport.push_lines(
        200,
        vec![
            content_line("Hel"),
            r#"data: {"error":{"message":"overloaded"}}"#.to_string(),
            content_line("never"),
        ],
    );
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;

    let outcome = ErrorOutcome::Unexpected {
        message: "overloaded".to_string(),
    };
    assert_eq!(
        chat.messages()[1].text(),
        format!("Hel\n\n{}", error_text(&outcome))
    );
}

#[tokio::test]
async fn test_network_failure() {
    let transport = ScriptedTransport::new();
    transport.push_failure(Error::Transport(
        ai_chat_core::transport::TransportError::Other("connection refused".to_string()),
    ));
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;

    assert_eq!(
        chat.messages()[1].text(),
        error_text(&ErrorOutcome::NetworkError)
    );
}

#[tokio::test]
async fn test_system_prompt_is_sent_but_not_stored() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, completion_body("first answer"));
    transport.push_json(200, completion_body("second answer"));
    let mut chat = non_streaming(Orchestrator::new(&client(&transport)));

    chat.submit_user_turn("one", Some("be brief")).unwrap();
    chat.run_until_idle().await;
    chat.submit_user_turn("two", Some("be brief")).unwrap();
    chat.run_until_idle().await;

    assert_eq!(chat.messages().len(), 4);
    assert!(chat
        .messages()
        .iter()
        .all(|m| m.role() != MessageRole::System));

    let second = &transport.requests()[1].body["messages"];
    assert_eq!(
        second,
        &json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "one"},
            {"role": "assistant", "content": "first answer"},
            {"role": "user", "content": "two"}
        ])
    );
}

#[tokio::test]
async fn test_streamed_tool_calls_are_assembled() {
    let transport = ScriptedTransport::new();
    transport.push_lines(
        200,
        vec![
            r#"data: {"choices":[{"index":0,"delta":{"role":"assistant","content":null,"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_weather","arguments":""}}]}}]}"#.to_string(),
            r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":\"Paris\"}"}}]}}]}"#.to_string(),
            done_line(),
        ],
    );
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("weather?", None).unwrap();
    chat.run_until_idle().await;

    let answer = &chat.messages()[1];
    assert_eq!(answer.text(), "");
    assert_eq!(answer.tool_calls().len(), 1);
    assert_eq!(answer.tool_calls()[0].name, "get_weather");
    assert_eq!(answer.tool_calls()[0].arguments, json!({"city": "Paris"}));
}

#[tokio::test]
async fn test_busy_flag_is_observable() {
    let transport = ScriptedTransport::new();
    transport.push_lines(200, vec![content_line("x"), done_line()]);
    let mut chat = Orchestrator::new(&client(&transport));
    let busy = chat.subscribe_busy();

    assert!(!*busy.borrow());
    chat.submit_user_turn("hi", None).unwrap();
    assert!(*busy.borrow());
    chat.run_until_idle().await;
    assert!(!*busy.borrow());
}

#[tokio::test]
async fn test_remove_message_rejected_while_busy() {
    let transport = ScriptedTransport::new();
    let lines = transport.push_stream(200);
    let mut chat = Orchestrator::new(&client(&transport));

    chat.submit_user_turn("hi", None).unwrap();
    assert!(matches!(chat.remove_message(0), Err(Error::Busy)));

    lines.send(Ok(done_line())).unwrap();
    chat.run_until_idle().await;

    let removed = chat.remove_message(0).unwrap();
    assert_eq!(removed, Message::user("hi"));
    assert_eq!(chat.messages().len(), 1);
    assert!(chat.remove_message(5).is_err());
}

#[tokio::test]
async fn test_conversation_is_persisted_and_resumed() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, completion_body("hello"));
    let store = Arc::new(InMemoryStore::new());
    let client = client(&transport);

    let mut chat = non_streaming(Orchestrator::with_store(&client, store.clone()));
    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;
    let id = chat.id().to_string();

    // Saving happens on a background task.
    let saved = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(conv) = store.get(&id).await {
                return conv;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(saved.messages(), chat.messages());

    let resumed = Orchestrator::resume(&client, store.clone(), &id).await.unwrap();
    assert_eq!(resumed.id(), id);
    assert_eq!(resumed.messages(), chat.messages());

    assert!(Orchestrator::resume(&client, store, "missing").await.is_err());
}

/// Takes a while on its first save, then records every snapshot it is given.
#[derive(Default)]
struct SlowFirstSaveStore {
    calls: AtomicUsize,
    saved: Mutex<Vec<Conversation>>,
}

#[async_trait]
impl ConversationStore for SlowFirstSaveStore {
    async fn save(&self, conversation: &Conversation) -> ai_chat_core::Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        self.saved.lock().unwrap().push(conversation.clone());
        Ok(())
    }

    async fn load(&self, _id: &str) -> ai_chat_core::Result<Option<Conversation>> {
        Ok(self.saved.lock().unwrap().last().cloned())
    }
}

#[tokio::test]
async fn test_saves_land_in_order() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, completion_body("hello"));
    let store = Arc::new(SlowFirstSaveStore::default());
    let mut chat = non_streaming(Orchestrator::with_store(&client(&transport), store.clone()));

    chat.submit_user_turn("hi", None).unwrap();
    chat.run_until_idle().await;
    chat.remove_message(1).unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while store.saved.lock().unwrap().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let saved = store.saved.lock().unwrap().clone();
    assert_eq!(saved[0].len(), 2);
    assert_eq!(saved[1].messages(), &[Message::user("hi")]);
    assert_eq!(store.load(chat.id()).await.unwrap().as_ref(), Some(chat.conversation()));
}

#[tokio::test]
async fn test_noop_store_load_is_empty() {
    let store = ai_chat_core::conversation::noop_store();
    assert!(store.load("any").await.unwrap().is_none());
}
