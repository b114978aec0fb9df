//! In-memory transport whose responses are queued by the test.

use ai_chat_core::transport::{HttpRequest, HttpResponse, StreamingResponse, Transport};
use ai_chat_core::{ChatClient, Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub type LineSender = mpsc::UnboundedSender<Result<String>>;

enum Script {
    Json { status: u16, body: Value },
    Stream {
        status: u16,
        lines: mpsc::UnboundedReceiver<Result<String>>,
    },
    Hang,
    Fail(Error),
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(Script::Json { status, body });
    }

    /// A stream whose lines are all available up front.
    pub fn push_lines(&self, status: u16, lines: Vec<String>) {
        let tx = self.push_stream(status);
        for line in lines {
            tx.send(Ok(line)).unwrap();
        }
    }

    /// A stream fed by the test; dropping the sender ends the body.
    pub fn push_stream(&self, status: u16) -> LineSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Script::Stream { status, lines: rx });
        tx
    }

    /// A request that never gets an answer.
    pub fn push_hang(&self) {
        self.push(Script::Hang);
    }

    pub fn push_failure(&self, error: Error) {
        self.push(Script::Fail(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    fn next(&self, request: HttpRequest) -> Script {
        self.requests.lock().unwrap().push(request);
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted response left")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        match self.next(request) {
            Script::Json { status, body } => Ok(HttpResponse {
                status,
                body: Bytes::from(body.to_string()),
            }),
            Script::Hang => futures::future::pending().await,
            Script::Fail(e) => Err(e),
            Script::Stream { .. } => panic!("scripted a stream for a buffered request"),
        }
    }

    async fn post_streaming(&self, request: HttpRequest) -> Result<StreamingResponse> {
        match self.next(request) {
            Script::Stream { status, lines } => Ok(StreamingResponse {
                status,
                lines: Box::pin(UnboundedReceiverStream::new(lines)),
            }),
            Script::Hang => futures::future::pending().await,
            Script::Fail(e) => Err(e),
            Script::Json { .. } => panic!("scripted a buffered body for a stream"),
        }
    }
}

pub const READ_TIMEOUT: Duration = Duration::from_millis(200);
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(300);

pub fn client(transport: &Arc<ScriptedTransport>) -> ChatClient {
    ChatClient::builder()
        .base_url("http://scripted.test/v1")
        .model("test-model")
        .api_key("sk-test")
        .read_timeout(READ_TIMEOUT)
        .request_timeout(REQUEST_TIMEOUT)
        .transport(transport.clone())
        .build()
        .unwrap()
}

pub fn content_line(text: &str) -> String {
    format!(
        "data: {}",
        json!({"choices": [{"index": 0, "delta": {"content": text}}]})
    )
}

pub fn role_line() -> String {
    format!(
        "data: {}",
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]})
    )
}

pub fn done_line() -> String {
    "data: [DONE]".to_string()
}

pub fn completion_body(text: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
}
