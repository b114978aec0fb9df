//! The exchange task: one request, run to a single terminal update.

use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::client::core::ChatClient;
use crate::client::dispatcher::ActiveSlot;
use crate::client::error_classification::classify;
use crate::client::types::{CancelHandle, Completion, ExchangeState, ExchangeUpdate, StateCell};
use crate::pipeline::SseDecoder;
use crate::protocol::{error_message_from_body, ChatCompletionResponse};
use crate::transport::lines::with_read_timeout;
use crate::transport::HttpRequest;
use crate::types::events::StreamEvent;
use crate::types::message::MessageContent;
use crate::types::outcome::ErrorOutcome;
use crate::utils::ToolCallAssembler;
use crate::{BoxStream, Error, ErrorContext, Result};

/// Upper bound on lines read from a failed streaming response.
const MAX_ERROR_BODY_LINES: usize = 64;

pub(crate) struct Exchange {
    pub(crate) client: ChatClient,
    pub(crate) request: HttpRequest,
    pub(crate) model: String,
    pub(crate) streaming: bool,
    pub(crate) request_id: String,
    pub(crate) cancel: CancelHandle,
    pub(crate) state: StateCell,
    pub(crate) updates: mpsc::UnboundedSender<ExchangeUpdate>,
    pub(crate) slot: ActiveSlot,
}

impl Exchange {
    pub(crate) async fn run(self) {
        let Exchange {
            client,
            request,
            model,
            streaming,
            request_id,
            cancel,
            state,
            updates,
            slot,
        } = self;

        let start = Instant::now();
        let mut run = Run {
            client: &client,
            cancel: &cancel,
            state: &state,
            updates: &updates,
            http_status: None,
        };
        let result = if streaming {
            run.streaming(request).await
        } else {
            run.full(request).await
        };
        let http_status = run.http_status;

        let result: std::result::Result<Completion, ErrorOutcome> = match result {
            // Once cancellation is requested nothing else is reported.
            _ if cancel.is_cancelled() => Err(ErrorOutcome::Cancelled),
            Ok(completion) => Ok(completion),
            Err(e) => {
                let outcome = classify(&e);
                if !outcome.is_cancelled() {
                    warn!(
                        request_id = request_id.as_str(),
                        http_status,
                        error = %e,
                        outcome = outcome.tag(),
                        "exchange failed"
                    );
                }
                Err(outcome)
            }
        };

        let terminal = match &result {
            Ok(_) => ExchangeState::Succeeded,
            Err(ErrorOutcome::Cancelled) => ExchangeState::Cancelled,
            Err(_) => ExchangeState::Failed,
        };
        state.advance(terminal);

        info!(
            request_id = request_id.as_str(),
            model = model.as_str(),
            streaming,
            http_status,
            outcome = result.as_ref().map(|_| "success").unwrap_or_else(|o| o.tag()),
            duration_ms = start.elapsed().as_millis(),
            "exchange finished"
        );

        // Free the slot before reporting, so the receiver can start the next exchange
        // as soon as it sees the result.
        drop(slot);
        let _ = updates.send(ExchangeUpdate::Finished(result));
    }
}

struct Run<'a> {
    client: &'a ChatClient,
    cancel: &'a CancelHandle,
    state: &'a StateCell,
    updates: &'a mpsc::UnboundedSender<ExchangeUpdate>,
    http_status: Option<u16>,
}

impl Run<'_> {
    /// Single POST under a wall-clock deadline.
    async fn full(&mut self, request: HttpRequest) -> Result<Completion> {
        let deadline = self.client.request_timeout();
        let transport = self.client.transport().clone();
        let cancel = self.cancel.clone();

        self.state.advance(ExchangeState::Sent);
        self.state.advance(ExchangeState::AwaitingFullResponse);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            r = timeout(deadline, transport.post(request)) => {
                r.map_err(|_| timed_out(deadline))??
            }
        };
        self.http_status = Some(response.status);

        if !response.is_success() {
            let body = String::from_utf8_lossy(&response.body);
            return Err(Error::Remote {
                status: response.status,
                message: error_message_from_body(&body),
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_slice(&response.body)?;
        parsed.into_completion()
    }

    /// Streamed response under a per-read deadline.
    async fn streaming(&mut self, request: HttpRequest) -> Result<Completion> {
        let read_timeout = self.client.read_timeout();
        let transport = self.client.transport().clone();
        let cancel = self.cancel.clone();

        self.state.advance(ExchangeState::Sent);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            r = timeout(read_timeout, transport.post_streaming(request)) => {
                r.map_err(|_| timed_out(read_timeout))??
            }
        };
        self.http_status = Some(response.status);

        if !response.is_success() {
            let status = response.status;
            let body = collect_error_body(response.lines, read_timeout, &cancel).await;
            return Err(Error::Remote {
                status,
                message: error_message_from_body(&body),
            });
        }

        self.state.advance(ExchangeState::Streaming);
        let decoder = SseDecoder::new()
            .with_max_consecutive_malformed(self.client.config().max_consecutive_malformed);
        // The deadline applies to raw lines, so keep-alive comments reset it.
        let mut events = decoder.decode_stream(with_read_timeout(response.lines, read_timeout));
        let mut accumulated = String::new();
        let mut tool_calls = ToolCallAssembler::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = events.next() => next,
            };

            match next {
                None => {
                    warn!(
                        received_chars = accumulated.len(),
                        "stream ended without a [DONE] marker"
                    );
                    break;
                }
                Some(Err(e)) => return Err(e),
                Some(Ok(StreamEvent::ContentDelta { text })) => {
                    accumulated.push_str(&text);
                    let update = ExchangeUpdate::Delta {
                        fragment: text,
                        accumulated: accumulated.clone(),
                    };
                    if self.updates.send(update).is_err() {
                        // Nobody is listening anymore.
                        return Err(Error::Cancelled);
                    }
                }
                Some(Ok(StreamEvent::ToolCallDelta { index, partial })) => {
                    tool_calls.on_fragment(index, partial);
                }
                Some(Ok(StreamEvent::RoleAnnounced { role })) => {
                    debug!(role = role.as_str(), "role announced");
                }
                Some(Ok(StreamEvent::Done)) => break,
                Some(Ok(StreamEvent::ProtocolError { message })) => {
                    return Err(Error::runtime_with_context(
                        message,
                        ErrorContext::new().with_source("stream_decoder"),
                    ));
                }
            }
        }

        Ok(Completion {
            content: MessageContent::text(accumulated),
            tool_calls: tool_calls.finalize(),
            citations: Vec::new(),
            finish_reason: None,
            usage: None,
        })
    }
}

fn timed_out(after: Duration) -> Error {
    Error::Timeout {
        after_ms: after.as_millis() as u64,
    }
}

async fn collect_error_body(
    mut lines: BoxStream<'static, String>,
    per_read: Duration,
    cancel: &CancelHandle,
) -> String {
    let mut body = String::new();
    for _ in 0..MAX_ERROR_BODY_LINES {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = timeout(per_read, lines.next()) => r,
        };
        match next {
            Ok(Some(Ok(line))) => {
                if !body.is_empty() {
                    body.push('\n');
                }
                body.push_str(&line);
            }
            _ => break,
        }
    }
    body
}
