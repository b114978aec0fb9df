use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::client::chat::ExchangeOptions;
use crate::client::core::ChatClient;
use crate::client::execution::Exchange;
use crate::client::types::{CancelHandle, ExchangeHandle, StateCell};
use crate::types::message::Message;
use crate::{Error, Result};

/// Runs at most one exchange at a time.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: ChatClient,
    active: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// Start an exchange over an owned snapshot of the conversation.
    ///
    /// Fails with [`Error::Busy`] before any I/O if an exchange is still active.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, snapshot: Vec<Message>, options: &ExchangeOptions) -> Result<ExchangeHandle> {
        let slot = ActiveSlot::acquire(&self.active).ok_or(Error::Busy)?;

        let body = options.to_request(snapshot).to_body()?;
        let request_id = Uuid::new_v4().to_string();
        let request = self
            .client
            .build_http_request(body, options.streaming, &request_id);

        let cancel = CancelHandle::new();
        let (state, state_rx) = StateCell::new();
        let (updates, updates_rx) = mpsc::unbounded_channel();

        debug!(
            request_id = %request_id,
            model = %options.model,
            streaming = options.streaming,
            "starting exchange"
        );

        let exchange = Exchange {
            client: self.client.clone(),
            request,
            model: options.model.clone(),
            streaming: options.streaming,
            request_id: request_id.clone(),
            cancel: cancel.clone(),
            state,
            updates,
            slot,
        };
        tokio::spawn(exchange.run());

        Ok(ExchangeHandle::new(request_id, cancel, state_rx, updates_rx))
    }

    /// Request cooperative cancellation. Idempotent.
    pub fn cancel(&self, handle: &ExchangeHandle) {
        handle.cancel();
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Occupancy of the dispatcher's single exchange slot; released on drop.
#[derive(Debug)]
pub(crate) struct ActiveSlot {
    flag: Arc<AtomicBool>,
}

impl ActiveSlot {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { flag: flag.clone() })
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
