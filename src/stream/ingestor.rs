//! Market stream ingestor
//!
//! Connects to the CLOB market WebSocket, sends one subscription naming
//! the full requested token set, and converts every inbound event into
//! snapshot records via the builder, persisting them as they arrive.
//! Failures at connection scope trigger backoff-and-reconnect; a
//! malformed message is dropped without touching the connection.

use super::{ConnState, EventCounters, StreamConfig};
use crate::snapshot::builder::{self, RawStreamMessage};
use crate::store::SnapshotStore;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// Subscription frame sent once per connection
#[derive(Debug, Serialize)]
struct SubscribeMessage {
    #[serde(rename = "type")]
    msg_type: &'static str,
    assets_ids: Vec<String>,
}

/// Long-lived WebSocket ingestor feeding the snapshot store
pub struct StreamIngestor {
    config: StreamConfig,
    store: Arc<SnapshotStore>,
    cancel: CancellationToken,
    state: RwLock<ConnState>,
    counters: EventCounters,
    connect_attempts: AtomicU64,
}

impl StreamIngestor {
    pub fn new(config: StreamConfig, store: Arc<SnapshotStore>, cancel: CancellationToken) -> Self {
        Self {
            config,
            store,
            cancel,
            state: RwLock::new(ConnState::Disconnected),
            counters: EventCounters::default(),
            connect_attempts: AtomicU64::new(0),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnState {
        *self.state.read()
    }

    /// Per-kind event counters
    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    /// Number of connection attempts made so far
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    fn set_state(&self, next: ConnState) {
        let mut state = self.state.write();
        if *state != next {
            tracing::debug!(from = state.as_str(), to = next.as_str(), "Stream state change");
            *state = next;
        }
    }

    /// Run the ingest loop until the cancellation token fires
    ///
    /// Each pass makes exactly one connection attempt; any failure waits
    /// out the fixed backoff and re-enters `Connecting`. The loop itself
    /// never fails the caller.
    pub async fn run(&self, token_ids: &[String]) -> anyhow::Result<()> {
        if token_ids.is_empty() {
            tracing::warn!("No token ids to subscribe to, stream ingestor idle");
            return Ok(());
        }

        tracing::info!(
            token_count = token_ids.len(),
            url = %self.config.ws_url,
            "Starting market stream ingestor"
        );

        while !self.cancel.is_cancelled() {
            self.set_state(ConnState::Connecting);
            self.connect_attempts.fetch_add(1, Ordering::Relaxed);

            match self.connect_and_receive(token_ids).await {
                Ok(()) => {
                    // Only a cancellation exits the receive loop cleanly
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Market stream connection error");
                }
            }

            self.set_state(ConnState::Disconnected);
            if self.cancel.is_cancelled() {
                break;
            }

            tracing::info!(
                backoff = ?self.config.reconnect_backoff,
                "Reconnecting to market stream after backoff"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.config.reconnect_backoff) => {}
            }
        }

        self.set_state(ConnState::Disconnected);
        tracing::info!("Market stream ingestor stopped");
        Ok(())
    }

    /// One connection attempt: connect, subscribe, then receive until
    /// cancellation or failure
    async fn connect_and_receive(&self, token_ids: &[String]) -> anyhow::Result<()> {
        let (ws_stream, _response) = connect_async(&self.config.ws_url).await?;
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnState::Subscribed);
        let subscribe = SubscribeMessage {
            msg_type: "Market",
            assets_ids: token_ids.to_vec(),
        };
        write
            .send(Message::Text(serde_json::to_string(&subscribe)?))
            .await?;
        tracing::info!(tokens = token_ids.len(), "Subscribed to market stream");

        self.set_state(ConnState::Receiving);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.process_message(&text),
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) => {
                        anyhow::bail!("Server closed the connection");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => anyhow::bail!("Stream ended unexpectedly"),
                }
            }
        }
    }

    /// Handle one raw WebSocket frame
    ///
    /// The upstream multiplexes events for the whole subscribed token set
    /// over this connection and may batch several event objects into one
    /// frame. Decode failures are logged and dropped; the connection
    /// stays open.
    pub fn process_message(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid JSON in stream message");
                return;
            }
        };

        match value {
            Value::Array(events) => {
                for event in &events {
                    self.process_event(event);
                }
            }
            other => self.process_event(&other),
        }
    }

    fn process_event(&self, event: &Value) {
        let msg: RawStreamMessage = match serde_json::from_value(event.clone()) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable stream event");
                return;
            }
        };

        match msg.event_type.as_str() {
            "book" => {
                let snapshots = builder::decode_book(&msg);
                if !snapshots.is_empty() {
                    if let Err(e) = self.store.save_orderbook_snapshots(&snapshots) {
                        tracing::error!(error = %e, "Failed to persist book event");
                    }
                }
                self.counters.book.fetch_add(1, Ordering::Relaxed);
            }
            "price_change" => {
                let events = builder::decode_price_change(&msg);
                if !events.is_empty() {
                    if let Err(e) = self.store.save_price_change_events(&events) {
                        tracing::error!(error = %e, "Failed to persist price change events");
                    }
                }
                self.counters
                    .price_change
                    .fetch_add(events.len() as u64, Ordering::Relaxed);
            }
            "last_trade_price" => {
                let trade = builder::decode_trade(&msg);
                if let Err(e) = self.store.save_trade_snapshots(&[trade]) {
                    tracing::error!(error = %e, "Failed to persist trade event");
                }
                self.counters.last_trade_price.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.counters.other.fetch_add(1, Ordering::Relaxed);
            }
        }

        let total = self.counters.total();
        if total > 0 && total % 100 == 0 {
            self.counters.log_summary();
        }
    }
}
