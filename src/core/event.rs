//! Event taxonomy and the single delivery funnel to the event consumer

use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::types::{
    LINK_STATE_CONNECTED, LINK_STATE_DISCONNECTED, Operation, ScanEntry, ScanSource,
    StatusSnapshot,
};

/// Events delivered to the event consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Link-layer connection changed (`state` 0 = disconnected, 2 = connected)
    ConnectionStatus { state: i32, status: i32 },

    /// Security negotiation finished
    SecurityResult { status: i32 },

    /// Configure parameters were posted
    ConfigureResult { status: i32 },

    /// Device status query answered
    DeviceStatus(StatusSnapshot),

    /// Device version query answered
    DeviceVersion { version: String },

    /// Custom data received from the device
    CustomData { data: String },

    /// One scan source delivered its result set
    ScanResult {
        source: ScanSource,
        entries: Vec<ScanEntry>,
    },

    /// Error reported by the provisioning client; code 0 is a no-op signal
    Error { code: i32, benign: bool },

    /// Diagnostic message
    LogLine { message: String },

    /// Status of a completion without a dedicated result kind
    Completed { operation: Operation, status: i32 },

    /// No completion arrived within the configured bound
    Timeout { operation: Operation },
}

impl Event {
    pub fn link_up(status: i32) -> Self {
        Event::ConnectionStatus {
            state: LINK_STATE_CONNECTED,
            status,
        }
    }

    pub fn link_down(status: i32) -> Self {
        Event::ConnectionStatus {
            state: LINK_STATE_DISCONNECTED,
            status,
        }
    }

    pub fn error(code: i32) -> Self {
        Event::Error {
            code,
            benign: code == 0,
        }
    }

    pub fn scan_result(source: ScanSource, entries: Vec<ScanEntry>) -> Self {
        Event::ScanResult { source, entries }
    }
}

/// Fan-out sink every asynchronous occurrence is funneled through
///
/// Emission holds the subscriber lock for the whole fan-out, so all
/// subscribers observe the same order, which is the order of `emit` calls.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<Event>>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber receiving every event emitted from now on
    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        EventStream { rx }
    }

    /// Deliver an event to all live subscribers
    pub fn emit(&self, event: Event) {
        match &event {
            Event::LogLine { message } => info!("{}", message),
            other => debug!(event = ?other, "Emitting event"),
        }

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Emit a diagnostic `LogLine`
    pub fn log(&self, message: impl Into<String>) {
        self.emit(Event::LogLine {
            message: message.into(),
        });
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

/// Ordered stream of events for one subscriber
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued so far
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
