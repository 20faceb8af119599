//! Session ownership: at most one active device session at a time

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::{
    backend::{
        link_layer::{LinkEvent, LinkEventSender, LinkLayer},
        provisioning_client::{Completion, CompletionSender, ProvisioningClient},
    },
    core::{
        error::BridgeResult,
        event::EventSink,
        generation::{Generation, Tagged},
        lifecycle::{LifecycleStateMachine, Watchdog},
        types::LifecycleState,
    },
};

/// The exclusive binding to one connected device
#[derive(Debug)]
pub struct Session<C> {
    device_id: String,
    generation: Generation,
    pub(crate) client: C,
}

impl<C: ProvisioningClient> Session<C> {
    pub fn new(device_id: impl Into<String>, generation: Generation, client: C) -> Self {
        Self {
            device_id: device_id.into(),
            generation,
            client,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Release the client handle; close failures are logged, never propagated
    pub async fn close(self) {
        debug!(device = %self.device_id, generation = %self.generation, "Closing session");
        if let Err(e) = self.client.close().await {
            warn!("Closing session with {} failed: {}", self.device_id, e);
        }
    }
}

/// Session state shared by the session manager, dispatcher and controller
pub struct SessionSlot<C> {
    pub(crate) session: Option<Session<C>>,
    pub(crate) lifecycle: LifecycleStateMachine,
    next_generation: Generation,
}

/// Handle to the single session slot
pub type SharedSlot<C> = Arc<Mutex<SessionSlot<C>>>;

impl<C> SessionSlot<C> {
    pub fn new() -> Self {
        Self {
            session: None,
            lifecycle: LifecycleStateMachine::new(),
            next_generation: Generation::first(),
        }
    }

    pub fn shared() -> SharedSlot<C> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Whether `generation` belongs to the live session
    pub fn is_current(&self, generation: Generation) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    fn allocate_generation(&mut self) -> Generation {
        let generation = self.next_generation;
        self.next_generation = generation.next();
        generation
    }
}

impl<C> Default for SessionSlot<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the single active session
///
/// Replacing a session is a swap-and-release under the slot lock: the old
/// client is closed and its generation retired before the new one is opened.
pub struct SessionManager<L: LinkLayer> {
    link: Arc<L>,
    slot: SharedSlot<L::Client>,
    events: EventSink,
    watchdog: Watchdog<L::Client>,
    link_tx: mpsc::UnboundedSender<Tagged<LinkEvent>>,
    completion_tx: mpsc::UnboundedSender<Tagged<Completion>>,
}

impl<L: LinkLayer> SessionManager<L> {
    pub fn new(
        link: Arc<L>,
        slot: SharedSlot<L::Client>,
        events: EventSink,
        watchdog: Watchdog<L::Client>,
        link_tx: mpsc::UnboundedSender<Tagged<LinkEvent>>,
        completion_tx: mpsc::UnboundedSender<Tagged<Completion>>,
    ) -> Self {
        Self {
            link,
            slot,
            events,
            watchdog,
            link_tx,
            completion_tx,
        }
    }

    /// Open a session to `device_id`, closing any existing one first
    ///
    /// Returns once the link layer accepted the request; link establishment
    /// is reported later as a `ConnectionStatus` event.
    pub async fn connect(&self, device_id: &str) -> BridgeResult<()> {
        let mut slot = self.slot.lock().await;

        if let Some(previous) = slot.session.take() {
            self.events.log(format!(
                "Closing session with {} before connecting to {}",
                previous.device_id(),
                device_id
            ));
            previous.close().await;
        }
        slot.lifecycle.reset();

        let generation = slot.allocate_generation();
        let client = match self
            .link
            .open(
                device_id,
                LinkEventSender::new(generation, self.link_tx.clone()),
                CompletionSender::new(generation, self.completion_tx.clone()),
            )
            .await
        {
            Ok(client) => client,
            Err(e) => {
                warn!("Connect to {} failed: {}", device_id, e);
                self.events
                    .log(format!("Connect to {} failed: {}", device_id, e));
                return Err(e.into());
            }
        };

        slot.session = Some(Session::new(device_id, generation, client));
        slot.lifecycle.begin_connect();
        self.watchdog.arm(generation, slot.lifecycle.ticket());

        info!(device = device_id, %generation, "Session created");
        self.events.log(format!("Connecting to {}", device_id));
        Ok(())
    }

    /// Close the current session if any and return to `Idle`
    pub async fn disconnect(&self) {
        let mut slot = self.slot.lock().await;

        let previous_state = slot.lifecycle.state();
        match slot.session.take() {
            Some(session) => {
                self.events
                    .log(format!("Disconnecting from {}", session.device_id()));
                session.close().await;
            }
            None if previous_state != LifecycleState::Idle => {
                self.events.log("Session reset to idle");
            }
            None => {
                debug!("Disconnect without active session");
            }
        }
        slot.lifecycle.reset();
    }

    pub async fn state(&self) -> LifecycleState {
        self.slot.lock().await.lifecycle.state()
    }

    /// Identifier of the device bound to the current session
    pub async fn device_id(&self) -> Option<String> {
        self.slot
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.device_id().to_string())
    }

    pub async fn generation(&self) -> Option<Generation> {
        self.slot
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock_backend::{ClientCall, MockLinkLayer, MockProvisioningClient};
    use pretty_assertions::assert_eq;

    fn manager(
        link: Arc<MockLinkLayer>,
    ) -> (
        SessionManager<MockLinkLayer>,
        SharedSlot<MockProvisioningClient>,
    ) {
        let slot = SessionSlot::shared();
        let events = EventSink::new();
        let watchdog = Watchdog::new(slot.clone(), events.clone(), None);
        let (link_tx, _link_rx) = mpsc::unbounded_channel();
        let (completion_tx, _completion_rx) = mpsc::unbounded_channel();
        (
            SessionManager::new(link, slot.clone(), events, watchdog, link_tx, completion_tx),
            slot,
        )
    }

    #[test]
    fn test_slot_tracks_current_generation() {
        let mut slot: SessionSlot<MockProvisioningClient> = SessionSlot::new();
        let first = slot.allocate_generation();
        let second = slot.allocate_generation();
        assert!(second > first);
        assert!(!slot.is_current(first));

        slot.session = Some(Session::new("dev", second, MockProvisioningClient::new()));
        assert!(slot.is_current(second));
        assert!(!slot.is_current(first));
    }

    #[tokio::test]
    async fn test_connect_swaps_and_releases() {
        let link = Arc::new(MockLinkLayer::new());
        let (manager, slot) = manager(link.clone());

        manager.connect("a").await.unwrap();
        let first_generation = manager.generation().await.unwrap();
        manager.connect("b").await.unwrap();

        let connections = link.connections().await;
        assert_eq!(connections.len(), 2);
        assert_eq!(connections[0].client.calls().await, vec![ClientCall::Close]);
        assert!(connections[1].client.calls().await.is_empty());

        let slot = slot.lock().await;
        assert!(!slot.is_current(first_generation));
        assert!(slot.is_current(connections[1].link_events.generation()));
        assert_eq!(slot.lifecycle.state(), LifecycleState::Connecting);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_idle_slot() {
        let link = Arc::new(MockLinkLayer::new());
        let (manager, _) = manager(link.clone());

        manager.connect("a").await.unwrap();
        link.set_adapter_available(false).await;
        assert!(manager.connect("b").await.is_err());

        assert_eq!(manager.state().await, LifecycleState::Idle);
        assert!(manager.device_id().await.is_none());
        assert!(link.connections().await[0].client.is_closed().await);
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_noop() {
        let link = Arc::new(MockLinkLayer::new());
        let (manager, _) = manager(link);

        manager.disconnect().await;
        assert_eq!(manager.state().await, LifecycleState::Idle);
    }
}
