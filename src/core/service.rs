//! Provisioning bridge facade

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    backend::{
        link_layer::{LinkEvent, LinkLayer},
        local_scan::LocalScanFacility,
        provisioning_client::{Completion, ProvisioningClient},
    },
    core::{
        dispatcher::CommandDispatcher,
        error::{BridgeError, BridgeResult},
        event::{EventSink, EventStream},
        generation::Tagged,
        lifecycle::{LifecycleController, Watchdog},
        scan::{LocalScanRequest, WifiScanAggregator},
        session::{SessionManager, SessionSlot},
        types::{LifecycleState, MAX_TRANSFER_UNIT},
    },
};

/// Tunables of the bridge core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Transfer unit requested right after the link comes up
    pub transfer_unit: u16,
    /// Bound on waiting for a completion; `None` waits forever
    pub completion_timeout: Option<Duration>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            transfer_unit: MAX_TRANSFER_UNIT,
            completion_timeout: None,
        }
    }
}

/// Result of a combined WiFi scan request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiScanRequest {
    /// Why the device-side scan was not requested, if it wasn't
    pub device: Result<(), BridgeError>,
    pub local: LocalScanRequest,
}

/// Main provisioning bridge facade
///
/// Orchestrates session ownership, command dispatch and scanning. All
/// link and completion notifications are serialized through one pump task.
pub struct ProvisioningBridge<L: LinkLayer, S: LocalScanFacility> {
    pub sessions: Arc<SessionManager<L>>,
    pub dispatcher: Arc<CommandDispatcher<L::Client>>,
    pub scanner: Arc<WifiScanAggregator<S>>,
    events: EventSink,
    pump: JoinHandle<()>,
}

impl<L: LinkLayer, S: LocalScanFacility> ProvisioningBridge<L, S> {
    /// Create a bridge and start its notification pump
    pub fn new(link: Arc<L>, facility: Arc<S>, settings: BridgeSettings) -> Self {
        let events = EventSink::new();
        let slot = SessionSlot::shared();
        let watchdog = Watchdog::new(slot.clone(), events.clone(), settings.completion_timeout);

        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let sessions = Arc::new(SessionManager::new(
            link,
            slot.clone(),
            events.clone(),
            watchdog.clone(),
            link_tx,
            completion_tx,
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            slot.clone(),
            events.clone(),
            watchdog.clone(),
        ));
        let scanner = Arc::new(WifiScanAggregator::new(
            facility,
            events.clone(),
            settings.completion_timeout,
        ));

        let controller = LifecycleController::new(
            slot,
            events.clone(),
            watchdog,
            settings.transfer_unit.min(MAX_TRANSFER_UNIT),
        );
        let pump = tokio::spawn(run_pump(controller, link_rx, completion_rx));

        Self {
            sessions,
            dispatcher,
            scanner,
            events,
            pump,
        }
    }

    /// Subscribe to the ordered event stream
    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    pub async fn connect(&self, device_id: &str) -> BridgeResult<()> {
        self.sessions.connect(device_id).await
    }

    pub async fn disconnect(&self) {
        self.sessions.disconnect().await
    }

    pub async fn negotiate_security(&self) -> BridgeResult<()> {
        self.dispatcher.negotiate_security().await
    }

    pub async fn set_operating_mode(&self, mode: i32) -> BridgeResult<()> {
        self.dispatcher.set_operating_mode(mode).await
    }

    pub async fn configure_wifi_station(&self, ssid: &[u8], password: &str) -> BridgeResult<()> {
        self.dispatcher.configure_wifi_station(ssid, password).await
    }

    pub async fn post_custom_data(&self, data: &[u8]) -> BridgeResult<()> {
        self.dispatcher.post_custom_data(data).await
    }

    pub async fn request_device_status(&self) -> BridgeResult<()> {
        self.dispatcher.request_device_status().await
    }

    pub async fn request_device_version(&self) -> BridgeResult<()> {
        self.dispatcher.request_device_version().await
    }

    /// Scan from both sources at once
    ///
    /// Never fails: each source reports through its own `ScanResult` event,
    /// and the local scan runs even without a device session.
    pub async fn request_wifi_scan(&self) -> WifiScanRequest {
        let (device, local) = tokio::join!(
            self.dispatcher.request_device_wifi_scan(),
            self.scanner.request_local_scan()
        );

        match &device {
            Ok(()) => {}
            Err(BridgeError::NoActiveSession) => {
                debug!("No session, skipping device-side scan");
                self.events
                    .log("No active session, scanning locally only");
            }
            Err(e) => warn!("Device-side scan not requested: {}", e),
        }

        WifiScanRequest { device, local }
    }

    pub async fn state(&self) -> LifecycleState {
        self.sessions.state().await
    }

    pub async fn device_id(&self) -> Option<String> {
        self.sessions.device_id().await
    }
}

impl<L: LinkLayer, S: LocalScanFacility> Drop for ProvisioningBridge<L, S> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Serialize link events and completions into the lifecycle controller
async fn run_pump<C: ProvisioningClient>(
    controller: LifecycleController<C>,
    mut link_rx: UnboundedReceiver<Tagged<LinkEvent>>,
    mut completion_rx: UnboundedReceiver<Tagged<Completion>>,
) {
    loop {
        tokio::select! {
            biased;
            Some(event) = link_rx.recv() => controller.handle_link_event(event).await,
            Some(completion) = completion_rx.recv() => controller.handle_completion(completion).await,
            else => break,
        }
    }
    debug!("Notification pump stopped");
}
