//! In-process loopback device for development and integration testing
//!
//! Simulates a provisioning peer that accepts every request and answers
//! after a fixed latency. No radio is involved.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::{
    backend::{
        link_layer::{LinkEvent, LinkEventSender, LinkLayer},
        local_scan::{LocalScanFacility, ReceiverId, ReceiverRegistry, ScanCompletion},
        provisioning_client::{Completion, CompletionSender, ProvisioningClient},
    },
    core::{
        error::{ClientError, ClientResult, LinkError, LinkResult, ScanFacilityResult},
        types::{ConfigureParams, NetworkRecord, StatusSnapshot},
    },
};

/// Behavior of the simulated device and host radio
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    pub latency: Duration,
    pub adapter_available: bool,
    pub version: String,
    pub networks: Vec<NetworkRecord>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(100),
            adapter_available: true,
            version: "loopback-1.0".to_string(),
            networks: vec![
                NetworkRecord::new("loopback-home", -42),
                NetworkRecord::new("loopback-guest", -67),
            ],
        }
    }
}

/// Device identifiers are Bluetooth addresses, `aa:bb:cc:dd:ee:ff`
fn parse_address(device_id: &str) -> Option<[u8; 6]> {
    let parts: Vec<&str> = device_id.split(':').collect();
    if parts.len() != 6 || parts.iter().any(|p| p.len() != 2) {
        return None;
    }
    let bytes = hex::decode(parts.concat()).ok()?;
    bytes.try_into().ok()
}

/// Link layer that "connects" to any well-formed address
#[derive(Debug, Clone, Default)]
pub struct LoopbackLinkLayer {
    config: LoopbackConfig,
}

impl LoopbackLinkLayer {
    pub fn new(config: LoopbackConfig) -> Self {
        Self { config }
    }
}

impl LinkLayer for LoopbackLinkLayer {
    type Client = LoopbackClient;

    async fn open(
        &self,
        device_id: &str,
        link_events: LinkEventSender,
        completions: CompletionSender,
    ) -> LinkResult<Self::Client> {
        if !self.config.adapter_available {
            return Err(LinkError::AdapterUnavailable("loopback adapter disabled".to_string()));
        }
        let address =
            parse_address(device_id).ok_or_else(|| LinkError::DeviceNotFound(device_id.to_string()))?;
        debug!("Loopback link to {}", hex::encode(address));

        let client = LoopbackClient::spawn(self.config.clone(), completions);

        let latency = self.config.latency;
        let closed = client.closed.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            if !closed.load(Ordering::SeqCst) {
                link_events.send(LinkEvent::Connected { status: 0 });
            }
        });

        Ok(client)
    }
}

#[derive(Debug)]
enum Request {
    TransferUnit(u16),
    NegotiateSecurity,
    Configure(ConfigureParams),
    CustomData(Vec<u8>),
    Status,
    Version,
    Scan,
}

/// Provisioning client answering from an in-process worker
///
/// Requests are answered in submission order.
#[derive(Debug)]
pub struct LoopbackClient {
    requests: mpsc::UnboundedSender<Request>,
    closed: Arc<AtomicBool>,
}

impl LoopbackClient {
    fn spawn(config: LoopbackConfig, completions: CompletionSender) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        tokio::spawn(run_device(config, rx, completions, closed.clone()));
        Self {
            requests: tx,
            closed,
        }
    }

    fn submit(&self, request: Request) -> ClientResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        self.requests
            .send(request)
            .map_err(|_| ClientError::Closed)
    }
}

async fn run_device(
    config: LoopbackConfig,
    mut requests: mpsc::UnboundedReceiver<Request>,
    completions: CompletionSender,
    closed: Arc<AtomicBool>,
) {
    let mut status = StatusSnapshot {
        operating_mode: 0,
        sta_connection_status: 1,
    };

    while let Some(request) = requests.recv().await {
        tokio::time::sleep(config.latency).await;
        if closed.load(Ordering::SeqCst) {
            break;
        }

        match request {
            Request::TransferUnit(size) => {
                completions.send(Completion::TransferUnit { size, status: 0 });
            }
            Request::NegotiateSecurity => {
                completions.send(Completion::SecurityNegotiated { status: 0 });
            }
            Request::Configure(params) => {
                status.operating_mode = params.op_mode;
                if params.station.is_some() {
                    status.sta_connection_status = 0;
                }
                completions.send(Completion::ConfigurePosted { status: 0 });
            }
            Request::CustomData(data) => {
                completions.send(Completion::CustomDataPosted { status: 0 });
                completions.send(Completion::CustomDataReceived {
                    status: 0,
                    data: Some(data),
                });
            }
            Request::Status => {
                completions.send(Completion::DeviceStatus {
                    status: 0,
                    response: Some(status),
                });
            }
            Request::Version => {
                completions.send(Completion::DeviceVersion {
                    status: 0,
                    version: Some(config.version.clone()),
                });
            }
            Request::Scan => {
                completions.send(Completion::DeviceScan {
                    status: 0,
                    results: Some(config.networks.clone()),
                });
            }
        }
    }
    debug!("Loopback device stopped");
}

impl ProvisioningClient for LoopbackClient {
    async fn request_transfer_unit(&self, size: u16) -> ClientResult<()> {
        self.submit(Request::TransferUnit(size))
    }

    async fn negotiate_security(&self) -> ClientResult<()> {
        self.submit(Request::NegotiateSecurity)
    }

    async fn configure(&self, params: ConfigureParams) -> ClientResult<()> {
        self.submit(Request::Configure(params))
    }

    async fn post_custom_data(&self, data: Vec<u8>) -> ClientResult<()> {
        self.submit(Request::CustomData(data))
    }

    async fn request_device_status(&self) -> ClientResult<()> {
        self.submit(Request::Status)
    }

    async fn request_device_version(&self) -> ClientResult<()> {
        self.submit(Request::Version)
    }

    async fn request_device_wifi_scan(&self) -> ClientResult<()> {
        self.submit(Request::Scan)
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Host scan facility that always finds the configured networks
#[derive(Debug)]
pub struct LoopbackScanFacility {
    config: LoopbackConfig,
    radio: AtomicBool,
    registry: Arc<ReceiverRegistry>,
}

impl LoopbackScanFacility {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            radio: AtomicBool::new(true),
            registry: Arc::new(ReceiverRegistry::new()),
        }
    }
}

impl LocalScanFacility for LoopbackScanFacility {
    async fn radio_enabled(&self) -> ScanFacilityResult<bool> {
        Ok(self.radio.load(Ordering::SeqCst))
    }

    async fn enable_radio(&self) -> ScanFacilityResult<()> {
        self.radio.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn register_receiver(
        &self,
        receiver: oneshot::Sender<ScanCompletion>,
    ) -> ScanFacilityResult<ReceiverId> {
        Ok(self.registry.register(receiver))
    }

    fn unregister_receiver(&self, id: ReceiverId) -> ScanFacilityResult<()> {
        self.registry.unregister(id)
    }

    async fn start_scan(&self) -> ScanFacilityResult<bool> {
        let registry = self.registry.clone();
        let latency = self.config.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            registry.notify(ScanCompletion {
                results_updated: true,
            });
        });
        Ok(true)
    }

    async fn scan_results(&self) -> ScanFacilityResult<Vec<NetworkRecord>> {
        Ok(self.config.networks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        event::Event,
        service::{BridgeSettings, ProvisioningBridge},
        types::{LifecycleState, ScanSource},
    };
    use pretty_assertions::assert_eq;

    fn fast() -> LoopbackConfig {
        LoopbackConfig {
            latency: Duration::from_millis(5),
            ..LoopbackConfig::default()
        }
    }

    fn bridge(
        config: LoopbackConfig,
    ) -> ProvisioningBridge<LoopbackLinkLayer, LoopbackScanFacility> {
        ProvisioningBridge::new(
            Arc::new(LoopbackLinkLayer::new(config.clone())),
            Arc::new(LoopbackScanFacility::new(config)),
            BridgeSettings::default(),
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("24:0A:c4:00:11:ff"),
            Some([0x24, 0x0a, 0xc4, 0x00, 0x11, 0xff])
        );
        assert_eq!(parse_address("24:0a:c4:00:11"), None);
        assert_eq!(parse_address("24:0a:c4:00:11:zz"), None);
        assert_eq!(parse_address("240ac40011ff"), None);
    }

    #[tokio::test]
    async fn test_loopback_provisioning_flow() {
        let bridge = bridge(fast());
        let mut stream = bridge.subscribe();

        bridge.connect("24:0a:c4:00:11:ff").await.unwrap();
        settle().await;
        assert_eq!(bridge.state().await, LifecycleState::Connected);

        bridge.negotiate_security().await.unwrap();
        settle().await;
        assert_eq!(bridge.state().await, LifecycleState::SecurityReady);

        bridge.configure_wifi_station(b"home", "pw").await.unwrap();
        bridge.post_custom_data(b"ping").await.unwrap();
        bridge.request_device_status().await.unwrap();
        settle().await;

        let events = stream.drain();
        assert!(events.contains(&Event::ConfigureResult { status: 0 }));
        assert!(events.contains(&Event::CustomData {
            data: "ping".to_string()
        }));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::DeviceStatus(s) if s.sta_connection_status == 0
        )));
    }

    #[tokio::test]
    async fn test_loopback_rejects_malformed_address() {
        let bridge = bridge(fast());
        assert!(bridge.connect("not-an-address").await.is_err());
        assert_eq!(bridge.state().await, LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_loopback_scan_reports_both_sources() {
        let bridge = bridge(fast());
        let mut stream = bridge.subscribe();
        bridge.connect("24:0a:c4:00:11:ff").await.unwrap();
        settle().await;

        bridge.request_wifi_scan().await;
        settle().await;

        let sources: Vec<ScanSource> = stream
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::ScanResult { source, .. } => Some(source),
                _ => None,
            })
            .collect();
        assert!(sources.contains(&ScanSource::Device));
        assert!(sources.contains(&ScanSource::Local));
    }

    #[tokio::test]
    async fn test_closed_client_rejects_submissions() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = LoopbackClient::spawn(
            fast(),
            CompletionSender::new(crate::core::generation::Generation::first(), tx),
        );

        client.close().await.unwrap();
        assert_eq!(
            client.request_device_version().await,
            Err(ClientError::Closed)
        );
    }
}
