//! Mock link layer, provisioning client and scan facility for testing

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::{Mutex, oneshot};

use crate::backend::{
    link_layer::{LinkEvent, LinkEventSender, LinkLayer},
    local_scan::{LocalScanFacility, ReceiverId, ReceiverRegistry, ScanCompletion},
    provisioning_client::{Completion, CompletionSender, ProvisioningClient},
};
use crate::core::error::{
    ClientError, ClientResult, LinkError, LinkResult, ScanError, ScanFacilityResult,
};
use crate::core::types::{ConfigureParams, NetworkRecord};

/// A submission recorded by the mock client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    TransferUnit(u16),
    NegotiateSecurity,
    Configure(ConfigureParams),
    PostCustomData(Vec<u8>),
    DeviceStatus,
    DeviceVersion,
    DeviceWifiScan,
    Close,
}

#[derive(Debug, Default)]
struct MockClientState {
    calls: Vec<ClientCall>,
    reject: bool,
    closed: bool,
}

/// Mock provisioning client recording every submission
#[derive(Debug, Clone, Default)]
pub struct MockProvisioningClient {
    inner: Arc<Mutex<MockClientState>>,
}

impl MockProvisioningClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the client to reject every submission
    pub async fn set_reject(&self, reject: bool) {
        self.inner.lock().await.reject = reject;
    }

    pub async fn calls(&self) -> Vec<ClientCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    async fn submit(&self, call: ClientCall) -> ClientResult<()> {
        let mut state = self.inner.lock().await;
        if state.closed {
            return Err(ClientError::Closed);
        }
        if state.reject {
            return Err(ClientError::Rejected("mock rejection".to_string()));
        }
        state.calls.push(call);
        Ok(())
    }
}

impl ProvisioningClient for MockProvisioningClient {
    async fn request_transfer_unit(&self, size: u16) -> ClientResult<()> {
        self.submit(ClientCall::TransferUnit(size)).await
    }

    async fn negotiate_security(&self) -> ClientResult<()> {
        self.submit(ClientCall::NegotiateSecurity).await
    }

    async fn configure(&self, params: ConfigureParams) -> ClientResult<()> {
        self.submit(ClientCall::Configure(params)).await
    }

    async fn post_custom_data(&self, data: Vec<u8>) -> ClientResult<()> {
        self.submit(ClientCall::PostCustomData(data)).await
    }

    async fn request_device_status(&self) -> ClientResult<()> {
        self.submit(ClientCall::DeviceStatus).await
    }

    async fn request_device_version(&self) -> ClientResult<()> {
        self.submit(ClientCall::DeviceVersion).await
    }

    async fn request_device_wifi_scan(&self) -> ClientResult<()> {
        self.submit(ClientCall::DeviceWifiScan).await
    }

    async fn close(&self) -> ClientResult<()> {
        let mut state = self.inner.lock().await;
        state.calls.push(ClientCall::Close);
        state.closed = true;
        Ok(())
    }
}

/// One `open` call on the mock link layer, with handles to drive it
#[derive(Debug, Clone)]
pub struct MockConnection {
    pub device_id: String,
    pub link_events: LinkEventSender,
    pub completions: CompletionSender,
    pub client: MockProvisioningClient,
}

impl MockConnection {
    pub fn link_up(&self, status: i32) {
        self.link_events.send(LinkEvent::Connected { status });
    }

    pub fn link_down(&self, status: i32) {
        self.link_events.send(LinkEvent::Disconnected { status });
    }

    pub fn complete(&self, completion: Completion) {
        self.completions.send(completion);
    }
}

#[derive(Debug)]
struct MockLinkState {
    adapter_available: bool,
    missing_devices: Vec<String>,
    reject_submissions: bool,
    connections: Vec<MockConnection>,
}

/// Mock link layer handing out recording clients
#[derive(Debug, Clone)]
pub struct MockLinkLayer {
    inner: Arc<Mutex<MockLinkState>>,
}

impl MockLinkLayer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockLinkState {
                adapter_available: true,
                missing_devices: vec![],
                reject_submissions: false,
                connections: vec![],
            })),
        }
    }

    pub async fn set_adapter_available(&self, available: bool) {
        self.inner.lock().await.adapter_available = available;
    }

    /// Make `device_id` fail to resolve
    pub async fn set_device_missing(&self, device_id: &str) {
        self.inner
            .lock()
            .await
            .missing_devices
            .push(device_id.to_string());
    }

    /// Clients opened from now on reject every submission
    pub async fn set_reject_submissions(&self, reject: bool) {
        self.inner.lock().await.reject_submissions = reject;
    }

    pub async fn connections(&self) -> Vec<MockConnection> {
        self.inner.lock().await.connections.clone()
    }

    pub async fn last_connection(&self) -> Option<MockConnection> {
        self.inner.lock().await.connections.last().cloned()
    }
}

impl Default for MockLinkLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkLayer for MockLinkLayer {
    type Client = MockProvisioningClient;

    async fn open(
        &self,
        device_id: &str,
        link_events: LinkEventSender,
        completions: CompletionSender,
    ) -> LinkResult<Self::Client> {
        let mut state = self.inner.lock().await;

        if !state.adapter_available {
            return Err(LinkError::AdapterUnavailable("mock adapter".to_string()));
        }
        if state.missing_devices.iter().any(|d| d == device_id) {
            return Err(LinkError::DeviceNotFound(device_id.to_string()));
        }

        let client = MockProvisioningClient::new();
        client.set_reject(state.reject_submissions).await;

        state.connections.push(MockConnection {
            device_id: device_id.to_string(),
            link_events,
            completions,
            client: client.clone(),
        });

        Ok(client)
    }
}

#[derive(Debug)]
struct MockScanState {
    radio_enabled: bool,
    start_result: ScanFacilityResult<bool>,
    cached_results: Vec<NetworkRecord>,
    fail_results: bool,
    start_calls: usize,
    enable_calls: usize,
}

/// Mock local scan facility; scans complete when the test calls `fire`
#[derive(Debug, Clone)]
pub struct MockScanFacility {
    inner: Arc<Mutex<MockScanState>>,
    registry: Arc<ReceiverRegistry>,
    fail_unregister: Arc<AtomicBool>,
    unregister_calls: Arc<AtomicUsize>,
}

impl MockScanFacility {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockScanState {
                radio_enabled: true,
                start_result: Ok(true),
                cached_results: vec![],
                fail_results: false,
                start_calls: 0,
                enable_calls: 0,
            })),
            registry: Arc::new(ReceiverRegistry::new()),
            fail_unregister: Arc::new(AtomicBool::new(false)),
            unregister_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn set_radio_enabled(&self, enabled: bool) {
        self.inner.lock().await.radio_enabled = enabled;
    }

    pub async fn set_start_result(&self, result: ScanFacilityResult<bool>) {
        self.inner.lock().await.start_result = result;
    }

    pub async fn set_cached_results(&self, results: Vec<NetworkRecord>) {
        self.inner.lock().await.cached_results = results;
    }

    /// Make reading the cached results fail
    pub async fn set_results_failure(&self, fail: bool) {
        self.inner.lock().await.fail_results = fail;
    }

    /// Make unregistering receivers fail (the receiver is still removed)
    pub fn set_unregister_failure(&self, fail: bool) {
        self.fail_unregister.store(fail, Ordering::SeqCst);
    }

    /// Simulate a scan completion, returning the number of receivers fired
    pub fn fire(&self, results_updated: bool) -> usize {
        self.registry.notify(ScanCompletion { results_updated })
    }

    pub fn registered_receivers(&self) -> usize {
        self.registry.registered()
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    pub async fn start_calls(&self) -> usize {
        self.inner.lock().await.start_calls
    }

    pub async fn enable_calls(&self) -> usize {
        self.inner.lock().await.enable_calls
    }
}

impl Default for MockScanFacility {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalScanFacility for MockScanFacility {
    async fn radio_enabled(&self) -> ScanFacilityResult<bool> {
        Ok(self.inner.lock().await.radio_enabled)
    }

    async fn enable_radio(&self) -> ScanFacilityResult<()> {
        let mut state = self.inner.lock().await;
        state.enable_calls += 1;
        state.radio_enabled = true;
        Ok(())
    }

    fn register_receiver(
        &self,
        receiver: oneshot::Sender<ScanCompletion>,
    ) -> ScanFacilityResult<ReceiverId> {
        Ok(self.registry.register(receiver))
    }

    fn unregister_receiver(&self, id: ReceiverId) -> ScanFacilityResult<()> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.registry.unregister(id)?;
        if self.fail_unregister.load(Ordering::SeqCst) {
            return Err(ScanError::Registration("mock unregister failure".to_string()));
        }
        Ok(())
    }

    async fn start_scan(&self) -> ScanFacilityResult<bool> {
        let mut state = self.inner.lock().await;
        state.start_calls += 1;
        state.start_result.clone()
    }

    async fn scan_results(&self) -> ScanFacilityResult<Vec<NetworkRecord>> {
        let state = self.inner.lock().await;
        if state.fail_results {
            return Err(ScanError::Unavailable("mock cache unreadable".to_string()));
        }
        Ok(state.cached_results.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::generation::Generation;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_mock_client_records_calls() {
        let client = MockProvisioningClient::new();

        client.request_transfer_unit(512).await.unwrap();
        client.negotiate_security().await.unwrap();
        client.close().await.unwrap();

        assert_eq!(
            client.calls().await,
            vec![
                ClientCall::TransferUnit(512),
                ClientCall::NegotiateSecurity,
                ClientCall::Close
            ]
        );
        assert_eq!(
            client.request_device_status().await,
            Err(ClientError::Closed)
        );
    }

    #[tokio::test]
    async fn test_mock_client_rejection() {
        let client = MockProvisioningClient::new();
        client.set_reject(true).await;

        assert!(matches!(
            client.request_device_version().await,
            Err(ClientError::Rejected(_))
        ));
        assert!(client.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_link_layer_failures() {
        let link = MockLinkLayer::new();
        let (link_tx, _link_rx) = mpsc::unbounded_channel();
        let (completion_tx, _completion_rx) = mpsc::unbounded_channel();
        let generation = Generation::first();

        link.set_device_missing("gone").await;
        let result = link
            .open(
                "gone",
                LinkEventSender::new(generation, link_tx.clone()),
                CompletionSender::new(generation, completion_tx.clone()),
            )
            .await;
        assert_eq!(result.err(), Some(LinkError::DeviceNotFound("gone".into())));

        link.set_adapter_available(false).await;
        let result = link
            .open(
                "present",
                LinkEventSender::new(generation, link_tx),
                CompletionSender::new(generation, completion_tx),
            )
            .await;
        assert!(matches!(result, Err(LinkError::AdapterUnavailable(_))));
        assert!(link.connections().await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_scan_facility_fire() {
        let facility = MockScanFacility::new();
        let (tx, rx) = oneshot::channel();
        let id = facility.register_receiver(tx).unwrap();

        assert_eq!(facility.fire(false), 1);
        assert_eq!(
            rx.await.unwrap(),
            ScanCompletion {
                results_updated: false
            }
        );

        facility.unregister_receiver(id).unwrap();
        assert_eq!(facility.registered_receivers(), 0);
    }
}
