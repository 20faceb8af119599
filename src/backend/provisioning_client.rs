//! Provisioning client abstraction

use trait_variant::make;

use crate::core::{
    error::ClientResult,
    generation::GenerationSender,
    types::{ConfigureParams, NetworkRecord, StatusSnapshot},
};

/// Completions reported by the provisioning client after a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    TransferUnit {
        size: u16,
        status: i32,
    },
    SecurityNegotiated {
        status: i32,
    },
    ConfigurePosted {
        status: i32,
    },
    DeviceStatus {
        status: i32,
        response: Option<StatusSnapshot>,
    },
    DeviceVersion {
        status: i32,
        version: Option<String>,
    },
    DeviceScan {
        status: i32,
        results: Option<Vec<NetworkRecord>>,
    },
    CustomDataPosted {
        status: i32,
    },
    CustomDataReceived {
        status: i32,
        data: Option<Vec<u8>>,
    },
    Error {
        code: i32,
    },
}

/// Channel a client reports its completions through
pub type CompletionSender = GenerationSender<Completion>;

/// Opaque peer implementing the device provisioning protocol
///
/// Every method only submits the operation. It returns as soon as the
/// request is queued; the outcome is reported later through the
/// `CompletionSender` the client was created with.
#[make(Send)]
pub trait ProvisioningClient: Send + Sync + 'static {
    /// Ask the transport for a larger transfer unit
    async fn request_transfer_unit(&self, size: u16) -> ClientResult<()>;

    /// Start the secure channel negotiation
    async fn negotiate_security(&self) -> ClientResult<()>;

    /// Post operating mode and optional station credentials
    async fn configure(&self, params: ConfigureParams) -> ClientResult<()>;

    /// Post an application-defined payload
    async fn post_custom_data(&self, data: Vec<u8>) -> ClientResult<()>;

    async fn request_device_status(&self) -> ClientResult<()>;

    async fn request_device_version(&self) -> ClientResult<()>;

    /// Ask the device to scan for WiFi networks
    async fn request_device_wifi_scan(&self) -> ClientResult<()>;

    /// Tear down the link and release the client
    ///
    /// No completion is reported for a closed client.
    async fn close(&self) -> ClientResult<()>;
}
