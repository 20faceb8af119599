//! Link-layer stack abstraction

use trait_variant::make;

use crate::{
    backend::provisioning_client::{CompletionSender, ProvisioningClient},
    core::{error::LinkResult, generation::GenerationSender},
};

/// Connection state notifications from the link layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Connected { status: i32 },
    Disconnected { status: i32 },
}

/// Channel the link layer reports state changes through
pub type LinkEventSender = GenerationSender<LinkEvent>;

/// Wireless transport that resolves devices and opens provisioning clients
#[make(Send)]
pub trait LinkLayer: Send + Sync + 'static {
    type Client: ProvisioningClient;

    /// Resolve `device_id` and start connecting to it
    ///
    /// Returns without waiting for the link; establishment and loss are
    /// reported through `link_events`. Fails with `AdapterUnavailable` when
    /// no adapter is present and `DeviceNotFound` when the identifier does
    /// not resolve.
    async fn open(
        &self,
        device_id: &str,
        link_events: LinkEventSender,
        completions: CompletionSender,
    ) -> LinkResult<Self::Client>;
}
