//! Link layer, provisioning client and local scan abstractions

pub mod link_layer;
pub mod local_scan;
pub mod loopback;
pub mod provisioning_client;
pub mod wifi_ctrl_backend;

#[cfg(test)]
pub mod mock_backend;

pub use link_layer::{LinkEvent, LinkLayer};
pub use local_scan::LocalScanFacility;
pub use loopback::{LoopbackClient, LoopbackConfig, LoopbackLinkLayer, LoopbackScanFacility};
pub use provisioning_client::{Completion, ProvisioningClient};
pub use wifi_ctrl_backend::WifiCtrlScanFacility;
