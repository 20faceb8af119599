//! Provisioning Bridge
//!
//! Drives one BLE provisioning session at a time on behalf of a local
//! client. Commands come in over a Unix socket (JSON-RPC 2.0); outcomes are
//! pushed back as notifications from a single ordered event stream.

pub mod backend;
pub mod config;
pub mod core;
pub mod protocol;
pub mod transport;

pub use core::{
    error::{BridgeError, ClientError, LinkError, ScanError, TransportError},
    event::{Event, EventSink, EventStream},
    service::{BridgeSettings, ProvisioningBridge},
    types::{LifecycleState, Operation, ScanEntry, ScanSource},
};
