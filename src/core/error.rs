//! Error types for the provisioning session bridge

use thiserror::Error;

use super::types::{LifecycleState, Operation};

/// Result type for bridge commands
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Result type for link-layer operations
pub type LinkResult<T> = Result<T, LinkError>;

/// Result type for provisioning client submissions
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for local scan facility operations
pub type ScanFacilityResult<T> = Result<T, ScanError>;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors reported synchronously by the link-layer stack
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}

/// Errors reported by the provisioning client when submitting an operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Provisioning client closed")]
    Closed,

    #[error("Submission rejected: {0}")]
    Rejected(String),
}

/// Errors related to the local scan facility
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Scan facility unavailable: {0}")]
    Unavailable(String),

    #[error("Radio control failed: {0}")]
    RadioControl(String),

    #[error("Receiver registration failed: {0}")]
    Registration(String),

    #[error("Unknown scan receiver {0}")]
    UnknownReceiver(u64),

    #[error("wpa_supplicant error: {0}")]
    WpaSupplicant(String),
}

/// Errors returned synchronously by bridge commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("{operation:?} not allowed in state {state:?}")]
    InvalidState {
        state: LifecycleState,
        operation: Operation,
    },

    #[error("Submission failed: {0}")]
    Submit(#[from] ClientError),
}

impl From<LinkError> for BridgeError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::AdapterUnavailable(msg) => BridgeError::AdapterUnavailable(msg),
            LinkError::DeviceNotFound(msg) => BridgeError::DeviceNotFound(msg),
        }
    }
}

/// Errors related to transport layer
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid socket mode: {0}")]
    InvalidSocketMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_maps_to_bridge_error() {
        assert_eq!(
            BridgeError::from(LinkError::AdapterUnavailable("hci0".into())),
            BridgeError::AdapterUnavailable("hci0".into())
        );
        assert_eq!(
            BridgeError::from(LinkError::DeviceNotFound("zz".into())),
            BridgeError::DeviceNotFound("zz".into())
        );
    }

    #[test]
    fn test_invalid_state_message() {
        let err = BridgeError::InvalidState {
            state: LifecycleState::Connected,
            operation: Operation::Configure,
        };
        assert_eq!(err.to_string(), "Configure not allowed in state Connected");
    }
}
