//! Domain types for the provisioning session bridge

use serde::{Deserialize, Serialize};

/// Largest transfer unit the provisioning protocol supports
pub const MAX_TRANSFER_UNIT: u16 = 512;

/// Operating mode value selecting station mode on the device
pub const OP_MODE_STA: i32 = 1;

/// `ConnectionStatus` state reported when the link is down
pub const LINK_STATE_DISCONNECTED: i32 = 0;

/// `ConnectionStatus` state reported when the link is up
pub const LINK_STATE_CONNECTED: i32 = 2;

/// Provisioning session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LifecycleState {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    SecurityNegotiating = 3,
    SecurityReady = 4,
    Configuring = 5,
    Disconnected = 6,
}

impl LifecycleState {
    /// Whether the link is up and provisioning commands may be sent
    pub fn link_ready(&self) -> bool {
        matches!(
            self,
            LifecycleState::Connected
                | LifecycleState::SecurityNegotiating
                | LifecycleState::SecurityReady
                | LifecycleState::Configuring
        )
    }

    /// Whether a link-layer disconnect still has something to tear down
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Idle | LifecycleState::Disconnected)
    }
}

impl TryFrom<u8> for LifecycleState {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0 => Ok(LifecycleState::Idle),
            1 => Ok(LifecycleState::Connecting),
            2 => Ok(LifecycleState::Connected),
            3 => Ok(LifecycleState::SecurityNegotiating),
            4 => Ok(LifecycleState::SecurityReady),
            5 => Ok(LifecycleState::Configuring),
            6 => Ok(LifecycleState::Disconnected),
            _ => Err(()),
        }
    }
}

impl From<LifecycleState> for u8 {
    fn from(state: LifecycleState) -> Self {
        state as u8
    }
}

/// Operations whose outcome is reported asynchronously
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Connect,
    TransferUnit,
    NegotiateSecurity,
    Configure,
    PostCustomData,
    DeviceStatus,
    DeviceVersion,
    DeviceScan,
    LocalScan,
}

/// Origin of a scan result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    /// Host-side scan through the local scan facility
    Local,
    /// Scan performed and reported by the provisioned device
    Device,
}

/// A raw network record as reported by either scan source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    pub ssid: String,
    pub rssi: i32,
}

impl NetworkRecord {
    pub fn new(ssid: impl Into<String>, rssi: i32) -> Self {
        Self {
            ssid: ssid.into(),
            rssi,
        }
    }
}

/// A visible network attributed to its scan source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub ssid: String,
    pub rssi: i32,
    pub source: ScanSource,
}

impl ScanEntry {
    /// Returns `None` for an empty SSID (hidden networks are not reported)
    pub fn new(ssid: impl Into<String>, rssi: i32, source: ScanSource) -> Option<Self> {
        let ssid = ssid.into();
        if ssid.is_empty() {
            return None;
        }
        Some(Self { ssid, rssi, source })
    }

    /// Attribute raw records to a source, dropping entries without an SSID
    pub fn from_records(records: Vec<NetworkRecord>, source: ScanSource) -> Vec<Self> {
        records
            .into_iter()
            .filter_map(|r| ScanEntry::new(r.ssid, r.rssi, source))
            .collect()
    }
}

/// Device status as reported by a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub operating_mode: i32,
    pub sta_connection_status: i32,
}

/// Station credentials sent to the device
#[derive(Clone, PartialEq, Eq)]
pub struct StationCredentials {
    pub ssid: Vec<u8>,
    pub password: String,
}

impl std::fmt::Debug for StationCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationCredentials")
            .field("ssid", &String::from_utf8_lossy(&self.ssid))
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parameters of a configure command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureParams {
    pub op_mode: i32,
    pub station: Option<StationCredentials>,
}

impl ConfigureParams {
    pub fn operating_mode(op_mode: i32) -> Self {
        Self {
            op_mode,
            station: None,
        }
    }

    pub fn station(ssid: &[u8], password: &str) -> Self {
        Self {
            op_mode: OP_MODE_STA,
            station: Some(StationCredentials {
                ssid: ssid.to_vec(),
                password: password.to_string(),
            }),
        }
    }
}

/// Session identifier for transport connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
