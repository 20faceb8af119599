//! Notification message types (bridge-to-client events)

use serde::{Deserialize, Serialize};

use crate::core::{
    event::Event,
    types::{Operation, ScanEntry, ScanSource, StatusSnapshot},
};

/// Bridge-to-client notifications, one per event kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params")]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    ConnectionStatus(ConnectionStatusParams),
    SecurityResult(StatusParams),
    ConfigureResult(StatusParams),
    DeviceStatus(StatusSnapshot),
    DeviceVersion(VersionParams),
    CustomData(DataParams),
    ScanResult(ScanResultParams),
    Error(ErrorParams),
    LogLine(LogLineParams),
    Completed(CompletedParams),
    Timeout(TimeoutParams),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionStatusParams {
    pub state: i32,
    pub status: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusParams {
    pub status: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionParams {
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataParams {
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResultParams {
    pub source: ScanSource,
    pub entries: Vec<ScanEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorParams {
    pub code: i32,
    /// True for code 0, which signals nothing went wrong
    pub benign: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogLineParams {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedParams {
    pub operation: Operation,
    pub status: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutParams {
    pub operation: Operation,
}

impl From<Event> for Notification {
    fn from(event: Event) -> Self {
        match event {
            Event::ConnectionStatus { state, status } => {
                Notification::ConnectionStatus(ConnectionStatusParams { state, status })
            }
            Event::SecurityResult { status } => Notification::SecurityResult(StatusParams { status }),
            Event::ConfigureResult { status } => {
                Notification::ConfigureResult(StatusParams { status })
            }
            Event::DeviceStatus(snapshot) => Notification::DeviceStatus(snapshot),
            Event::DeviceVersion { version } => Notification::DeviceVersion(VersionParams { version }),
            Event::CustomData { data } => Notification::CustomData(DataParams { data }),
            Event::ScanResult { source, entries } => {
                Notification::ScanResult(ScanResultParams { source, entries })
            }
            Event::Error { code, benign } => Notification::Error(ErrorParams { code, benign }),
            Event::LogLine { message } => Notification::LogLine(LogLineParams { message }),
            Event::Completed { operation, status } => {
                Notification::Completed(CompletedParams { operation, status })
            }
            Event::Timeout { operation } => Notification::Timeout(TimeoutParams { operation }),
        }
    }
}
