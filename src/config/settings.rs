//! Runtime settings

use std::time::Duration;

use crate::{
    backend::LoopbackConfig,
    config::CliArgs,
    core::{
        error::{TransportError, TransportResult},
        service::BridgeSettings,
        types::MAX_TRANSFER_UNIT,
    },
};

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub socket_path: String,
    pub socket_mode: u32,
    pub wifi_interface: Option<String>,
    pub transfer_unit: u16,
    pub completion_timeout: Option<Duration>,
    pub loopback_latency: Duration,
}

impl Settings {
    pub fn bridge(&self) -> BridgeSettings {
        BridgeSettings {
            transfer_unit: self.transfer_unit,
            completion_timeout: self.completion_timeout,
        }
    }

    pub fn loopback(&self) -> LoopbackConfig {
        LoopbackConfig {
            latency: self.loopback_latency,
            ..LoopbackConfig::default()
        }
    }
}

/// Octal permission bits, e.g. `660`
fn parse_socket_mode(mode: &str) -> TransportResult<u32> {
    u32::from_str_radix(mode, 8)
        .ok()
        .filter(|bits| *bits <= 0o777)
        .ok_or_else(|| TransportError::InvalidSocketMode(mode.to_string()))
}

impl TryFrom<CliArgs> for Settings {
    type Error = TransportError;

    fn try_from(args: CliArgs) -> TransportResult<Self> {
        let socket_mode = parse_socket_mode(&args.socket_mode)?;

        Ok(Settings {
            socket_path: args.socket_path,
            socket_mode,
            wifi_interface: args.wifi_interface,
            transfer_unit: args.transfer_unit.min(MAX_TRANSFER_UNIT),
            completion_timeout: args
                .completion_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            loopback_latency: Duration::from_millis(args.loopback_latency_ms),
        })
    }
}
