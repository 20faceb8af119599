//! Command-line argument parsing

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[clap(name = "provisioning-bridge", version, author)]
#[clap(about = "BLE WiFi provisioning session bridge with a Unix socket JSON-RPC interface")]
pub struct CliArgs {
    /// Path for Unix socket
    #[clap(long, default_value = "/run/provisioning-bridge.sock")]
    pub socket_path: String,

    /// Socket file permissions (octal, e.g., 660)
    #[clap(long, default_value = "660")]
    pub socket_mode: String,

    /// Wireless interface for local scans; the loopback scanner is used when absent
    #[clap(short, long)]
    pub wifi_interface: Option<String>,

    /// Transfer unit requested after the link comes up
    #[clap(long, default_value = "512")]
    pub transfer_unit: u16,

    /// Give up on a pending completion after this many seconds
    #[clap(long)]
    pub completion_timeout_secs: Option<u64>,

    /// Response latency of the loopback device in milliseconds
    #[clap(long, default_value = "100")]
    pub loopback_latency_ms: u64,
}
