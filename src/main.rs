//! Provisioning Bridge - Main Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use provisioning_bridge::{
    backend::{LocalScanFacility, LoopbackLinkLayer, LoopbackScanFacility, WifiCtrlScanFacility},
    config::{CliArgs, Settings},
    core::service::ProvisioningBridge,
    transport::unix_socket::UnixSocketServer,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,provisioning_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    info!(?args, "Starting provisioning bridge");
    let settings = Settings::try_from(args)?;

    match settings.wifi_interface.clone() {
        Some(interface) => {
            let facility = Arc::new(WifiCtrlScanFacility::new(interface.clone())?);
            info!("Local scans through wpa_supplicant on {}", interface);
            run(settings, facility).await
        }
        None => {
            let facility = Arc::new(LoopbackScanFacility::new(settings.loopback()));
            info!("Local scans through the loopback scanner");
            run(settings, facility).await
        }
    }
}

async fn run<S: LocalScanFacility>(
    settings: Settings,
    facility: Arc<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let link = Arc::new(LoopbackLinkLayer::new(settings.loopback()));
    let bridge = Arc::new(ProvisioningBridge::new(link, facility, settings.bridge()));
    info!("Provisioning bridge created");

    info!("Starting Unix socket transport on {}", settings.socket_path);
    let server = UnixSocketServer::new(settings.socket_path.clone(), settings.socket_mode, bridge);
    let task = tokio::spawn(async move {
        if let Err(e) = server.start().await {
            error!("Unix socket server error: {}", e);
        }
    });

    #[cfg(feature = "systemd")]
    if let Err(e) = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]) {
        error!("Failed to notify systemd: {}", e);
    }

    info!("Service started successfully");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully");
        }
        _ = shutdown_signal() => {
            info!("Received SIGTERM, shutting down gracefully");
        }
        _ = task => {
            info!("Transport stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await
}
