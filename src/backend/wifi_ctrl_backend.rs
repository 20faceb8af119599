//! wifi-ctrl backed local scan facility

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::{
    process::Command,
    sync::{Mutex, oneshot},
};
use tracing::{debug, error, warn};
use wifi_ctrl::sta::{RequestClient, WifiSetup};

use crate::{
    backend::local_scan::{LocalScanFacility, ReceiverId, ReceiverRegistry, ScanCompletion},
    core::{
        error::{ScanError, ScanFacilityResult},
        types::NetworkRecord,
    },
};

/// Local scans through wpa_supplicant, radio control through rfkill
pub struct WifiCtrlScanFacility {
    interface: String,
    client: Arc<RequestClient>,
    registry: Arc<ReceiverRegistry>,
    cache: Arc<Mutex<Vec<NetworkRecord>>>,
    scanning: Arc<AtomicBool>,
}

impl WifiCtrlScanFacility {
    pub fn new(interface: String) -> ScanFacilityResult<Self> {
        let path = format!("/var/run/wpa_supplicant/{}", interface);
        let mut setup = WifiSetup::new().map_err(|e| ScanError::WpaSupplicant(e.to_string()))?;
        setup.set_socket_path(path);

        let client = setup.get_request_client();
        let station = setup.complete();

        tokio::spawn(async move {
            if let Err(e) = station.run().await {
                error!("WifiStation runtime error: {}", e);
            }
        });

        Ok(Self {
            interface,
            client: Arc::new(client),
            registry: Arc::new(ReceiverRegistry::new()),
            cache: Arc::new(Mutex::new(Vec::new())),
            scanning: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn rfkill(args: &[&str]) -> ScanFacilityResult<String> {
        let output = Command::new("rfkill")
            .args(args)
            .output()
            .await
            .map_err(|e| ScanError::RadioControl(format!("rfkill failed: {}", e)))?;

        if !output.status.success() {
            return Err(ScanError::RadioControl(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Whether `rfkill list wifi` output reports any block
fn radio_blocked(listing: &str) -> bool {
    listing.lines().any(|line| {
        let line = line.trim();
        (line.starts_with("Soft blocked:") || line.starts_with("Hard blocked:"))
            && line.ends_with("yes")
    })
}

impl LocalScanFacility for WifiCtrlScanFacility {
    async fn radio_enabled(&self) -> ScanFacilityResult<bool> {
        let listing = Self::rfkill(&["list", "wifi"]).await?;
        Ok(!radio_blocked(&listing))
    }

    async fn enable_radio(&self) -> ScanFacilityResult<()> {
        debug!("Unblocking WiFi radio");
        Self::rfkill(&["unblock", "wifi"]).await.map(|_| ())
    }

    fn register_receiver(
        &self,
        receiver: oneshot::Sender<ScanCompletion>,
    ) -> ScanFacilityResult<ReceiverId> {
        Ok(self.registry.register(receiver))
    }

    fn unregister_receiver(&self, id: ReceiverId) -> ScanFacilityResult<()> {
        self.registry.unregister(id)
    }

    async fn start_scan(&self) -> ScanFacilityResult<bool> {
        if self.scanning.swap(true, Ordering::SeqCst) {
            debug!("Scan already running on {}", self.interface);
            return Ok(true);
        }

        debug!("Starting WiFi scan on interface: {}", self.interface);
        let client = self.client.clone();
        let registry = self.registry.clone();
        let cache = self.cache.clone();
        let scanning = self.scanning.clone();

        tokio::spawn(async move {
            let results_updated = match client.get_scan().await {
                Ok(results) => {
                    let records: Vec<NetworkRecord> = results
                        .iter()
                        .map(|res| NetworkRecord::new(res.name.clone(), res.signal as i32))
                        .collect();
                    debug!("Scan complete, found {} networks", records.len());
                    *cache.lock().await = records;
                    true
                }
                Err(e) => {
                    warn!("Scan failed: {}", e);
                    false
                }
            };

            scanning.store(false, Ordering::SeqCst);
            registry.notify(ScanCompletion { results_updated });
        });

        Ok(true)
    }

    async fn scan_results(&self) -> ScanFacilityResult<Vec<NetworkRecord>> {
        Ok(self.cache.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_unblocked() {
        let listing = "0: phy0: Wireless LAN\n\tSoft blocked: no\n\tHard blocked: no\n";
        assert!(!radio_blocked(listing));
    }

    #[test]
    fn test_radio_soft_blocked() {
        let listing = "0: phy0: Wireless LAN\n\tSoft blocked: yes\n\tHard blocked: no\n";
        assert!(radio_blocked(listing));
    }

    #[test]
    fn test_radio_hard_blocked() {
        let listing = "1: phy1: Wireless LAN\n\tSoft blocked: no\n\tHard blocked: yes\n";
        assert!(radio_blocked(listing));
    }

    #[test]
    fn test_radio_listing_empty() {
        assert!(!radio_blocked(""));
    }
}
