//! Local (host-side) WiFi scan facility abstraction

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::oneshot;
use trait_variant::make;

use crate::core::{
    error::{ScanError, ScanFacilityResult},
    types::NetworkRecord,
};

/// Handle of a registered scan completion receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

impl ReceiverId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Notification delivered to a receiver when a scan finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCompletion {
    /// False when the scan did not complete and only cached results exist
    pub results_updated: bool,
}

/// OS capability producing the list of visible networks
#[make(Send)]
pub trait LocalScanFacility: Send + Sync + 'static {
    /// Whether the WiFi radio is administratively enabled
    async fn radio_enabled(&self) -> ScanFacilityResult<bool>;

    async fn enable_radio(&self) -> ScanFacilityResult<()>;

    /// Register a receiver fired on the next scan completion
    fn register_receiver(
        &self,
        receiver: oneshot::Sender<ScanCompletion>,
    ) -> ScanFacilityResult<ReceiverId>;

    fn unregister_receiver(&self, id: ReceiverId) -> ScanFacilityResult<()>;

    /// Request a scan; `Ok(false)` when the facility refused to start one
    async fn start_scan(&self) -> ScanFacilityResult<bool>;

    /// Most recent results held by the facility, possibly stale
    async fn scan_results(&self) -> ScanFacilityResult<Vec<NetworkRecord>>;
}

/// Bookkeeping of registered receivers shared by facility implementations
///
/// A receiver stays registered after firing until it is unregistered.
#[derive(Debug, Default)]
pub struct ReceiverRegistry {
    next_id: AtomicU64,
    receivers: Mutex<HashMap<ReceiverId, Option<oneshot::Sender<ScanCompletion>>>>,
}

impl ReceiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, receiver: oneshot::Sender<ScanCompletion>) -> ReceiverId {
        let id = ReceiverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, Some(receiver));
        id
    }

    pub fn unregister(&self, id: ReceiverId) -> ScanFacilityResult<()> {
        self.lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(ScanError::UnknownReceiver(id.value()))
    }

    /// Fire every receiver that has not fired yet
    pub fn notify(&self, completion: ScanCompletion) -> usize {
        let mut fired = 0;
        for slot in self.lock().values_mut() {
            if let Some(tx) = slot.take() {
                if tx.send(completion).is_ok() {
                    fired += 1;
                }
            }
        }
        fired
    }

    /// Number of currently registered receivers
    pub fn registered(&self) -> usize {
        self.lock().len()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ReceiverId, Option<oneshot::Sender<ScanCompletion>>>>
    {
        self.receivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
