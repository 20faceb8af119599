//! Local WiFi scan coordination
//!
//! The device-side scan goes through the command dispatcher; this module
//! drives the host-side scan and its single outstanding receiver.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::{
    backend::local_scan::{LocalScanFacility, ReceiverId, ScanCompletion},
    core::{
        error::ScanFacilityResult,
        event::{Event, EventSink},
        types::{Operation, ScanEntry, ScanSource},
    },
};

/// A registered scan receiver, released exactly once
///
/// Released explicitly on the firing path or implicitly on drop. Release
/// failures are logged and swallowed.
pub struct ScanSubscription<S: LocalScanFacility> {
    facility: Arc<S>,
    id: Option<ReceiverId>,
}

impl<S: LocalScanFacility> ScanSubscription<S> {
    fn new(facility: Arc<S>, id: ReceiverId) -> Self {
        Self {
            facility,
            id: Some(id),
        }
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(id) = self.id.take() {
            if let Err(e) = self.facility.unregister_receiver(id) {
                warn!("Ignoring scan receiver release failure: {}", e);
            }
        }
    }
}

impl<S: LocalScanFacility> Drop for ScanSubscription<S> {
    fn drop(&mut self) {
        self.release_once();
    }
}

/// Outcome of a local scan request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalScanRequest {
    /// A new scan was started and a receiver registered
    Started,
    /// A scan was already outstanding; its result serves this request too
    Joined,
    /// The scan could not be started; cached results were delivered
    Degraded,
}

/// Drives host-side scans and publishes their results
pub struct WifiScanAggregator<S: LocalScanFacility> {
    facility: Arc<S>,
    events: EventSink,
    outstanding: Arc<Mutex<Option<u64>>>,
    next_ticket: AtomicU64,
    timeout: Option<Duration>,
}

impl<S: LocalScanFacility> WifiScanAggregator<S> {
    pub fn new(facility: Arc<S>, events: EventSink, timeout: Option<Duration>) -> Self {
        Self {
            facility,
            events,
            outstanding: Arc::new(Mutex::new(None)),
            next_ticket: AtomicU64::new(0),
            timeout,
        }
    }

    /// Start a local scan unless one is already outstanding
    pub async fn request_local_scan(&self) -> LocalScanRequest {
        let mut outstanding = self.outstanding.lock().await;
        if outstanding.is_some() {
            debug!("Local scan already outstanding");
            self.events.log("Local scan already in progress, joining it");
            return LocalScanRequest::Joined;
        }

        if let Err(e) = self.ensure_radio().await {
            warn!("Could not enable WiFi radio: {}", e);
            self.events.log(format!("Could not enable WiFi radio: {}", e));
        }

        let (tx, rx) = oneshot::channel();
        let subscription = match self.facility.register_receiver(tx) {
            Ok(id) => ScanSubscription::new(self.facility.clone(), id),
            Err(e) => {
                drop(outstanding);
                self.events
                    .log(format!("Scan receiver registration failed: {}", e));
                deliver_cached(self.facility.as_ref(), &self.events, false).await;
                return LocalScanRequest::Degraded;
            }
        };

        match self.facility.start_scan().await {
            Ok(true) => {}
            Ok(false) => {
                subscription.release();
                drop(outstanding);
                self.events.log("Local scan not started");
                deliver_cached(self.facility.as_ref(), &self.events, false).await;
                return LocalScanRequest::Degraded;
            }
            Err(e) => {
                subscription.release();
                drop(outstanding);
                self.events.log(format!("Local scan not started: {}", e));
                deliver_cached(self.facility.as_ref(), &self.events, false).await;
                return LocalScanRequest::Degraded;
            }
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        *outstanding = Some(ticket);
        drop(outstanding);

        info!("Starting local WiFi scan");
        tokio::spawn(await_completion(
            self.facility.clone(),
            self.events.clone(),
            self.outstanding.clone(),
            ticket,
            rx,
            subscription,
            self.timeout,
        ));

        LocalScanRequest::Started
    }

    async fn ensure_radio(&self) -> ScanFacilityResult<()> {
        if !self.facility.radio_enabled().await? {
            info!("WiFi radio disabled, enabling it");
            self.facility.enable_radio().await?;
        }
        Ok(())
    }
}

async fn await_completion<S: LocalScanFacility>(
    facility: Arc<S>,
    events: EventSink,
    outstanding: Arc<Mutex<Option<u64>>>,
    ticket: u64,
    rx: oneshot::Receiver<ScanCompletion>,
    subscription: ScanSubscription<S>,
    timeout: Option<Duration>,
) {
    let fired = match timeout {
        Some(limit) => tokio::time::timeout(limit, rx).await.ok(),
        None => Some(rx.await),
    };

    let updated = match fired {
        Some(Ok(completion)) => completion.results_updated,
        Some(Err(_)) => {
            warn!("Scan receiver dropped without firing");
            false
        }
        None => {
            events.emit(Event::Timeout {
                operation: Operation::LocalScan,
            });
            false
        }
    };

    {
        let mut outstanding = outstanding.lock().await;
        if *outstanding == Some(ticket) {
            *outstanding = None;
        }
        subscription.release();
    }

    deliver_cached(facility.as_ref(), &events, updated).await;
}

/// Publish whatever the facility holds, stale or not
async fn deliver_cached<S: LocalScanFacility>(facility: &S, events: &EventSink, updated: bool) {
    if !updated {
        events.log("Local scan did not complete, delivering cached results");
    }

    let entries = match facility.scan_results().await {
        Ok(records) => ScanEntry::from_records(records, ScanSource::Local),
        Err(e) => {
            warn!("Reading cached scan results failed: {}", e);
            events.log(format!("Local scan results unavailable: {}", e));
            Vec::new()
        }
    };

    events.log(format!("Local scan: found {} networks", entries.len()));
    events.emit(Event::scan_result(ScanSource::Local, entries));
}
