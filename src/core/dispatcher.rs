//! Command dispatcher: precondition checks and submission to the client
//!
//! Every command either fails fast with a typed error or returns once the
//! operation has been submitted. The outcome arrives later as an event.

use tracing::{debug, warn};

use crate::{
    backend::provisioning_client::ProvisioningClient,
    core::{
        error::{BridgeError, BridgeResult, ClientError},
        event::EventSink,
        lifecycle::Watchdog,
        session::{Session, SessionSlot, SharedSlot},
        types::{ConfigureParams, LifecycleState, Operation},
    },
};

pub struct CommandDispatcher<C: ProvisioningClient> {
    slot: SharedSlot<C>,
    events: EventSink,
    watchdog: Watchdog<C>,
}

impl<C: ProvisioningClient> CommandDispatcher<C> {
    pub fn new(slot: SharedSlot<C>, events: EventSink, watchdog: Watchdog<C>) -> Self {
        Self {
            slot,
            events,
            watchdog,
        }
    }

    pub async fn negotiate_security(&self) -> BridgeResult<()> {
        let mut guard = self.slot.lock().await;
        let slot = &mut *guard;
        let session = active(&slot.session)?;

        slot.lifecycle.begin_negotiation()?;
        if let Err(e) = session.client.negotiate_security().await {
            slot.lifecycle.finish_negotiation(false);
            return Err(self.rejected(Operation::NegotiateSecurity, e));
        }

        self.watchdog
            .arm(session.generation(), slot.lifecycle.ticket());
        self.events.log("Negotiating security");
        Ok(())
    }

    pub async fn set_operating_mode(&self, mode: i32) -> BridgeResult<()> {
        self.configure(ConfigureParams::operating_mode(mode)).await?;
        self.events.log(format!("Setting operating mode {}", mode));
        Ok(())
    }

    pub async fn configure_wifi_station(&self, ssid: &[u8], password: &str) -> BridgeResult<()> {
        self.configure(ConfigureParams::station(ssid, password))
            .await?;
        self.events.log(format!(
            "Configuring station for {}",
            String::from_utf8_lossy(ssid)
        ));
        Ok(())
    }

    async fn configure(&self, params: ConfigureParams) -> BridgeResult<()> {
        let mut guard = self.slot.lock().await;
        let slot = &mut *guard;
        let session = active(&slot.session)?;

        slot.lifecycle.begin_configure()?;
        debug!(?params, "Submitting configure");
        if let Err(e) = session.client.configure(params).await {
            slot.lifecycle.finish_configure();
            // Earlier configures are still in flight under a new ticket
            if slot.lifecycle.state() == LifecycleState::Configuring {
                self.watchdog
                    .arm(session.generation(), slot.lifecycle.ticket());
            }
            return Err(self.rejected(Operation::Configure, e));
        }

        self.watchdog
            .arm(session.generation(), slot.lifecycle.ticket());
        Ok(())
    }

    pub async fn post_custom_data(&self, data: &[u8]) -> BridgeResult<()> {
        let slot = self.linked().await?;
        let session = active(&slot.session)?;

        session
            .client
            .post_custom_data(data.to_vec())
            .await
            .map_err(|e| self.rejected(Operation::PostCustomData, e))?;

        self.events.log(format!(
            "Posted custom data: {}",
            String::from_utf8_lossy(data)
        ));
        Ok(())
    }

    pub async fn request_device_status(&self) -> BridgeResult<()> {
        let slot = self.linked().await?;
        active(&slot.session)?
            .client
            .request_device_status()
            .await
            .map_err(|e| self.rejected(Operation::DeviceStatus, e))
    }

    pub async fn request_device_version(&self) -> BridgeResult<()> {
        let slot = self.linked().await?;
        active(&slot.session)?
            .client
            .request_device_version()
            .await
            .map_err(|e| self.rejected(Operation::DeviceVersion, e))
    }

    pub async fn request_device_wifi_scan(&self) -> BridgeResult<()> {
        let slot = self.linked().await?;
        active(&slot.session)?
            .client
            .request_device_wifi_scan()
            .await
            .map_err(|e| self.rejected(Operation::DeviceScan, e))?;

        self.events.log("Requested device-side WiFi scan");
        Ok(())
    }

    /// Lock the slot, requiring a session whose link is up
    async fn linked(&self) -> BridgeResult<tokio::sync::MutexGuard<'_, SessionSlot<C>>> {
        let slot = self.slot.lock().await;
        slot.lifecycle.require_link()?;
        Ok(slot)
    }

    fn rejected(&self, operation: Operation, err: ClientError) -> BridgeError {
        warn!(?operation, "Submission rejected: {}", err);
        self.events
            .log(format!("{:?} not submitted: {}", operation, err));
        BridgeError::Submit(err)
    }
}

fn active<C>(session: &Option<Session<C>>) -> BridgeResult<&Session<C>> {
    session.as_ref().ok_or(BridgeError::NoActiveSession)
}
