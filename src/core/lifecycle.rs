//! Connection lifecycle state machine and completion handling

use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    backend::{
        link_layer::LinkEvent,
        provisioning_client::{Completion, ProvisioningClient},
    },
    core::{
        error::{BridgeError, BridgeResult},
        event::{Event, EventSink},
        generation::{Generation, Tagged},
        session::SharedSlot,
        types::{LifecycleState, Operation, ScanEntry, ScanSource},
    },
};

/// Lifecycle state machine
///
/// Every mutation bumps `ticket`, which lets a watchdog tell whether the
/// state it was armed for is still current.
#[derive(Debug)]
pub struct LifecycleStateMachine {
    state: LifecycleState,
    pending_configures: u32,
    ticket: u64,
}

impl LifecycleStateMachine {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
            pending_configures: 0,
            ticket: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    fn transition(&mut self, to: LifecycleState) {
        self.state = to;
        self.ticket += 1;
    }

    /// Back to idle, dropping any in-flight bookkeeping
    pub fn reset(&mut self) {
        self.pending_configures = 0;
        self.transition(LifecycleState::Idle);
    }

    pub fn begin_connect(&mut self) {
        self.pending_configures = 0;
        self.transition(LifecycleState::Connecting);
    }

    /// Returns true when the link came up for a connecting session
    pub fn link_up(&mut self) -> bool {
        if self.state != LifecycleState::Connecting {
            return false;
        }
        self.transition(LifecycleState::Connected);
        true
    }

    /// Returns true when a live session was torn down
    pub fn link_down(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.pending_configures = 0;
        self.transition(LifecycleState::Disconnected);
        true
    }

    /// Fails with `NoActiveSession` unless the link is up
    pub fn require_link(&self) -> BridgeResult<()> {
        if self.state.link_ready() {
            Ok(())
        } else {
            Err(BridgeError::NoActiveSession)
        }
    }

    pub fn begin_negotiation(&mut self) -> BridgeResult<()> {
        self.require_link()?;
        if self.state != LifecycleState::Connected {
            return Err(BridgeError::InvalidState {
                state: self.state,
                operation: Operation::NegotiateSecurity,
            });
        }
        self.transition(LifecycleState::SecurityNegotiating);
        Ok(())
    }

    /// Success moves to `SecurityReady`, failure back to `Connected`
    pub fn finish_negotiation(&mut self, success: bool) -> bool {
        if self.state != LifecycleState::SecurityNegotiating {
            return false;
        }
        if success {
            self.transition(LifecycleState::SecurityReady);
        } else {
            self.transition(LifecycleState::Connected);
        }
        true
    }

    pub fn begin_configure(&mut self) -> BridgeResult<()> {
        self.require_link()?;
        match self.state {
            LifecycleState::SecurityReady | LifecycleState::Configuring => {
                self.pending_configures += 1;
                self.transition(LifecycleState::Configuring);
                Ok(())
            }
            state => Err(BridgeError::InvalidState {
                state,
                operation: Operation::Configure,
            }),
        }
    }

    /// One configure finished; `SecurityReady` once none remain in flight
    pub fn finish_configure(&mut self) -> bool {
        if self.state != LifecycleState::Configuring {
            return false;
        }
        self.pending_configures = self.pending_configures.saturating_sub(1);
        if self.pending_configures == 0 {
            self.transition(LifecycleState::SecurityReady);
        } else {
            self.ticket += 1;
        }
        true
    }

    /// Roll back an in-flight state that has not moved since `ticket`
    pub fn expire(&mut self, ticket: u64) -> Option<Operation> {
        if ticket != self.ticket {
            return None;
        }
        match self.state {
            LifecycleState::Connecting => {
                self.transition(LifecycleState::Disconnected);
                Some(Operation::Connect)
            }
            LifecycleState::SecurityNegotiating => {
                self.transition(LifecycleState::Connected);
                Some(Operation::NegotiateSecurity)
            }
            LifecycleState::Configuring => {
                self.pending_configures = 0;
                self.transition(LifecycleState::SecurityReady);
                Some(Operation::Configure)
            }
            _ => None,
        }
    }
}

impl Default for LifecycleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds how long an in-flight state may wait for its completion
pub struct Watchdog<C: ProvisioningClient> {
    slot: SharedSlot<C>,
    events: EventSink,
    timeout: Option<Duration>,
}

impl<C: ProvisioningClient> Clone for Watchdog<C> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            events: self.events.clone(),
            timeout: self.timeout,
        }
    }
}

impl<C: ProvisioningClient> Watchdog<C> {
    pub fn new(slot: SharedSlot<C>, events: EventSink, timeout: Option<Duration>) -> Self {
        Self {
            slot,
            events,
            timeout,
        }
    }

    /// Expire the state reached at `ticket` unless it changes in time
    pub fn arm(&self, generation: Generation, ticket: u64) {
        let Some(timeout) = self.timeout else {
            return;
        };

        let slot = self.slot.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let mut slot = slot.lock().await;
            if !slot.is_current(generation) {
                return;
            }
            let Some(operation) = slot.lifecycle.expire(ticket) else {
                return;
            };

            warn!(?operation, %generation, "No completion within {:?}", timeout);
            if operation == Operation::Connect {
                if let Some(session) = slot.session.take() {
                    session.close().await;
                }
            }
            events.emit(Event::Timeout { operation });
        });
    }
}

/// Reacts to link notifications and client completions
pub struct LifecycleController<C: ProvisioningClient> {
    slot: SharedSlot<C>,
    events: EventSink,
    watchdog: Watchdog<C>,
    transfer_unit: u16,
}

impl<C: ProvisioningClient> LifecycleController<C> {
    pub fn new(
        slot: SharedSlot<C>,
        events: EventSink,
        watchdog: Watchdog<C>,
        transfer_unit: u16,
    ) -> Self {
        Self {
            slot,
            events,
            watchdog,
            transfer_unit,
        }
    }

    /// Apply a link-layer notification
    pub async fn handle_link_event(&self, event: Tagged<LinkEvent>) {
        let mut guard = self.slot.lock().await;
        let slot = &mut *guard;

        if !slot.is_current(event.generation) {
            debug!(generation = %event.generation, "Discarding link event from stale session");
            return;
        }

        match event.payload {
            LinkEvent::Connected { status } => {
                if !slot.lifecycle.link_up() {
                    debug!(state = ?slot.lifecycle.state(), "Ignoring link up outside Connecting");
                    return;
                }

                self.events.log(format!(
                    "Link connected (status {}), requesting transfer unit {}",
                    status, self.transfer_unit
                ));

                // Sent before the state becomes observable, so it precedes every command
                if let Some(session) = &slot.session {
                    if let Err(e) = session.client.request_transfer_unit(self.transfer_unit).await
                    {
                        warn!("Transfer unit request failed: {}", e);
                        self.events
                            .log(format!("Transfer unit request not submitted: {}", e));
                    }
                }

                self.events.emit(Event::link_up(status));
            }
            LinkEvent::Disconnected { status } => {
                if !slot.lifecycle.link_down() {
                    return;
                }

                if let Some(session) = slot.session.take() {
                    self.events.log(format!(
                        "Link to {} lost (status {})",
                        session.device_id(),
                        status
                    ));
                    session.close().await;
                }

                self.events.emit(Event::link_down(status));
            }
        }
    }

    /// Apply a provisioning client completion
    pub async fn handle_completion(&self, completion: Tagged<Completion>) {
        let mut slot = self.slot.lock().await;

        if !slot.is_current(completion.generation) {
            debug!(
                generation = %completion.generation,
                "Discarding completion from stale session"
            );
            return;
        }
        let generation = completion.generation;

        match completion.payload {
            Completion::TransferUnit { size, status } => {
                if status == 0 {
                    self.events.log(format!("Transfer unit changed to {}", size));
                } else {
                    self.events
                        .log(format!("Transfer unit change failed, status {}", status));
                }
            }
            Completion::SecurityNegotiated { status } => {
                if !slot.lifecycle.finish_negotiation(status == 0) {
                    warn!(state = ?slot.lifecycle.state(), "Late security negotiation result");
                }
                self.events.emit(Event::SecurityResult { status });
                self.events
                    .log(format!("Security negotiation result: {}", status));
            }
            Completion::ConfigurePosted { status } => {
                if !slot.lifecycle.finish_configure() {
                    warn!(state = ?slot.lifecycle.state(), "Late configure result");
                } else if slot.lifecycle.state() == LifecycleState::Configuring {
                    self.watchdog.arm(generation, slot.lifecycle.ticket());
                }
                self.events.emit(Event::ConfigureResult { status });
                self.events
                    .log(format!("Post configure params result: {}", status));
            }
            Completion::DeviceStatus { status, response } => {
                self.events.emit(Event::Completed {
                    operation: Operation::DeviceStatus,
                    status,
                });
                if let Some(snapshot) = response {
                    self.events.log(format!("Status response: {:?}", snapshot));
                    self.events.emit(Event::DeviceStatus(snapshot));
                }
            }
            Completion::DeviceVersion { status, version } => {
                self.events.emit(Event::Completed {
                    operation: Operation::DeviceVersion,
                    status,
                });
                if let Some(version) = version {
                    self.events.log(format!("Version response: {}", version));
                    self.events.emit(Event::DeviceVersion { version });
                }
            }
            Completion::DeviceScan { status, results } => {
                self.events.emit(Event::Completed {
                    operation: Operation::DeviceScan,
                    status,
                });
                match results {
                    Some(records) if status == 0 => {
                        let entries = ScanEntry::from_records(records, ScanSource::Device);
                        self.events
                            .log(format!("Device scan: found {} networks", entries.len()));
                        self.events
                            .emit(Event::scan_result(ScanSource::Device, entries));
                    }
                    _ => self
                        .events
                        .log(format!("Device scan failed with status {}", status)),
                }
            }
            Completion::CustomDataPosted { status } => {
                self.events.emit(Event::Completed {
                    operation: Operation::PostCustomData,
                    status,
                });
                self.events
                    .log(format!("Post custom data result: {}", status));
            }
            Completion::CustomDataReceived { status, data } => match data {
                Some(bytes) => {
                    let data = String::from_utf8_lossy(&bytes).into_owned();
                    self.events.log(format!("Received custom data: {}", data));
                    self.events.emit(Event::CustomData { data });
                }
                None => self.events.log(format!(
                    "Custom data notification without payload (status {})",
                    status
                )),
            },
            Completion::Error { code } => {
                self.events.emit(Event::error(code));
                if code == 0 {
                    self.events.log("Error code 0 received (no-op)");
                } else {
                    self.events.log(format!("Error code: {}", code));
                }
            }
        }
    }
}
