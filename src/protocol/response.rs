//! Response message types

use serde::{Deserialize, Serialize};

use crate::core::types::LifecycleState;

/// Response messages from bridge to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Response {
    /// Response for get_state request
    State(StateResponse),

    /// Command accepted; the outcome follows as notifications
    Ack(AckResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateResponse {
    pub status: String,
    pub state: LifecycleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

impl StateResponse {
    pub fn ok(state: LifecycleState, device_id: Option<String>) -> Self {
        Self {
            status: "ok".to_string(),
            state,
            device_id,
        }
    }
}
