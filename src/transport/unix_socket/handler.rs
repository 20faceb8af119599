//! JSON-RPC request handler for Unix socket transport

use std::sync::Arc;

use tracing::debug;

use crate::{
    backend::{LinkLayer, LocalScanFacility},
    core::{error::BridgeResult, service::ProvisioningBridge},
    protocol::{
        AckResponse, ConfigureWifiParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, Request,
        RequestId, Response, StateResponse,
    },
};

/// JSON-RPC request handler
pub struct RequestHandler<L: LinkLayer, S: LocalScanFacility> {
    bridge: Arc<ProvisioningBridge<L, S>>,
}

impl<L: LinkLayer, S: LocalScanFacility> RequestHandler<L, S> {
    pub fn new(bridge: Arc<ProvisioningBridge<L, S>>) -> Self {
        Self { bridge }
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id;
        debug!(?id, request = ?request.request, "Handling request");

        match request.request {
            Request::Connect(params) => ack(self.bridge.connect(&params.device_id).await, id),
            Request::Disconnect => {
                self.bridge.disconnect().await;
                ack(Ok(()), id)
            }
            Request::NegotiateSecurity => ack(self.bridge.negotiate_security().await, id),
            Request::SetOperatingMode(params) => {
                ack(self.bridge.set_operating_mode(params.mode).await, id)
            }
            Request::ConfigureWifi(params) => self.handle_configure_wifi(params, id).await,
            Request::PostCustomData(params) => {
                ack(self.bridge.post_custom_data(params.data.as_bytes()).await, id)
            }
            Request::RequestDeviceStatus => ack(self.bridge.request_device_status().await, id),
            Request::RequestDeviceVersion => ack(self.bridge.request_device_version().await, id),
            Request::RequestWifiScan => {
                // Results of both sources arrive as scan_result notifications
                self.bridge.request_wifi_scan().await;
                ack(Ok(()), id)
            }
            Request::GetState => {
                let state = self.bridge.state().await;
                let device_id = self.bridge.device_id().await;
                JsonRpcResponse::success(
                    Response::State(StateResponse::ok(state, device_id)),
                    id,
                )
            }
        }
    }

    async fn handle_configure_wifi(
        &self,
        params: ConfigureWifiParams,
        id: RequestId,
    ) -> JsonRpcResponse {
        let ssid = match params.decode_ssid() {
            Ok(ssid) => ssid,
            Err(e) => return JsonRpcResponse::error(JsonRpcError::invalid_params(e), id),
        };
        ack(
            self.bridge
                .configure_wifi_station(&ssid, &params.password)
                .await,
            id,
        )
    }
}

fn ack(result: BridgeResult<()>, id: RequestId) -> JsonRpcResponse {
    match result {
        Ok(()) => JsonRpcResponse::success(Response::Ack(AckResponse::ok()), id),
        Err(e) => JsonRpcResponse::error(e.into(), id),
    }
}
