//! Unix socket server implementation

use std::{os::unix::fs::PermissionsExt, path::Path, sync::Arc};
use tokio::{
    fs,
    net::{UnixListener, UnixStream},
    sync::broadcast,
};
use tracing::{debug, error, info, warn};

use crate::{
    backend::{LinkLayer, LocalScanFacility},
    core::{
        error::TransportResult,
        event::EventStream,
        service::ProvisioningBridge,
    },
    protocol::{JsonRpcNotification, JsonRpcRequest, Notification},
    transport::unix_socket::{
        handler::RequestHandler,
        session::{SessionReader, UnixSocketSession},
    },
};

const NOTIFICATION_CAPACITY: usize = 256;

/// Unix socket server
pub struct UnixSocketServer<L: LinkLayer, S: LocalScanFacility> {
    socket_path: String,
    socket_mode: u32,
    bridge: Arc<ProvisioningBridge<L, S>>,
    handler: Arc<RequestHandler<L, S>>,
    notification_tx: broadcast::Sender<JsonRpcNotification>,
}

impl<L: LinkLayer, S: LocalScanFacility> UnixSocketServer<L, S> {
    /// Create a new Unix socket server
    pub fn new(socket_path: String, socket_mode: u32, bridge: Arc<ProvisioningBridge<L, S>>) -> Self {
        let handler = Arc::new(RequestHandler::new(bridge.clone()));
        let (notification_tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            socket_path,
            socket_mode,
            bridge,
            handler,
            notification_tx,
        }
    }

    /// Start the server
    pub async fn start(&self) -> TransportResult<()> {
        let listener = self.listen().await?;

        tokio::spawn(forward_events(
            self.bridge.subscribe(),
            self.notification_tx.clone(),
        ));

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let handler = self.handler.clone();
                    let notifications = self.notification_tx.subscribe();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_client(stream, handler, notifications).await {
                            error!("Error handling client: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                }
            }
        }
    }

    /// Take a socket passed by the service manager, or bind our own
    async fn listen(&self) -> TransportResult<UnixListener> {
        let mut listenfd = listenfd::ListenFd::from_env();
        if let Some(listener) = listenfd.take_unix_listener(0)? {
            listener.set_nonblocking(true)?;
            info!("Using activated Unix socket");
            return Ok(UnixListener::from_std(listener)?);
        }

        // Remove existing socket file if it exists
        if Path::new(&self.socket_path).exists() {
            fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        fs::set_permissions(
            &self.socket_path,
            std::fs::Permissions::from_mode(self.socket_mode),
        )
        .await?;

        info!(
            "Unix socket server listening on {} (mode {:o})",
            self.socket_path, self.socket_mode
        );
        Ok(listener)
    }

    async fn handle_client(
        stream: UnixStream,
        handler: Arc<RequestHandler<L, S>>,
        mut notifications: broadcast::Receiver<JsonRpcNotification>,
    ) -> TransportResult<()> {
        let (read_half, write_half) = stream.into_split();
        let session = Arc::new(UnixSocketSession::new(write_half));
        let mut reader = SessionReader::new(read_half);

        info!("New client connected: {}", session.id());

        let pusher = {
            let session = session.clone();
            tokio::spawn(async move {
                loop {
                    match notifications.recv().await {
                        Ok(notification) => {
                            if let Err(e) = session.send_notification(&notification).await {
                                debug!("Stopping notifications for {}: {}", session.id(), e);
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("Client {} missed {} notifications", session.id(), missed);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        let result: TransportResult<()> = async {
            while let Some(line) = reader.read_line().await? {
                if line.is_empty() {
                    continue;
                }

                let response = match JsonRpcRequest::parse(&line) {
                    Ok(request) => handler.handle_request(request).await,
                    Err(response) => {
                        warn!("Invalid JSON-RPC request: {}", line);
                        response
                    }
                };
                session.send_response(&response).await?;
            }
            Ok(())
        }
        .await;

        pusher.abort();
        info!("Client disconnected: {}", session.id());
        result
    }
}

/// Turn bridge events into notifications for every connected client
async fn forward_events(
    mut events: EventStream,
    notification_tx: broadcast::Sender<JsonRpcNotification>,
) {
    while let Some(event) = events.recv().await {
        // No receivers just means no client is connected
        let _ = notification_tx.send(JsonRpcNotification::new(Notification::from(event)));
    }
    debug!("Event forwarding stopped");
}
