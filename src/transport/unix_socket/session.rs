//! Unix socket client session management

use serde::Serialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::unix::{OwnedReadHalf, OwnedWriteHalf},
    sync::Mutex,
};

use crate::{
    core::{error::TransportResult, types::SessionId},
    protocol::{JsonRpcNotification, JsonRpcResponse},
};

/// Write side of one connected client
///
/// Responses and notifications interleave on the same stream, one JSON
/// document per line.
#[derive(Debug)]
pub struct UnixSocketSession {
    id: SessionId,
    writer: Mutex<OwnedWriteHalf>,
}

impl UnixSocketSession {
    pub fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            id: SessionId::new(),
            writer: Mutex::new(writer),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn send_response(&self, response: &JsonRpcResponse) -> TransportResult<()> {
        self.send_line(response).await
    }

    pub async fn send_notification(
        &self,
        notification: &JsonRpcNotification,
    ) -> TransportResult<()> {
        self.send_line(notification).await
    }

    async fn send_line<T: Serialize>(&self, message: &T) -> TransportResult<()> {
        let json = serde_json::to_string(message)?;

        let mut writer = self.writer.lock().await;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        Ok(())
    }
}

/// Session reader for processing incoming messages
pub struct SessionReader {
    reader: BufReader<OwnedReadHalf>,
}

impl SessionReader {
    pub fn new(reader: OwnedReadHalf) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next line from the socket, `None` on EOF
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::event::Event,
        protocol::{JsonRpcRequest, Notification, Request, RequestId},
    };
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let (client, server) = UnixStream::pair().unwrap();
        let session = UnixSocketSession::new(server.into_split().1);
        let session2 = UnixSocketSession::new(client.into_split().1);

        assert_ne!(session.id(), session2.id());
    }

    #[tokio::test]
    async fn test_session_reader_strips_line_endings() {
        let (client, server) = UnixStream::pair().unwrap();
        let (read_half, _write_half) = server.into_split();
        let mut reader = SessionReader::new(read_half);

        let request = JsonRpcRequest::new(Request::GetState, RequestId::Number(1));
        let json = serde_json::to_string(&request).unwrap();
        let (_client_read, mut client_write) = client.into_split();

        client_write.write_all(json.as_bytes()).await.unwrap();
        client_write.write_all(b"\r\n").await.unwrap();
        client_write.flush().await.unwrap();

        let line = reader.read_line().await.unwrap().unwrap();
        assert_eq!(line, json);
    }

    #[tokio::test]
    async fn test_session_writes_notification_line() {
        let (client, server) = UnixStream::pair().unwrap();
        let session = UnixSocketSession::new(server.into_split().1);
        let mut reader = SessionReader::new(client.into_split().0);

        let notification = JsonRpcNotification::new(Notification::from(Event::error(5)));
        session.send_notification(&notification).await.unwrap();

        let line = reader.read_line().await.unwrap().unwrap();
        let received: JsonRpcNotification = serde_json::from_str(&line).unwrap();
        assert_eq!(received, notification);
    }

    #[tokio::test]
    async fn test_session_reader_eof() {
        let (client, server) = UnixStream::pair().unwrap();
        let (read_half, _) = server.into_split();
        let mut reader = SessionReader::new(read_half);

        drop(client);

        let line = reader.read_line().await.unwrap();
        assert!(line.is_none());
    }
}
