//! WebSocket transport over tokio-tungstenite

use crate::core::error::{FabricError, Result};
use crate::core::service::{
    FrameSink, FrameSource, Transport, TransportEvent, TransportSession, CLOSE_ABNORMAL,
};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the server sent a close frame without a status.
const CLOSE_NO_STATUS: u16 = 1005;

#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<TransportSession> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| FabricError::Transport(e.to_string()))?;
        info!(url = %url, status = ?response.status(), "WebSocket connection established");

        let (write, read) = stream.split();
        Ok(TransportSession {
            sink: Box::new(WsSink { write }),
            source: Box::new(WsSource { read }),
        })
    }
}

struct WsSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.write
            .send(Message::Text(frame))
            .await
            .map_err(|e| FabricError::Transport(e.to_string()))
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.write
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| FabricError::Transport(e.to_string()))?;
        self.write
            .close()
            .await
            .map_err(|e| FabricError::Transport(e.to_string()))
    }
}

struct WsSource {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Frame(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return TransportEvent::Frame(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((CLOSE_NO_STATUS, String::new()));
                    debug!(code, reason = %reason, "WebSocket closed by server");
                    return TransportEvent::Closed { code, reason };
                }
                // tungstenite queues the pong for protocol-level pings itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    trace!("WebSocket control frame");
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    return TransportEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: e.to_string(),
                    }
                }
                None => {
                    return TransportEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: "stream ended".to_string(),
                    }
                }
            }
        }
    }
}
