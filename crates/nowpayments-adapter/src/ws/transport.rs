/*
[INPUT]:  WebSocket URL
[OUTPUT]: Text-frame transport handle (send / receive / close)
[POS]:    WebSocket layer - transport seam between connection logic and tungstenite
[UPDATE]: When changing TLS setup or frame handling
*/

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::{NowPaymentsError, Result};

/// An open connection exchanging text frames
#[async_trait]
pub trait WsTransport: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next text frame; `None` once the peer closed the connection
    async fn next_text(&mut self) -> Option<Result<String>>;

    async fn close(&mut self);
}

/// Opens transports; the connection worker calls this for every attempt
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn WsTransport>>;
}

/// tokio-tungstenite connector used in production
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn WsTransport>> {
        let (stream, response) = connect_async(url).await?;
        debug!(%url, status = response.status().as_u16(), "ws transport opened");
        Ok(Box::new(TungsteniteTransport { stream }))
    }
}

pub struct TungsteniteTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl WsTransport for TungsteniteTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.to_string())),
                Ok(WsMessage::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes.to_vec()).map_err(|err| {
                        NowPaymentsError::websocket_with_source("binary frame is not utf-8", err)
                    }));
                }
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "ws close frame received");
                    return None;
                }
                // tungstenite queues pongs for pings on its own
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {}
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            debug!(error = %err, "ws close handshake failed");
        }
    }
}
