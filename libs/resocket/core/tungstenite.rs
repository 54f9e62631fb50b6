use crate::connection::TransportEvents;
use crate::traits::event::NORMAL_CLOSURE;
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};

/// Commands from the transport handle to its socket task
#[derive(Debug)]
enum TransportCommand {
    Send(WsMessage),
    Close { code: u16, reason: String },
}

/// How long to wait for the peer to answer a close frame
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport factory backed by `tokio-tungstenite`
///
/// Requires a tokio runtime: `is_supported` is false outside one. Each
/// transport runs its socket in a dedicated task.
#[derive(Debug, Clone, Copy)]
pub struct TungsteniteFactory {
    close_timeout: Duration,
}

impl TungsteniteFactory {
    pub fn new() -> Self {
        Self {
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Drop the socket if the close handshake takes longer than `timeout`
    ///
    /// The connection then reports an abnormal close.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

impl Default for TungsteniteFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for TungsteniteFactory {
    fn is_supported(&self) -> bool {
        Handle::try_current().is_ok()
    }

    fn connect(
        &self,
        request: &ConnectRequest,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>> {
        let runtime = Handle::try_current().map_err(|e| {
            ResocketError::UnsupportedEnvironment(format!("no tokio runtime available: {}", e))
        })?;
        let client_request = build_request(request)?;

        let (command_tx, command_rx) = unbounded_channel();
        runtime.spawn(drive_socket(
            client_request,
            request.binary_mode,
            self.close_timeout,
            events,
            command_rx,
        ));

        Ok(Arc::new(TungsteniteTransport {
            commands: command_tx,
        }))
    }
}

/// Handle to a socket task
///
/// Dropping it closes the socket.
struct TungsteniteTransport {
    commands: UnboundedSender<TransportCommand>,
}

impl Transport for TungsteniteTransport {
    fn send(&self, message: WsMessage) -> Result<()> {
        self.commands
            .send(TransportCommand::Send(message))
            .map_err(|_| ResocketError::Transport("socket task has exited".to_string()))
    }

    fn close(&self, code: u16, reason: &str) -> Result<()> {
        self.commands
            .send(TransportCommand::Close {
                code,
                reason: reason.to_string(),
            })
            .map_err(|_| ResocketError::Transport("socket task has exited".to_string()))
    }
}

fn build_request(request: &ConnectRequest) -> Result<Request> {
    let mut client_request = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| ResocketError::InvalidUrl(format!("{}: {}", request.url, e)))?;

    if let Some(protocol) = &request.protocol {
        let value = HeaderValue::from_str(protocol).map_err(|_| {
            ResocketError::Configuration(format!("invalid subprotocol '{}'", protocol))
        })?;
        client_request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok(client_request)
}

async fn wait_for_close(commands: &mut UnboundedReceiver<TransportCommand>) {
    while let Some(command) = commands.recv().await {
        if let TransportCommand::Close { .. } = command {
            return;
        }
    }
}

/// Socket task: connect, pump frames both ways, report the close
async fn drive_socket(
    request: Request,
    binary_mode: bool,
    close_timeout: Duration,
    events: TransportEvents,
    mut commands: UnboundedReceiver<TransportCommand>,
) {
    let stream = tokio::select! {
        result = connect_async(request) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                events.error(format!("Failed to connect: {}", e));
                events.disconnected(CloseInfo::abnormal());
                return;
            }
        },
        _ = wait_for_close(&mut commands) => {
            debug!("Close requested before the handshake completed");
            events.disconnected(CloseInfo::abnormal());
            return;
        }
    };

    events.connected();

    let (mut write, mut read) = stream.split();
    let mut closing = false;
    let mut close_deadline = Instant::now();
    let mut received_close: Option<CloseInfo> = None;

    let outcome = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let message = if binary_mode {
                        WsMessage::Binary(text.into_bytes())
                    } else {
                        WsMessage::Text(text)
                    };
                    events.message(message);
                }
                Some(Ok(Message::Binary(data))) => events.message(WsMessage::Binary(data)),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Received close frame: {:?}", frame);
                    received_close = Some(match frame {
                        Some(frame) => CloseInfo::clean(u16::from(frame.code), frame.reason.into_owned()),
                        None => CloseInfo { was_clean: true, code: None, reason: None },
                    });
                }
                // Ping replies are queued by tungstenite itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    break received_close.take().unwrap_or_else(CloseInfo::abnormal);
                }
                Some(Err(e)) => {
                    events.error(e.to_string());
                    break CloseInfo::abnormal();
                }
            },

            _ = sleep_until(close_deadline), if closing => {
                warn!("Close handshake not answered within {:?}, dropping socket", close_timeout);
                break CloseInfo::abnormal();
            }

            command = commands.recv(), if !closing => match command {
                Some(TransportCommand::Send(message)) => {
                    if let Err(e) = write.send(to_tungstenite(message)).await {
                        warn!("Failed to send message: {}", e);
                        events.error(format!("Failed to send message: {}", e));
                    }
                }
                Some(TransportCommand::Close { code, reason }) => {
                    closing = true;
                    close_deadline = Instant::now() + close_timeout;
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        debug!("Failed to send close frame: {}", e);
                    }
                }
                None => {
                    debug!("Transport handle dropped, closing socket");
                    closing = true;
                    close_deadline = Instant::now() + close_timeout;
                    let frame = CloseFrame {
                        code: CloseCode::from(NORMAL_CLOSURE),
                        reason: "".into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        debug!("Failed to send close frame: {}", e);
                    }
                }
            }
        }
    };

    events.disconnected(outcome);
}

fn to_tungstenite(message: WsMessage) -> Message {
    match message {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str, protocol: Option<&str>) -> ConnectRequest {
        ConnectRequest {
            url: url.to_string(),
            protocol: protocol.map(str::to_string),
            binary_mode: false,
        }
    }

    #[test]
    fn request_carries_subprotocol_header() {
        let built = build_request(&request("ws://127.0.0.1:9001/feed", Some("chat.v2"))).unwrap();
        assert_eq!(built.headers().get(SEC_WEBSOCKET_PROTOCOL).unwrap(), "chat.v2");
    }

    #[test]
    fn request_without_protocol_has_no_header() {
        let built = build_request(&request("ws://127.0.0.1:9001", None)).unwrap();
        assert!(built.headers().get(SEC_WEBSOCKET_PROTOCOL).is_none());
    }

    #[test]
    fn malformed_url_is_rejected() {
        let err = build_request(&request("not a url", None)).unwrap_err();
        assert!(matches!(err, ResocketError::InvalidUrl(_)));
    }

    #[test]
    fn unsupported_outside_runtime() {
        assert!(!TungsteniteFactory::new().is_supported());
    }

    #[tokio::test]
    async fn supported_inside_runtime() {
        assert!(TungsteniteFactory::new().is_supported());
    }
}
