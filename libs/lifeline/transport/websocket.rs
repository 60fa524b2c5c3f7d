//! WebSocket transport built on `tokio-tungstenite`
//!
//! `open` validates the address and prepares the handshake request
//! synchronously, then spawns one I/O task per connection. The task owns the
//! socket and reports back through the [`TransportEvents`] sink:
//!
//! - handshake failure: `Errored` then `Closed { 1006 }`
//! - handshake success: `Opened`, then one `Message` per text frame
//! - end of stream: `Closed` with the code from the peer's close frame, the
//!   code we closed with, or 1006 if neither is known
//!
//! Binary, ping and pong frames are not surfaced. Dropping the handle stops
//! the task without any further events.

use crate::traits::*;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Close code reported when the connection ended without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when the peer's close frame carried no status
pub const NO_STATUS_RECEIVED: u16 = 1005;

const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens WebSocket connections
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    close_timeout: Duration,
}

impl WebSocketTransport {
    /// `close_timeout` bounds how long a closing handshake may take before
    /// the connection is dropped.
    pub fn new(close_timeout: Duration) -> Self {
        Self { close_timeout }
    }

    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CLOSE_TIMEOUT)
    }
}

impl Transport for WebSocketTransport {
    fn open(
        &self,
        address: &str,
        protocols: &[String],
        events: TransportEvents,
    ) -> Result<Box<dyn TransportHandle>> {
        let request = build_request(address, protocols)?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LifelineError::TransportCreation(e.to_string()))?;
        runtime.spawn(run_socket(
            request,
            events,
            outbound_rx,
            Arc::clone(&open),
            self.close_timeout,
        ));

        Ok(Box::new(WebSocketHandle { outbound_tx, open }))
    }
}

/// Build the handshake request for `address`, offering `protocols`
fn build_request(address: &str, protocols: &[String]) -> Result<Request> {
    let mut request = address.into_client_request().map_err(|e| {
        LifelineError::TransportCreation(format!("invalid address '{}': {}", address, e))
    })?;

    match request.uri().scheme_str() {
        Some("ws") | Some("wss") => {}
        other => {
            return Err(LifelineError::TransportCreation(format!(
                "unsupported scheme {:?} in '{}', expected ws or wss",
                other.unwrap_or(""),
                address
            )));
        }
    }

    if !protocols.is_empty() {
        let value = protocols.join(", ");
        let header = value.parse::<http::header::HeaderValue>().map_err(|_| {
            LifelineError::TransportCreation(format!("invalid sub-protocol list: {}", value))
        })?;
        request
            .headers_mut()
            .insert(http::header::SEC_WEBSOCKET_PROTOCOL, header);
    }

    Ok(request)
}

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close(u16),
}

struct WebSocketHandle {
    outbound_tx: UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl TransportHandle for WebSocketHandle {
    fn send(&mut self, text: &str) -> Result<()> {
        if !self.is_open() {
            return Err(LifelineError::NotOpen("websocket is not open".to_string()));
        }
        self.outbound_tx
            .send(Outbound::Text(text.to_string()))
            .map_err(|e| LifelineError::ChannelSend(e.to_string()))
    }

    fn close(&mut self, code: u16) {
        self.open.store(false, Ordering::Release);
        let _ = self.outbound_tx.send(Outbound::Close(code));
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// I/O task for one connection
async fn run_socket(
    request: Request,
    events: TransportEvents,
    mut outbound_rx: UnboundedReceiver<Outbound>,
    open: Arc<AtomicBool>,
    close_timeout: Duration,
) {
    let session = events.session();

    let connect = connect_async(request);
    tokio::pin!(connect);

    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((ws_stream, _response)) => break ws_stream,
                Err(e) => {
                    debug!(session, "WebSocket handshake failed: {}", e);
                    events.emit(TransportEvent::Errored(e.to_string()));
                    events.emit(TransportEvent::Closed { code: ABNORMAL_CLOSURE });
                    return;
                }
            },
            command = outbound_rx.recv() => match command {
                Some(Outbound::Text(_)) => debug!(session, "Dropping payload queued before open"),
                Some(Outbound::Close(code)) => {
                    debug!(session, "Closed before the handshake completed");
                    events.emit(TransportEvent::Closed { code });
                    return;
                }
                None => {
                    debug!(session, "Transport handle dropped while connecting");
                    return;
                }
            },
        }
    };

    open.store(true, Ordering::Release);
    if !events.emit(TransportEvent::Opened) {
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    // Code from the peer's close frame, if one arrived
    let mut remote_code: Option<u16> = None;
    // Code we closed with, if we started the closing handshake
    let mut local_code: Option<u16> = None;
    let mut closing_deadline: Option<Instant> = None;

    loop {
        let deadline_at = closing_deadline;
        let deadline = async move {
            match deadline_at {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if !events.emit(TransportEvent::Message(text)) {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map(|f| u16::from(f.code)).unwrap_or(NO_STATUS_RECEIVED);
                    debug!(session, code, "Close frame received");
                    open.store(false, Ordering::Release);
                    remote_code = Some(code);
                }
                // Binary payloads are not supported; ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(session, "WebSocket error: {}", e);
                    events.emit(TransportEvent::Errored(e.to_string()));
                    break;
                }
                None => break,
            },
            command = outbound_rx.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        warn!(session, "Failed to send message: {}", e);
                        events.emit(TransportEvent::Errored(e.to_string()));
                        break;
                    }
                }
                Some(Outbound::Close(code)) => {
                    if local_code.is_some() {
                        continue;
                    }
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "".into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        debug!(session, "Failed to send close frame: {}", e);
                    }
                    local_code = Some(code);
                    closing_deadline = Some(Instant::now() + close_timeout);
                }
                None => {
                    debug!(session, "Transport handle dropped, stopping socket task");
                    return;
                }
            },
            _ = deadline => {
                warn!(session, "Closing handshake timed out after {:?}", close_timeout);
                break;
            }
        }
    }

    open.store(false, Ordering::Release);
    let code = remote_code.or(local_code).unwrap_or(ABNORMAL_CLOSURE);
    events.emit(TransportEvent::Closed { code });
}
