//! Common test utilities for lifeline integration tests
//!
//! - `MockTransport`: scripted in-memory transport; tests decide when each
//!   connection opens, closes, errors or receives a message
//! - `MockWsServer`: real WebSocket server on localhost that answers heartbeat
//!   probes and echoes everything else

#![allow(dead_code)]

use lifeline::{
    ConnectionEvent, ConnectionManager, LifelineError, Result, Transport, TransportEvent,
    TransportEvents, TransportHandle,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Let the controller task drain its queue
///
/// On the paused test clock no time passes while yielding.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock by `ms` and let everything that became due run
pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

/// All notifications currently queued on the manager
pub fn drain_events(manager: &ConnectionManager) -> Vec<ConnectionEvent> {
    std::iter::from_fn(|| manager.try_recv_event()).collect()
}

/// One connection handed out by [`MockTransport`]
#[derive(Clone)]
pub struct MockConnection {
    pub address: String,
    pub protocols: Vec<String>,
    pub opened_at: Instant,
    pub events: TransportEvents,
    open: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<Vec<u16>>>,
}

impl MockConnection {
    /// Report the connection as established
    pub fn emit_open(&self) -> bool {
        self.open.store(true, Ordering::Release);
        self.events.emit(TransportEvent::Opened)
    }

    /// Report the connection as gone
    pub fn emit_close(&self, code: u16) -> bool {
        self.open.store(false, Ordering::Release);
        self.events.emit(TransportEvent::Closed { code })
    }

    pub fn emit_error(&self, detail: &str) -> bool {
        self.events.emit(TransportEvent::Errored(detail.to_string()))
    }

    pub fn emit_message(&self, text: &str) -> bool {
        self.events.emit(TransportEvent::Message(text.to_string()))
    }

    /// Payloads the manager sent on this connection, probes included
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Heartbeat probes sent on this connection
    pub fn probes(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|payload| payload.starts_with(r#"{"ping":"#))
            .collect()
    }

    /// Codes the manager asked this connection to close with
    pub fn closes(&self) -> Vec<u16> {
        self.closes.lock().clone()
    }
}

#[derive(Default)]
struct MockState {
    connections: Vec<MockConnection>,
    fail_next_opens: usize,
    refuse_next_opens: usize,
    failed_opens: usize,
    auto_pong: bool,
}

/// Scripted transport
///
/// Clones share state, so a test keeps one clone and hands the other to the
/// builder.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every probe with a `{"pong": ..}` reply
    pub fn with_auto_pong(self) -> Self {
        self.state.lock().auto_pong = true;
        self
    }

    /// Make the next `count` calls to `open` fail synchronously
    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().fail_next_opens = count;
    }

    /// Let the next `count` connections fail the way a refused handshake does:
    /// `Errored` followed by `Closed { 1006 }`
    pub fn refuse_next_opens(&self, count: usize) {
        self.state.lock().refuse_next_opens = count;
    }

    /// Refuse every connection from now on
    pub fn refuse_all(&self) {
        self.refuse_next_opens(usize::MAX);
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    pub fn failed_opens(&self) -> usize {
        self.state.lock().failed_opens
    }

    pub fn connection(&self, index: usize) -> MockConnection {
        self.state.lock().connections[index].clone()
    }

    pub fn last(&self) -> MockConnection {
        self.state
            .lock()
            .connections
            .last()
            .cloned()
            .expect("no connection opened yet")
    }

    pub fn open_instants(&self) -> Vec<Instant> {
        self.state
            .lock()
            .connections
            .iter()
            .map(|connection| connection.opened_at)
            .collect()
    }
}

impl Transport for MockTransport {
    fn open(
        &self,
        address: &str,
        protocols: &[String],
        events: TransportEvents,
    ) -> Result<Box<dyn TransportHandle>> {
        let mut state = self.state.lock();

        if state.fail_next_opens > 0 {
            state.fail_next_opens -= 1;
            state.failed_opens += 1;
            return Err(LifelineError::TransportCreation(format!(
                "mock refused to create transport for {}",
                address
            )));
        }

        let connection = MockConnection {
            address: address.to_string(),
            protocols: protocols.to_vec(),
            opened_at: Instant::now(),
            events,
            open: Arc::new(AtomicBool::new(false)),
            sent: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(Mutex::new(Vec::new())),
        };

        if state.refuse_next_opens > 0 {
            state.refuse_next_opens -= 1;
            connection.emit_error("connection refused");
            connection.emit_close(1006);
        }

        state.connections.push(connection.clone());

        Ok(Box::new(MockHandle {
            connection,
            auto_pong: state.auto_pong,
        }))
    }
}

struct MockHandle {
    connection: MockConnection,
    auto_pong: bool,
}

impl TransportHandle for MockHandle {
    fn send(&mut self, text: &str) -> Result<()> {
        if !self.is_open() {
            return Err(LifelineError::NotOpen("mock connection is not open".to_string()));
        }
        self.connection.sent.lock().push(text.to_string());

        if self.auto_pong && text.starts_with(r#"{"ping":"#) {
            self.connection.emit_message(r#"{"pong": 1}"#);
        }
        Ok(())
    }

    /// Completes the closing handshake immediately
    fn close(&mut self, code: u16) {
        self.connection.closes.lock().push(code);
        if self.connection.open.swap(false, Ordering::AcqRel) {
            self.connection.events.emit(TransportEvent::Closed { code });
        }
    }

    fn is_open(&self) -> bool {
        self.connection.open.load(Ordering::Acquire)
    }
}

/// A simple mock WebSocket server for testing
///
/// Replies to `{"ping": n}` with `{"pong": n}` and echoes every other text
/// frame. Connections are dropped without a close frame when the server
/// shuts down.
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let reply = match serde_json::from_str::<serde_json::Value>(&text) {
                                Ok(serde_json::Value::Object(fields)) if fields.contains_key("ping") => {
                                    serde_json::json!({ "pong": fields["ping"].clone() }).to_string()
                                }
                                _ => text,
                            };
                            if write.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            // tungstenite queues the close reply; flush it
                            let _ = write.flush().await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
