//! Common test utilities for Resocket integration tests
//!
//! - `MockFactory`: a transport factory whose sockets are driven by the test
//! - `MockWsServer`: a real echo server over `tokio-tungstenite`

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use resocket::{
    CloseInfo, ConnectRequest, ConnectionEvent, ResocketError, Result, Transport,
    TransportEvents, TransportFactory, WsMessage,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Everything the state machine did to one mock transport
#[derive(Default)]
struct SocketLog {
    sent: Vec<WsMessage>,
    close_requests: Vec<(u16, String)>,
}

/// One transport created by [`MockFactory`], driven by the test
#[derive(Clone)]
pub struct MockSocket {
    pub request: ConnectRequest,
    events: TransportEvents,
    log: Arc<Mutex<SocketLog>>,
}

impl MockSocket {
    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    pub fn connect(&self) {
        self.events.connected();
    }

    pub fn receive(&self, message: impl Into<WsMessage>) {
        self.events.message(message.into());
    }

    pub fn fail(&self, detail: &str) {
        self.events.error(detail);
    }

    /// Transport reports an abrupt close
    pub fn drop_connection(&self) {
        self.events.disconnected(CloseInfo::abnormal());
    }

    /// Transport reports an orderly close
    pub fn close_cleanly(&self, code: u16, reason: &str) {
        self.events.disconnected(CloseInfo::clean(code, reason));
    }

    pub fn sent(&self) -> Vec<WsMessage> {
        self.log.lock().sent.clone()
    }

    pub fn close_requests(&self) -> Vec<(u16, String)> {
        self.log.lock().close_requests.clone()
    }
}

struct MockTransport {
    log: Arc<Mutex<SocketLog>>,
}

impl Transport for MockTransport {
    fn send(&self, message: WsMessage) -> Result<()> {
        self.log.lock().sent.push(message);
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) -> Result<()> {
        self.log.lock().close_requests.push((code, reason.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct FactoryState {
    unsupported: bool,
    connect_on_create: bool,
    fail_next: Option<ResocketError>,
    sockets: Vec<MockSocket>,
}

/// Transport factory recording every `connect` call
#[derive(Clone, Default)]
pub struct MockFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory whose environment lacks the transport capability
    pub fn unsupported() -> Self {
        let factory = Self::default();
        factory.state.lock().unsupported = true;
        factory
    }

    /// A factory whose transports report `connected` before `connect` returns
    pub fn connecting_synchronously() -> Self {
        let factory = Self::default();
        factory.state.lock().connect_on_create = true;
        factory
    }

    /// Make the next `connect` fail synchronously
    pub fn fail_next(&self, error: ResocketError) {
        self.state.lock().fail_next = Some(error);
    }

    /// Number of `connect` calls that produced a transport
    pub fn open_count(&self) -> usize {
        self.state.lock().sockets.len()
    }

    pub fn socket(&self, index: usize) -> MockSocket {
        self.state.lock().sockets[index].clone()
    }

    pub fn last(&self) -> MockSocket {
        self.state
            .lock()
            .sockets
            .last()
            .cloned()
            .expect("no transport created yet")
    }
}

impl TransportFactory for MockFactory {
    fn is_supported(&self) -> bool {
        !self.state.lock().unsupported
    }

    fn connect(
        &self,
        request: &ConnectRequest,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }

        let log = Arc::new(Mutex::new(SocketLog::default()));
        state.sockets.push(MockSocket {
            request: request.clone(),
            events: events.clone(),
            log: Arc::clone(&log),
        });
        let connect_now = state.connect_on_create;
        drop(state);

        if connect_now {
            events.connected();
        }
        Ok(Arc::new(MockTransport { log }))
    }
}

/// Drain every event received so far
pub fn drain(events: &Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    events.try_iter().collect()
}

/// Poll a subscription until an event matches or the timeout expires
pub async fn wait_for<F>(
    events: &Receiver<ConnectionEvent>,
    timeout: Duration,
    mut matches: F,
) -> Option<ConnectionEvent>
where
    F: FnMut(&ConnectionEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        while let Ok(event) = events.try_recv() {
            verbose_println!("  event: {:?}", event);
            if matches(&event) {
                return Some(event);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

/// A simple echo WebSocket server for testing
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    kick: Arc<Notify>,
    accepted: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        Self::spawn(false).await
    }

    /// A server that completes the handshake, then never reads
    ///
    /// Close frames sent to it are never answered.
    pub async fn start_unresponsive() -> Self {
        Self::spawn(true).await
    }

    async fn spawn(unresponsive: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let kick = Arc::new(Notify::new());
        let accepted = Arc::new(AtomicUsize::new(0));

        let shutdown_clone = Arc::clone(&shutdown);
        let kick_clone = Arc::clone(&kick);
        let accepted_clone = Arc::clone(&accepted);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                accepted_clone.fetch_add(1, Ordering::SeqCst);
                                let kick = Arc::clone(&kick_clone);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, kick, unresponsive).await;
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

        Self {
            addr,
            shutdown,
            kick,
            accepted,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        kick: Arc<Notify>,
        unresponsive: bool,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        if unresponsive {
            // Hold the socket open without reading until kicked
            kick.notified().await;
            drop(ws_stream);
            return;
        }

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_text() || msg.is_binary() {
                                // Echo the message back
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                // tungstenite answers the close frame on flush
                                let _ = write.flush().await;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = kick.notified() => {
                    // Drop the TCP stream without a close handshake
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of TCP connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Abruptly drop every open connection
    pub fn disconnect_all(&self) {
        self.kick.notify_waiters();
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
