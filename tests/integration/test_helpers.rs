// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

use sessiond::config::{Config, DispatchStrategy};
use sessiond::core::accounts::{AccountRegistry, load};
use sessiond::core::activity::{ActivityEvent, ActivityLog, ActivitySink, NullActivityLog};
use sessiond::core::state::ServerState;
use sessiond::server::{self, setup_with};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// How long a client waits for a reply before the test fails.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// The account directory most tests run against.
pub const DEFAULT_ACCOUNTS: &str = "alice 1\nbob 1\ncarol 0\n";

/// Both strategies must behave identically on the wire.
pub const ALL_DISPATCH: [DispatchStrategy; 2] = [DispatchStrategy::Poll, DispatchStrategy::Worker];

/// A loopback configuration on an ephemeral port.
pub fn test_config(dispatch: DispatchStrategy) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        dispatch,
        ..Config::default()
    }
}

/// Captures activity events in memory.
#[derive(Debug, Default)]
pub struct RecordingActivityLog {
    events: Mutex<Vec<ActivityEvent>>,
}

impl RecordingActivityLog {
    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ActivitySink for RecordingActivityLog {
    fn record(&self, event: ActivityEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A running server bound to an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Starts a server with the default account directory.
    pub async fn start(dispatch: DispatchStrategy) -> Self {
        Self::with_config(test_config(dispatch), DEFAULT_ACCOUNTS).await
    }

    /// Starts a server with a custom configuration and account directory.
    pub async fn with_config(config: Config, accounts: &str) -> Self {
        Self::with_activity(config, accounts, Arc::new(NullActivityLog)).await
    }

    /// Starts a server that records activity into `activity`.
    pub async fn with_activity(config: Config, accounts: &str, activity: ActivityLog) -> Self {
        init_tracing();
        let registry = Arc::new(AccountRegistry::from_accounts(
            load(accounts).expect("Failed to parse test accounts"),
        ));
        let ctx = setup_with(config, registry, activity)
            .await
            .expect("Failed to bind test server");
        let addr = ctx.local_addr().expect("Failed to read local address");
        let state = ctx.state.clone();
        let shutdown_tx = ctx.shutdown_handle();
        let handle = tokio::spawn(server::serve(ctx));
        Self {
            addr,
            state,
            shutdown_tx,
            handle,
        }
    }

    /// Connects a new client and consumes its greeting.
    pub async fn connect(&self) -> TestClient {
        let mut client = self.connect_raw().await;
        assert_eq!(
            client.read_reply().await.as_deref(),
            Some("100"),
            "expected greeting on connect"
        );
        client
    }

    /// Connects a new client without reading anything.
    pub async fn connect_raw(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("Failed to connect to test server");
        let (read_half, write_half) = stream.into_split();
        TestClient {
            reader: TestReader {
                reader: BufReader::new(read_half),
            },
            writer: write_half,
        }
    }

    /// Waits until the server has released `username` after a disconnect.
    pub async fn wait_released(&self, username: &str) {
        let registry = self.state.registry.clone();
        let name = username.to_string();
        tokio::time::timeout(REPLY_TIMEOUT, async move {
            while registry.is_in_session(&name) != Some(false) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("account '{username}' was never released"));
    }

    /// Waits until the server counts exactly `expected` live connections.
    pub async fn wait_connected_clients(&self, expected: u64) {
        let state = self.state.clone();
        tokio::time::timeout(REPLY_TIMEOUT, async move {
            while state.stats.get_connected_clients() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("connected client count never reached {expected}"));
    }

    /// Signals shutdown and waits for the dispatcher to return.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(15), self.handle)
            .await
            .expect("Server did not shut down in time")
            .expect("Server task panicked");
    }
}

/// A line-oriented protocol client.
pub struct TestClient {
    reader: TestReader,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Writes raw bytes exactly as given.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer
            .write_all(bytes)
            .await
            .expect("Failed to write to server");
    }

    /// Sends `line` with its terminator and returns the reply.
    pub async fn request(&mut self, line: &str) -> String {
        self.send_raw(format!("{line}\r\n").as_bytes()).await;
        self.read_reply()
            .await
            .unwrap_or_else(|| panic!("connection closed while waiting for reply to {line:?}"))
    }

    pub async fn read_reply(&mut self) -> Option<String> {
        self.reader.read_reply().await
    }

    /// Asserts that the server closes the connection without sending anything further.
    pub async fn expect_closed(&mut self) {
        self.reader.expect_closed().await;
    }

    /// Separates the halves so requests can be written from another task.
    pub fn into_split(self) -> (TestReader, OwnedWriteHalf) {
        (self.reader, self.writer)
    }
}

/// The receiving half of a [`TestClient`].
pub struct TestReader {
    reader: BufReader<OwnedReadHalf>,
}

impl TestReader {
    /// Reads one CRLF-terminated reply, or `None` once the server has closed the connection.
    pub async fn read_reply(&mut self) -> Option<String> {
        let mut line = String::new();
        let read = tokio::time::timeout(REPLY_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("Timed out waiting for a reply");
        match read {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                assert!(line.ends_with("\r\n"), "reply {line:?} is not CRLF-terminated");
                line.truncate(line.len() - 2);
                Some(line)
            }
        }
    }

    pub async fn expect_closed(&mut self) {
        assert_eq!(self.read_reply().await, None, "expected the server to close");
    }
}

fn init_tracing() {
    // Ignore the error if another test already installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
