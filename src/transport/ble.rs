//! # Bluetooth LE Transport
//!
//! Sends ESC/POS bytes to BLE thermal printers through a writable GATT
//! characteristic.
//!
//! ## Runtime Model
//!
//! The BLE stack is async while the rest of the bridge is synchronous. All BLE
//! work happens on one dedicated thread (`ble-runtime`) running a
//! single-threaded tokio runtime. [`BleTransport`] is a cheap synchronous
//! handle: each call posts a command to that thread and blocks on the reply.
//!
//! ```text
//! caller thread ──Command──▶ ble-runtime (actor, owns the link)
//!        ▲                         │
//!        └──────── reply ◀─────────┘
//! ```
//!
//! The actor is the only owner of the live link, so connects, writes and
//! disconnects never interleave. Connection state is mirrored into a mutex
//! that callers can read without touching the runtime.
//!
//! ## Connection States
//!
//! | State | Meaning |
//! |-------|---------|
//! | Disconnected | no link (initial state) |
//! | Connecting | connect in flight |
//! | Connected | link open to `address` |
//! | Failing | a write failed, link being torn down |
//!
//! A failed or timed-out send always ends in `Disconnected`, so the next job
//! reconnects from scratch.
//!
//! ## Deadlines
//!
//! Every command carries the instant its caller stops waiting. The actor
//! drops commands that are already past it when they reach the front of the
//! queue and cuts off work that runs over it, so a job the caller was told
//! failed never prints later.
//!
//! ## Chunking
//!
//! Payloads are written in [`CHUNK_SIZE`] byte slices, the largest size common
//! BLE printer modules accept without a negotiated MTU.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::BleError;

/// Maximum bytes per characteristic write.
pub const CHUNK_SIZE: usize = 180;

/// Default scan duration.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Slack the caller allows the actor beyond its own timeouts.
const REPLY_GRACE: Duration = Duration::from_secs(2);

/// How long the caller keeps listening past a command's deadline for the
/// actor's own timeout reply.
const DEADLINE_SLACK: Duration = Duration::from_millis(250);

/// Bluetooth base UUID; 16-bit UUIDs are expanded into it.
const BASE_UUID_SUFFIX: &str = "-0000-1000-8000-00805f9b34fb";

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failing,
}

/// A BLE device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// Advertised name, or `(unknown)`.
    pub name: String,
    /// Platform address (MAC on Linux/Windows, peripheral id on macOS).
    pub address: String,
}

impl DiscoveredDevice {
    pub fn display_name(&self) -> String {
        format!("{} [{}]", self.name, self.address)
    }
}

/// One GATT characteristic and its write capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub service: Uuid,
    pub uuid: Uuid,
    pub write: bool,
    pub write_without_response: bool,
}

impl CharacteristicInfo {
    pub fn is_writable(&self) -> bool {
        self.write || self.write_without_response
    }
}

/// Timeouts enforced by the BLE actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BleTimeouts {
    pub connect: Duration,
    /// Bounds a whole send, including any reconnect.
    pub send: Duration,
    pub disconnect: Duration,
}

impl Default for BleTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            send: Duration::from_secs(30),
            disconnect: Duration::from_secs(5),
        }
    }
}

/// Platform BLE stack: discovery and link establishment.
#[async_trait]
pub trait BleBackend: Send {
    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, BleError>;

    async fn connect(&mut self, address: &str) -> Result<Box<dyn BleLink>, BleError>;
}

/// An open connection to one peripheral.
#[async_trait]
pub trait BleLink: Send {
    /// All characteristics across all services, in discovery order.
    async fn characteristics(&mut self) -> Result<Vec<CharacteristicInfo>, BleError>;

    async fn write(&mut self, characteristic: Uuid, chunk: &[u8]) -> Result<(), BleError>;

    async fn disconnect(&mut self) -> Result<(), BleError>;
}

/// Pick the first characteristic that accepts writes.
pub fn first_writable(characteristics: &[CharacteristicInfo]) -> Option<(Uuid, Uuid)> {
    characteristics
        .iter()
        .find(|c| c.is_writable())
        .map(|c| (c.service, c.uuid))
}

/// Parse a full UUID or a 16-bit short form such as `ffe1`.
pub fn parse_uuid(s: &str) -> Result<Uuid, BleError> {
    let s = s.trim();
    let full = if s.len() == 4 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        format!("0000{}{}", s, BASE_UUID_SUFFIX)
    } else {
        s.to_string()
    };
    Uuid::parse_str(&full).map_err(|_| BleError::InvalidUuid(s.to_string()))
}

#[derive(Debug, Default)]
struct LinkStatus {
    state: ConnectionState,
    address: Option<String>,
}

type SharedStatus = Arc<Mutex<LinkStatus>>;

fn set_status(status: &SharedStatus, state: ConnectionState, address: Option<String>) {
    let mut s = status.lock().unwrap_or_else(PoisonError::into_inner);
    s.state = state;
    s.address = address;
}

type Reply<T> = std_mpsc::SyncSender<Result<T, BleError>>;

enum Command {
    Scan {
        timeout: Duration,
        deadline: Instant,
        reply: Reply<Vec<DiscoveredDevice>>,
    },
    Connect {
        address: String,
        deadline: Instant,
        reply: Reply<()>,
    },
    Detect {
        address: String,
        deadline: Instant,
        reply: Reply<(Uuid, Uuid)>,
    },
    Send {
        address: String,
        characteristic: Uuid,
        data: Vec<u8>,
        deadline: Instant,
        reply: Reply<()>,
    },
    /// Always runs, even late; it only ever moves towards `Disconnected`.
    Disconnect { reply: Reply<()> },
}

/// Run `work` only if `deadline` has not passed, and stop it when it does.
/// `None` means the caller is gone (or about to be) and `work` was dropped.
async fn before<T>(
    deadline: Instant,
    work: impl Future<Output = Result<T, BleError>>,
) -> Option<Result<T, BleError>> {
    if Instant::now() >= deadline {
        return None;
    }
    tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), work)
        .await
        .ok()
}

/// Runs on the BLE thread; sole owner of the link.
struct Actor {
    backend: Box<dyn BleBackend>,
    link: Option<Box<dyn BleLink>>,
    address: Option<String>,
    status: SharedStatus,
    timeouts: BleTimeouts,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!("BLE runtime started");
        while let Some(command) = commands.recv().await {
            match command {
                Command::Scan {
                    timeout,
                    deadline,
                    reply,
                } => {
                    let result = before(deadline, self.scan(timeout)).await.unwrap_or_else(|| {
                        warn!("BLE scan dropped: caller no longer waiting");
                        Err(BleError::Scan("scan did not finish".into()))
                    });
                    let _ = reply.send(result);
                }
                Command::Connect {
                    address,
                    deadline,
                    reply,
                } => match before(deadline, self.connect(&address)).await {
                    Some(result) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        let _ = reply.send(Err(BleError::ConnectTimeout(self.timeouts.connect)));
                        self.expired("connect", &address).await;
                    }
                },
                Command::Detect {
                    address,
                    deadline,
                    reply,
                } => match before(deadline, self.detect(&address)).await {
                    Some(result) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        let _ = reply.send(Err(BleError::ConnectTimeout(self.timeouts.connect)));
                        self.expired("detect", &address).await;
                    }
                },
                Command::Send {
                    address,
                    characteristic,
                    data,
                    deadline,
                    reply,
                } => match before(deadline, self.send(&address, characteristic, &data)).await {
                    Some(result) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        let _ = reply.send(Err(BleError::SendTimeout(self.timeouts.send)));
                        self.expired("send", &address).await;
                    }
                },
                Command::Disconnect { reply } => {
                    self.disconnect().await;
                    let _ = reply.send(Ok(()));
                }
            }
        }
        self.disconnect().await;
        debug!("BLE runtime stopped");
    }

    fn is_connected_to(&self, address: &str) -> bool {
        let state = self
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state;
        self.link.is_some()
            && state == ConnectionState::Connected
            && self.address.as_deref() == Some(address)
    }

    async fn scan(&mut self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, BleError> {
        info!("Scanning BLE devices for {:?}", timeout);
        match tokio::time::timeout(timeout + REPLY_GRACE, self.backend.scan(timeout)).await {
            Ok(result) => result,
            Err(_) => Err(BleError::Scan("scan did not finish".into())),
        }
    }

    async fn connect(&mut self, address: &str) -> Result<(), BleError> {
        if self.is_connected_to(address) {
            return Ok(());
        }
        if self.link.is_some() {
            self.disconnect().await;
        }

        set_status(
            &self.status,
            ConnectionState::Connecting,
            Some(address.to_string()),
        );
        info!("Connecting to BLE printer {}", address);

        let timeout = self.timeouts.connect;
        match tokio::time::timeout(timeout, self.backend.connect(address)).await {
            Ok(Ok(link)) => {
                self.link = Some(link);
                self.address = Some(address.to_string());
                set_status(
                    &self.status,
                    ConnectionState::Connected,
                    Some(address.to_string()),
                );
                info!("BLE connected to {}", address);
                Ok(())
            }
            Ok(Err(e)) => {
                set_status(&self.status, ConnectionState::Disconnected, None);
                error!("BLE connect to {} failed: {}", address, e);
                Err(match e {
                    BleError::ConnectFailed(_) | BleError::NoAdapter => e,
                    other => BleError::ConnectFailed(other.to_string()),
                })
            }
            Err(_) => {
                set_status(&self.status, ConnectionState::Disconnected, None);
                error!("BLE connect to {} timed out", address);
                Err(BleError::ConnectTimeout(timeout))
            }
        }
    }

    async fn detect(&mut self, address: &str) -> Result<(Uuid, Uuid), BleError> {
        self.connect(address).await?;
        let Some(link) = self.link.as_mut() else {
            return Err(BleError::ConnectFailed("link lost".into()));
        };
        let characteristics = link.characteristics().await?;
        debug!(count = characteristics.len(), "characteristics discovered");
        let found = first_writable(&characteristics).ok_or(BleError::NotFound)?;
        info!("Detected BLE service {} characteristic {}", found.0, found.1);
        Ok(found)
    }

    async fn send(
        &mut self,
        address: &str,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), BleError> {
        let timeout = self.timeouts.send;
        match tokio::time::timeout(timeout, self.write_chunks(address, characteristic, data))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                error!("BLE send to {} timed out after {:?}", address, timeout);
                self.abandon().await;
                Err(BleError::SendTimeout(timeout))
            }
        }
    }

    async fn write_chunks(
        &mut self,
        address: &str,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), BleError> {
        self.connect(address).await?;

        let total = data.len().div_ceil(CHUNK_SIZE);
        for (i, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
            let Some(link) = self.link.as_mut() else {
                return Err(BleError::WriteFailed("link lost".into()));
            };
            if let Err(e) = link.write(characteristic, chunk).await {
                warn!("BLE write failed at chunk {}/{}: {}", i + 1, total, e);
                self.abandon().await;
                return Err(match e {
                    BleError::WriteFailed(_) => e,
                    other => BleError::WriteFailed(other.to_string()),
                });
            }
        }
        debug!(bytes = data.len(), chunks = total, "BLE payload written");
        Ok(())
    }

    /// The caller gave up on this command. Whatever it left behind is
    /// unknown, so start the next job from a fresh link.
    async fn expired(&mut self, what: &str, address: &str) {
        warn!("BLE {} for {} dropped: caller deadline passed", what, address);
        self.abandon().await;
    }

    /// Tear down a link that can no longer be trusted.
    async fn abandon(&mut self) {
        set_status(&self.status, ConnectionState::Failing, self.address.clone());
        self.disconnect().await;
    }

    async fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            match tokio::time::timeout(self.timeouts.disconnect, link.disconnect()).await {
                Ok(Ok(())) => info!("BLE disconnected"),
                Ok(Err(e)) => warn!("BLE disconnect error: {}", e),
                Err(_) => warn!("BLE disconnect timed out"),
            }
        }
        self.address = None;
        set_status(&self.status, ConnectionState::Disconnected, None);
    }
}

/// Synchronous handle to the BLE runtime thread.
///
/// The thread is started on first use and stopped by [`BleTransport::shutdown`]
/// (or on drop), which disconnects any open link first.
pub struct BleTransport {
    backend: Mutex<Option<Box<dyn BleBackend>>>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    status: SharedStatus,
    timeouts: BleTimeouts,
}

impl BleTransport {
    pub fn new(backend: impl BleBackend + 'static) -> Self {
        Self::with_timeouts(backend, BleTimeouts::default())
    }

    pub fn with_timeouts(backend: impl BleBackend + 'static, timeouts: BleTimeouts) -> Self {
        Self {
            backend: Mutex::new(Some(Box::new(backend))),
            commands: Mutex::new(None),
            thread: Mutex::new(None),
            status: SharedStatus::default(),
            timeouts,
        }
    }

    pub fn timeouts(&self) -> BleTimeouts {
        self.timeouts
    }

    pub fn state(&self) -> ConnectionState {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Address of the current (or in-flight) connection.
    pub fn address(&self) -> Option<String> {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .address
            .clone()
    }

    pub fn scan(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, BleError> {
        self.request(
            |reply, deadline| Command::Scan {
                timeout,
                deadline,
                reply,
            },
            timeout + REPLY_GRACE * 2,
        )
        .map_err(|e| match e {
            BleError::Runtime(msg) if msg.is_empty() => {
                BleError::Scan("scan did not finish".into())
            }
            other => other,
        })
    }

    /// Open (or reuse) a connection to `address`.
    pub fn connect(&self, address: &str) -> Result<(), BleError> {
        let address = address.to_string();
        self.request(
            |reply, deadline| Command::Connect {
                address,
                deadline,
                reply,
            },
            self.timeouts.connect + REPLY_GRACE,
        )
        .map_err(|e| self.on_stall(e, BleError::ConnectTimeout(self.timeouts.connect)))
    }

    /// Connect and return the first writable `(service, characteristic)` pair.
    pub fn detect_characteristics(&self, address: &str) -> Result<(Uuid, Uuid), BleError> {
        let address = address.to_string();
        self.request(
            |reply, deadline| Command::Detect {
                address,
                deadline,
                reply,
            },
            self.timeouts.connect * 2 + REPLY_GRACE,
        )
        .map_err(|e| self.on_stall(e, BleError::ConnectTimeout(self.timeouts.connect)))
    }

    /// Write `data` to `characteristic`, connecting first if needed.
    pub fn send(&self, address: &str, characteristic: Uuid, data: Vec<u8>) -> Result<(), BleError> {
        let address = address.to_string();
        info!(bytes = data.len(), "Sending to BLE printer {}", address);
        self.request(
            |reply, deadline| Command::Send {
                address,
                characteristic,
                data,
                deadline,
                reply,
            },
            self.timeouts.send + REPLY_GRACE,
        )
        .map_err(|e| self.on_stall(e, BleError::SendTimeout(self.timeouts.send)))
    }

    /// Close the link if open. Safe to call repeatedly.
    pub fn disconnect(&self) {
        if self.sender_if_running().is_none() {
            return;
        }
        if let Err(e) = self.request(
            |reply, _| Command::Disconnect { reply },
            self.timeouts.disconnect + REPLY_GRACE,
        ) {
            warn!("BLE disconnect: {}", e);
            set_status(&self.status, ConnectionState::Disconnected, None);
        }
    }

    /// Disconnect and stop the runtime thread. Further calls fail with
    /// [`BleError::Runtime`].
    pub fn shutdown(&self) {
        self.disconnect();
        let sender = self
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // dropping the last sender ends the actor loop
        drop(sender);
        self.backend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = thread {
            if handle.join().is_err() {
                error!("BLE runtime thread panicked");
            }
        }
    }

    /// An unanswered request means the actor is stuck; report the caller's
    /// timeout and force a reconnect on the next job.
    fn on_stall(&self, e: BleError, timeout: BleError) -> BleError {
        match e {
            BleError::Runtime(msg) if msg.is_empty() => {
                set_status(&self.status, ConnectionState::Disconnected, None);
                timeout
            }
            other => other,
        }
    }

    /// Queue a command due within `wait` and block for its reply.
    fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>, Instant) -> Command,
        wait: Duration,
    ) -> Result<T, BleError> {
        let sender = self.sender()?;
        let (reply, response) = std_mpsc::sync_channel(1);
        let deadline = Instant::now() + wait;
        sender
            .send(make(reply, deadline))
            .map_err(|_| BleError::Runtime("BLE runtime stopped".into()))?;
        match response.recv_timeout(wait + DEADLINE_SLACK) {
            Ok(result) => result,
            // empty message marks a stall; callers map it to their own timeout
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(BleError::Runtime(String::new())),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                Err(BleError::Runtime("BLE runtime stopped".into()))
            }
        }
    }

    fn sender_if_running(&self) -> Option<mpsc::UnboundedSender<Command>> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn sender(&self) -> Result<mpsc::UnboundedSender<Command>, BleError> {
        let mut commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = commands.as_ref() {
            return Ok(sender.clone());
        }

        let backend = self
            .backend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| BleError::Runtime("BLE runtime stopped".into()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BleError::Runtime(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Actor {
            backend,
            link: None,
            address: None,
            status: Arc::clone(&self.status),
            timeouts: self.timeouts,
        };
        let handle = std::thread::Builder::new()
            .name("ble-runtime".into())
            .spawn(move || runtime.block_on(actor.run(rx)))
            .map_err(|e| BleError::Runtime(e.to_string()))?;

        *self.thread.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        *commands = Some(tx.clone());
        Ok(tx)
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("state", &self.state())
            .field("address", &self.address())
            .field("timeouts", &self.timeouts)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{MockBackend, WriteMode};
    use super::*;
    use pretty_assertions::assert_eq;

    const ADDR: &str = "AA:BB:CC:DD:EE:FF";

    fn char_uuid() -> Uuid {
        parse_uuid("2af1").unwrap()
    }

    fn fast() -> BleTimeouts {
        BleTimeouts {
            connect: Duration::from_millis(200),
            send: Duration::from_millis(300),
            disconnect: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_send_chunks_at_180_bytes() {
        let (backend, rec) = MockBackend::new();
        let ble = BleTransport::new(backend);
        ble.send(ADDR, char_uuid(), vec![0x41; 500]).unwrap();
        assert_eq!(rec.chunk_sizes(), vec![180, 180, 140]);
        assert_eq!(ble.state(), ConnectionState::Connected);
        assert_eq!(ble.address().as_deref(), Some(ADDR));
    }

    #[test]
    fn test_failed_chunk_stops_and_disconnects() {
        let (mut backend, rec) = MockBackend::new();
        backend.write_mode = WriteMode::FailAt(2);
        let ble = BleTransport::new(backend);

        let err = ble.send(ADDR, char_uuid(), vec![0; 500]).unwrap_err();
        assert!(matches!(err, BleError::WriteFailed(_)));
        assert_eq!(rec.chunk_sizes(), vec![180]);
        assert_eq!(ble.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_reconnects_after_failure() {
        let (mut backend, rec) = MockBackend::new();
        backend.write_mode = WriteMode::FailAt(1);
        let ble = BleTransport::new(backend);

        assert!(ble.send(ADDR, char_uuid(), vec![0; 10]).is_err());
        // fresh link: its first write fails again, but a new connect happened
        assert!(ble.send(ADDR, char_uuid(), vec![0; 10]).is_err());
        assert_eq!(rec.connects(), 2);
    }

    #[test]
    fn test_connect_is_reused() {
        let (backend, rec) = MockBackend::new();
        let ble = BleTransport::new(backend);
        ble.connect(ADDR).unwrap();
        ble.connect(ADDR).unwrap();
        ble.send(ADDR, char_uuid(), vec![1, 2, 3]).unwrap();
        assert_eq!(rec.connects(), 1);
    }

    #[test]
    fn test_connect_to_other_address_replaces_link() {
        let (backend, rec) = MockBackend::new();
        let ble = BleTransport::new(backend);
        ble.connect(ADDR).unwrap();
        ble.connect("11:22:33:44:55:66").unwrap();
        assert_eq!(rec.connects(), 2);
        assert_eq!(rec.disconnects(), 1);
        assert_eq!(ble.address().as_deref(), Some("11:22:33:44:55:66"));
    }

    #[test]
    fn test_hung_write_times_out() {
        let (mut backend, _rec) = MockBackend::new();
        backend.write_mode = WriteMode::Hang;
        let ble = BleTransport::with_timeouts(backend, fast());

        let err = ble.send(ADDR, char_uuid(), vec![0; 50]).unwrap_err();
        assert_eq!(err, BleError::SendTimeout(Duration::from_millis(300)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Transfer);
        assert_eq!(ble.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_stuck_behind_scan_never_prints_late() {
        let (mut backend, rec) = MockBackend::new();
        backend.scan_delay = Duration::from_millis(2800);
        let ble = Arc::new(BleTransport::with_timeouts(backend, fast()));

        let scanner = {
            let ble = Arc::clone(&ble);
            std::thread::spawn(move || ble.scan(Duration::from_secs(1)))
        };
        std::thread::sleep(Duration::from_millis(100));

        // queued behind the scan; the caller gives up around 2.65s
        let err = ble.send(ADDR, char_uuid(), vec![0; 500]).unwrap_err();
        assert_eq!(err, BleError::SendTimeout(Duration::from_millis(300)));
        assert_eq!(ble.state(), ConnectionState::Disconnected);
        assert!(scanner.join().unwrap().is_ok());

        // runs after the stale send has left the queue
        ble.connect(ADDR).unwrap();
        assert_eq!(rec.connects(), 1);
        assert!(rec.chunk_sizes().is_empty());
    }

    #[test]
    fn test_refused_connect() {
        let (mut backend, _rec) = MockBackend::new();
        backend.refuse_connect = true;
        let ble = BleTransport::new(backend);
        assert!(matches!(
            ble.connect(ADDR),
            Err(BleError::ConnectFailed(_))
        ));
        assert_eq!(ble.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_detect_picks_first_writable() {
        let (backend, _rec) = MockBackend::new();
        let ble = BleTransport::new(backend);
        let (service, characteristic) = ble.detect_characteristics(ADDR).unwrap();
        assert_eq!(service, parse_uuid("18f0").unwrap());
        assert_eq!(characteristic, char_uuid());
    }

    #[test]
    fn test_detect_without_writable_characteristic() {
        let (mut backend, _rec) = MockBackend::new();
        backend.characteristics.retain(|c| !c.is_writable());
        let ble = BleTransport::new(backend);
        assert_eq!(ble.detect_characteristics(ADDR), Err(BleError::NotFound));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (backend, rec) = MockBackend::new();
        let ble = BleTransport::new(backend);
        ble.disconnect();
        ble.connect(ADDR).unwrap();
        ble.disconnect();
        ble.disconnect();
        assert_eq!(rec.disconnects(), 1);
        assert_eq!(ble.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_shutdown_disconnects_and_stops() {
        let (backend, rec) = MockBackend::new();
        let ble = BleTransport::new(backend);
        ble.connect(ADDR).unwrap();
        ble.shutdown();
        assert_eq!(rec.disconnects(), 1);
        assert!(matches!(ble.connect(ADDR), Err(BleError::Runtime(_))));
    }

    #[test]
    fn test_scan() {
        let (backend, _rec) = MockBackend::new();
        let ble = BleTransport::new(backend);
        let devices = ble.scan(Duration::from_millis(10)).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].display_name(), "MPT-II [AA:BB:CC:DD:EE:FF]");
    }

    #[test]
    fn test_parse_uuid_short_and_long() {
        assert_eq!(
            parse_uuid("FFE1").unwrap().to_string(),
            "0000ffe1-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            parse_uuid(" 49535343-8841-43f4-a8d4-ecbe34729bb3 ")
                .unwrap()
                .to_string(),
            "49535343-8841-43f4-a8d4-ecbe34729bb3"
        );
        assert!(matches!(parse_uuid("nope"), Err(BleError::InvalidUuid(_))));
    }
}
