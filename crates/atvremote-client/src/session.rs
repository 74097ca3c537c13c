//! The persistent command channel (tcp/6466).
//!
//! One connection at a time: a dedicated reader task owns the input half
//! and answers the television's configure/set-active/ping traffic; callers
//! send keys and text through the output half behind a mutex. Creating a
//! new connection tears down the old one.

use crate::state::{ConnectionState, SessionState, VolumeState};
use atvremote_core::error::{Result, SessionError};
use atvremote_core::{Direction, Error, KeyCode, COMMAND_PORT};
use atvremote_identity::{is_certificate_alert, PairedRegistry, TlsTransport};
use atvremote_wire::{read_frame, write_frame, DeviceInfo, ImeEdit, RemoteMessage, TextFieldStatus};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tracing::{debug, trace, warn};

/// Per-attempt TCP + TLS budget.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Linear backoff between the three connect attempts.
const CONNECT_BACKOFF: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];

/// Pause between disconnect and reconnect.
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

type Writer = Arc<Mutex<WriteHalf<TlsStream<TcpStream>>>>;

/// Session engine configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local device model, announced in the configure reply.
    pub device_name: String,
    /// Local vendor string, announced in the configure reply.
    pub vendor: String,
    /// Command-channel port; protocol default, overridable for tests.
    pub command_port: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_name: "atvremote".to_string(),
            vendor: "atvremote".to_string(),
            command_port: COMMAND_PORT,
        }
    }
}

struct ActiveConnection {
    ip: IpAddr,
    writer: Writer,
    reader_task: JoinHandle<()>,
}

/// The command-channel engine. One per [`crate::RemoteClient`].
pub struct RemoteSession {
    transport: TlsTransport,
    registry: Arc<PairedRegistry>,
    state: Arc<SessionState>,
    active: Mutex<Option<ActiveConnection>>,
    config: SessionConfig,
}

impl RemoteSession {
    pub fn new(
        transport: TlsTransport,
        registry: Arc<PairedRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            state: Arc::new(SessionState::new()),
            active: Mutex::new(None),
            config,
        }
    }

    /// Connect the command channel to a paired television.
    ///
    /// Fails with [`SessionError::NotPaired`] before opening any socket if
    /// the ip is not in the paired set. A TLS alert rejecting our
    /// certificate removes the ip from the paired set and fails with
    /// [`SessionError::CertificateRejected`]; the user must re-pair.
    pub async fn connect(&self, ip: IpAddr) -> Result<()> {
        if !self.registry.is_paired(ip) {
            return Err(SessionError::NotPaired(ip.to_string()).into());
        }

        self.teardown(ConnectionState::Connecting).await;

        let addr = SocketAddr::new(ip, self.config.command_port);
        let mut last_err: Option<Error> = None;

        for attempt in 0..3 {
            if attempt > 0 {
                tokio::time::sleep(CONNECT_BACKOFF[attempt - 1]).await;
            }
            match self.transport.connect(addr, CONNECT_TIMEOUT).await {
                Ok(stream) => {
                    self.install(ip, stream).await;
                    return Ok(());
                }
                Err(Error::Connection(io)) if is_certificate_alert(&io) => {
                    warn!("Television {ip} rejected our certificate; unpairing");
                    self.registry.remove(ip)?;
                    let err = SessionError::CertificateRejected(ip.to_string());
                    self.state
                        .connection
                        .send_replace(ConnectionState::Error(err.to_string()));
                    return Err(err.into());
                }
                Err(e) => {
                    debug!("Connect attempt {} to {addr} failed: {e}", attempt + 1);
                    last_err = Some(e);
                }
            }
        }

        let err = last_err.unwrap_or(Error::Timeout);
        self.state
            .connection
            .send_replace(ConnectionState::Error(err.to_string()));
        Err(err)
    }

    async fn install(&self, ip: IpAddr, stream: TlsStream<TcpStream>) {
        let (reader, writer) = tokio::io::split(stream);
        let writer: Writer = Arc::new(Mutex::new(writer));

        let reader_task = tokio::spawn(reader_loop(
            ip,
            reader,
            Arc::clone(&writer),
            Arc::clone(&self.state),
            DeviceInfo::new(&self.config.device_name, &self.config.vendor),
        ));

        let previous = self.active.lock().await.replace(ActiveConnection {
            ip,
            writer,
            reader_task,
        });
        if let Some(old) = previous {
            old.reader_task.abort();
        }
        self.state.connection.send_replace(ConnectionState::Connected(ip));
        debug!("Command channel up to {ip}");
    }

    /// Cancel the reader, close the socket, go to `Disconnected`.
    pub async fn disconnect(&self) {
        self.teardown(ConnectionState::Disconnected).await;
    }

    /// Disconnect, pause briefly, and connect again.
    pub async fn reconnect(&self, ip: IpAddr) -> Result<()> {
        self.disconnect().await;
        tokio::time::sleep(RECONNECT_DELAY).await;
        self.connect(ip).await
    }

    async fn teardown(&self, final_state: ConnectionState) {
        let mut active = self.active.lock().await;
        // Publish the deliberate state first so the reader does not report
        // the closing socket as a lost connection.
        self.state.connection.send_replace(final_state);
        if let Some(conn) = active.take() {
            conn.reader_task.abort();
            let mut writer = conn.writer.lock().await;
            let _ = writer.shutdown().await;
        }
    }

    /// Send a short key press (press + release in one message).
    pub async fn send_key(&self, ip: IpAddr, key: KeyCode) -> Result<()> {
        self.send_key_code(ip, key.into(), Direction::Short).await
    }

    /// Send a key with an explicit direction, for bracketing long presses.
    pub async fn send_key_with_direction(
        &self,
        ip: IpAddr,
        key: KeyCode,
        direction: Direction,
    ) -> Result<()> {
        self.send_key_code(ip, key.into(), direction).await
    }

    /// Raw key-code send path.
    pub async fn send_key_code(
        &self,
        ip: IpAddr,
        key_code: u32,
        direction: Direction,
    ) -> Result<()> {
        let msg = RemoteMessage::KeyInject {
            key_code,
            direction: direction.into(),
        };
        self.send_with_retry(ip, &msg).await
    }

    /// Type text into the focused field on the television.
    ///
    /// Echoes the IME counters most recently observed from the television;
    /// the television rejects edits carrying stale counters.
    pub async fn send_text(&self, ip: IpAddr, text: &str) -> Result<()> {
        let (ime_counter, field_counter) = self.state.ime_counters();
        let cursor = text.len().saturating_sub(1) as u32;
        let msg = RemoteMessage::ImeBatchEdit {
            ime_counter,
            field_counter,
            edits: vec![ImeEdit {
                insert: 1,
                status: TextFieldStatus {
                    start: cursor,
                    end: cursor,
                    value: text.to_string(),
                },
            }],
        };
        self.send_with_retry(ip, &msg).await
    }

    async fn send_with_retry(&self, ip: IpAddr, msg: &RemoteMessage) -> Result<()> {
        self.ensure_connected(ip).await?;
        match self.try_send(msg).await {
            Ok(()) => Ok(()),
            Err(e) if is_retryable(&e) => {
                warn!("Send to {ip} failed ({e}); reconnecting for one retry");
                self.reconnect(ip).await?;
                self.try_send(msg)
                    .await
                    .map_err(|e| SessionError::SendFailed(e.to_string()).into())
            }
            Err(e) => Err(SessionError::SendFailed(e.to_string()).into()),
        }
    }

    async fn ensure_connected(&self, ip: IpAddr) -> Result<()> {
        let connected = {
            let active = self.active.lock().await;
            active.as_ref().map(|c| c.ip) == Some(ip)
                && *self.state.connection.borrow() == ConnectionState::Connected(ip)
        };
        if connected {
            return Ok(());
        }
        self.connect(ip).await
    }

    async fn try_send(&self, msg: &RemoteMessage) -> Result<()> {
        let writer = {
            let active = self.active.lock().await;
            let conn = active.as_ref().ok_or(SessionError::NotConnected)?;
            Arc::clone(&conn.writer)
        };
        let mut writer = writer.lock().await;
        write_frame(&mut *writer, &msg.encode()).await
    }

    pub fn observe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.state.connection.subscribe()
    }

    pub fn observe_volume(&self) -> watch::Receiver<Option<VolumeState>> {
        self.state.volume.subscribe()
    }

    pub fn observe_power(&self) -> watch::Receiver<Option<bool>> {
        self.state.power.subscribe()
    }

    pub fn observe_current_app(&self) -> watch::Receiver<Option<String>> {
        self.state.current_app.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection.borrow().clone()
    }
}

fn is_retryable(err: &Error) -> bool {
    match err {
        Error::Connection(io) => matches!(
            io.kind(),
            std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

/// Reader task: consume frames, keep the television happy, publish state.
async fn reader_loop(
    ip: IpAddr,
    mut reader: ReadHalf<TlsStream<TcpStream>>,
    writer: Writer,
    state: Arc<SessionState>,
    device_info: DeviceInfo,
) {
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(e) => {
                // Deliberate teardown already moved the state away from
                // Connected; only an unexpected loss is an error.
                if *state.connection.borrow() == ConnectionState::Connected(ip) {
                    debug!("Command channel to {ip} lost: {e}");
                    state
                        .connection
                        .send_replace(ConnectionState::Error("Connection lost".to_string()));
                }
                return;
            }
        };

        let msg = match RemoteMessage::decode(&frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Skipping malformed message from {ip}: {e}");
                continue;
            }
        };

        let reply = match msg {
            RemoteMessage::Configure { code1, .. } => {
                debug!("Television {ip} configure (features {code1:#x})");
                Some(RemoteMessage::configure(device_info.clone()))
            }
            RemoteMessage::SetActive { .. } => Some(RemoteMessage::set_active()),
            RemoteMessage::PingRequest { val1 } => {
                trace!("Ping {val1} from {ip}");
                Some(RemoteMessage::PingResponse { val1 })
            }
            RemoteMessage::ImeKeyInject { app_package } => {
                state.current_app.send_replace(Some(app_package));
                None
            }
            RemoteMessage::ImeBatchEdit {
                ime_counter,
                field_counter,
                ..
            } => {
                state.store_ime_counters(ime_counter, field_counter);
                None
            }
            RemoteMessage::Start { started } => {
                state.power.send_replace(Some(started));
                None
            }
            RemoteMessage::SetVolumeLevel { max, level, muted } => {
                state.volume.send_replace(Some(VolumeState { max, level, muted }));
                None
            }
            RemoteMessage::Unknown { field } => {
                trace!("Ignoring unknown envelope field {field} from {ip}");
                None
            }
            // Messages this client originates; a television never sends them.
            other => {
                trace!("Ignoring unexpected message from {ip}: {other:?}");
                None
            }
        };

        if let Some(reply) = reply {
            let mut writer = writer.lock().await;
            if let Err(e) = write_frame(&mut *writer, &reply.encode()).await {
                if *state.connection.borrow() == ConnectionState::Connected(ip) {
                    debug!("Reply to {ip} failed: {e}");
                    state
                        .connection
                        .send_replace(ConnectionState::Error("Connection lost".to_string()));
                }
                return;
            }
        }
    }
}
