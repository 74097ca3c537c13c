//! The five-step pairing handshake.
//!
//! One [`PairingAttempt`] drives one connection to `tv:6467`: three
//! request/acknowledge round trips put the code on the television's screen,
//! then the user-supplied code is turned into the secret and submitted.
//! Every terminal outcome (success, rejection, cancellation) consumes the
//! attempt.

use crate::secret::pairing_secret;
use atvremote_core::error::{PairingError, Result};
use atvremote_core::{Error, Television};
use atvremote_identity::{
    peer_certificate, rsa_params_from_cert, ClientIdentity, PairedRegistry, RsaPublicParams,
    TlsTransport,
};
use atvremote_wire::{read_frame, write_frame, PairingMessage, STATUS_BAD_SECRET};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tracing::{debug, warn};

/// TCP + TLS bring-up budget for the pairing channel.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-acknowledgement read budget for steps 1-3.
const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Read budget for the step-5 verdict; generous because the television
/// only answers once the user has typed the code.
pub const CODE_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Settle delay after a successful handshake. Televisions finalise
/// certificate pinning in this window; connecting earlier is rejected with
/// an unknown-certificate alert.
pub const POST_PAIR_SETTLE: Duration = Duration::from_secs(2);

/// Observable state of one pairing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    Connecting,
    /// The television is showing the code; waiting for the user to type it.
    WaitingForCode,
    SubmittingCode,
    Success,
    Failed(String),
}

/// One pairing attempt against one television.
#[derive(Debug)]
pub struct PairingAttempt {
    tv: Television,
    stream: Option<TlsStream<TcpStream>>,
    client_params: RsaPublicParams,
    server_params: RsaPublicParams,
    registry: Arc<PairedRegistry>,
    state: watch::Sender<PairingState>,
}

impl PairingAttempt {
    /// Connect and run steps 1-3. On return the television is displaying
    /// the code and the attempt is waiting for [`PairingAttempt::submit_code`].
    pub async fn begin(
        tv: Television,
        transport: &TlsTransport,
        identity: &ClientIdentity,
        registry: Arc<PairedRegistry>,
        client_name: &str,
    ) -> Result<Self> {
        let (state, _) = watch::channel(PairingState::Idle);
        state.send_replace(PairingState::Connecting);

        let stream = match transport.connect(tv.pairing_addr(), CONNECT_TIMEOUT).await {
            Ok(stream) => stream,
            Err(e) => {
                let pairing_err = match e {
                    Error::Timeout => {
                        PairingError::ConnectFailed("connect timed out".to_string())
                    }
                    Error::Connection(io) if io.kind() == std::io::ErrorKind::InvalidData => {
                        PairingError::HandshakeFailed(io.to_string())
                    }
                    Error::Connection(io) => PairingError::ConnectFailed(io.to_string()),
                    other => PairingError::ConnectFailed(other.to_string()),
                };
                state.send_replace(PairingState::Failed(pairing_err.to_string()));
                return Err(pairing_err.into());
            }
        };

        let server_cert = peer_certificate(&stream).ok_or_else(|| {
            PairingError::HandshakeFailed("television sent no certificate".to_string())
        })?;
        let server_params = rsa_params_from_cert(&server_cert)?;
        let client_params = identity.public_params()?;

        let mut attempt = Self {
            tv,
            stream: Some(stream),
            client_params,
            server_params,
            registry,
            state,
        };

        let steps = attempt.run_steps(client_name).await;
        if let Err(e) = steps {
            return Err(attempt.fail(e));
        }

        attempt.state.send_replace(PairingState::WaitingForCode);
        Ok(attempt)
    }

    async fn run_steps(&mut self, client_name: &str) -> Result<()> {
        debug!("Pairing with {}: requesting", self.tv.ip);
        self.exchange(&PairingMessage::request(client_name), STEP_TIMEOUT)
            .await?;

        debug!("Pairing with {}: offering hex encoding", self.tv.ip);
        self.exchange(&PairingMessage::encoding_option(), STEP_TIMEOUT)
            .await?;

        debug!("Pairing with {}: committing configuration", self.tv.ip);
        self.exchange(&PairingMessage::configuration(), STEP_TIMEOUT)
            .await?;

        Ok(())
    }

    /// Submit the code the user read off the screen.
    ///
    /// On success the television's ip is persisted to the paired set and
    /// the attempt settles for [`POST_PAIR_SETTLE`] before returning.
    pub async fn submit_code(&mut self, code: &str) -> Result<()> {
        if *self.state.borrow() != PairingState::WaitingForCode {
            return Err(PairingError::InvalidState("not waiting for a code").into());
        }
        self.state.send_replace(PairingState::SubmittingCode);

        let secret = match pairing_secret(&self.client_params, &self.server_params, code) {
            Ok(secret) => secret,
            Err(e) => return Err(self.fail(e)),
        };

        let result = self
            .exchange(&PairingMessage::secret(secret.to_vec()), CODE_WAIT_TIMEOUT)
            .await
            .map_err(|e| match e {
                Error::Pairing(PairingError::Rejected(STATUS_BAD_SECRET)) => {
                    Error::Pairing(PairingError::BadCode)
                }
                other => other,
            });
        if let Err(e) = result {
            return Err(self.fail(e));
        }

        self.registry.add(self.tv.ip)?;
        debug!(
            "Paired with {}; settling for {:?}",
            self.tv.ip, POST_PAIR_SETTLE
        );
        tokio::time::sleep(POST_PAIR_SETTLE).await;

        self.stream = None;
        self.state.send_replace(PairingState::Success);
        Ok(())
    }

    /// Abandon the attempt and close the socket.
    pub fn cancel(&mut self) {
        if matches!(
            *self.state.borrow(),
            PairingState::Success | PairingState::Failed(_)
        ) {
            return;
        }
        warn!("Pairing with {} cancelled", self.tv.ip);
        self.stream = None;
        self.state
            .send_replace(PairingState::Failed(PairingError::Cancelled.to_string()));
    }

    /// Current state snapshot.
    pub fn state(&self) -> PairingState {
        self.state.borrow().clone()
    }

    /// Observe state transitions.
    pub fn observe_state(&self) -> watch::Receiver<PairingState> {
        self.state.subscribe()
    }

    pub fn television(&self) -> &Television {
        &self.tv
    }

    /// Write one envelope, read the acknowledgement, and require status OK.
    async fn exchange(
        &mut self,
        msg: &PairingMessage,
        read_timeout: Duration,
    ) -> Result<PairingMessage> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(PairingError::InvalidState("socket closed"))?;

        write_frame(stream, &msg.encode()).await?;

        let frame = timeout(read_timeout, read_frame(stream))
            .await
            .map_err(|_| PairingError::Timeout)??;
        let reply = PairingMessage::decode(&frame)?;

        if !reply.is_ok() {
            return Err(PairingError::Rejected(reply.status).into());
        }
        Ok(reply)
    }

    /// Record a terminal failure: close the socket, publish the reason.
    fn fail(&mut self, err: Error) -> Error {
        self.stream = None;
        self.state.send_replace(PairingState::Failed(err.to_string()));
        err
    }
}
