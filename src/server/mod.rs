// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound link that exposes one coil and accepts a single peer.
//!
//! Every [`ServerLink`] is one generation: it is started once, serves at
//! most one peer and is stopped once. Reconfiguration creates a new
//! generation.

mod mapping;
mod tcp;

use std::fmt;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::validate_port,
    frame::Address,
    Result,
};

/// Lifecycle of a server link generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Created, worker not yet running.
    Idle,
    /// Opening the listening socket.
    Listening,
    /// Listening and waiting for a peer to connect.
    AwaitingPeer,
    /// Receiving requests from the connected peer.
    Serving,
    /// All resources of this generation have been released.
    Terminated,
}

/// Why the worker of a server link generation exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminated {
    /// The link was stopped.
    Cancelled,
    /// The peer closed the connection.
    PeerClosed,
    /// The listening socket could not be opened.
    ListenFailed,
    /// Accepting the peer connection failed.
    AcceptFailed,
    /// Receiving a request failed.
    TransportError,
    /// A request was shorter than the minimum request length.
    ShortFrame(usize),
    /// Sending the acknowledgement failed.
    ReplyFailed,
    /// The worker task panicked.
    Panicked,
}

impl fmt::Display for Terminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::PeerClosed => f.write_str("peer closed the connection"),
            Self::ListenFailed => f.write_str("listen failed"),
            Self::AcceptFailed => f.write_str("accept failed"),
            Self::TransportError => f.write_str("receive failed"),
            Self::ShortFrame(len) => write!(f, "short frame of {len} bytes"),
            Self::ReplyFailed => f.write_str("reply failed"),
            Self::Panicked => f.write_str("worker panicked"),
        }
    }
}

/// A coil write from the peer that was applied to the coil mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoilWrite {
    pub address: Address,
    pub active: bool,
}

/// Handle of a running server link generation.
///
/// Dropping the handle cancels the worker without waiting for it, use
/// [`ServerLink::stop`] to wait until all sockets are closed.
#[derive(Debug)]
pub struct ServerLink {
    port: u16,
    token: CancellationToken,
    state: watch::Receiver<ServerState>,
    worker: Option<JoinHandle<Terminated>>,
}

impl ServerLink {
    /// Spawns the worker that listens on `0.0.0.0:port`.
    ///
    /// Must be called from within a tokio runtime. Ports below
    /// [`MIN_PORT`](crate::config::MIN_PORT) are rejected. Failing to
    /// listen does not fail the start, it terminates the worker with
    /// [`Terminated::ListenFailed`].
    pub fn start(port: u16) -> Result<Self> {
        Self::start_with_observer(port, None)
    }

    /// Like [`ServerLink::start`], additionally reporting every coil write
    /// that was acknowledged to the peer to `observer`.
    pub fn start_with_observer(
        port: u16,
        observer: Option<mpsc::UnboundedSender<CoilWrite>>,
    ) -> Result<Self> {
        validate_port(port)?;
        let token = CancellationToken::new();
        let (state_tx, state) = watch::channel(ServerState::Idle);
        log::info!("Starting Modbus TCP server link on port {port}");
        let worker = tokio::spawn(tcp::run(port, token.clone(), state_tx, observer));
        Ok(Self {
            port,
            token,
            state,
            worker: Some(worker),
        })
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Receiver that observes the state transitions of this generation.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ServerState> {
        self.state.clone()
    }

    /// Whether the worker has not been joined yet.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Cancels the worker and waits until it has exited.
    ///
    /// Returns why the worker exited, or `None` if it had already been
    /// joined by an earlier call.
    pub async fn stop(&mut self) -> Option<Terminated> {
        let worker = self.worker.take()?;
        log::info!("Joining running server worker on port {}", self.port);
        self.token.cancel();
        let terminated = match worker.await {
            Ok(terminated) => terminated,
            Err(err) => {
                log::error!("Server worker on port {} failed: {err}", self.port);
                Terminated::Panicked
            }
        };
        log::info!(
            "Server link on port {} stopped: {terminated}",
            self.port
        );
        Some(terminated)
    }
}

impl Drop for ServerLink {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
