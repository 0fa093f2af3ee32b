// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
};

use futures_util::{SinkExt as _, StreamExt as _};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, watch},
};
use tokio_util::{codec::Framed, sync::CancellationToken};

use super::{mapping::CoilMapping, CoilWrite, ServerState, Terminated};
use crate::{
    codec::tcp::ServerCodec,
    frame::{tcp::RequestFrame, FunctionCode},
};

/// Only a single pending peer is queued by the kernel.
const LISTEN_BACKLOG: i32 = 1;

/// Number of coils exposed to the peer.
const NB_COILS: usize = 1;

/// Start TCP listener - configure and open TCP socket
fn listener(port: u16) -> io::Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}

/// Body of the worker task of one server link generation.
pub(super) async fn run(
    port: u16,
    token: CancellationToken,
    state: watch::Sender<ServerState>,
    observer: Option<mpsc::UnboundedSender<CoilWrite>>,
) -> Terminated {
    let terminated = run_generation(port, &token, &state, observer.as_ref()).await;
    state.send_replace(ServerState::Terminated);
    terminated
}

async fn run_generation(
    port: u16,
    token: &CancellationToken,
    state: &watch::Sender<ServerState>,
    observer: Option<&mpsc::UnboundedSender<CoilWrite>>,
) -> Terminated {
    state.send_replace(ServerState::Listening);
    log::info!("Listen for Modbus TCP connection on port {port} ...");
    let listener = match listener(port) {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("Failed to listen on port {port}: {err}");
            return Terminated::ListenFailed;
        }
    };

    state.send_replace(ServerState::AwaitingPeer);
    log::info!("Accept Modbus TCP connection ...");
    let accepted = tokio::select! {
        biased;
        () = token.cancelled() => return Terminated::Cancelled,
        accepted = listener.accept() => accepted,
    };
    let (stream, peer) = match accepted {
        Ok(accepted) => accepted,
        Err(err) => {
            log::error!("Failed to accept Modbus TCP connection: {err}");
            return Terminated::AcceptFailed;
        }
    };
    log::info!("Accepted Modbus TCP connection from {peer}");

    let mut mapping = CoilMapping::new(NB_COILS);
    let mut framed = Framed::new(stream, ServerCodec::default());
    state.send_replace(ServerState::Serving);
    let terminated = serve(&mut framed, &mut mapping, token, observer).await;

    // Release the session before the listening socket and the mapping.
    drop(framed);
    drop(listener);
    drop(mapping);
    terminated
}

/// The request-response loop for the connected peer.
async fn serve(
    framed: &mut Framed<TcpStream, ServerCodec>,
    mapping: &mut CoilMapping,
    token: &CancellationToken,
    observer: Option<&mpsc::UnboundedSender<CoilWrite>>,
) -> Terminated {
    log::info!("Start receiving ...");
    loop {
        if token.is_cancelled() {
            return Terminated::Cancelled;
        }
        let received = tokio::select! {
            biased;
            () = token.cancelled() => return Terminated::Cancelled,
            received = framed.next() => received,
        };
        let adu = match received {
            // tcp socket closed
            None => {
                log::info!("Modbus TCP peer closed the connection");
                return Terminated::PeerClosed;
            }
            Some(Err(err)) => {
                log::error!("Modbus receive failed: {err}");
                return Terminated::TransportError;
            }
            Some(Ok(adu)) => adu,
        };
        log::trace!("Received {:02X?}", &adu[..]);

        let request = match RequestFrame::parse(&adu) {
            Ok(request) => request,
            Err(err) => {
                log::info!("The requests we handle are longer, giving up: {err}");
                return Terminated::ShortFrame(adu.len());
            }
        };
        if request.function != FunctionCode::WriteSingleCoil {
            log::debug!("Ignoring request with function code {}", request.function);
            continue;
        }

        let active = request.is_active();
        log::info!(
            "The event trigger at coil {} is now {}",
            request.address,
            if active { "ACTIVE" } else { "INACTIVE" }
        );
        let reply = mapping.reply(&adu);
        let sent = tokio::select! {
            biased;
            () = token.cancelled() => return Terminated::Cancelled,
            sent = framed.send(reply.adu) => sent,
        };
        if let Err(err) = sent {
            log::error!("Modbus reply failed: {err}");
            return Terminated::ReplyFailed;
        }
        if let (true, Some(observer)) = (reply.accepted, observer) {
            let write = CoilWrite {
                address: request.address,
                active,
            };
            if observer.send(write).is_err() {
                log::debug!("Coil write observer has gone away");
            }
        }
        log::info!("Sent reply to client for acknowledgement");
    }
}
