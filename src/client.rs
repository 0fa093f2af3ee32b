// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound link that writes the trigger state to a remote coil.

use std::{io, time::Duration};

use futures_util::{SinkExt as _, StreamExt as _};
use tokio::{io::AsyncWriteExt as _, net::TcpStream, time::timeout};
use tokio_util::codec::Framed;

use crate::{
    codec::tcp::ClientCodec,
    config::validate_port,
    frame::{
        tcp::{Header, RequestAdu, TransactionId, UnitId, TCP_DEVICE_UNIT_ID},
        Address, Coil, Request,
    },
    Error, Result,
};

/// Coil the trigger state is written to.
pub const EVENT_ACTIVE_ADDRESS: Address = 0;

/// How long to wait for the TCP handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for the acknowledgement of a coil write.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

const INITIAL_TRANSACTION_ID: TransactionId = 0;

/// Modbus TCP client side of the link.
///
/// Write failures never reach the caller of [`ClientLink::send_bool_event`].
/// They are logged and counted, see [`ClientLink::write_failures`].
#[derive(Debug)]
pub struct ClientLink {
    framed: Option<Framed<TcpStream, ClientCodec>>,
    peer: String,
    unit_id: UnitId,
    transaction_id: TransactionId,
    write_failures: u64,
}

impl Default for ClientLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientLink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            framed: None,
            peer: String::new(),
            unit_id: TCP_DEVICE_UNIT_ID,
            transaction_id: INITIAL_TRANSACTION_ID,
            write_failures: 0,
        }
    }

    /// Opens a Modbus TCP connection to `host:port`.
    ///
    /// Any connection held before is released first. On failure no
    /// connection is held.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if host.is_empty() {
            return Err(Error::MissingRemoteHost);
        }
        validate_port(port)?;
        self.shutdown().await;

        let peer = format!("{host}:{port}");
        log::info!("Trying to create Modbus TCP connection to {peer}");
        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                log::error!("Failed to connect to {peer}: {source}");
                return Err(Error::Connect { peer, source });
            }
            Err(_) => {
                log::error!("Timed out connecting to {peer}");
                let source = io::Error::new(io::ErrorKind::TimedOut, "connect timed out");
                return Err(Error::Connect { peer, source });
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            log::debug!("Failed to disable Nagle's algorithm: {err}");
        }
        log::info!("Connected to {peer}");
        self.framed = Some(Framed::new(stream, ClientCodec::default()));
        self.peer = peer;
        self.transaction_id = INITIAL_TRANSACTION_ID;
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Number of coil writes that failed since this link was created.
    #[must_use]
    pub const fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Writes `active` to [`EVENT_ACTIVE_ADDRESS`].
    ///
    /// Returns `Ok(())` even if the write failed on the wire. Only a
    /// missing connection is reported as [`Error::NotConnected`].
    pub async fn send_bool_event(&mut self, active: bool) -> Result<()> {
        if self.framed.is_none() {
            return Err(Error::NotConnected);
        }
        match self.write_single_coil(EVENT_ACTIVE_ADDRESS, active).await {
            Ok(()) => log::info!("Wrote event {active} to {}", self.peer),
            Err(err) => {
                self.write_failures += 1;
                log::error!(
                    "Failed to write Modbus coil {EVENT_ACTIVE_ADDRESS} on {}: {err}",
                    self.peer
                );
            }
        }
        Ok(())
    }

    /// Releases the connection. Does nothing if there is none.
    pub async fn shutdown(&mut self) {
        let Some(framed) = self.framed.take() else {
            return;
        };
        log::info!("Closing Modbus TCP connection to {}", self.peer);
        let mut stream = framed.into_inner();
        if let Err(err) = stream.shutdown().await {
            log::debug!("Failed to shut down connection to {}: {err}", self.peer);
        }
    }

    fn next_request_hdr(&mut self) -> Header {
        let transaction_id = self.transaction_id;
        self.transaction_id = transaction_id.wrapping_add(1);
        Header {
            transaction_id,
            unit_id: self.unit_id,
        }
    }

    async fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()> {
        let req = Request::WriteSingleCoil(addr, coil);
        let req_adu = RequestAdu {
            hdr: self.next_request_hdr(),
            pdu: req,
        };
        let req_hdr = req_adu.hdr;
        let framed = self.framed.as_mut().ok_or(Error::NotConnected)?;
        log::debug!("Call {req:?}");

        framed.read_buffer_mut().clear();
        framed.send(req_adu).await?;
        let rsp_adu = match timeout(RESPONSE_TIMEOUT, framed.next()).await {
            Ok(Some(rsp_adu)) => rsp_adu?,
            Ok(None) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )
                .into())
            }
            Err(_) => {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "response timed out").into())
            }
        };
        verify_response_header(&req_hdr, &rsp_adu.hdr)?;
        match rsp_adu.pdu {
            Ok(rsp) if rsp.acknowledges(&req) => Ok(()),
            Ok(rsp) => Err(Error::UnexpectedResponse(rsp)),
            Err(exception) => Err(Error::Exception(exception.exception)),
        }
    }
}

fn verify_response_header(req_hdr: &Header, rsp_hdr: &Header) -> io::Result<()> {
    if req_hdr != rsp_hdr {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid response header: expected/request = {req_hdr:?}, actual/response = {rsp_hdr:?}"),
        ));
    }
    Ok(())
}
