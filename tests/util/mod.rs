// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use tokio::{sync::watch, time::timeout};

use modbus_trigger_link::ServerState;

/// Upper bound for anything that should happen "promptly".
pub const PROMPT: Duration = Duration::from_secs(1);

/// Returns a port that was free a moment ago.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    assert!(port >= 1024);
    port
}

pub async fn wait_for_state(
    rx: &mut watch::Receiver<ServerState>,
    expected: ServerState,
) -> anyhow::Result<()> {
    timeout(PROMPT * 2, rx.wait_for(|state| *state == expected)).await??;
    Ok(())
}

/// A _Write Single Coil_ request ADU for coil `addr`.
pub fn write_coil_request(transaction_id: u16, addr: u16, value: u16) -> Vec<u8> {
    let mut adu = transaction_id.to_be_bytes().to_vec();
    adu.extend_from_slice(&[0x00, 0x00, 0x00, 0x06, 0xFF, 0x05]);
    adu.extend_from_slice(&addr.to_be_bytes());
    adu.extend_from_slice(&value.to_be_bytes());
    adu
}
