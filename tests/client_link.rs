// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

mod util;

use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpListener,
    sync::mpsc,
};

use modbus_trigger_link::{ClientLink, CoilWrite, Error, ServerLink, ServerState};

use util::{free_port, wait_for_state};

#[tokio::test]
async fn writes_trigger_state_to_server_link() -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut server = ServerLink::start_with_observer(free_port(), Some(tx))?;
    wait_for_state(&mut server.state_changes(), ServerState::AwaitingPeer).await?;

    let mut client = ClientLink::new();
    client.connect("127.0.0.1", server.port()).await?;
    assert!(client.is_connected());

    client.send_bool_event(true).await?;
    client.send_bool_event(false).await?;
    assert_eq!(client.write_failures(), 0);
    assert_eq!(
        rx.recv().await,
        Some(CoilWrite {
            address: 0,
            active: true
        })
    );
    assert_eq!(
        rx.recv().await,
        Some(CoilWrite {
            address: 0,
            active: false
        })
    );

    client.shutdown().await;
    assert!(!client.is_connected());
    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn failed_writes_are_counted_not_returned() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let acceptor = tokio::spawn(async move {
        // Accept and hang up immediately.
        let (stream, _) = listener.accept().await?;
        drop(stream);
        anyhow::Ok(())
    });

    let mut client = ClientLink::new();
    client.connect("127.0.0.1", port).await?;
    acceptor.await??;

    client.send_bool_event(true).await?;
    assert_eq!(client.write_failures(), 1);
    assert!(client.is_connected());
    Ok(())
}

#[tokio::test]
async fn exception_replies_are_counted() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let peer = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        let mut request = [0; 12];
        stream.read_exact(&mut request).await?;
        let mut reply = request[..2].to_vec();
        reply.extend_from_slice(&[0x00, 0x00, 0x00, 0x03, 0xFF, 0x85, 0x04]);
        stream.write_all(&reply).await?;
        anyhow::Ok(request)
    });

    let mut client = ClientLink::new();
    client.connect("127.0.0.1", port).await?;
    client.send_bool_event(true).await?;
    assert_eq!(client.write_failures(), 1);

    let request = peer.await??;
    assert_eq!(
        request,
        [0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x05, 0x00, 0x00, 0xFF, 0x00]
    );
    Ok(())
}

#[tokio::test]
async fn missing_reply_times_out() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let peer = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        let mut request = [0; 12];
        stream.read_exact(&mut request).await?;
        // Keep the connection open without replying.
        let _ = done_rx.await;
        anyhow::Ok(())
    });

    let mut client = ClientLink::new();
    client.connect("127.0.0.1", port).await?;
    client.send_bool_event(false).await?;
    assert_eq!(client.write_failures(), 1);

    let _ = done_tx.send(());
    peer.await??;
    Ok(())
}

#[tokio::test]
async fn refused_connection_is_an_error() {
    let mut client = ClientLink::new();
    let result = client.connect("127.0.0.1", free_port()).await;
    assert!(matches!(result, Err(Error::Connect { .. })));
    assert!(!client.is_connected());
}
