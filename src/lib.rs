// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relays a boolean trigger signal over
//! [Modbus](https://en.wikipedia.org/wiki/Modbus) TCP, based on
//! [tokio](https://tokio.rs).
//!
//! The process acts in exactly one of two roles at a time:
//!
//! - **client**: every trigger change is written to a coil of a remote
//!   Modbus TCP server ([`ClientLink`]).
//! - **server**: a single coil is exposed on a local port and writes from
//!   one remote client are acknowledged and logged ([`ServerLink`]).
//!
//! The [`LinkManager`] switches between the roles at runtime whenever the
//! `Mode`, `Port` or `Server` parameter changes, and guarantees that at
//! most one link exists at any time.
//!
//! ```no_run
//! use modbus_trigger_link::{LinkConfig, LinkManager, LinkRole};
//!
//! # async fn run() -> modbus_trigger_link::Result<()> {
//! let manager = LinkManager::new(LinkConfig::default());
//! manager.apply_port(5020).await?;
//! manager.complete_initialization().await?;
//!
//! // Switch to client mode, the server link is torn down first.
//! manager.apply_remote_host(Some("10.0.0.5".to_owned())).await?;
//! manager.apply_role(LinkRole::Client).await?;
//! manager.send_event(true).await?;
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod codec;
mod frame;

pub mod client;
pub mod config;
pub mod dispatch;
pub mod manager;
pub mod relay;
pub mod server;

mod error;
pub use self::error::Error;

/// Specialized [`std::result::Result`] type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub use self::{
    client::ClientLink,
    config::{LinkConfig, LinkRole, Param, Scenario},
    dispatch::{ChannelSource, Dispatcher, LineSource, Notification, ParamSource},
    frame::{
        tcp::{RequestFrame, HEADER_LEN, MAX_ADU_LEN, MIN_REQUEST_LEN},
        Address, Coil, ExceptionCode, ExceptionResponse, FunctionCode, Request, Response,
    },
    manager::{LinkKind, LinkManager},
    relay::{EventRelay, Relayed, TriggerEvent},
    server::{CoilWrite, ServerLink, ServerState, Terminated},
};
