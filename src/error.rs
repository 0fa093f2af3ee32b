// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::io;

use thiserror::Error;

use crate::{ExceptionCode, Response};

/// Errors of the link layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value could not be parsed or is out of range.
    #[error("invalid value {value:?} for parameter {name}")]
    InvalidParameter { name: String, value: String },

    /// A configuration notification named a parameter nobody handles.
    #[error("unknown parameter {0}")]
    UnknownParameter(String),

    /// A configuration notification carried no value.
    #[error("missing value for parameter {0}")]
    MissingValue(String),

    /// Client role was requested without a remote host.
    #[error("no remote server configured")]
    MissingRemoteHost,

    /// The outbound connection could not be established.
    #[error("failed to connect to {peer}: {source}")]
    Connect {
        peer: String,
        #[source]
        source: io::Error,
    },

    /// A coil write was attempted before connecting.
    #[error("client link is not connected")]
    NotConnected,

    /// An inbound frame was shorter than any request this crate handles.
    #[error("frame of {0} bytes is too short")]
    ShortFrame(usize),

    /// The peer responded with a _Modbus_ exception.
    #[error("exception: {0}")]
    Exception(ExceptionCode),

    /// The received response doesn't match the request.
    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(Response),

    /// Transport failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_parameter(name: &str, value: &str) -> Self {
        Self::InvalidParameter {
            name: name.to_owned(),
            value: value.to_owned(),
        }
    }
}
