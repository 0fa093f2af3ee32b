// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use byteorder::{BigEndian, ByteOrder as _};

use super::*;
use crate::{Error, Result};

pub(crate) type TransactionId = u16;
pub(crate) type UnitId = u8;

/// Size of the MBAP header including the unit id.
pub const HEADER_LEN: usize = 7;

/// Maximum size of a Modbus TCP ADU.
pub const MAX_ADU_LEN: usize = 260;

/// Shortest request this crate is willing to interpret.
///
/// A _Write Single Coil_ request is exactly this long. Anything shorter
/// terminates the session.
pub const MIN_REQUEST_LEN: usize = 12;

pub(crate) const PROTOCOL_ID: u16 = 0x0000;

/// Unit id for a Modbus TCP device that is addressed directly.
pub(crate) const TCP_DEVICE_UNIT_ID: UnitId = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) transaction_id: TransactionId,
    pub(crate) unit_id: UnitId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestAdu {
    pub(crate) hdr: Header,
    pub(crate) pdu: Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseAdu {
    pub(crate) hdr: Header,
    pub(crate) pdu: std::result::Result<Response, ExceptionResponse>,
}

/// The fields of a raw inbound ADU that the server link looks at.
///
/// Byte positions are fixed: function code at 7, address at 8..10
/// (big-endian) and the high byte of the coil value at 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame {
    pub function: FunctionCode,
    pub address: Address,
    pub value: u8,
}

impl RequestFrame {
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < MIN_REQUEST_LEN {
            return Err(Error::ShortFrame(frame.len()));
        }
        Ok(Self {
            function: FunctionCode::new(frame[7]),
            address: BigEndian::read_u16(&frame[8..10]),
            value: frame[10],
        })
    }

    /// `0xFF` switches the coil on, every other value switches it off.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.value == 0xFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_write_single_coil_on() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x05, 0x00, 0x00, 0xFF, 0x00];
        let req = RequestFrame::parse(&frame).unwrap();
        assert_eq!(req.function, FunctionCode::WriteSingleCoil);
        assert_eq!(req.address, 0);
        assert!(req.is_active());
    }

    #[test]
    fn parse_reads_big_endian_address() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x05, 0x12, 0x34, 0x00, 0x00];
        let req = RequestFrame::parse(&frame).unwrap();
        assert_eq!(req.address, 0x1234);
        assert!(!req.is_active());
    }

    #[test]
    fn any_value_other_than_ff_is_inactive() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x05, 0x00, 0x00, 0x01, 0x00];
        assert!(!RequestFrame::parse(&frame).unwrap().is_active());
    }

    #[test]
    fn parse_rejects_short_frames() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0xFF, 0x05, 0x00, 0x00];
        let err = RequestFrame::parse(&frame).unwrap_err();
        assert!(matches!(err, Error::ShortFrame(10)));
    }

    #[test]
    fn parse_keeps_unknown_function_codes() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x01];
        let req = RequestFrame::parse(&frame).unwrap();
        assert_eq!(req.function, FunctionCode::Other(0x03));
    }
}
