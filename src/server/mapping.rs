// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use byteorder::{BigEndian, ByteOrder as _};
use bytes::{BufMut as _, Bytes, BytesMut};

use crate::{
    codec::{encode_exception_response_pdu, encode_response_pdu},
    frame::{
        tcp::{HEADER_LEN, MIN_REQUEST_LEN},
        Address, Coil, ExceptionCode, ExceptionResponse, FunctionCode, Response,
    },
};

/// Reply ADU for a coil write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub(crate) adu: Bytes,
    /// `false` if the reply is an exception and no coil was written.
    pub(crate) accepted: bool,
}

/// Coil storage of a server session together with the reply rules for
/// writes into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CoilMapping {
    coils: Vec<Coil>,
}

impl CoilMapping {
    pub(crate) fn new(nb_coils: usize) -> Self {
        Self {
            coils: vec![false; nb_coils],
        }
    }

    #[cfg(test)]
    pub(crate) fn coil(&self, addr: Address) -> Option<Coil> {
        self.coils.get(usize::from(addr)).copied()
    }

    fn write_single_coil(
        &mut self,
        addr: Address,
        value: u16,
    ) -> Result<Response, ExceptionResponse> {
        let exception = |exception| ExceptionResponse {
            function: FunctionCode::WriteSingleCoil,
            exception,
        };
        let coil = self
            .coils
            .get_mut(usize::from(addr))
            .ok_or_else(|| exception(ExceptionCode::IllegalDataAddress))?;
        let state = match value {
            0xFF00 => true,
            0x0000 => false,
            _ => return Err(exception(ExceptionCode::IllegalDataValue)),
        };
        *coil = state;
        Ok(Response::WriteSingleCoil(addr, state))
    }

    /// Applies a _Write Single Coil_ request ADU and builds the reply ADU.
    ///
    /// The request must be at least [`MIN_REQUEST_LEN`] bytes long. The
    /// reply carries the transaction id, protocol id and unit id of the
    /// request.
    pub(crate) fn reply(&mut self, request: &[u8]) -> Reply {
        debug_assert!(request.len() >= MIN_REQUEST_LEN);
        let addr = BigEndian::read_u16(&request[8..10]);
        let value = BigEndian::read_u16(&request[10..12]);

        let mut pdu = BytesMut::with_capacity(5);
        let accepted = match self.write_single_coil(addr, value) {
            Ok(rsp) => {
                encode_response_pdu(&mut pdu, &rsp);
                true
            }
            Err(rsp) => {
                log::warn!("Rejecting coil write: {rsp}");
                encode_exception_response_pdu(&mut pdu, rsp);
                false
            }
        };

        let mut adu = BytesMut::with_capacity(HEADER_LEN + pdu.len());
        adu.put_slice(&request[0..4]);
        adu.put_u16(crate::codec::u16_len(pdu.len() + 1));
        adu.put_u8(request[6]);
        adu.put_slice(&pdu);
        Reply {
            adu: adu.freeze(),
            accepted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_request(addr: u16, value: u16) -> Vec<u8> {
        let mut req = vec![0x12, 0x34, 0x00, 0x00, 0x00, 0x06, 0x11, 0x05];
        req.extend_from_slice(&addr.to_be_bytes());
        req.extend_from_slice(&value.to_be_bytes());
        req
    }

    #[test]
    fn acknowledges_coil_on() {
        let mut mapping = CoilMapping::new(1);
        let req = write_request(0, 0xFF00);
        let reply = mapping.reply(&req);
        assert!(reply.accepted);
        assert_eq!(&reply.adu[..], &req[..]);
        assert_eq!(mapping.coil(0), Some(true));
    }

    #[test]
    fn acknowledges_coil_off() {
        let mut mapping = CoilMapping::new(1);
        mapping.reply(&write_request(0, 0xFF00));
        let req = write_request(0, 0x0000);
        let reply = mapping.reply(&req);
        assert!(reply.accepted);
        assert_eq!(&reply.adu[..], &req[..]);
        assert_eq!(mapping.coil(0), Some(false));
    }

    #[test]
    fn rejects_address_outside_mapping() {
        let mut mapping = CoilMapping::new(1);
        let reply = mapping.reply(&write_request(1, 0xFF00));
        assert!(!reply.accepted);
        assert_eq!(
            &reply.adu[..],
            &[0x12, 0x34, 0x00, 0x00, 0x00, 0x03, 0x11, 0x85, 0x02]
        );
        assert_eq!(mapping.coil(0), Some(false));
    }

    #[test]
    fn rejects_invalid_coil_value() {
        let mut mapping = CoilMapping::new(1);
        let reply = mapping.reply(&write_request(0, 0x1234));
        assert!(!reply.accepted);
        assert_eq!(
            &reply.adu[..],
            &[0x12, 0x34, 0x00, 0x00, 0x00, 0x03, 0x11, 0x85, 0x03]
        );
        assert_eq!(mapping.coil(0), Some(false));
    }
}
