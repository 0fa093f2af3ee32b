// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    convert::TryFrom,
    io::{self, Cursor, Error, ErrorKind},
};

use byteorder::{BigEndian, ReadBytesExt as _};
use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};

use crate::frame::{ExceptionCode, ExceptionResponse, FunctionCode, Request, Response};

pub(crate) mod tcp;

/// Maximum request/response PDU size.
const MAX_PDU_SIZE: usize = 253;

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u16_len(len: usize) -> u16 {
    // The length is limited by the protocol, see MAX_PDU_SIZE.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

fn encode_request_pdu(buf: &mut BytesMut, request: &Request) {
    buf.put_u8(request.function_code().value());
    match request {
        Request::WriteSingleCoil(address, state) => {
            buf.put_u16(*address);
            buf.put_u16(bool_to_coil(*state));
        }
    }
}

fn request_pdu_size(request: &Request) -> usize {
    match request {
        Request::WriteSingleCoil(_, _) => 5,
    }
}

pub(crate) fn encode_response_pdu(buf: &mut BytesMut, response: &Response) {
    buf.put_u8(response.function_code().value());
    match response {
        Response::WriteSingleCoil(address, state) => {
            buf.put_u16(*address);
            buf.put_u16(bool_to_coil(*state));
        }
        Response::Other(_, data) => buf.put_slice(data),
    }
}

pub(crate) fn encode_exception_response_pdu(buf: &mut BytesMut, rsp: ExceptionResponse) {
    debug_assert!(rsp.function.value() < 0x80);
    buf.put_u8(rsp.function.value() + 0x80);
    buf.put_u8(rsp.exception.into());
}

fn read_u16_be(reader: &mut impl io::Read) -> io::Result<u16> {
    reader.read_u16::<BigEndian>()
}

impl TryFrom<Bytes> for Response {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() > MAX_PDU_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "response PDU size exceeded",
            ));
        }
        let rdr = &mut Cursor::new(&bytes);
        let fn_code = rdr.read_u8()?;
        let rsp = match FunctionCode::new(fn_code) {
            FunctionCode::WriteSingleCoil => {
                Response::WriteSingleCoil(read_u16_be(rdr)?, coil_to_bool(read_u16_be(rdr)?)?)
            }
            FunctionCode::Other(code) => return Ok(Response::Other(code, bytes[1..].to_vec())),
        };
        // Verify that all data has been consumed and decoded.
        if rdr.has_remaining() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "undecoded response data",
            ));
        }
        Ok(rsp)
    }
}

impl TryFrom<Bytes> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let mut rdr = Cursor::new(&bytes);
        let fn_err_code = rdr.read_u8()?;
        if fn_err_code < 0x80 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Invalid exception function code",
            ));
        }
        let function = fn_err_code - 0x80;
        let exception = ExceptionCode::new(rdr.read_u8()?);
        Ok(ExceptionResponse {
            function: FunctionCode::new(function),
            exception,
        })
    }
}

pub(crate) fn decode_response_pdu(bytes: Bytes) -> io::Result<Result<Response, ExceptionResponse>> {
    let fn_code = Cursor::new(&bytes).read_u8()?;
    if fn_code < 0x80 {
        Response::try_from(bytes).map(Ok)
    } else {
        ExceptionResponse::try_from(bytes).map(Err)
    }
}

pub(crate) fn bool_to_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

pub(crate) fn coil_to_bool(coil: u16) -> io::Result<bool> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(Error::new(
            ErrorKind::InvalidData,
            format!("Invalid coil value: 0x{coil:04X}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_bool_to_coil() {
        assert_eq!(bool_to_coil(true), 0xFF00);
        assert_eq!(bool_to_coil(false), 0x0000);
    }

    #[test]
    fn convert_coil_to_bool() {
        assert!(coil_to_bool(0xFF00).unwrap());
        assert!(!coil_to_bool(0x0000).unwrap());
        assert_eq!(
            coil_to_bool(0x1234).unwrap_err().kind(),
            ErrorKind::InvalidData
        );
    }

    #[test]
    fn encode_write_single_coil_request() {
        let mut buf = BytesMut::new();
        encode_request_pdu(&mut buf, &Request::WriteSingleCoil(0x1234, true));
        assert_eq!(&buf[..], &[0x05, 0x12, 0x34, 0xFF, 0x00]);
        assert_eq!(
            request_pdu_size(&Request::WriteSingleCoil(0x1234, true)),
            buf.len()
        );
    }

    #[test]
    fn encode_write_single_coil_response() {
        let mut buf = BytesMut::new();
        encode_response_pdu(&mut buf, &Response::WriteSingleCoil(0x33, false));
        assert_eq!(&buf[..], &[0x05, 0x00, 0x33, 0x00, 0x00]);
    }

    #[test]
    fn encode_exception_response() {
        let mut buf = BytesMut::new();
        encode_exception_response_pdu(
            &mut buf,
            ExceptionResponse {
                function: FunctionCode::WriteSingleCoil,
                exception: ExceptionCode::IllegalDataAddress,
            },
        );
        assert_eq!(&buf[..], &[0x85, 0x02]);
    }

    #[test]
    fn decode_write_single_coil_response() {
        let bytes = Bytes::from_static(&[0x05, 0x00, 0x33, 0xFF, 0x00]);
        let rsp = decode_response_pdu(bytes).unwrap();
        assert_eq!(rsp, Ok(Response::WriteSingleCoil(0x33, true)));
    }

    #[test]
    fn decode_exception_response() {
        let bytes = Bytes::from_static(&[0x85, 0x03]);
        let rsp = decode_response_pdu(bytes).unwrap();
        assert_eq!(
            rsp,
            Err(ExceptionResponse {
                function: FunctionCode::WriteSingleCoil,
                exception: ExceptionCode::IllegalDataValue,
            })
        );
    }

    #[test]
    fn decode_response_with_trailing_data() {
        let bytes = Bytes::from_static(&[0x05, 0x00, 0x33, 0xFF, 0x00, 0x01]);
        let err = decode_response_pdu(bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn decode_other_response_keeps_payload() {
        let bytes = Bytes::from_static(&[0x06, 0x00, 0x01, 0x00, 0x02]);
        let rsp = decode_response_pdu(bytes).unwrap();
        assert_eq!(rsp, Ok(Response::Other(0x06, vec![0x00, 0x01, 0x00, 0x02])));
    }
}
