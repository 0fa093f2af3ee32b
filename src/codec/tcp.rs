// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{Error, ErrorKind, Result};

use byteorder::{BigEndian, ByteOrder as _};
use bytes::{BufMut as _, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{decode_response_pdu, encode_request_pdu, request_pdu_size, u16_len};
use crate::frame::tcp::{Header, RequestAdu, ResponseAdu, HEADER_LEN, MAX_ADU_LEN, PROTOCOL_ID};

/// Splits complete MBAP framed ADUs off the read buffer.
///
/// The length field counts the unit id and the PDU, so a complete ADU
/// occupies `6 + len` bytes.
#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct AduDecoder;

impl Decoder for AduDecoder {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let len = usize::from(BigEndian::read_u16(&buf[4..6]));
        if len == 0 {
            return Err(Error::new(ErrorKind::InvalidData, "Invalid ADU length: 0"));
        }
        let adu_len = HEADER_LEN - 1 + len;
        if adu_len > MAX_ADU_LEN {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("ADU length {adu_len} exceeds maximum of {MAX_ADU_LEN}"),
            ));
        }

        if buf.len() < adu_len {
            buf.reserve(adu_len - buf.len());
            return Ok(None);
        }

        Ok(Some(buf.split_to(adu_len).freeze()))
    }
}

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ClientCodec {
    pub(crate) decoder: AduDecoder,
}

impl Decoder for ClientCodec {
    type Item = ResponseAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<ResponseAdu>> {
        let Some(mut adu) = self.decoder.decode(buf)? else {
            return Ok(None);
        };
        let header = adu.split_to(HEADER_LEN);
        let protocol_id = BigEndian::read_u16(&header[2..4]);
        if protocol_id != PROTOCOL_ID {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Invalid protocol identifier: expected = {PROTOCOL_ID}, actual = {protocol_id}"),
            ));
        }
        let hdr = Header {
            transaction_id: BigEndian::read_u16(&header[0..2]),
            unit_id: header[6],
        };
        let pdu = decode_response_pdu(adu)?;
        Ok(Some(ResponseAdu { hdr, pdu }))
    }
}

impl Encoder<RequestAdu> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, adu: RequestAdu, buf: &mut BytesMut) -> Result<()> {
        let RequestAdu { hdr, pdu } = adu;
        let pdu_len = request_pdu_size(&pdu);
        buf.reserve(HEADER_LEN + pdu_len);
        buf.put_u16(hdr.transaction_id);
        buf.put_u16(PROTOCOL_ID);
        buf.put_u16(u16_len(pdu_len + 1));
        buf.put_u8(hdr.unit_id);
        encode_request_pdu(buf, &pdu);
        Ok(())
    }
}

/// Hands out raw request ADUs and writes raw reply ADUs.
///
/// The server link interprets request bytes itself, so no PDU decoding
/// happens here.
#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ServerCodec {
    pub(crate) decoder: AduDecoder,
}

impl Decoder for ServerCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        self.decoder.decode(buf)
    }
}

impl Encoder<Bytes> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, adu: Bytes, buf: &mut BytesMut) -> Result<()> {
        buf.extend_from_slice(&adu);
        Ok(())
    }
}
