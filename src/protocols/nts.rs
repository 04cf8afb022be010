//! NTS-KE (Network Time Security Key Establishment, RFC 8915) record
//! framing: a 4-byte record header — a critical bit, a 15-bit record type,
//! and a 16-bit body length — followed by the body (spec §10, scenario
//! S5). The key-establishment exchange itself runs over a caller-supplied
//! transport (TLS in practice); this module only frames/parses records.

use crate::error::{NicError, NicResult};

pub const RECORD_HEADER_LEN: usize = 4;
const CRITICAL_BIT: u16 = 0x8000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordType {
    EndOfMessage,
    NextProtocolNegotiation,
    Error,
    Warning,
    AeadAlgorithmNegotiation,
    NewCookie,
    NtpServerNegotiation,
    NtpPortNegotiation,
    Unknown(u16),
}

impl RecordType {
    fn code(self) -> u16 {
        match self {
            RecordType::EndOfMessage => 0,
            RecordType::NextProtocolNegotiation => 1,
            RecordType::Error => 2,
            RecordType::Warning => 3,
            RecordType::AeadAlgorithmNegotiation => 4,
            RecordType::NewCookie => 5,
            RecordType::NtpServerNegotiation => 6,
            RecordType::NtpPortNegotiation => 7,
            RecordType::Unknown(n) => n,
        }
    }

    fn from_code(code: u16) -> Self {
        match code {
            0 => RecordType::EndOfMessage,
            1 => RecordType::NextProtocolNegotiation,
            2 => RecordType::Error,
            3 => RecordType::Warning,
            4 => RecordType::AeadAlgorithmNegotiation,
            5 => RecordType::NewCookie,
            6 => RecordType::NtpServerNegotiation,
            7 => RecordType::NtpPortNegotiation,
            n => RecordType::Unknown(n),
        }
    }
}

/// One decoded record: its type, whether the critical bit was set, and the
/// body bytes (a borrow into the caller's receive buffer).
#[derive(Copy, Clone, Debug)]
pub struct Record<'a> {
    pub record_type: RecordType,
    pub critical: bool,
    pub body: &'a [u8],
}

/// Encode one record's header + body into `out`, returning the total
/// number of bytes written. `critical` must be set on `NextProtocolNegotiation`
/// and `EndOfMessage` per RFC 8915; this module doesn't enforce that, the
/// caller constructing the exchange does.
pub fn encode_record(
    record_type: RecordType,
    critical: bool,
    body: &[u8],
    out: &mut [u8],
) -> NicResult<usize> {
    if out.len() < RECORD_HEADER_LEN + body.len() {
        return Err(NicError::LengthInvalid);
    }
    if body.len() > u16::MAX as usize {
        return Err(NicError::LengthInvalid);
    }
    let mut type_field = record_type.code() & 0x7FFF;
    if critical {
        type_field |= CRITICAL_BIT;
    }
    out[0..2].copy_from_slice(&type_field.to_be_bytes());
    out[2..4].copy_from_slice(&(body.len() as u16).to_be_bytes());
    out[4..4 + body.len()].copy_from_slice(body);
    Ok(RECORD_HEADER_LEN + body.len())
}

/// Parse one record from the front of `bytes`, returning it and the number
/// of bytes consumed.
pub fn decode_record(bytes: &[u8]) -> NicResult<(Record<'_>, usize)> {
    if bytes.len() < RECORD_HEADER_LEN {
        return Err(NicError::InvalidPacket);
    }
    let type_field = u16::from_be_bytes([bytes[0], bytes[1]]);
    let body_len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
    let consumed = RECORD_HEADER_LEN + body_len;
    if bytes.len() < consumed {
        return Err(NicError::InvalidPacket);
    }
    Ok((
        Record {
            record_type: RecordType::from_code(type_field & 0x7FFF),
            critical: type_field & CRITICAL_BIT != 0,
            body: &bytes[RECORD_HEADER_LEN..consumed],
        },
        consumed,
    ))
}

/// Parse every record in `bytes` in order, stopping at `EndOfMessage` or
/// when the buffer is exhausted. Bounded to `MAX_RECORDS` so a malformed
/// or hostile stream can't loop unboundedly.
pub const MAX_RECORDS: usize = 16;

pub fn decode_all(bytes: &[u8]) -> NicResult<heapless::Vec<(RecordType, bool), MAX_RECORDS>> {
    let mut out = heapless::Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let (record, consumed) = decode_record(&bytes[offset..])?;
        let is_end = record.record_type == RecordType::EndOfMessage;
        out.push((record.record_type, record.critical))
            .map_err(|_| NicError::OutOfResources)?;
        offset += consumed;
        if is_end {
            break;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_through_wire_bytes() {
        let mut buf = [0u8; 16];
        let n = encode_record(RecordType::NewCookie, false, &[1, 2, 3], &mut buf).unwrap();
        let (record, consumed) = decode_record(&buf[..n]).unwrap();
        assert_eq!(consumed, n);
        assert_eq!(record.record_type, RecordType::NewCookie);
        assert!(!record.critical);
        assert_eq!(record.body, &[1, 2, 3]);
    }

    #[test]
    fn critical_bit_survives_round_trip() {
        let mut buf = [0u8; 8];
        let n = encode_record(RecordType::NextProtocolNegotiation, true, &[0, 0], &mut buf).unwrap();
        let (record, _) = decode_record(&buf[..n]).unwrap();
        assert!(record.critical);
        assert_eq!(record.record_type, RecordType::NextProtocolNegotiation);
    }

    /// S5 — a short NTS-KE exchange: next-protocol negotiation followed by
    /// an end-of-message record.
    #[test]
    fn scenario_s5_decodes_negotiation_then_stops_at_end_marker() {
        let mut buf = [0u8; 32];
        let mut offset = 0;
        offset += encode_record(
            RecordType::NextProtocolNegotiation,
            true,
            &[0x00, 0x00],
            &mut buf[offset..],
        )
        .unwrap();
        offset += encode_record(RecordType::EndOfMessage, true, &[], &mut buf[offset..]).unwrap();
        // A trailing, unrelated record must never be reached.
        encode_record(RecordType::Error, true, &[0xFF], &mut buf[offset..]).unwrap();

        let records = decode_all(&buf[..offset]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, RecordType::NextProtocolNegotiation);
        assert_eq!(records[1].0, RecordType::EndOfMessage);
    }

    #[test]
    fn truncated_body_is_invalid_packet() {
        let buf = [0x00, 0x05, 0x00, 0x10]; // claims 16-byte body, none present
        assert_eq!(decode_record(&buf), Err(NicError::InvalidPacket));
    }
}
