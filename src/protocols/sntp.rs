//! An SNTP client: 48-byte NTP header framing (RFC 4330) plus a small
//! request/reply state machine with exponential backoff (spec §10,
//! property 10: originate-timestamp echo validation; property 11:
//! Kiss-of-Death handling).

use zerocopy::byteorder::big_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{NicError, NicResult};

pub const NTP_HEADER_LEN: usize = 48;

const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;
const VERSION_4: u8 = 4;

/// The fixed 48-byte NTP/SNTP header, laid out exactly as it goes on the
/// wire (spec §10). All multi-byte fields are big-endian, matching the
/// same `zerocopy` framing idiom used for other register/wire structs in
/// this crate.
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct NtpHeader {
    pub li_vn_mode: u8,
    pub stratum: u8,
    pub poll: i8,
    pub precision: i8,
    pub root_delay: U32,
    pub root_dispersion: U32,
    pub reference_id: U32,
    pub reference_timestamp: U64,
    pub originate_timestamp: U64,
    pub receive_timestamp: U64,
    pub transmit_timestamp: U64,
}

const _: () = assert!(core::mem::size_of::<NtpHeader>() == NTP_HEADER_LEN);

impl NtpHeader {
    pub fn client_request(originate_timestamp: u64) -> Self {
        NtpHeader {
            li_vn_mode: (VERSION_4 << 3) | MODE_CLIENT,
            stratum: 0,
            poll: 0,
            precision: 0,
            root_delay: U32::new(0),
            root_dispersion: U32::new(0),
            reference_id: U32::new(0),
            reference_timestamp: U64::new(0),
            originate_timestamp: U64::new(0),
            receive_timestamp: U64::new(0),
            transmit_timestamp: U64::new(originate_timestamp),
        }
    }

    pub fn mode(&self) -> u8 {
        self.li_vn_mode & 0x07
    }

    pub fn leap_indicator(&self) -> u8 {
        self.li_vn_mode >> 6
    }

    pub fn is_kiss_of_death(&self) -> bool {
        self.stratum == 0
    }
}

pub fn encode(header: &NtpHeader, out: &mut [u8; NTP_HEADER_LEN]) {
    out.copy_from_slice(header.as_bytes());
}

pub fn decode(bytes: &[u8]) -> NicResult<NtpHeader> {
    NtpHeader::read_from_bytes(bytes).map_err(|_| NicError::InvalidPacket)
}

const INITIAL_BACKOFF_MS: u32 = 1_000;
const MAX_BACKOFF_MS: u32 = 5_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Idle,
    AwaitingReply { sent_xmit_ts: u64, deadline_ms: u64 },
    KissOfDeathBackoff { resume_at_ms: u64 },
}

/// Request/reply sequencing for one SNTP server (spec §10). Time is
/// supplied by the caller in milliseconds since an arbitrary epoch — this
/// client has no clock of its own.
pub struct SntpClient {
    state: State,
    backoff_ms: u32,
}

impl SntpClient {
    pub fn new() -> Self {
        SntpClient {
            state: State::Idle,
            backoff_ms: INITIAL_BACKOFF_MS,
        }
    }

    /// Called periodically. Returns the request header to send when it's
    /// time to (re)send, `None` otherwise.
    pub fn poll(&mut self, now_ms: u64) -> Option<NtpHeader> {
        match self.state {
            State::Idle => {
                let req = NtpHeader::client_request(now_ms);
                self.state = State::AwaitingReply {
                    sent_xmit_ts: now_ms,
                    deadline_ms: now_ms + self.backoff_ms as u64,
                };
                Some(req)
            }
            State::AwaitingReply { deadline_ms, .. } if now_ms >= deadline_ms => {
                self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
                let req = NtpHeader::client_request(now_ms);
                self.state = State::AwaitingReply {
                    sent_xmit_ts: now_ms,
                    deadline_ms: now_ms + self.backoff_ms as u64,
                };
                Some(req)
            }
            State::KissOfDeathBackoff { resume_at_ms } if now_ms >= resume_at_ms => {
                self.state = State::Idle;
                self.poll(now_ms)
            }
            _ => None,
        }
    }

    /// Validate and consume a reply. Property 10: a reply whose originate
    /// timestamp doesn't match the request this client actually sent is
    /// discarded (`Ok(None)`), not applied. Property 11: a stratum-0
    /// (Kiss-of-Death) reply suspends polling and surfaces as
    /// `RequestRejected` carrying the 4-byte ASCII kiss code from the
    /// reference-id field, rather than being treated as a valid sync.
    pub fn on_reply(&mut self, bytes: &[u8]) -> NicResult<Option<u64>> {
        let reply = decode(bytes)?;
        let sent_xmit_ts = match self.state {
            State::AwaitingReply { sent_xmit_ts, .. } => sent_xmit_ts,
            _ => return Ok(None),
        };

        if reply.mode() != MODE_SERVER {
            return Ok(None);
        }

        if reply.originate_timestamp.get() != sent_xmit_ts {
            // Stale or spoofed reply: discarded, state machine keeps
            // waiting for its actual outstanding request.
            return Ok(None);
        }

        if reply.is_kiss_of_death() {
            self.state = State::KissOfDeathBackoff {
                resume_at_ms: sent_xmit_ts + MAX_BACKOFF_MS as u64 * 4,
            };
            return Err(NicError::RequestRejected(reply.reference_id.get().to_be_bytes()));
        }

        self.backoff_ms = INITIAL_BACKOFF_MS;
        self.state = State::Idle;
        Ok(Some(reply.transmit_timestamp.get()))
    }
}

impl Default for SntpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_wire_bytes() {
        let header = NtpHeader::client_request(0x1122_3344_5566_7788);
        let mut wire = [0u8; NTP_HEADER_LEN];
        encode(&header, &mut wire);
        let decoded = decode(&wire).unwrap();
        assert_eq!(decoded.transmit_timestamp.get(), 0x1122_3344_5566_7788);
        assert_eq!(decoded.mode(), MODE_CLIENT);
    }

    #[test]
    fn reply_with_mismatched_originate_timestamp_is_discarded() {
        let mut client = SntpClient::new();
        let req = client.poll(1_000).unwrap();
        let _ = req;

        let mut reply = NtpHeader::client_request(0);
        reply.li_vn_mode = (VERSION_4 << 3) | MODE_SERVER;
        reply.stratum = 1;
        reply.originate_timestamp = U64::new(999); // does not match sent (1000)
        reply.transmit_timestamp = U64::new(5_000);
        let mut wire = [0u8; NTP_HEADER_LEN];
        encode(&reply, &mut wire);

        assert_eq!(client.on_reply(&wire).unwrap(), None);
    }

    #[test]
    fn matching_reply_yields_transmit_timestamp() {
        let mut client = SntpClient::new();
        client.poll(1_000).unwrap();

        let mut reply = NtpHeader::client_request(0);
        reply.li_vn_mode = (VERSION_4 << 3) | MODE_SERVER;
        reply.stratum = 2;
        reply.originate_timestamp = U64::new(1_000);
        reply.transmit_timestamp = U64::new(42_000);
        let mut wire = [0u8; NTP_HEADER_LEN];
        encode(&reply, &mut wire);

        assert_eq!(client.on_reply(&wire).unwrap(), Some(42_000));
    }

    #[test]
    fn kiss_of_death_suspends_polling_instead_of_syncing() {
        let mut client = SntpClient::new();
        client.poll(1_000).unwrap();

        let mut reply = NtpHeader::client_request(0);
        reply.li_vn_mode = (VERSION_4 << 3) | MODE_SERVER;
        reply.stratum = 0; // Kiss-of-Death
        reply.originate_timestamp = U64::new(1_000);
        reply.reference_id = U32::new(u32::from_be_bytes(*b"RATE"));
        let mut wire = [0u8; NTP_HEADER_LEN];
        encode(&reply, &mut wire);

        assert_eq!(
            client.on_reply(&wire),
            Err(NicError::RequestRejected(*b"RATE"))
        );
        // Immediately afterwards, polling does not re-send.
        assert_eq!(client.poll(1_001), None);
    }

    #[test]
    fn backoff_doubles_up_to_cap_on_repeated_timeout() {
        let mut client = SntpClient::new();
        client.poll(0).unwrap();
        client.poll(1_000).unwrap(); // timed out at 1s, backoff -> 2s
        client.poll(3_000).unwrap(); // backoff -> 4s
        client.poll(7_000).unwrap(); // backoff -> 5s (capped)
        assert_eq!(client.backoff_ms, MAX_BACKOFF_MS);
    }
}
