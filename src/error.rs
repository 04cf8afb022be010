//! Error taxonomy surfaced across the NIC core (spec §7).
//!
//! Every fault becomes a `NicError`; nothing in this crate panics on a
//! hardware or protocol condition. `unwrap`/`expect` are reserved for
//! invariants that genuinely cannot fail (e.g. a `const`-sized slice index).

/// Error taxonomy shared by every component (C1–C5) and by the protocol
/// clients in `protocols`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NicError {
    /// Null handle, out-of-range enum, or unsupported opcode.
    InvalidParameter,
    /// Frame too large for a slot, or smaller than the minimum header size.
    LengthInvalid,
    /// Descriptor error bits set, FS/LS flags missing, or a malformed
    /// on-wire record.
    InvalidPacket,
    /// No more RX packets to drain. Normal loop termination, not a fault.
    BufferEmpty,
    /// TX slot momentarily unavailable; caller re-drives on `tx_ready`.
    TransientBusy,
    /// Protocol-client deadline exceeded.
    Timeout,
    /// A non-blocking step is still in progress.
    WouldBlock,
    /// Mutex/event allocation failed.
    OutOfResources,
    /// Operation issued in an incompatible client state.
    WrongState,
    /// NTP Kiss-of-Death (stratum 0); carries the 4-byte ASCII kiss code.
    RequestRejected([u8; 4]),
}

impl core::fmt::Display for NicError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NicError::InvalidParameter => write!(f, "invalid parameter"),
            NicError::LengthInvalid => write!(f, "length invalid"),
            NicError::InvalidPacket => write!(f, "invalid packet"),
            NicError::BufferEmpty => write!(f, "buffer empty"),
            NicError::TransientBusy => write!(f, "transient busy"),
            NicError::Timeout => write!(f, "timeout"),
            NicError::WouldBlock => write!(f, "would block"),
            NicError::OutOfResources => write!(f, "out of resources"),
            NicError::WrongState => write!(f, "wrong state"),
            NicError::RequestRejected(code) => {
                let s = core::str::from_utf8(code).unwrap_or("????");
                write!(f, "request rejected (kiss code {s})")
            }
        }
    }
}

pub type NicResult<T> = Result<T, NicError>;
