//! An RFC 3164 syslog message formatter (spec §10): `<PRI>TIMESTAMP
//! HOSTNAME TAG: MESSAGE`. No clock or DNS lookups live here — the caller
//! supplies the already-split timestamp fields and hostname string, the
//! way the rest of this crate takes platform specifics as parameters
//! rather than reaching for them itself.

use core::fmt::Write;

use crate::error::{NicError, NicResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Facility {
    Kernel = 0,
    User = 1,
    Daemon = 3,
    Syslog = 5,
    Local0 = 16,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Informational = 6,
    Debug = 7,
}

fn priority(facility: Facility, severity: Severity) -> u8 {
    (facility as u8) * 8 + (severity as u8)
}

/// A calendar timestamp broken into RFC 3164's fixed `Mmm dd hh:mm:ss`
/// fields. No timezone handling — RFC 3164 timestamps are local time with
/// no offset field, by design.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timestamp {
    pub month: Month,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    fn abbreviation(self) -> &'static str {
        match self {
            Month::Jan => "Jan",
            Month::Feb => "Feb",
            Month::Mar => "Mar",
            Month::Apr => "Apr",
            Month::May => "May",
            Month::Jun => "Jun",
            Month::Jul => "Jul",
            Month::Aug => "Aug",
            Month::Sep => "Sep",
            Month::Oct => "Oct",
            Month::Nov => "Nov",
            Month::Dec => "Dec",
        }
    }
}

/// A fixed-capacity byte buffer implementing `core::fmt::Write`, since
/// `&mut [u8]` doesn't implement it directly.
struct SliceWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> Write for SliceWriter<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        if self.len + bytes.len() > self.buf.len() {
            return Err(core::fmt::Error);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }
}

/// Format a syslog message into `out`, returning the number of bytes
/// written. RFC 3164 caps the whole message at 1024 bytes; this function
/// doesn't truncate, it fails with `length_invalid` if `out` is too small
/// or the formatted message would exceed that cap.
pub fn format_message(
    out: &mut [u8],
    facility: Facility,
    severity: Severity,
    timestamp: Timestamp,
    hostname: &str,
    tag: &str,
    message: &str,
) -> NicResult<usize> {
    const RFC3164_MAX_LEN: usize = 1024;
    let mut writer = SliceWriter { buf: out, len: 0 };
    write!(
        writer,
        "<{}>{} {:2} {:02}:{:02}:{:02} {} {}: {}",
        priority(facility, severity),
        timestamp.month.abbreviation(),
        timestamp.day,
        timestamp.hour,
        timestamp.minute,
        timestamp.second,
        hostname,
        tag,
        message,
    )
    .map_err(|_| NicError::LengthInvalid)?;
    if writer.len > RFC3164_MAX_LEN {
        return Err(NicError::LengthInvalid);
    }
    Ok(writer.len)
}
