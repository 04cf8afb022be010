//! Surrounding protocol clients (spec §10). These sit above the NIC layer
//! named out of scope by spec §1, but §8's testable properties pin their
//! wire framing directly, so thin clients for them live here rather than
//! being left as an unimplemented collaborator.

pub mod nts;
pub mod sntp;
pub mod syslog;
