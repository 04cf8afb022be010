//! A network interface controller abstraction for embedded TCP/IP stacks:
//! frame buffers, a driver contract uniform across descriptor-ring DMA
//! MACs and SPI-attached FIFO MACs, the DMA ring engine itself, MAC/PHY/
//! switch link and filter management, and the serial-attached controller
//! adapter primitives a chip like an [`Enc28j60`](drivers::enc28j60::Enc28j60)
//! or [`W5100`](drivers::w5100::W5100) needs.
//!
//! Everything above the Ethernet frame boundary — IP, UDP, the SNTP/NTS/
//! syslog clients in [`protocols`] — is a consumer of [`NetworkInterface`],
//! not a part of this layer.

#![cfg_attr(not(test), no_std)]

pub mod buffer;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod filter;
pub mod iface;
pub mod link;
pub mod mdio;
pub mod protocols;
pub mod ring;
pub mod serial;
pub mod signal;
pub mod switch;

#[cfg(feature = "smoltcp_phy")]
pub mod smoltcp_phy;

pub use buffer::Buffer;
pub use driver::{Ancillary, NicCapabilities, NicDriver, PhyDriver, PortTagging, SwitchDriver};
pub use error::{NicError, NicResult};
pub use iface::{Duplex, LinkState, MacAddress, NetworkInterface, Speed, UpwardStack};
