//! Concrete controller families built on top of the generic C1–C5 layers.
//! Each one is grounded in a different real part so the abstraction earns
//! its keep across descriptor-ring DMA MACs, SPI-attached FIFO MACs, and a
//! tagging switch.

pub mod dma_mac;
pub mod enc28j60;
pub mod tailtag_switch;
pub mod w5100;
