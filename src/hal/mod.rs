//! Hardware Abstraction Layer
//!
//! This module sits between the driver and the SPI peripheral:
//!
//! - [`spi`]: Command framing, the [`SpiBus`] seam and the [`RegisterBus`]
//!   that issues register and FIFO exchanges
//! - [`reset`]: Soft reset pulses and power mode changes
//!
//! # Delay Integration
//!
//! All types that require delays use `embedded_hal::delay::DelayNs` directly.
//! Pass any delay implementation from your HAL.

pub mod reset;
pub mod spi;

// Re-export commonly used types
pub use reset::{PowerMode, ResetController, ResetScope};
pub use spi::{AccessWidth, BusStats, RegisterBus, SpiBus, SpiDeviceBus};
