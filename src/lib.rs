//! KS8851 SPI Ethernet Driver
//!
//! A `no_std` driver engine for the Micrel KS8851 Ethernet controller
//! attached over SPI.
//!
//! The chip is reached through a byte-serial command bus: every register
//! access is a short command/data exchange, and packets move through
//! receive and transmit FIFOs with bulk transfers. This crate turns that
//! into a packet-in / packet-out interface with interrupt-driven delivery
//! and transmit flow control.
//!
//! # Architecture
//!
//! The driver is organized into four layers:
//!
//! 1. **Bus Layer** ([`hal::spi`]): Command framing and FIFO transfers over
//!    an `embedded_hal::spi::SpiDevice`
//! 2. **Register Layer** ([`driver::chip`]): Reset, identity, MAC address,
//!    PHY mirror, open/stop sequencing
//! 3. **Pipelines** ([`driver::rx`], [`driver::tx`]): Bulk receive with
//!    partial-read recovery, batched transmit under a space budget
//! 4. **Dispatch** ([`driver::interrupt`], [`sync`]): Interrupt decode and
//!    the deferred receive, transmit and filter units
//!
//! [`Ks8851`] owns all of it behind a coarse bus lock and a short state lock.
//!
//! # Features
//!
//! - `defmt`: Enable defmt formatting and driver logging
//! - `smoltcp`: Enable smoltcp network stack integration
//!
//! # Example
//!
//! ```ignore
//! use ks8851_spi::{Ks8851, Ks8851Config, SpiDeviceBus, RxMode};
//!
//! let config = Ks8851Config::new()
//!     .with_mac_address([0x02, 0x00, 0x00, 0x12, 0x34, 0x56]);
//!
//! let eth = Ks8851::attach(SpiDeviceBus::new(spi_device), delay, config)?;
//! eth.open()?;
//! eth.set_rx_mode(RxMode::Normal);
//!
//! // in the task woken by the interrupt line
//! eth.service(&mut uplink);
//!
//! // send path, from any context
//! match eth.start_xmit(&frame)? {
//!     TxVerdict::Accepted => {}
//!     TxVerdict::Busy => { /* wait for Uplink::wake_tx */ }
//! }
//! ```
//!
//! # Memory Requirements
//!
//! Receive and transmit scratch buffers are allocated per pass, so a global
//! allocator is required. A receive pass needs at most 12 KiB, a transmit
//! batch at most 12 KiB. Queued transmit frames are copied.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in Cargo.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

extern crate alloc;

// =============================================================================
// Modules
// =============================================================================

pub mod driver;
pub mod hal;
pub mod phy;
pub mod sync;

// Internal implementation details (pub(crate) only)
mod internal;

#[cfg(feature = "smoltcp")]
#[cfg_attr(docsrs, doc(cfg(feature = "smoltcp")))]
pub mod integration;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::chip::{SelfTest, Stats};
pub use driver::config::{Ks8851Config, State};
pub use driver::device::{Ks8851, Timestamp, Uplink};
pub use driver::error::{
    BufferError, BufferResult, ConfigError, ConfigResult, Error, IoError, IoResult, Result,
};
pub use driver::filtering::{RxFilter, RxMode};
pub use driver::interrupt::InterruptStatus;
pub use driver::tx::TxVerdict;

pub use hal::reset::PowerMode;
pub use hal::spi::{SpiBus, SpiDeviceBus};

// Re-export PHY types
pub use phy::{Duplex, LinkState, LinkStatus, Speed};

#[cfg(feature = "smoltcp")]
#[cfg_attr(docsrs, doc(cfg(feature = "smoltcp")))]
pub use integration::smoltcp::{SmoltcpPort, ethernet_address};

/// Low-level register map for advanced use.
///
/// Most users should prefer the driver APIs; writing registers directly
/// bypasses the shadow copies the driver keeps.
pub mod registers {
    pub use crate::internal::register::*;
}

/// Shared driver constants.
///
/// These are grouped into a dedicated module to keep the top-level facade
/// focused on driver types and integration points.
pub mod constants {
    pub use crate::internal::constants::{
        // Frame/buffer sizes
        CRC_SIZE,
        // Receive coalescing and flow control
        DEFAULT_FLOW_HIGH_WATER,
        DEFAULT_FLOW_LOW_WATER,
        DEFAULT_RX_BYTE_THRESHOLD,
        DEFAULT_RX_DURATION_US,
        DEFAULT_RX_FRAME_THRESHOLD,
        ETH_HEADER_SIZE,
        FRAME_HEADER_SIZE,
        // Transmit budget
        KSZ8851_TX_SPACE,
        MAC_ADDR_LEN,
        MAX_FRAME_SIZE,
        MAX_RXFIFO_SIZE,
        MTU,
        TX_BATCH_BUFFER,
        TX_BATCH_CAP,
        TX_HEADER_SIZE,
    };
}
