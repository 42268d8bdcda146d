//! Core driver components for the KS8851.
//!
//! - [`config`] - Configuration types and builder patterns
//! - [`error`] - Error types and result aliases
//! - [`chip`] - Register access protocol behind the bus lock
//! - [`rx`] - Receive pipeline
//! - [`tx`] - Transmit pipeline and space budget
//! - [`interrupt`] - Interrupt status decode and dispatch
//! - [`filtering`] - Receive address filtering
//! - [`device`] - The [`Ks8851`] device and its [`Uplink`]
//!
//! # Example
//!
//! ```ignore
//! use ks8851_spi::driver::{Ks8851, Ks8851Config, Error};
//!
//! let config = Ks8851Config::new()
//!     .with_mac_address([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
//! ```

// Submodules
pub mod chip;
pub mod config;
pub mod device;
pub mod error;
pub mod filtering;
pub mod interrupt;
pub mod rx;
pub mod tx;

// Re-exports for convenience
pub use chip::{SelfTest, Stats};
pub use config::{Ks8851Config, State};
pub use device::{Ks8851, Timestamp, Uplink};
pub use error::{
    BufferError, BufferResult, ConfigError, ConfigResult, Error, IoError, IoResult, Result,
};
pub use filtering::{RxFilter, RxMode};
pub use interrupt::InterruptStatus;
pub use rx::RxReport;
pub use tx::{TxReport, TxVerdict};
