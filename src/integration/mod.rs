//! External Stack Integrations
//!
//! - **smoltcp** (`smoltcp`): Integration with the smoltcp TCP/IP network stack
//!   - Implements `smoltcp::phy::Device` on [`smoltcp::SmoltcpPort`]
//!   - RX/TX token support
//!   - Requires `smoltcp` feature
//!
//! # Example
//!
//! ```ignore
//! use smoltcp::phy::Device;
//! let mut port = SmoltcpPort::new(&eth);
//! let caps = port.capabilities();
//! ```

#[cfg(feature = "smoltcp")]
pub mod smoltcp;

#[cfg(feature = "smoltcp")]
pub use smoltcp::{Ks8851RxToken, Ks8851TxToken, SmoltcpPort, ethernet_address};
