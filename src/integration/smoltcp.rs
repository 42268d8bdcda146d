//! smoltcp Network Stack Integration
#![cfg_attr(docsrs, doc(cfg(feature = "smoltcp")))]
//!
//! [`SmoltcpPort`] adapts a [`Ks8851`] to the `smoltcp::phy::Device` trait.
//! It is also the [`Uplink`] the driver delivers into: received frames are
//! buffered in the port until smoltcp asks for them, and transmit tokens
//! go straight to [`Ks8851::start_xmit`].
//!
//! # Example
//!
//! ```ignore
//! use smoltcp::iface::{Config, Interface, SocketSet};
//! use smoltcp::time::Instant;
//!
//! let eth = Ks8851::attach(SpiDeviceBus::new(spi), delay, config)?;
//! eth.open()?;
//!
//! let mut port = SmoltcpPort::new(&eth);
//! let config = Config::new(ethernet_address(&eth).into());
//! let mut iface = Interface::new(config, &mut port, Instant::ZERO);
//!
//! loop {
//!     let now = Instant::from_micros(clock.micros());
//!     port.poll(now);
//!     iface.poll(now, &mut port, &mut sockets);
//! }
//! ```
//!
//! # Features
//!
//! This module is only available when the `smoltcp` feature is enabled in Cargo.toml:
//! ```toml
//! [dependencies]
//! ks8851-spi = { version = "0.1", features = ["smoltcp"] }
//! ```

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use smoltcp::phy::{Checksum, ChecksumCapabilities, Device, DeviceCapabilities, Medium};
use smoltcp::time::Instant;

use crate::driver::device::{Ks8851, Timestamp, Uplink};
use crate::driver::interrupt::InterruptStatus;
use crate::hal::spi::SpiBus;
use crate::internal::constants::{ETH_HEADER_SIZE, MAX_FRAME_SIZE, MTU};
use crate::phy::LinkState;

/// Frames buffered between polls unless configured otherwise
pub const DEFAULT_RX_BACKLOG: usize = 16;

// =============================================================================
// RX Token
// =============================================================================

/// Receive token for smoltcp
///
/// Owns one frame taken from the port's receive backlog.
pub struct Ks8851RxToken {
    frame: Vec<u8>,
}

impl smoltcp::phy::RxToken for Ks8851RxToken {
    fn consume<R, F>(self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        f(&self.frame)
    }
}

// =============================================================================
// TX Token
// =============================================================================

/// Transmit token for smoltcp
///
/// The frame is built in a stack buffer and queued with
/// [`Ks8851::start_xmit`], which only takes the short state lock.
pub struct Ks8851TxToken<'a, B, D: DelayNs> {
    device: &'a Ks8851<B, D>,
}

impl<B: SpiBus, D: DelayNs> smoltcp::phy::TxToken for Ks8851TxToken<'_, B, D> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let len = len.min(MAX_FRAME_SIZE);
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let result = f(&mut buffer[..len]);

        // A refused frame is dropped; smoltcp retransmits at its own layer
        if let Err(_err) = self.device.start_xmit(&buffer[..len]) {
            #[cfg(feature = "defmt")]
            defmt::warn!("smoltcp tx dropped: {}", _err);
        }
        result
    }
}

// =============================================================================
// Port
// =============================================================================

/// smoltcp device backed by a KS8851
pub struct SmoltcpPort<'d, B, D: DelayNs> {
    device: &'d Ks8851<B, D>,
    backlog: VecDeque<Vec<u8>>,
    backlog_limit: usize,
    dropped: u32,
    link: LinkState,
    clock: Timestamp,
}

impl<'d, B: SpiBus, D: DelayNs> SmoltcpPort<'d, B, D> {
    /// Wrap `device` with the default receive backlog
    pub fn new(device: &'d Ks8851<B, D>) -> Self {
        Self::with_backlog(device, DEFAULT_RX_BACKLOG)
    }

    /// Wrap `device`, buffering at most `limit` received frames
    pub fn with_backlog(device: &'d Ks8851<B, D>, limit: usize) -> Self {
        Self {
            device,
            backlog: VecDeque::new(),
            backlog_limit: limit,
            dropped: 0,
            link: device.link_state(),
            clock: Timestamp::ZERO,
        }
    }

    /// Service the chip and run the deferred work it posted
    ///
    /// Call when the interrupt line fires, or periodically.
    pub fn poll(&mut self, now: Instant) -> InterruptStatus {
        self.clock = Timestamp::from_micros(now.total_micros() as u64);
        let device = self.device;
        device.service(self)
    }

    /// Frames waiting for smoltcp
    pub fn backlog(&self) -> usize {
        self.backlog.len()
    }

    /// Frames dropped because the backlog was full
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Last link state reported by the driver
    pub fn link(&self) -> LinkState {
        self.link
    }

    fn can_transmit(&self) -> bool {
        self.device.is_open() && !self.device.is_tx_stopped()
    }
}

impl<B: SpiBus, D: DelayNs> Uplink for SmoltcpPort<'_, B, D> {
    fn receive(&mut self, frame: &[u8], _timestamp: Timestamp) {
        let mut copy = Vec::new();
        if self.backlog.len() >= self.backlog_limit
            || copy.try_reserve_exact(frame.len()).is_err()
            || self.backlog.try_reserve(1).is_err()
        {
            self.dropped = self.dropped.wrapping_add(1);
            return;
        }
        copy.extend_from_slice(frame);
        self.backlog.push_back(copy);
    }

    fn link_changed(&mut self, link: LinkState) {
        self.link = link;
    }

    fn now(&self) -> Timestamp {
        self.clock
    }
}

// =============================================================================
// Device Implementation
// =============================================================================

impl<'d, B: SpiBus, D: DelayNs> Device for SmoltcpPort<'d, B, D> {
    type RxToken<'a>
        = Ks8851RxToken
    where
        Self: 'a;
    type TxToken<'a>
        = Ks8851TxToken<'d, B, D>
    where
        Self: 'a;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        let frame = self.backlog.pop_front()?;
        Some((
            Ks8851RxToken { frame },
            Ks8851TxToken {
                device: self.device,
            },
        ))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        if !self.can_transmit() {
            return None;
        }
        Some(Ks8851TxToken {
            device: self.device,
        })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.medium = Medium::Ethernet;
        caps.max_transmission_unit = MTU + ETH_HEADER_SIZE;
        caps.max_burst_size = None;

        // CRC is the only thing the chip computes
        caps.checksum = ChecksumCapabilities::default();
        caps.checksum.ipv4 = Checksum::Both;
        caps.checksum.udp = Checksum::Both;
        caps.checksum.tcp = Checksum::Both;
        caps.checksum.icmpv4 = Checksum::Both;
        caps
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get the MAC address as a smoltcp EthernetAddress
pub fn ethernet_address<B: SpiBus, D: DelayNs>(
    device: &Ks8851<B, D>,
) -> smoltcp::wire::EthernetAddress {
    smoltcp::wire::EthernetAddress(device.mac_address())
}
