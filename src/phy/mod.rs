//! Embedded PHY shim
//!
//! The KS8851 has a single internal PHY whose Clause 22 registers are
//! mirrored into the chip register space. [`mii`] maps the standard MII
//! register numbers onto those mirrors so a network stack can treat the
//! chip like any other MAC + PHY pair.
//!
//! Link state is derived from the mirrored `BMSR` (link up) and the port
//! status register (negotiated speed and duplex).

pub mod mii;

pub use mii::{bmcr, bmsr, mii_register, phy_reg};

use crate::internal::register::p1sr;

// =============================================================================
// Link Parameters
// =============================================================================

/// Link speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    /// 10 Mbps
    Mbps10,
    /// 100 Mbps
    #[default]
    Mbps100,
}

/// Duplex mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Duplex {
    /// Half duplex
    Half,
    /// Full duplex
    #[default]
    Full,
}

/// Negotiated link parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStatus {
    /// Link speed
    pub speed: Speed,
    /// Duplex mode
    pub duplex: Duplex,
}

impl LinkStatus {
    /// Create a new link status
    pub const fn new(speed: Speed, duplex: Duplex) -> Self {
        Self { speed, duplex }
    }

    /// 100 Mbps Full Duplex
    pub const fn fast_full() -> Self {
        Self::new(Speed::Mbps100, Duplex::Full)
    }

    /// Decode speed and duplex from the port status register
    pub const fn from_p1sr(value: u16) -> Self {
        let speed = if value & p1sr::OP_100M != 0 {
            Speed::Mbps100
        } else {
            Speed::Mbps10
        };
        let duplex = if value & p1sr::OP_FDX != 0 {
            Duplex::Full
        } else {
            Duplex::Half
        };
        Self::new(speed, duplex)
    }
}

// =============================================================================
// Link State
// =============================================================================

/// Carrier state reported to the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// No carrier
    #[default]
    Down,
    /// Carrier present
    Up(LinkStatus),
}

impl LinkState {
    /// Derive the link state from the mirrored `BMSR` and `P1SR`
    pub const fn from_registers(bmsr_value: u16, p1sr_value: u16) -> Self {
        if bmsr_value & bmsr::LINK_STATUS != 0 {
            LinkState::Up(LinkStatus::from_p1sr(p1sr_value))
        } else {
            LinkState::Down
        }
    }

    /// Whether the carrier is present
    pub const fn is_up(&self) -> bool {
        matches!(self, LinkState::Up(_))
    }
}
