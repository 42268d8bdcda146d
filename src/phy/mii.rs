//! MII register mirror
//!
//! Only the first six Clause 22 registers exist on the KS8851. Reads of any
//! other register return zero and writes are dropped.

use crate::internal::register::{P1ANAR, P1ANLPR, P1MBCR, P1MBSR, PHY1IHR, PHY1ILR};

/// IEEE 802.3 Clause 22 register numbers
pub mod phy_reg {
    /// Basic Mode Control Register
    pub const BMCR: u8 = 0;
    /// Basic Mode Status Register
    pub const BMSR: u8 = 1;
    /// PHY Identifier 1
    pub const PHYIDR1: u8 = 2;
    /// PHY Identifier 2
    pub const PHYIDR2: u8 = 3;
    /// Auto-Negotiation Advertisement Register
    pub const ANAR: u8 = 4;
    /// Auto-Negotiation Link Partner Ability Register
    pub const ANLPAR: u8 = 5;
}

/// BMCR (Basic Mode Control Register) bits
pub mod bmcr {
    /// Soft reset
    pub const RESET: u16 = 1 << 15;
    /// Loopback mode
    pub const LOOPBACK: u16 = 1 << 14;
    /// Speed select (100 Mbps if set)
    pub const SPEED_100: u16 = 1 << 13;
    /// Auto-negotiation enable
    pub const AN_ENABLE: u16 = 1 << 12;
    /// Power down
    pub const POWER_DOWN: u16 = 1 << 11;
    /// Restart auto-negotiation
    pub const AN_RESTART: u16 = 1 << 9;
    /// Full duplex
    pub const DUPLEX_FULL: u16 = 1 << 8;
}

/// BMSR (Basic Mode Status Register) bits
pub mod bmsr {
    /// 100BASE-TX full duplex capable
    pub const TX_FD_CAPABLE: u16 = 1 << 14;
    /// 100BASE-TX half duplex capable
    pub const TX_HD_CAPABLE: u16 = 1 << 13;
    /// Auto-negotiation complete
    pub const AN_COMPLETE: u16 = 1 << 5;
    /// Auto-negotiation ability
    pub const AN_ABILITY: u16 = 1 << 3;
    /// Link status
    pub const LINK_STATUS: u16 = 1 << 2;
}

/// Chip register mirroring MII register `reg`
pub const fn mii_register(reg: u8) -> Option<u8> {
    match reg {
        phy_reg::BMCR => Some(P1MBCR),
        phy_reg::BMSR => Some(P1MBSR),
        phy_reg::PHYIDR1 => Some(PHY1ILR),
        phy_reg::PHYIDR2 => Some(PHY1IHR),
        phy_reg::ANAR => Some(P1ANAR),
        phy_reg::ANLPAR => Some(P1ANLPR),
        _ => None,
    }
}
