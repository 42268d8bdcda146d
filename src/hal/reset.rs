//! Reset and power controller
//!
//! Soft resets pulse a scope mask in `GRR`: set, hold, clear, hold. The
//! global scope resets the whole chip; the queue manager scope only flushes
//! the TX and RX queues.
//!
//! Power mode changes are a read-modify-write of the `PMECR` mode field.

use embedded_hal::delay::DelayNs;

use super::spi::{RegisterBus, SpiBus};
use crate::internal::constants::SOFT_RESET_HOLD_MS;
use crate::internal::register::{GRR, PMECR, grr, pmecr};

// =============================================================================
// Reset Scope
// =============================================================================

/// Blocks affected by a soft reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetScope {
    /// Whole chip, register contents included
    Global,
    /// Transmit and receive queue manager only
    QueueManager,
}

impl ResetScope {
    /// `GRR` bits for this scope
    pub const fn bits(self) -> u16 {
        match self {
            ResetScope::Global => grr::GSR,
            ResetScope::QueueManager => grr::QMU,
        }
    }
}

// =============================================================================
// Power Mode
// =============================================================================

/// Chip power management mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    /// Fully operational
    #[default]
    Normal,
    /// Wake on cable energy
    EnergyDetect,
    /// Everything but the host interface powered down
    SoftPowerDown,
    /// PHY power saving
    PowerSave,
}

impl PowerMode {
    /// `PMECR` mode field value
    pub const fn bits(self) -> u16 {
        match self {
            PowerMode::Normal => pmecr::PM_NORMAL,
            PowerMode::EnergyDetect => pmecr::PM_ENERGY,
            PowerMode::SoftPowerDown => pmecr::PM_SOFTDOWN,
            PowerMode::PowerSave => pmecr::PM_POWERSAVE,
        }
    }

    /// Decode the mode field of a `PMECR` value
    pub const fn from_pmecr(value: u16) -> Self {
        match value & pmecr::PM_MASK {
            pmecr::PM_NORMAL => PowerMode::Normal,
            pmecr::PM_ENERGY => PowerMode::EnergyDetect,
            pmecr::PM_SOFTDOWN => PowerMode::SoftPowerDown,
            _ => PowerMode::PowerSave,
        }
    }
}

/// Current power mode
pub fn power_mode<B: SpiBus>(regs: &mut RegisterBus<B>) -> PowerMode {
    PowerMode::from_pmecr(regs.read32(PMECR))
}

/// Switch the chip to `mode`, leaving the wake-up event bits untouched
pub fn set_power_mode<B: SpiBus>(regs: &mut RegisterBus<B>, mode: PowerMode) {
    #[cfg(feature = "defmt")]
    defmt::debug!("power mode -> {}", mode);

    let value = regs.read32(PMECR);
    regs.write16(PMECR, (value & !pmecr::PM_MASK) | mode.bits());
}

// =============================================================================
// Reset Controller
// =============================================================================

/// Reset controller for the KS8851
///
/// Owns the delay provider used for reset hold times and for the chip
/// identity poll during attach.
#[derive(Debug)]
pub struct ResetController<D: DelayNs> {
    /// Delay provider
    delay: D,
    /// Hold time on each edge of the reset pulse
    hold_ms: u32,
}

impl<D: DelayNs> ResetController<D> {
    /// Create a new reset controller
    pub fn new(delay: D) -> Self {
        Self {
            delay,
            hold_ms: SOFT_RESET_HOLD_MS,
        }
    }

    /// Create a new reset controller with a custom hold time
    pub fn with_hold_ms(delay: D, hold_ms: u32) -> Self {
        Self { delay, hold_ms }
    }

    /// Pulse a soft reset of `scope`
    pub fn soft_reset<B: SpiBus>(&mut self, regs: &mut RegisterBus<B>, scope: ResetScope) {
        regs.write16(GRR, scope.bits());
        self.delay.delay_ms(self.hold_ms);
        regs.write16(GRR, 0);
        self.delay.delay_ms(self.hold_ms);
    }

    /// Wait `ms` milliseconds
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Get the current hold time
    pub fn hold_ms(&self) -> u32 {
        self.hold_ms
    }

    /// Return the delay provider
    pub fn release(self) -> D {
        self.delay
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
