//! Interrupt status handling for the KS8851.
//!
//! [`InterruptStatus`] parses the `ISR` bits. [`Chip::decode_interrupt`] is
//! the bus-locked half of the dispatcher: it reads `ISR` once, handles each
//! set bit in a fixed order, acknowledges the handled set with one write and
//! returns a [`Dispatch`] describing the follow-up work. Scheduling that work
//! and notifying the network stack happen after the bus lock is released.

use embedded_hal::delay::DelayNs;

use super::chip::Chip;
use crate::hal::spi::SpiBus;
use crate::internal::register::{ISR, PMECR, irq, pmecr};

// =============================================================================
// Interrupt Status
// =============================================================================

/// Interrupt status flags parsed from `ISR`.
///
/// # Example
///
/// ```ignore
/// let status = device.handle_interrupt(&mut uplink);
/// if status.rx_done {
///     device.run_receive_queue(&mut uplink);
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptStatus {
    /// Link state changed
    pub link_change: bool,
    /// A frame flagged with `TXIC` was transmitted
    pub tx_done: bool,
    /// Receive coalescing threshold reached
    pub rx_done: bool,
    /// Receive queue overrun
    pub rx_overrun: bool,
    /// Transmit process stopped
    pub tx_stopped: bool,
    /// Receive process stopped
    pub rx_stopped: bool,
    /// Requested transmit space available
    pub tx_space_available: bool,
    /// Wake-up frame detected
    pub wake_frame: bool,
    /// Magic packet detected
    pub magic_packet: bool,
    /// Link-up wake event
    pub link_wake: bool,
    /// Energy detected
    pub energy_detect: bool,
    /// SPI bus error
    pub spi_bus_error: bool,
    /// Delayed energy detected
    pub delayed_energy: bool,
}

impl InterruptStatus {
    /// Create from a raw `ISR` value
    #[inline]
    pub const fn from_raw(status: u16) -> Self {
        Self {
            link_change: (status & irq::LCI) != 0,
            tx_done: (status & irq::TXI) != 0,
            rx_done: (status & irq::RXI) != 0,
            rx_overrun: (status & irq::RXOI) != 0,
            tx_stopped: (status & irq::TXPSI) != 0,
            rx_stopped: (status & irq::RXPSI) != 0,
            tx_space_available: (status & irq::TXSAI) != 0,
            wake_frame: (status & irq::RXWFDI) != 0,
            magic_packet: (status & irq::RXMPDI) != 0,
            link_wake: (status & irq::LDI) != 0,
            energy_detect: (status & irq::EDI) != 0,
            spi_bus_error: (status & irq::SPIBEI) != 0,
            delayed_energy: (status & irq::DEDI) != 0,
        }
    }

    /// Convert to a raw value for acknowledging (write-1-to-clear)
    #[inline]
    pub const fn to_raw(&self) -> u16 {
        let flags = [
            (self.link_change, irq::LCI),
            (self.tx_done, irq::TXI),
            (self.rx_done, irq::RXI),
            (self.rx_overrun, irq::RXOI),
            (self.tx_stopped, irq::TXPSI),
            (self.rx_stopped, irq::RXPSI),
            (self.tx_space_available, irq::TXSAI),
            (self.wake_frame, irq::RXWFDI),
            (self.magic_packet, irq::RXMPDI),
            (self.link_wake, irq::LDI),
            (self.energy_detect, irq::EDI),
            (self.spi_bus_error, irq::SPIBEI),
            (self.delayed_energy, irq::DEDI),
        ];
        let mut val = 0u16;
        let mut i = 0;
        while i < flags.len() {
            if flags[i].0 {
                val |= flags[i].1;
            }
            i += 1;
        }
        val
    }

    /// Check if any interrupt is pending
    #[inline]
    pub const fn any(&self) -> bool {
        self.to_raw() != 0
    }

    /// Check if any error occurred
    #[inline]
    pub const fn has_error(&self) -> bool {
        self.rx_overrun || self.spi_bus_error
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Follow-up work decided while the bus lock was held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dispatch {
    /// Status read at entry
    pub status: InterruptStatus,
    /// Bits written back to `ISR`
    pub handled: u16,
    /// Free transmit space read on transmit-done
    pub tx_space: Option<u16>,
    /// Receive work should run
    pub rx_ready: bool,
    /// The receiver stopped; a pending filter can be written
    pub rx_stopped: bool,
    /// Link state must be re-evaluated
    pub link_changed: bool,
}

impl<B: SpiBus, D: DelayNs> Chip<B, D> {
    /// Read, handle and acknowledge the pending interrupts
    ///
    /// A failed `ISR` read reads as zero, so nothing is handled that cycle.
    pub fn decode_interrupt(&mut self) -> Dispatch {
        let status = InterruptStatus::from_raw(self.regs.read32(ISR));
        let mut dispatch = Dispatch {
            status,
            ..Dispatch::default()
        };
        let mut handled = 0u16;

        if status.link_change {
            handled |= irq::LCI;
            dispatch.link_changed = true;
        }

        if status.link_wake {
            handled |= irq::LDI;
            let value = self.regs.read32(PMECR) & !pmecr::WKEVT_MASK;
            self.regs.write16(PMECR, value | pmecr::WKEVT_LINK);
        }

        if status.rx_stopped {
            handled |= irq::RXPSI;
            dispatch.rx_stopped = true;
        }

        if status.tx_done {
            handled |= irq::TXI;
            dispatch.tx_space = Some(self.read_tx_space());
        }

        if status.rx_done {
            handled |= irq::RXI;
            dispatch.rx_ready = true;
        }

        if status.spi_bus_error {
            handled |= irq::SPIBEI;
            #[cfg(feature = "defmt")]
            defmt::error!("SPI bus error reported by chip");
        }

        if status.rx_overrun {
            handled |= irq::RXOI;
            self.stats.rx_overruns = self.stats.rx_overruns.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("rx: queue overrun");
        }

        if status.tx_stopped {
            handled |= irq::TXPSI;
        }

        self.regs.write16(ISR, handled);
        dispatch.handled = handled;
        dispatch
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::config::Ks8851Config;
    use crate::internal::register::{TXMIR, txmir};
    use crate::testing::{MockChip, MockDelay};

    const ALL_BITS: u16 = irq::LCI
        | irq::TXI
        | irq::RXI
        | irq::RXOI
        | irq::TXPSI
        | irq::RXPSI
        | irq::TXSAI
        | irq::RXWFDI
        | irq::RXMPDI
        | irq::LDI
        | irq::EDI
        | irq::SPIBEI
        | irq::DEDI;

    fn chip(mock: &MockChip) -> Chip<MockChip, MockDelay> {
        Chip::new(mock.clone(), MockDelay::new(), Ks8851Config::new())
    }

    #[test]
    fn interrupt_status_from_raw_zero() {
        let status = InterruptStatus::from_raw(0);
        assert_eq!(status, InterruptStatus::default());
        assert!(!status.any());
        assert!(!status.has_error());
    }

    #[test]
    fn interrupt_status_from_raw_single_bits() {
        assert!(InterruptStatus::from_raw(irq::TXI).tx_done);
        assert!(InterruptStatus::from_raw(irq::RXI).rx_done);
        assert!(InterruptStatus::from_raw(irq::LCI).link_change);
        assert!(InterruptStatus::from_raw(irq::RXPSI).rx_stopped);
        assert!(!InterruptStatus::from_raw(irq::TXI).rx_done);
    }

    #[test]
    fn interrupt_status_to_raw_roundtrip() {
        for raw in [0, irq::TXI | irq::RXI, irq::LCI | irq::LDI, ALL_BITS] {
            assert_eq!(InterruptStatus::from_raw(raw).to_raw(), raw);
        }
    }

    #[test]
    fn interrupt_status_ignores_reserved_bits() {
        // bits 12, 10 and 7 are reserved
        let status = InterruptStatus::from_raw(0x1480);
        assert!(!status.any());
    }

    #[test]
    fn interrupt_status_errors() {
        assert!(InterruptStatus::from_raw(irq::RXOI).has_error());
        assert!(InterruptStatus::from_raw(irq::SPIBEI).has_error());
        assert!(!InterruptStatus::from_raw(irq::TXI | irq::RXI).has_error());
    }

    #[test]
    fn transmit_done_reads_free_space() {
        let mock = MockChip::ks8851();
        mock.set_reg16(TXMIR, 0xE000 | 4508);
        mock.raise_irq(irq::TXI);
        let mut chip = chip(&mock);

        let dispatch = chip.decode_interrupt();
        assert_eq!(dispatch.tx_space, Some(4508 & txmir::TXMA_MASK));
        assert_eq!(mock.writes_to(ISR), [irq::TXI]);
        assert_eq!(mock.reg16(ISR), 0);
    }

    #[test]
    fn every_handled_bit_acknowledged_in_one_write() {
        let mock = MockChip::ks8851();
        mock.raise_irq(irq::LCI | irq::RXI | irq::RXOI | irq::RXPSI | irq::SPIBEI | irq::TXPSI);
        let mut chip = chip(&mock);

        let dispatch = chip.decode_interrupt();
        assert!(dispatch.link_changed);
        assert!(dispatch.rx_ready);
        assert!(dispatch.rx_stopped);
        assert_eq!(dispatch.tx_space, None);
        assert_eq!(chip.stats().rx_overruns, 1);
        assert_eq!(
            mock.writes_to(ISR),
            [irq::LCI | irq::RXI | irq::RXOI | irq::RXPSI | irq::SPIBEI | irq::TXPSI]
        );
    }

    #[test]
    fn wake_only_bits_stay_pending() {
        let mock = MockChip::ks8851();
        mock.raise_irq(irq::RXI | irq::EDI);
        let mut chip = chip(&mock);

        let dispatch = chip.decode_interrupt();
        assert_eq!(dispatch.handled, irq::RXI);
        assert_eq!(mock.reg16(ISR), irq::EDI);
    }

    #[test]
    fn link_wake_rewrites_wake_events() {
        let mock = MockChip::ks8851();
        mock.set_reg16(PMECR, pmecr::WKEVT_ENERGY | pmecr::WKEVT_MAGICPKT | pmecr::PM_NORMAL);
        mock.raise_irq(irq::LDI);
        let mut chip = chip(&mock);

        chip.decode_interrupt();
        assert_eq!(mock.reg16(PMECR), pmecr::WKEVT_LINK | pmecr::PM_NORMAL);
        assert_eq!(mock.writes_to(ISR), [irq::LDI]);
    }

    #[test]
    fn status_and_wake_events_read_through_fast_path() {
        let mock = MockChip::ks8851();
        mock.set_reg16(PMECR, pmecr::WKEVT_ENERGY | pmecr::PM_NORMAL);
        mock.raise_irq(irq::LDI);
        let mut chip = chip(&mock);

        chip.decode_interrupt();
        assert_eq!(mock.fast_reads(), [ISR, PMECR]);
        assert!(mock.framed_reads().is_empty());
    }

    #[test]
    fn failed_status_read_handles_nothing() {
        let mock = MockChip::ks8851();
        mock.raise_irq(irq::TXI | irq::RXI);
        let mut chip = chip(&mock);
        mock.fail_next(1);

        let dispatch = chip.decode_interrupt();
        assert!(!dispatch.status.any());
        assert_eq!(mock.writes_to(ISR), [0]);
        assert_eq!(mock.reg16(ISR), irq::TXI | irq::RXI);
        assert_eq!(chip.stats().bus_faults, 1);
    }
}
