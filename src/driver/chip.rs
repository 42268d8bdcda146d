//! Register access protocol
//!
//! [`Chip`] is everything that lives behind the bus lock: the register bus,
//! the delay provider, shadow copies of the registers the driver rewrites
//! often, and the counters updated from the receive and interrupt paths.
//!
//! The receive pipeline, transmit batcher and interrupt decode extend
//! `Chip` from their own modules.

use embedded_hal::delay::DelayNs;

use super::config::{Ks8851Config, State, is_valid_mac_address};
use super::error::{ConfigError, ConfigResult};
use crate::hal::reset::{PowerMode, ResetController, ResetScope, power_mode, set_power_mode};
use crate::hal::spi::{BusStats, RegisterBus, SpiBus};
use crate::internal::constants::MAC_ADDR_LEN;
use crate::internal::register::{
    CCR, CIDER, FCHWR, FCLWR, IER, ISR, MBIR, P1MBSR, P1SR, RXCR1, RXCR2, RXDBCTR,
    RXDTTR, RXFCTR, RXFDPR, RXQCR, TXCR, TXFDPR, TXMIR, TXQCR, ccr, cider, fdpr, irq, mar, mbir,
    rxcr1, rxcr2, rxqcr, txcr, txmir, txqcr,
};
use crate::phy::{LinkState, mii_register};

/// Interrupts enabled while the interface is open
pub const STD_IRQ: u16 = irq::LCI | irq::TXI | irq::RXI | irq::SPIBEI | irq::TXPSI | irq::RXPSI;

// =============================================================================
// Statistics
// =============================================================================

/// Interface counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Frames delivered upward
    pub rx_packets: u32,
    /// Bytes delivered upward
    pub rx_bytes: u64,
    /// Receive attempts abandoned for lack of memory
    pub rx_dropped: u32,
    /// Receive overrun interrupts
    pub rx_overruns: u32,
    /// Frames written to the TX FIFO
    pub tx_packets: u32,
    /// Payload bytes written to the TX FIFO
    pub tx_bytes: u64,
    /// Frames discarded at teardown or for lack of memory
    pub tx_dropped: u32,
    /// Failed bus exchanges
    pub bus_faults: u32,
}

/// Result of the packet memory built-in self-test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SelfTest {
    /// Both memory tests ran to completion
    pub finished: bool,
    /// TX memory failed
    pub tx_failed: bool,
    /// RX memory failed
    pub rx_failed: bool,
}

impl SelfTest {
    /// Decode an `MBIR` value
    pub const fn from_mbir(value: u16) -> Self {
        let done = mbir::TXMBF | mbir::RXMBF;
        Self {
            finished: value & done == done,
            tx_failed: value & mbir::TXMBFA != 0,
            rx_failed: value & mbir::RXMBFA != 0,
        }
    }

    /// Whether both memories passed
    pub const fn passed(&self) -> bool {
        self.finished && !self.tx_failed && !self.rx_failed
    }
}

// =============================================================================
// Chip
// =============================================================================

/// Bus-locked device state
#[derive(Debug)]
pub struct Chip<B, D: DelayNs> {
    pub(crate) regs: RegisterBus<B>,
    pub(crate) reset: ResetController<D>,
    pub(crate) config: Ks8851Config,
    /// Shadow of `IER` while open
    pub(crate) rc_ier: u16,
    /// Shadow of `RXQCR` without the one-shot bits
    pub(crate) rc_rxqcr: u16,
    /// Cached `CCR`
    pub(crate) rc_ccr: u16,
    /// Next transmit frame id
    pub(crate) fid: u16,
    pub(crate) mac: [u8; MAC_ADDR_LEN],
    pub(crate) state: State,
    pub(crate) link: LinkState,
    pub(crate) stats: Stats,
}

impl<B: SpiBus, D: DelayNs> Chip<B, D> {
    /// Wrap a bus; nothing is sent until [`Chip::probe`]
    pub fn new(bus: B, delay: D, config: Ks8851Config) -> Self {
        Self {
            regs: RegisterBus::new(bus),
            reset: ResetController::with_hold_ms(delay, config.reset_hold_ms),
            config,
            rc_ier: 0,
            rc_rxqcr: 0,
            rc_ccr: 0,
            fid: 0,
            mac: [0; MAC_ADDR_LEN],
            state: State::Initialized,
            link: LinkState::Down,
            stats: Stats::default(),
        }
    }

    /// Whether TX and RX are enabled
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    /// Counters, including bus faults
    pub fn stats(&self) -> Stats {
        let BusStats { faults, .. } = self.regs.stats();
        Stats {
            bus_faults: faults,
            ..self.stats
        }
    }

    /// Cached `CCR`
    pub fn capabilities(&self) -> u16 {
        self.rc_ccr
    }

    /// Station address in use
    pub fn mac_address(&self) -> [u8; MAC_ADDR_LEN] {
        self.mac
    }

    /// Last link state seen
    pub fn link(&self) -> LinkState {
        self.link
    }

    /// Return the bus and delay provider
    pub fn release(self) -> (B, D) {
        (self.regs.release(), self.reset.release())
    }

    // =========================================================================
    // Reset and Power
    // =========================================================================

    /// Pulse a soft reset
    pub fn soft_reset(&mut self, scope: ResetScope) {
        self.reset.soft_reset(&mut self.regs, scope);
    }

    /// Switch power mode
    pub fn set_power_mode(&mut self, mode: PowerMode) {
        set_power_mode(&mut self.regs, mode);
    }

    /// Current power mode
    pub fn power_mode(&mut self) -> PowerMode {
        power_mode(&mut self.regs)
    }

    // =========================================================================
    // Identity and Self-Test
    // =========================================================================

    /// Poll `CIDER` until the KS8851 family ID shows up
    ///
    /// Returns the chip revision.
    pub fn read_chip_id(&mut self) -> ConfigResult<u8> {
        let attempts = self.config.chip_id_attempts;
        for attempt in 0..attempts {
            let value = self.regs.read16(CIDER);
            if value & !cider::REV_MASK == cider::ID {
                let revision = ((value & cider::REV_MASK) >> cider::REV_SHIFT) as u8;
                #[cfg(feature = "defmt")]
                defmt::info!("KS8851 revision {} found", revision);
                return Ok(revision);
            }
            if attempt + 1 < attempts {
                self.reset.delay_ms(self.config.chip_id_retry_delay_ms);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::error!("chip ID not found after {} attempts", attempts);
        Err(ConfigError::DeviceNotFound)
    }

    /// Read the packet memory self-test result
    ///
    /// Failures are logged only; the chip stays usable.
    pub fn self_test(&mut self) -> SelfTest {
        let result = SelfTest::from_mbir(self.regs.read16(MBIR));

        if !result.finished {
            #[cfg(feature = "defmt")]
            defmt::warn!("memory self-test not finished");
        }
        if result.tx_failed {
            #[cfg(feature = "defmt")]
            defmt::error!("TX memory self-test failed");
        }
        if result.rx_failed {
            #[cfg(feature = "defmt")]
            defmt::error!("RX memory self-test failed");
        }
        result
    }

    // =========================================================================
    // MAC Address
    // =========================================================================

    /// Read the station address registers
    pub fn read_mac_address(&mut self) -> [u8; MAC_ADDR_LEN] {
        let mut addr = [0u8; MAC_ADDR_LEN];
        for (i, byte) in addr.iter_mut().enumerate() {
            *byte = self.regs.read8(mar(i));
        }
        addr
    }

    /// Program the station address
    ///
    /// The chip is woken for the write and put back into soft power-down
    /// unless the interface is running.
    pub fn write_mac_address(&mut self, addr: &[u8; MAC_ADDR_LEN]) {
        self.set_power_mode(PowerMode::Normal);
        for (i, byte) in addr.iter().enumerate() {
            self.regs.write8(mar(i), *byte);
        }
        self.mac = *addr;
        if !self.is_running() {
            self.set_power_mode(PowerMode::SoftPowerDown);
        }
    }

    /// Pick the station address at attach
    ///
    /// An address loaded from EEPROM wins when valid; otherwise the
    /// configured fallback is programmed.
    pub fn init_mac(&mut self) -> ConfigResult<()> {
        if self.rc_ccr & ccr::EEPROM != 0 {
            let addr = self.read_mac_address();
            if is_valid_mac_address(&addr) {
                self.mac = addr;
                self.set_power_mode(PowerMode::SoftPowerDown);
                return Ok(());
            }
            #[cfg(feature = "defmt")]
            defmt::warn!("EEPROM MAC address invalid, using fallback");
        }

        match self.config.mac_address {
            Some(addr) if is_valid_mac_address(&addr) => {
                self.write_mac_address(&addr);
                Ok(())
            }
            _ => Err(ConfigError::InvalidMacAddress),
        }
    }

    /// Reset, identify and prepare the chip
    pub fn probe(&mut self) -> ConfigResult<u8> {
        self.soft_reset(ResetScope::Global);
        let revision = self.read_chip_id()?;
        self.rc_ccr = self.regs.read16(CCR);
        self.self_test();
        self.init_mac()?;
        Ok(revision)
    }

    // =========================================================================
    // PHY Mirror
    // =========================================================================

    /// Read MII register `reg`; unmapped registers read as zero
    pub fn phy_read(&mut self, reg: u8) -> u16 {
        match mii_register(reg) {
            Some(chip_reg) => self.regs.read16(chip_reg),
            None => 0,
        }
    }

    /// Write MII register `reg`; writes to unmapped registers are dropped
    pub fn phy_write(&mut self, reg: u8, value: u16) {
        if let Some(chip_reg) = mii_register(reg) {
            self.regs.write16(chip_reg, value);
        }
    }

    /// Current link state from the PHY mirror
    pub fn read_link(&mut self) -> LinkState {
        let bmsr = self.regs.read16(P1MBSR);
        let p1sr = self.regs.read16(P1SR);
        LinkState::from_registers(bmsr, p1sr)
    }

    /// Re-read the link and return it if it changed
    pub fn update_link(&mut self) -> Option<LinkState> {
        let link = self.read_link();
        if link == self.link {
            return None;
        }
        self.link = link;
        Some(link)
    }

    // =========================================================================
    // Open / Stop
    // =========================================================================

    /// Bring TX and RX up and enable interrupts
    pub fn start(&mut self) {
        self.set_power_mode(PowerMode::Normal);
        self.soft_reset(ResetScope::QueueManager);

        self.regs
            .write16(TXCR, txcr::TXE | txcr::TXPE | txcr::TXCRC | txcr::TXFCE);
        self.regs.write16(TXFDPR, fdpr::FPAI);

        self.regs.write16(
            RXCR1,
            rxcr1::RXPAFMA | rxcr1::RXFCE | rxcr1::RXBE | rxcr1::RXUE | rxcr1::RXE,
        );
        self.regs.write16(RXCR2, rxcr2::SRDBL_FRAME);

        self.regs.write16(RXDTTR, self.config.rx_duration_timer_us);
        self.regs.write16(RXDBCTR, self.config.rx_byte_count_threshold);
        self.regs.write8(RXFCTR, self.config.rx_frame_count_threshold);

        self.rc_rxqcr = rxqcr::RXFCTE | rxqcr::RXDBCTE | rxqcr::RXDTTE;
        self.regs.write16(RXQCR, self.rc_rxqcr);

        self.regs.write16(FCLWR, self.config.flow_low_watermark);
        self.regs.write16(FCHWR, self.config.flow_high_watermark);

        self.rc_ier = STD_IRQ;
        self.regs.write16(ISR, self.rc_ier);
        self.regs.write16(IER, self.rc_ier);

        self.state = State::Running;
        self.link = LinkState::Down;

        #[cfg(feature = "defmt")]
        defmt::debug!("network device up");
    }

    /// Mask and clear every interrupt
    pub fn disable_interrupts(&mut self) {
        self.regs.write16(IER, 0);
        self.regs.write16(ISR, 0xFFFF);
    }

    /// Turn TX and RX off and power down
    pub fn shutdown(&mut self) {
        self.regs.write16(RXCR1, 0);
        self.regs.write16(TXCR, 0);
        self.set_power_mode(PowerMode::SoftPowerDown);
        self.state = State::Stopped;
        self.link = LinkState::Down;
    }

    /// Free space the chip reports in its TX queue
    pub fn read_tx_space(&mut self) -> u16 {
        self.regs.read16(TXMIR) & txmir::TXMA_MASK
    }

    /// Manual enqueue of the TX queue
    pub(crate) fn enqueue_tx_frames(&mut self) {
        self.regs.write16(TXQCR, txqcr::AETFE);
    }

    /// Point the RX read pointer at the start of the queue with auto-increment
    pub(crate) fn reset_rx_pointer(&mut self) {
        self.regs.write16(RXFDPR, fdpr::FPAI);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::register::{GRR, PMECR, grr, pmecr};
    use crate::testing::{MockChip, MockDelay};

    const MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x12, 0x34, 0x56];

    fn chip(mock: &MockChip) -> Chip<MockChip, MockDelay> {
        Chip::new(
            mock.clone(),
            MockDelay::new(),
            Ks8851Config::new().with_mac_address(MAC),
        )
    }

    #[test]
    fn std_irq_mask() {
        assert_eq!(STD_IRQ, 0xE302);
    }

    #[test]
    fn chip_id_found_on_first_read() {
        let mock = MockChip::ks8851();
        let mut chip = chip(&mock);
        assert_eq!(chip.read_chip_id(), Ok(1));
    }

    #[test]
    fn chip_id_poll_gives_up() {
        let mock = MockChip::new();
        mock.set_reg16(CIDER, 0x1234);
        let delay = MockDelay::new();
        let mut chip = Chip::new(mock, delay.clone(), Ks8851Config::new());

        assert_eq!(chip.read_chip_id(), Err(ConfigError::DeviceNotFound));
        // one delay between each pair of attempts
        assert_eq!(delay.total_ms(), 19 * 20);
    }

    #[test]
    fn soft_reset_uses_configured_hold() {
        let mock = MockChip::ks8851();
        let delay = MockDelay::new();
        let config = Ks8851Config::new().with_mac_address(MAC).with_reset_hold_ms(3);
        let mut chip = Chip::new(mock.clone(), delay.clone(), config);

        assert_eq!(chip.probe(), Ok(1));
        assert_eq!(mock.writes_to(GRR), [grr::GSR, 0]);
        assert_eq!(delay.total_ms(), 6);
    }

    #[test]
    fn chip_id_survives_transient_fault() {
        let mock = MockChip::ks8851();
        let mut chip = chip(&mock);
        mock.fail_next(3);
        assert_eq!(chip.read_chip_id(), Ok(1));
        assert_eq!(chip.stats().bus_faults, 3);
    }

    #[test]
    fn self_test_decodes_mbir() {
        assert!(SelfTest::from_mbir(mbir::TXMBF | mbir::RXMBF).passed());

        let failed = SelfTest::from_mbir(mbir::TXMBF | mbir::RXMBF | mbir::RXMBFA);
        assert!(failed.finished);
        assert!(failed.rx_failed);
        assert!(!failed.passed());

        assert!(!SelfTest::from_mbir(mbir::TXMBF).finished);
    }

    #[test]
    fn mac_address_byte_order() {
        let mock = MockChip::new();
        let mut chip = chip(&mock);

        chip.write_mac_address(&MAC);
        // MARH holds bytes 0-1, MARL bytes 4-5, each high byte first
        assert_eq!(mock.reg16(0x14), 0x0200);
        assert_eq!(mock.reg16(0x12), 0x0012);
        assert_eq!(mock.reg16(0x10), 0x3456);
        assert_eq!(chip.read_mac_address(), MAC);
        assert_eq!(mock.reg16(PMECR) & pmecr::PM_MASK, pmecr::PM_SOFTDOWN);
    }

    #[test]
    fn eeprom_address_preferred_when_valid() {
        let eeprom = [0x00, 0x10, 0xA1, 0x88, 0x51, 0x01];
        let mock = MockChip::ks8851();
        mock.set_reg16(CCR, ccr::EEPROM | ccr::SPI);
        for (i, byte) in eeprom.iter().enumerate() {
            mock.set_reg8(mar(i), *byte);
        }
        let mut chip = chip(&mock);

        assert_eq!(chip.probe(), Ok(1));
        assert_eq!(chip.mac, eeprom);
    }

    #[test]
    fn fallback_address_without_eeprom() {
        let mock = MockChip::ks8851();
        let mut chip = chip(&mock);

        chip.probe().unwrap();
        assert_eq!(chip.mac, MAC);
        assert_eq!(chip.read_mac_address(), MAC);
        assert_eq!(mock.writes_to(GRR), [grr::GSR, 0]);
    }

    #[test]
    fn probe_without_any_address_fails() {
        let mock = MockChip::ks8851();
        let mut chip = Chip::new(mock, MockDelay::new(), Ks8851Config::new());
        assert_eq!(chip.probe(), Err(ConfigError::InvalidMacAddress));
    }

    #[test]
    fn phy_mirror_maps_standard_registers() {
        let mock = MockChip::new();
        mock.set_reg16(0xE8, 0x0022);
        mock.set_reg16(0xEA, 0x1430);
        let mut chip = chip(&mock);

        assert_eq!(chip.phy_read(2), 0x0022);
        assert_eq!(chip.phy_read(3), 0x1430);
        assert_eq!(chip.phy_read(17), 0);

        chip.phy_write(0, 0x3100);
        chip.phy_write(31, 0xFFFF);
        assert_eq!(mock.reg16(0xE4), 0x3100);
        assert_eq!(mock.write_log().len(), 1);
    }

    #[test]
    fn start_programs_queues_and_interrupts() {
        let mock = MockChip::ks8851();
        let mut chip = chip(&mock);
        chip.start();

        assert!(chip.is_running());
        assert_eq!(mock.writes_to(GRR), [grr::QMU, 0]);
        assert_eq!(mock.reg16(TXCR), 0x000F);
        assert_eq!(mock.reg16(RXCR1), 0x0CA1);
        assert_eq!(mock.reg16(RXCR2), rxcr2::SRDBL_FRAME);
        assert_eq!(mock.reg16(RXDTTR), 1000);
        assert_eq!(mock.reg16(RXDBCTR), 4096);
        assert_eq!(mock.reg8(RXFCTR), 10);
        assert_eq!(mock.reg16(RXQCR), 0x00E0);
        assert_eq!(mock.reg16(FCLWR), 0x0800);
        assert_eq!(mock.reg16(FCHWR), 0x0400);
        assert_eq!(mock.reg16(IER), STD_IRQ);
        assert_eq!(mock.reg16(PMECR) & pmecr::PM_MASK, pmecr::PM_NORMAL);
    }

    #[test]
    fn shutdown_disables_and_powers_down() {
        let mock = MockChip::ks8851();
        let mut chip = chip(&mock);
        chip.start();
        chip.disable_interrupts();
        chip.shutdown();

        assert_eq!(mock.reg16(IER), 0);
        assert_eq!(mock.reg16(RXCR1), 0);
        assert_eq!(mock.reg16(TXCR), 0);
        assert_eq!(mock.reg16(PMECR) & pmecr::PM_MASK, pmecr::PM_SOFTDOWN);
        assert_eq!(chip.state, State::Stopped);
    }

    #[test]
    fn link_change_reported_once() {
        let mock = MockChip::new();
        let mut chip = chip(&mock);
        assert_eq!(chip.update_link(), None);

        mock.set_reg16(P1MBSR, crate::phy::bmsr::LINK_STATUS);
        mock.set_reg16(P1SR, crate::internal::register::p1sr::OP_100M);
        let link = chip.update_link();
        assert!(link.is_some_and(|l| l.is_up()));
        assert_eq!(chip.update_link(), None);
    }
}
