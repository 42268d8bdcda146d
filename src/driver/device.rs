//! KS8851 device
//!
//! [`Ks8851`] ties the pieces together behind two locks:
//!
//! - the **bus lock**, a `spin::Mutex` around [`Chip`], held for every
//!   register access and for the whole body of each deferred unit, so at
//!   most one FIFO transfer is ever in flight
//! - the **state lock**, a [`CriticalSectionCell`] around [`TxState`], held
//!   only for a few instructions by the transmit path and the dispatcher
//!
//! The bus lock is always taken first. The state lock never spans a bus
//! exchange, so [`Ks8851::start_xmit`] never waits behind a FIFO burst.
//!
//! # Interrupt Flow
//!
//! ```text
//!   IRQ line ──► task ──► handle_interrupt ──► decode ISR, ack, update tx_space
//!                      │
//!                      ├── posts Work::Rx      ──► run_receive_queue
//!                      ├── posts Work::RxCtrl  ──► run_transmit_queue
//!                      └── wake_tx / link_changed (bus lock released)
//! ```
//!
//! Every method except [`Ks8851::start_xmit`] and the state queries may
//! spin on the bus lock. Call them from a task or thread that the IRQ
//! wakes, never from the interrupt handler itself.
//!
//! # Example
//!
//! ```ignore
//! let config = Ks8851Config::new().with_mac_address([0x02, 0, 0, 0x12, 0x34, 0x56]);
//! let eth = Ks8851::attach(SpiDeviceBus::new(spi), delay, config)?;
//! eth.open()?;
//!
//! // in the task woken by the IRQ line
//! eth.service(&mut uplink);
//! ```

use embedded_hal::delay::DelayNs;

use super::chip::{Chip, SelfTest, Stats};
use super::config::Ks8851Config;
use super::error::{ConfigError, Error, IoError, Result};
use super::filtering::{RxFilter, RxMode};
use super::interrupt::InterruptStatus;
use super::rx::RxReport;
use super::tx::{TxReport, TxState, TxVerdict};
use crate::hal::reset::PowerMode;
use crate::hal::spi::SpiBus;
use crate::internal::constants::MAC_ADDR_LEN;
use crate::phy::LinkState;
use crate::sync::{CriticalSectionCell, Queue, Work, WorkQueue};

// =============================================================================
// Upward Interface
// =============================================================================

/// Monotonic time in microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp(u64);

impl Timestamp {
    /// Time zero
    pub const ZERO: Self = Self(0);

    /// From microseconds
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// From milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1000)
    }

    /// As microseconds
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// As milliseconds
    pub const fn as_millis(self) -> u64 {
        self.0 / 1000
    }
}

/// Network stack side of the driver
///
/// Only [`Uplink::receive`] is required.
pub trait Uplink {
    /// Hand a received frame (FCS stripped) to the stack
    fn receive(&mut self, frame: &[u8], timestamp: Timestamp);

    /// The chip reported free transmit space; a paused producer may resume
    fn wake_tx(&mut self) {}

    /// Link state changed
    fn link_changed(&mut self, _link: LinkState) {}

    /// Current time, stamped on received frames
    fn now(&self) -> Timestamp {
        Timestamp::ZERO
    }
}

// =============================================================================
// Device
// =============================================================================

/// KS8851 Ethernet controller on an SPI bus
pub struct Ks8851<B, D: DelayNs> {
    chip: spin::Mutex<Chip<B, D>>,
    state: CriticalSectionCell<TxState>,
    work: WorkQueue,
    config: Ks8851Config,
    revision: u8,
}

impl<B: SpiBus, D: DelayNs> core::fmt::Debug for Ks8851<B, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ks8851")
            .field("revision", &self.revision)
            .field("config", &self.config)
            .field("work", &self.work)
            .finish_non_exhaustive()
    }
}

impl<B: SpiBus, D: DelayNs> Ks8851<B, D> {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Reset and identify the chip, then pick its station address
    ///
    /// The chip is left in soft power-down until [`Ks8851::open`].
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidConfig` / `InvalidMacAddress` - bad `config`
    /// - `ConfigError::DeviceNotFound` - the identity poll gave up
    /// - `ConfigError::InvalidMacAddress` - no EEPROM address and no fallback
    pub fn attach(bus: B, delay: D, config: Ks8851Config) -> Result<Self> {
        config.validate()?;

        let mut chip = Chip::new(bus, delay, config);
        let revision = chip.probe()?;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "KS8851 rev {} attached, MAC {:02x}",
            revision,
            chip.mac_address()
        );

        Ok(Self {
            chip: spin::Mutex::new(chip),
            state: CriticalSectionCell::new(TxState::new(config.tx_space)),
            work: WorkQueue::new(),
            config,
            revision,
        })
    }

    /// Bring the interface up
    ///
    /// # Errors
    ///
    /// `IoError::InvalidState` if already open.
    pub fn open(&self) -> Result<()> {
        let mut chip = self.chip.lock();
        if chip.is_running() {
            return Err(IoError::InvalidState.into());
        }
        chip.start();
        self.work.take(Work::RxCtrl);
        if self.state.with(|s| s.reopen(self.config.tx_space)) {
            self.work.schedule(Work::RxCtrl);
        }
        Ok(())
    }

    /// Take the interface down
    ///
    /// Interrupts are masked first, then pending transmit and filter work is
    /// flushed, then TX and RX are disabled and the chip powered down. Frames
    /// still queued after that are discarded; their count is returned.
    pub fn stop(&self) -> usize {
        #[cfg(feature = "defmt")]
        defmt::info!("shutting down");

        self.state.with(|s| s.open = false);
        self.chip.lock().disable_interrupts();

        self.run_transmit_queue();
        self.work.take(Work::Rx);

        let mut chip = self.chip.lock();
        chip.shutdown();
        let dropped = self.state.with(TxState::drain);
        chip.stats.tx_dropped = chip.stats.tx_dropped.wrapping_add(dropped as u32);
        dropped
    }

    /// Whether the interface is open
    pub fn is_open(&self) -> bool {
        self.chip.lock().is_running()
    }

    /// Chip revision read at attach
    pub fn revision(&self) -> u8 {
        self.revision
    }

    /// Configuration the device was attached with
    pub fn config(&self) -> &Ks8851Config {
        &self.config
    }

    /// Return the bus and delay provider
    pub fn release(self) -> (B, D) {
        self.chip.into_inner().release()
    }

    // =========================================================================
    // Addressing
    // =========================================================================

    /// Station address in use
    pub fn mac_address(&self) -> [u8; MAC_ADDR_LEN] {
        self.chip.lock().mac_address()
    }

    /// Change the station address
    ///
    /// # Errors
    ///
    /// - `ConfigError::AlreadyOpen` while the interface is open
    /// - `ConfigError::InvalidMacAddress` for zero or multicast addresses
    pub fn set_mac_address(&self, addr: [u8; MAC_ADDR_LEN]) -> Result<()> {
        let mut chip = self.chip.lock();
        if chip.is_running() {
            return Err(ConfigError::AlreadyOpen.into());
        }
        if !super::config::is_valid_mac_address(&addr) {
            return Err(ConfigError::InvalidMacAddress.into());
        }
        chip.write_mac_address(&addr);
        Ok(())
    }

    /// Request a receive filter
    ///
    /// Returns whether the filter differs from the last request; only then is
    /// the filter unit scheduled.
    pub fn set_rx_mode(&self, mode: RxMode<'_>) -> bool {
        let filter = RxFilter::from_mode(mode);
        let changed = self.state.with(|s| {
            if s.rx_filter == filter {
                return false;
            }
            s.rx_filter = filter;
            true
        });
        if changed {
            self.work.schedule(Work::RxCtrl);
        }
        changed
    }

    // =========================================================================
    // Transmit
    // =========================================================================

    /// Queue `frame` for transmission
    ///
    /// Never touches the bus. The transmit unit is scheduled whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// - `IoError::InvalidState` when the interface is not open
    /// - `IoError::InvalidLength` for an empty frame
    /// - `IoError::FrameTooLarge` when the frame cannot fit one batch
    /// - `BufferError::OutOfMemory` when the copy cannot be allocated
    pub fn start_xmit(&self, frame: &[u8]) -> Result<TxVerdict> {
        let verdict = self.state.with(|s| {
            if !s.open {
                return Err(Error::from(IoError::InvalidState));
            }
            s.enqueue(frame)
        });
        self.work.schedule(Work::Tx);

        #[cfg(feature = "defmt")]
        if verdict == Ok(TxVerdict::Busy) {
            defmt::debug!("tx: busy, {} bytes", frame.len());
        }
        verdict
    }

    /// Bytes of transmit budget left
    pub fn tx_space(&self) -> u16 {
        self.state.with(|s| s.tx_space())
    }

    /// Whether a producer was refused and waits for [`Uplink::wake_tx`]
    pub fn is_tx_stopped(&self) -> bool {
        self.state.with(|s| s.stopped)
    }

    /// Frames waiting for the transmit unit
    pub fn queued_frames(&self) -> usize {
        self.state.with(|s| s.queued_frames())
    }

    /// Budget held by frames waiting for the transmit unit
    pub fn queued_bytes(&self) -> usize {
        self.state.with(|s| s.queued_bytes())
    }

    // =========================================================================
    // Interrupts and Deferred Work
    // =========================================================================

    /// Service the interrupt line
    ///
    /// Reads and acknowledges `ISR` under the bus lock and posts the
    /// follow-up work. Upward notifications run after the lock is dropped.
    /// Runs in task context; the bus lock is a spin lock.
    pub fn handle_interrupt<U: Uplink>(&self, uplink: &mut U) -> InterruptStatus {
        let dispatch = {
            let mut chip = self.chip.lock();
            let dispatch = chip.decode_interrupt();
            if dispatch.rx_stopped {
                self.state.with(|s| s.filter_restart = true);
            }
            if let Some(space) = dispatch.tx_space {
                self.state.with(|s| s.restore_space(space));
            }
            dispatch
        };

        if dispatch.rx_stopped {
            self.work.schedule(Work::RxCtrl);
        }
        if dispatch.rx_ready {
            self.work.schedule(Work::Rx);
        }
        if dispatch.tx_space.is_some() {
            uplink.wake_tx();
        }
        if dispatch.link_changed {
            let link = self.chip.lock().update_link();
            if let Some(link) = link {
                #[cfg(feature = "defmt")]
                defmt::info!("link {}", link);
                uplink.link_changed(link);
            }
        }
        dispatch.status
    }

    /// Run pending receive work
    pub fn run_receive_queue<U: Uplink>(&self, uplink: &mut U) -> Option<RxReport> {
        if !self.work.take(Work::Rx) {
            return None;
        }
        Some(self.chip.lock().receive(uplink))
    }

    /// Run pending transmit and filter work
    ///
    /// Returns the transmit report when the transmit unit ran.
    pub fn run_transmit_queue(&self) -> Option<TxReport> {
        let report = if self.work.take(Work::Tx) {
            Some(self.chip.lock().transmit(&self.state))
        } else {
            None
        };
        if self.work.take(Work::RxCtrl) {
            self.run_rx_control();
        }
        report
    }

    /// Quiesce the receiver, or write the filter once it has stopped
    ///
    /// Does nothing while closed; [`Ks8851::open`] reschedules a pending
    /// request.
    fn run_rx_control(&self) {
        let mut chip = self.chip.lock();
        let step = self.state.with(|s| {
            if !s.open {
                s.filter_restart = false;
                return None;
            }
            Some(core::mem::take(&mut s.filter_restart).then_some(s.rx_filter))
        });
        match step {
            None => {}
            Some(Some(filter)) if filter.enables_receiver() => chip.write_rx_filter(&filter),
            Some(Some(_)) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("rx filter without RXE, restoring base filter");
                chip.write_rx_filter(&RxFilter::from_mode(RxMode::Normal));
            }
            Some(None) => chip.quiesce_receiver(),
        }
    }

    /// Run everything pending on both queues
    pub fn run_pending<U: Uplink>(&self, uplink: &mut U) {
        self.run_receive_queue(uplink);
        self.run_transmit_queue();
    }

    /// Handle the interrupt, then run the work it posted
    pub fn service<U: Uplink>(&self, uplink: &mut U) -> InterruptStatus {
        let status = self.handle_interrupt(uplink);
        self.run_pending(uplink);
        status
    }

    /// Whether `work` is waiting to run
    pub fn is_pending(&self, work: Work) -> bool {
        self.work.is_pending(work)
    }

    /// Whether anything is waiting on `queue`
    pub fn has_pending(&self, queue: Queue) -> bool {
        self.work.has_pending(queue)
    }

    // =========================================================================
    // Status and Diagnostics
    // =========================================================================

    /// Interface counters
    pub fn stats(&self) -> Stats {
        self.chip.lock().stats()
    }

    /// Last link state reported upward
    pub fn link_state(&self) -> LinkState {
        self.chip.lock().link()
    }

    /// Read MII register `reg` from the PHY mirror
    pub fn phy_read(&self, reg: u8) -> u16 {
        self.chip.lock().phy_read(reg)
    }

    /// Write MII register `reg` through the PHY mirror
    pub fn phy_write(&self, reg: u8, value: u16) {
        self.chip.lock().phy_write(reg, value);
    }

    /// Packet memory self-test result
    pub fn self_test(&self) -> SelfTest {
        self.chip.lock().self_test()
    }

    /// Current power mode
    pub fn power_mode(&self) -> PowerMode {
        self.chip.lock().power_mode()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
