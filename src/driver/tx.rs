//! Transmit pipeline
//!
//! # Producer
//!
//! [`TxState::enqueue`] runs under the short state lock. A frame costs
//! `4 + align4(len)` bytes of the space budget; a frame that does not fit
//! is refused with [`TxVerdict::Busy`] and the producer is marked stopped
//! until the chip reports free space again.
//!
//! # Consumer
//!
//! [`Chip::transmit`] runs under the bus lock. It packs queued frames into
//! batches of up to [`TX_BATCH_CAP`] bytes, each frame preceded by its
//! [`TxHeader`], and writes every batch with one FIFO burst. It never gives
//! space back: only the chip's own `TXMIR` reading, taken on the
//! transmit-done interrupt, restores the budget.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;

use super::chip::Chip;
use super::error::{BufferError, IoError, Result};
use super::filtering::{RxFilter, RxMode};
use crate::hal::spi::{SPIOP_TXFIFO, SpiBus};
use crate::internal::constants::{
    FRAME_HEADER_SIZE, TX_BATCH_BUFFER, TX_BATCH_CAP, TX_HEADER_SIZE, align4,
};
use crate::internal::register::{RXQCR, rxqcr, txfr};
use crate::sync::CriticalSectionCell;

/// Space budget consumed by a frame of `len` bytes
#[inline]
pub const fn needed_bytes(len: usize) -> usize {
    FRAME_HEADER_SIZE + align4(len)
}

// =============================================================================
// Frame Header
// =============================================================================

/// Control and length words sent ahead of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxHeader {
    /// Frame id and interrupt-on-completion flag
    pub control: u16,
    /// Frame length in bytes
    pub length: u16,
}

impl TxHeader {
    /// Header for frame `fid` (taken modulo the 13-bit id field)
    pub const fn new(fid: u16, irq: bool, length: u16) -> Self {
        let mut control = fid & txfr::TXFID_MASK;
        if irq {
            control |= txfr::TXIC;
        }
        Self { control, length }
    }

    /// Frame id
    pub const fn frame_id(&self) -> u16 {
        self.control & txfr::TXFID_MASK
    }

    /// Whether completion raises an interrupt
    pub const fn raises_irq(&self) -> bool {
        self.control & txfr::TXIC != 0
    }

    /// Byte view: pad, TX FIFO opcode, control LE, length LE
    pub const fn to_bytes(&self) -> [u8; TX_HEADER_SIZE] {
        let [c0, c1] = self.control.to_le_bytes();
        let [l0, l1] = self.length.to_le_bytes();
        [0, SPIOP_TXFIFO, c0, c1, l0, l1]
    }

    /// Parse the byte view
    pub const fn from_bytes(bytes: &[u8; TX_HEADER_SIZE]) -> Self {
        Self {
            control: u16::from_le_bytes([bytes[2], bytes[3]]),
            length: u16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }

    /// 16-bit word view over the same six bytes, for 16-bit aligned transfers
    pub const fn to_words(&self) -> [u16; 3] {
        let b = self.to_bytes();
        [
            u16::from_ne_bytes([b[0], b[1]]),
            u16::from_ne_bytes([b[2], b[3]]),
            u16::from_ne_bytes([b[4], b[5]]),
        ]
    }

    /// Parse the word view
    pub const fn from_words(words: [u16; 3]) -> Self {
        let [c0, c1] = words[1].to_ne_bytes();
        let [l0, l1] = words[2].to_ne_bytes();
        Self::from_bytes(&[0, SPIOP_TXFIFO, c0, c1, l0, l1])
    }

    /// Header as the first 32-bit word of a FIFO burst
    ///
    /// Words are shifted out most significant byte first, so the
    /// little-endian control/length pair is byte swapped into place.
    pub const fn to_fifo_word(&self) -> u32 {
        (((self.length as u32) << 16) | self.control as u32).swap_bytes()
    }
}

// =============================================================================
// Producer State
// =============================================================================

/// Outcome of a transmit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxVerdict {
    /// Frame queued
    Accepted,
    /// Not enough space; stop sending until woken
    Busy,
}

/// State guarded by the fast-path lock
#[derive(Debug)]
pub struct TxState {
    pub(crate) queue: VecDeque<Vec<u8>>,
    /// Bytes the driver believes are free in the chip's TX queue
    pub(crate) tx_space: u16,
    /// Producer was refused and waits for a wake-up
    pub(crate) stopped: bool,
    /// Last requested receive filter
    pub(crate) rx_filter: RxFilter,
    /// The receiver reported itself stopped; the filter can be written
    pub(crate) filter_restart: bool,
    /// Interface is open and accepting frames
    pub(crate) open: bool,
}

impl TxState {
    /// Empty queue with `tx_space` bytes of budget
    pub const fn new(tx_space: u16) -> Self {
        Self {
            queue: VecDeque::new(),
            tx_space,
            stopped: false,
            rx_filter: RxFilter {
                mchash: [0; 4],
                rxcr1: 0,
                rxcr2: 0,
            },
            filter_restart: false,
            open: false,
        }
    }

    /// Reset for a freshly opened interface with `tx_space` bytes of budget
    ///
    /// The last requested filter survives; with none on record the base
    /// filter programmed at open is assumed. Returns whether the kept filter
    /// differs from that base filter and still has to be applied.
    pub(crate) fn reopen(&mut self, tx_space: u16) -> bool {
        self.queue.clear();
        self.tx_space = tx_space;
        self.stopped = false;
        self.filter_restart = false;
        self.open = true;

        let base = RxFilter::from_mode(RxMode::Normal);
        if !self.rx_filter.enables_receiver() {
            self.rx_filter = base;
        }
        self.rx_filter != base
    }

    /// Account for and queue a copy of `frame`
    pub fn enqueue(&mut self, frame: &[u8]) -> Result<TxVerdict> {
        if frame.is_empty() {
            return Err(IoError::InvalidLength.into());
        }
        let needed = needed_bytes(frame.len());
        if needed > self.tx_space as usize {
            self.stopped = true;
            return Ok(TxVerdict::Busy);
        }
        if needed > TX_BATCH_CAP {
            return Err(IoError::FrameTooLarge.into());
        }

        let mut copy = Vec::new();
        copy.try_reserve_exact(frame.len())
            .map_err(BufferError::from)?;
        copy.extend_from_slice(frame);
        self.queue.try_reserve(1).map_err(BufferError::from)?;

        self.tx_space -= needed as u16;
        self.queue.push_back(copy);
        Ok(TxVerdict::Accepted)
    }

    /// Take the chip's free space reading; returns whether the producer was stopped
    pub fn restore_space(&mut self, space: u16) -> bool {
        self.tx_space = space;
        core::mem::take(&mut self.stopped)
    }

    /// Discard every queued frame, returning how many there were
    pub fn drain(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Budget held by frames still in the queue
    pub fn queued_bytes(&self) -> usize {
        self.queue.iter().map(|frame| needed_bytes(frame.len())).sum()
    }

    /// Current space budget
    pub fn tx_space(&self) -> u16 {
        self.tx_space
    }

    /// Frames waiting for the transmit unit
    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }
}

// =============================================================================
// Consumer
// =============================================================================

/// Outcome of one transmit unit run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxReport {
    /// FIFO bursts written
    pub batches: usize,
    /// Frames written
    pub frames: usize,
    /// Payload bytes written
    pub bytes: usize,
    /// A batch buffer allocation failed; frames stay queued
    pub out_of_memory: bool,
}

/// Append `frame` to `batch` as big-endian words, zero padded
fn push_payload(batch: &mut Vec<u32>, frame: &[u8]) {
    let mut chunks = frame.chunks_exact(4);
    for chunk in &mut chunks {
        batch.push(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut tail = [0u8; 4];
        tail[..rest.len()].copy_from_slice(rest);
        batch.push(u32::from_be_bytes(tail));
    }
}

impl<B: SpiBus, D: DelayNs> Chip<B, D> {
    fn next_fid(&mut self) -> u16 {
        let fid = self.fid & txfr::TXFID_MASK;
        self.fid = self.fid.wrapping_add(1) & txfr::TXFID_MASK;
        fid
    }

    /// Write every queued frame to the TX FIFO
    pub fn transmit(&mut self, state: &CriticalSectionCell<TxState>) -> TxReport {
        let mut report = TxReport::default();
        if state.with(|s| s.queue.is_empty()) {
            return report;
        }

        self.enqueue_tx_frames();
        self.regs.write16(RXQCR, self.rc_rxqcr | rxqcr::SDA);

        while !state.with(|s| s.queue.is_empty()) {
            let mut batch: Vec<u32> = Vec::new();
            if batch.try_reserve_exact(TX_BATCH_BUFFER / 4).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("tx: out of memory for batch buffer");
                report.out_of_memory = true;
                break;
            }

            let mut len = 0usize;
            while len < TX_BATCH_CAP {
                let Some((frame, last)) = state.with(|s| {
                    let frame = s.queue.pop_front()?;
                    Some((frame, s.queue.is_empty()))
                }) else {
                    break;
                };

                let needed = needed_bytes(frame.len());
                let irq = last || len + needed >= TX_BATCH_CAP;
                let header = TxHeader::new(self.next_fid(), irq, frame.len() as u16);

                batch.push(header.to_fifo_word());
                push_payload(&mut batch, &frame);

                len += needed;
                report.frames += 1;
                report.bytes += frame.len();
                self.stats.tx_packets = self.stats.tx_packets.wrapping_add(1);
                self.stats.tx_bytes = self.stats.tx_bytes.wrapping_add(frame.len() as u64);
            }

            self.regs.write_bulk(SPIOP_TXFIFO, &mut batch);
            report.batches += 1;
        }

        self.regs.write16(RXQCR, self.rc_rxqcr);
        report
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::config::Ks8851Config;
    use crate::internal::register::{TXQCR, txqcr};
    use crate::testing::{MockChip, MockDelay, test_frame};

    fn open_chip(mock: &MockChip) -> Chip<MockChip, MockDelay> {
        let mut chip = Chip::new(mock.clone(), MockDelay::new(), Ks8851Config::new());
        chip.start();
        mock.clear_log();
        chip
    }

    #[test]
    fn reopen_falls_back_to_base_filter() {
        let mut state = TxState::new(100);
        assert!(!state.reopen(6144));
        assert_eq!(state.rx_filter, RxFilter::from_mode(RxMode::Normal));
        assert!(state.rx_filter.enables_receiver());

        state.rx_filter = RxFilter::from_mode(RxMode::AllMulticast);
        state.filter_restart = true;
        assert!(state.reopen(6144));
        assert_eq!(state.rx_filter, RxFilter::from_mode(RxMode::AllMulticast));
        assert!(!state.filter_restart);
        assert_eq!(state.tx_space(), 6144);
    }

    #[test]
    fn needed_bytes_rounds_payload() {
        assert_eq!(needed_bytes(60), 64);
        assert_eq!(needed_bytes(1500), 1504);
        assert_eq!(needed_bytes(61), 68);
    }

    #[test]
    fn header_views_agree() {
        let header = TxHeader::new(0x0123, true, 1514);
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0x00, 0xC0, 0x23, 0x81, 0xEA, 0x05]);
        assert_eq!(TxHeader::from_bytes(&bytes), header);
        assert_eq!(TxHeader::from_words(header.to_words()), header);
        assert_eq!(header.to_fifo_word().to_be_bytes(), [0x23, 0x81, 0xEA, 0x05]);
    }

    #[test]
    fn header_frame_id_wraps_at_field_width() {
        for (id, len) in [(0u16, 60u16), (8191, 1500), (8192, 64), (12345, 9)] {
            let decoded = TxHeader::from_bytes(&TxHeader::new(id, false, len).to_bytes());
            assert_eq!(decoded.frame_id(), id % 8192);
            assert_eq!(decoded.length, len);
            assert!(!decoded.raises_irq());
        }
    }

    #[test]
    fn three_frames_fit_one_batch() {
        let mut state = TxState::new(6144);
        for len in [60, 1500, 64] {
            assert_eq!(state.enqueue(&test_frame(len, 0)), Ok(TxVerdict::Accepted));
        }
        assert_eq!(state.tx_space(), 6144 - 1636);
        assert_eq!(state.queued_bytes(), 1636);

        let mock = MockChip::ks8851();
        let mut chip = open_chip(&mock);
        let state = CriticalSectionCell::new(state);
        let report = chip.transmit(&state);

        assert_eq!(report.batches, 1);
        assert_eq!(report.frames, 3);
        assert_eq!(mock.tx_bursts().len(), 1);
        assert_eq!(mock.tx_bursts()[0].len(), 1636);
        // the budget only comes back from the chip
        assert_eq!(state.with(|s| s.tx_space()), 6144 - 1636);
    }

    #[test]
    fn oversized_request_is_refused_without_side_effects() {
        let mut state = TxState::new(6144);
        let frame = test_frame(6996, 0);
        assert_eq!(needed_bytes(frame.len()), 7000);

        assert_eq!(state.enqueue(&frame), Ok(TxVerdict::Busy));
        assert_eq!(state.tx_space(), 6144);
        assert_eq!(state.queued_frames(), 0);
        assert!(state.stopped);
    }

    #[test]
    fn frame_larger_than_a_batch_is_an_error() {
        let mut state = TxState::new(18432);
        assert_eq!(
            state.enqueue(&test_frame(6200, 0)),
            Err(IoError::FrameTooLarge.into())
        );
        assert_eq!(state.enqueue(&[]), Err(IoError::InvalidLength.into()));
        assert_eq!(state.tx_space(), 18432);
    }

    #[test]
    fn restore_space_wakes_stopped_producer() {
        let mut state = TxState::new(100);
        assert_eq!(state.enqueue(&test_frame(200, 0)), Ok(TxVerdict::Busy));
        assert!(state.restore_space(6144));
        assert!(!state.restore_space(6144));
        assert_eq!(state.enqueue(&test_frame(200, 0)), Ok(TxVerdict::Accepted));
    }

    #[test]
    fn burst_layout_header_then_padded_payload() {
        let mock = MockChip::ks8851();
        let mut chip = open_chip(&mock);
        let state = CriticalSectionCell::new(TxState::new(6144));
        state.with(|s| s.enqueue(&[1, 2, 3, 4, 5]).unwrap());

        chip.transmit(&state);

        let burst = &mock.tx_bursts()[0];
        assert_eq!(burst, &[0x00, 0x80, 0x05, 0x00, 1, 2, 3, 4, 5, 0, 0, 0]);
        assert_eq!(mock.writes_to(TXQCR), [txqcr::AETFE]);
        let base = chip.rc_rxqcr;
        assert_eq!(mock.writes_to(RXQCR), [base | rxqcr::SDA, base]);
    }

    #[test]
    fn batches_split_at_cap_and_flag_interrupts() {
        let mock = MockChip::ks8851();
        let mut chip = open_chip(&mock);
        let state = CriticalSectionCell::new(TxState::new(18432));
        // 1504 bytes each: the fifth frame starts below the cap and crosses it
        for seed in 0..6 {
            state.with(|s| s.enqueue(&test_frame(1500, seed)).unwrap());
        }

        let report = chip.transmit(&state);
        assert_eq!(report.batches, 2);
        assert_eq!(report.frames, 6);

        let bursts = mock.tx_bursts();
        assert_eq!(bursts[0].len(), 5 * 1504);
        assert_eq!(bursts[1].len(), 1504);

        let headers: Vec<TxHeader> = bursts
            .iter()
            .flat_map(|burst| burst.chunks(1504))
            .map(|frame| TxHeader::from_bytes(&[0, 0xC0, frame[0], frame[1], frame[2], frame[3]]))
            .collect();
        let ids: Vec<u16> = headers.iter().map(TxHeader::frame_id).collect();
        assert_eq!(ids, [0, 1, 2, 3, 4, 5]);
        let irqs: Vec<bool> = headers.iter().map(TxHeader::raises_irq).collect();
        // fifth frame fills the first batch (4 * 1504 + 1504 >= 6144), sixth ends the queue
        assert_eq!(irqs, [false, false, false, false, true, true]);
    }

    #[test]
    fn empty_queue_skips_the_bus() {
        let mock = MockChip::ks8851();
        let mut chip = open_chip(&mock);
        let state = CriticalSectionCell::new(TxState::new(6144));

        assert_eq!(chip.transmit(&state), TxReport::default());
        assert!(mock.write_log().is_empty());
    }

    #[test]
    fn drain_discards_queue() {
        let mut state = TxState::new(6144);
        state.enqueue(&test_frame(60, 0)).unwrap();
        state.enqueue(&test_frame(60, 1)).unwrap();
        assert_eq!(state.drain(), 2);
        assert_eq!(state.queued_frames(), 0);
    }
}
