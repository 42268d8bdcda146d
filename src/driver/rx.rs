//! Receive pipeline
//!
//! One pass drains what the chip reported at the start of the pass:
//!
//! 1. Read the frame count (`RXFC`). Nothing queued ends the pass.
//! 2. Probe every frame's byte count with one chained read of `RXFHBCR`
//!    and size a single bulk buffer from the sum.
//! 3. Rewind the read pointer, start DMA, bulk read the estimate.
//! 4. Walk the buffer frame by frame: a 4-byte envelope, then the frame
//!    padded to a 4-byte boundary.
//! 5. If a frame runs past the buffer and the estimate was not capped,
//!    fetch exactly the missing tail with one more bulk read, deliver that
//!    frame and stop.
//! 6. Release the frames and end DMA with one `RXQCR` write.
//!
//! # FIFO Layout
//!
//! ```text
//! +-------+--------+--------+----------------+-----+--------+--------+----
//! | dummy | status | count  | frame ...      | pad | status | count  | ...
//! | 4 B   | LE16   | LE16   | count - 4 + FCS|     |        |        |
//! +-------+--------+--------+----------------+-----+--------+--------+----
//! ```
//!
//! The byte count includes the 4-byte FCS, which is not delivered.

use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;

use super::chip::Chip;
use super::device::Uplink;
use super::error::{BufferError, BufferResult};
use crate::hal::spi::{SPIOP_RXFIFO, SpiBus};
use crate::internal::constants::{
    CRC_SIZE, FRAME_HEADER_SIZE, MAX_RXFIFO_SIZE, RX_DUMMY_SIZE, align4,
};
use crate::internal::register::{RXFC, RXFHBCR, RXQCR, rxfhbcr, rxqcr};

// =============================================================================
// Frame Envelope
// =============================================================================

/// Status and byte count preceding each frame in the RX FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxEnvelope {
    /// Frame status (`RXFHSR` layout)
    pub status: u16,
    /// Byte count including FCS, 12 bits
    pub count: u16,
}

impl RxEnvelope {
    /// Decode the four envelope bytes as they came off the wire
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            status: u16::from_le_bytes([bytes[0], bytes[1]]),
            count: u16::from_le_bytes([bytes[2], bytes[3]]) & rxfhbcr::RXBC_MASK,
        }
    }

    /// Decode a FIFO word as returned by a bulk read
    ///
    /// The word was shifted in most significant byte first; the envelope is
    /// little-endian, so the count lands in bits 16-27 only after a swap.
    pub const fn from_fifo_word(word: u32) -> Self {
        let le = word.swap_bytes();
        Self {
            status: le as u16,
            count: (le >> 16) as u16 & rxfhbcr::RXBC_MASK,
        }
    }

    /// Whether the count can hold at least an FCS
    pub const fn is_valid(&self) -> bool {
        self.count as usize > CRC_SIZE
    }

    /// Bytes delivered upward
    pub const fn frame_len(&self) -> usize {
        (self.count as usize).saturating_sub(CRC_SIZE)
    }

    /// Bytes the frame occupies in the FIFO, envelope included
    pub const fn fifo_len(&self) -> usize {
        FRAME_HEADER_SIZE + align4(self.count as usize)
    }
}

// =============================================================================
// Size Estimate
// =============================================================================

/// Bulk read size for the probed byte counts
///
/// Stops adding frames once the running total reaches the FIFO size, then
/// adds the leading dummy word. Returns the size, clamped to the FIFO size,
/// and whether it was clamped.
pub fn estimate_rx_len(counts: &[u16]) -> (usize, bool) {
    let mut total = 0usize;
    for count in counts {
        total += align4((count & rxfhbcr::RXBC_MASK) as usize) + FRAME_HEADER_SIZE;
        if total >= MAX_RXFIFO_SIZE {
            break;
        }
    }
    total += RX_DUMMY_SIZE;

    if total >= MAX_RXFIFO_SIZE {
        (MAX_RXFIFO_SIZE, true)
    } else {
        (total, false)
    }
}

// =============================================================================
// Receive Report
// =============================================================================

/// Outcome of one receive pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxReport {
    /// Frames the chip reported
    pub queued: usize,
    /// Frames delivered upward
    pub frames: usize,
    /// Bytes delivered upward
    pub bytes: usize,
    /// A follow-up read fetched the tail of the last frame
    pub recovered: bool,
    /// Decoding stopped at the clamped buffer end
    pub truncated: bool,
    /// A buffer allocation failed
    pub out_of_memory: bool,
}

fn alloc_words(len: usize) -> BufferResult<Vec<u32>> {
    let mut words = Vec::new();
    words.try_reserve_exact(len)?;
    words.resize(len, 0);
    Ok(words)
}

/// Convert freshly read FIFO words so their memory holds the wire bytes
fn to_wire_order(words: &mut [u32]) {
    for word in words.iter_mut() {
        *word = word.to_be();
    }
}

// =============================================================================
// Pipeline
// =============================================================================

impl<B: SpiBus, D: DelayNs> Chip<B, D> {
    fn probe_rx_counts(&mut self, frames: usize) -> BufferResult<Vec<u16>> {
        let mut counts = Vec::new();
        counts.try_reserve_exact(frames)?;
        counts.resize(frames, 0);
        self.regs.read_chained(RXFHBCR, &mut counts)?;
        Ok(counts)
    }

    /// Drain the RX FIFO into `uplink`
    pub fn receive<U: Uplink>(&mut self, uplink: &mut U) -> RxReport {
        let mut report = RxReport {
            queued: self.regs.read8(RXFC) as usize,
            ..RxReport::default()
        };
        if report.queued == 0 {
            return report;
        }

        let counts = match self.probe_rx_counts(report.queued) {
            Ok(counts) => counts,
            Err(BufferError::OutOfMemory) => {
                self.rx_out_of_memory(&mut report);
                return report;
            }
        };
        let (estimate, capped) = estimate_rx_len(&counts);
        drop(counts);

        let mut buf = match alloc_words(estimate / 4) {
            Ok(buf) => buf,
            Err(_) => {
                self.rx_out_of_memory(&mut report);
                return report;
            }
        };

        self.reset_rx_pointer();
        self.regs.write16(RXQCR, self.rc_rxqcr | rxqcr::SDA);
        self.regs.read_bulk(SPIOP_RXFIFO, &mut buf);
        to_wire_order(&mut buf);

        self.decode_rx(&buf, capped, uplink, &mut report);

        self.regs.write16(RXQCR, self.rc_rxqcr | rxqcr::RRXEF);
        report
    }

    fn rx_out_of_memory(&mut self, report: &mut RxReport) {
        #[cfg(feature = "defmt")]
        defmt::warn!("rx: out of memory for {} frames", report.queued);
        report.out_of_memory = true;
        self.stats.rx_dropped = self.stats.rx_dropped.wrapping_add(1);
    }

    fn decode_rx<U: Uplink>(
        &mut self,
        buf: &[u32],
        capped: bool,
        uplink: &mut U,
        report: &mut RxReport,
    ) {
        let bytes: &[u8] = bytemuck::cast_slice(buf);
        let stamp = uplink.now();
        let mut pos = RX_DUMMY_SIZE;

        for _ in 0..report.queued {
            let Some(header) = bytes.get(pos..pos + FRAME_HEADER_SIZE) else {
                if capped {
                    report.truncated = true;
                } else if self.recover_rx_envelope(uplink, report).is_err() {
                    self.rx_out_of_memory(report);
                }
                break;
            };
            let envelope = RxEnvelope::from_bytes([header[0], header[1], header[2], header[3]]);
            if !envelope.is_valid() {
                break;
            }

            let end = pos + envelope.fifo_len();
            if end > bytes.len() {
                if capped {
                    report.truncated = true;
                } else if self.recover_rx(buf, pos, &envelope, uplink, report).is_err() {
                    self.rx_out_of_memory(report);
                }
                break;
            }

            let start = pos + FRAME_HEADER_SIZE;
            self.deliver(&bytes[start..start + envelope.frame_len()], uplink, stamp, report);
            pos = end;
        }
    }

    /// Fetch a frame whose envelope fell just past the bulk read
    fn recover_rx_envelope<U: Uplink>(
        &mut self,
        uplink: &mut U,
        report: &mut RxReport,
    ) -> BufferResult<()> {
        let mut head = [0u32; 1];
        self.regs.read_bulk(SPIOP_RXFIFO, &mut head);
        to_wire_order(&mut head);

        let envelope = RxEnvelope::from_bytes(head[0].to_ne_bytes());
        if !envelope.is_valid() {
            return Ok(());
        }
        self.recover_rx(&head, 0, &envelope, uplink, report)
    }

    /// Fetch the tail of the frame starting at byte `pos` and deliver it
    fn recover_rx<U: Uplink>(
        &mut self,
        buf: &[u32],
        pos: usize,
        envelope: &RxEnvelope,
        uplink: &mut U,
        report: &mut RxReport,
    ) -> BufferResult<()> {
        let have = buf.len() - pos / 4;
        let mut frame = alloc_words(envelope.fifo_len() / 4)?;
        frame[..have].copy_from_slice(&buf[pos / 4..]);

        #[cfg(feature = "defmt")]
        defmt::debug!("rx: short read, fetching {} more bytes", (frame.len() - have) * 4);

        self.regs.read_bulk(SPIOP_RXFIFO, &mut frame[have..]);
        to_wire_order(&mut frame[have..]);
        report.recovered = true;

        let bytes: &[u8] = bytemuck::cast_slice(&frame);
        let start = FRAME_HEADER_SIZE;
        let stamp = uplink.now();
        self.deliver(&bytes[start..start + envelope.frame_len()], uplink, stamp, report);
        Ok(())
    }

    fn deliver<U: Uplink>(
        &mut self,
        frame: &[u8],
        uplink: &mut U,
        stamp: super::device::Timestamp,
        report: &mut RxReport,
    ) {
        uplink.receive(frame, stamp);
        report.frames += 1;
        report.bytes += frame.len();
        self.stats.rx_packets = self.stats.rx_packets.wrapping_add(1);
        self.stats.rx_bytes = self.stats.rx_bytes.wrapping_add(frame.len() as u64);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
