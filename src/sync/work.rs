//! Deferred work scheduler
//!
//! Three units of work run outside interrupt context, each holding the bus
//! lock for its whole body. Units are grouped into two logical queues so a
//! receive burst never waits behind a transmit batch and vice versa.
//!
//! Scheduling is coalescing: posting a unit that is already pending does
//! nothing. A unit is marked idle before it runs, so work posted while it
//! runs gets a fresh pass.

use super::primitives::CriticalSectionCell;

// =============================================================================
// Work Units
// =============================================================================

/// Executor queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Queue {
    /// Receive-class work
    Receive,
    /// Transmit and filter work
    Transmit,
}

/// Deferred unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Work {
    /// Drain the RX FIFO
    Rx,
    /// Push queued frames into the TX FIFO
    Tx,
    /// Quiesce the receiver or apply the pending receive filter
    RxCtrl,
}

impl Work {
    /// Every unit, in execution order within a queue
    pub const ALL: [Work; 3] = [Work::Rx, Work::Tx, Work::RxCtrl];

    const fn bit(self) -> u8 {
        match self {
            Work::Rx => 1 << 0,
            Work::Tx => 1 << 1,
            Work::RxCtrl => 1 << 2,
        }
    }

    /// Queue this unit runs on
    pub const fn queue(self) -> Queue {
        match self {
            Work::Rx => Queue::Receive,
            Work::Tx | Work::RxCtrl => Queue::Transmit,
        }
    }
}

// =============================================================================
// Work Queue
// =============================================================================

/// Set of pending work units
#[derive(Debug)]
pub struct WorkQueue {
    pending: CriticalSectionCell<u8>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    /// Empty queue
    pub const fn new() -> Self {
        Self {
            pending: CriticalSectionCell::new(0),
        }
    }

    /// Mark `work` pending; returns `false` if it already was
    pub fn schedule(&self, work: Work) -> bool {
        self.pending.with(|pending| {
            let fresh = *pending & work.bit() == 0;
            *pending |= work.bit();
            fresh
        })
    }

    /// Clear `work` and report whether it was pending
    ///
    /// Executors call this right before running the unit.
    pub fn take(&self, work: Work) -> bool {
        self.pending.with(|pending| {
            let was = *pending & work.bit() != 0;
            *pending &= !work.bit();
            was
        })
    }

    /// Whether `work` is pending
    pub fn is_pending(&self, work: Work) -> bool {
        self.pending.with(|pending| *pending & work.bit() != 0)
    }

    /// Whether anything on `queue` is pending
    pub fn has_pending(&self, queue: Queue) -> bool {
        Work::ALL
            .iter()
            .any(|work| work.queue() == queue && self.is_pending(*work))
    }

    /// Drop every pending unit
    pub fn clear(&self) {
        self.pending.with(|pending| *pending = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_coalesces() {
        let queue = WorkQueue::new();
        assert!(queue.schedule(Work::Tx));
        assert!(!queue.schedule(Work::Tx));
        assert!(queue.is_pending(Work::Tx));
        assert!(!queue.is_pending(Work::Rx));
    }

    #[test]
    fn take_clears_pending() {
        let queue = WorkQueue::new();
        queue.schedule(Work::RxCtrl);
        assert!(queue.take(Work::RxCtrl));
        assert!(!queue.take(Work::RxCtrl));
        assert!(queue.schedule(Work::RxCtrl));
    }

    #[test]
    fn units_map_to_queues() {
        assert_eq!(Work::Rx.queue(), Queue::Receive);
        assert_eq!(Work::Tx.queue(), Queue::Transmit);
        assert_eq!(Work::RxCtrl.queue(), Queue::Transmit);

        let queue = WorkQueue::new();
        queue.schedule(Work::RxCtrl);
        assert!(queue.has_pending(Queue::Transmit));
        assert!(!queue.has_pending(Queue::Receive));
        queue.clear();
        assert!(!queue.has_pending(Queue::Transmit));
    }
}
