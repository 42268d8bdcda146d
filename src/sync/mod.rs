//! Synchronization and Concurrency Support
//!
//! - **Primitives** (`primitives`): [`CriticalSectionCell`], the short-held
//!   state lock guarding the transmit queue and space budget
//! - **Work** (`work`): [`WorkQueue`], the pending set behind the deferred
//!   receive, transmit and filter units
//!
//! The coarse bus lock is a `spin::Mutex` owned by the device itself.

mod primitives;
pub mod work;

pub use primitives::CriticalSectionCell;
pub use work::{Queue, Work, WorkQueue};
