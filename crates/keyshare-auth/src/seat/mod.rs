//! Seat control: who may occupy an account, how occupancy is counted, and
//! the periodic pass that keeps stored counters honest.

pub mod gate;
pub mod resolver;
pub mod sweeper;

pub use gate::{Admission, ConcurrencyGate, DenialReason};
pub use resolver::{Occupancy, OccupancyResolver};
pub use sweeper::{ReconciliationSweeper, SweepReport};
