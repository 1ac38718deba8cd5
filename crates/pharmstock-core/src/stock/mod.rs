//! Stock accounting: unit schemes, ledger replay and batch ordering.

mod aggregator;
mod fefo;
mod units;

pub use aggregator::*;
pub use fefo::*;
pub use units::*;
