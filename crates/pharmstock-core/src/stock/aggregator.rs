//! Stock recompute from ledger entries.
//!
//! A recompute is a pure sum over entries: it does not depend on their order
//! and running it twice yields the same result.

use rust_decimal::Decimal;

use super::UnitScheme;
use crate::models::{LedgerEntry, Quantities, StockLevel};

/// Result of replaying a set of ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockComputation {
    /// Stock to cache, never negative
    pub level: StockLevel,
    /// Unclamped net of base units
    pub net: Decimal,
    /// Base units the net fell below zero (0 when stock is non-negative)
    pub deficit: Decimal,
    pub total_in: Quantities,
    pub total_out: Quantities,
}

impl StockComputation {
    pub fn has_deficit(&self) -> bool {
        self.deficit > Decimal::ZERO
    }
}

/// Replay `entries` under `scheme`.
pub fn aggregate<'a, I>(scheme: &dyn UnitScheme, entries: I) -> StockComputation
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut total_in = Quantities::zero();
    let mut total_out = Quantities::zero();
    for entry in entries {
        total_in += entry.incoming;
        total_out += entry.outgoing;
    }

    let net = scheme.base_units(&total_in) - scheme.base_units(&total_out);
    let clamped = net.max(Decimal::ZERO);
    StockComputation {
        level: scheme.decompose(clamped),
        net,
        deficit: (-net).max(Decimal::ZERO),
        total_in,
        total_out,
    }
}
