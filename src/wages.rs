//! Mean and exact median of the wages retained for one group.

use rust_decimal::Decimal;

use crate::aggregate::GroupAccumulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WageStats {
    pub observations: usize,
    /// `None` when the group has no eligible wage; zero is a real wage.
    pub average: Option<Decimal>,
    pub median: Option<Decimal>,
}

pub fn wage_statistics(group: &mut GroupAccumulator) -> WageStats {
    let observations = group.wage_count();
    let average = (observations > 0).then(|| group.wage_sum() / Decimal::from(observations));
    let median = exact_median(group.wages_mut());
    WageStats {
        observations,
        average,
        median,
    }
}

/// Sorts `values` in place and returns the middle value, or the mean of the
/// two central values for an even count.
pub fn exact_median(values: &mut [Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len().is_multiple_of(2) {
        let (low, high) = (values[mid - 1], values[mid]);
        // `high - low` only overflows when the signs differ, and then the sum cannot.
        let midpoint = match high.checked_sub(low) {
            Some(span) => low + span / Decimal::TWO,
            None => (low + high) / Decimal::TWO,
        };
        Some(midpoint)
    } else {
        Some(values[mid])
    }
}
