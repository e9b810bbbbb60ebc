//! Time-weighted average price calculation
//!
//! Each snapshot's price is weighted by how long it prevailed: the gap to the
//! next snapshot, and for the last snapshot the gap to the interval's end.
//!
//! ```text
//! TWAP = floor( Σ(price_i · duration_i) / Σ(duration_i) )
//! ```
//!
//! Snapshots are stably sorted by timestamp before weighting, so slightly
//! reordered arrivals are weighted as if they had arrived in order, and
//! equal timestamps keep their arrival order. Accumulation is in `i128`
//! with floor division, matching the fixed-point truncation policy.

use crate::bucketer::{Bucket, Snapshot};

/// Compute the TWAP of a bucket, or `None` if it holds no snapshots.
pub fn compute(bucket: &Bucket) -> Option<i64> {
    time_weighted_average(bucket.snapshots(), bucket.end_time())
}

/// Compute the TWAP of `snapshots` for an interval ending at `end_time`.
///
/// - no snapshots: `None`
/// - one snapshot: its price, unchanged
/// - zero total weight: floored arithmetic mean of all prices
pub fn time_weighted_average(snapshots: &[Snapshot], end_time: i64) -> Option<i64> {
    match snapshots {
        [] => None,
        [only] => Some(only.price),
        _ => {
            let (weighted_sum, total_weight) = weighted_terms(snapshots, end_time)
                .into_iter()
                .fold((0i128, 0i128), |(sum, total), (price, weight)| {
                    (sum + price as i128 * weight as i128, total + weight as i128)
                });

            if total_weight > 0 {
                // Non-negative weights keep the result within [min, max] price.
                Some(weighted_sum.div_euclid(total_weight) as i64)
            } else {
                Some(unweighted_mean(snapshots))
            }
        }
    }
}

/// The `(price, weight)` terms the average is built from, in timestamp order.
///
/// For in-bounds snapshots the weights sum to `end_time - first.timestamp`.
pub fn weighted_terms(snapshots: &[Snapshot], end_time: i64) -> Vec<(i64, i64)> {
    let mut ordered = snapshots.to_vec();
    ordered.sort_by_key(|s| s.timestamp);

    let mut terms = Vec::with_capacity(ordered.len());
    for pair in ordered.windows(2) {
        terms.push((pair[0].price, pair[1].timestamp - pair[0].timestamp));
    }

    if let Some(last) = ordered.last() {
        if last.timestamp < end_time {
            terms.push((last.price, end_time - last.timestamp));
        }
    }

    terms
}

fn unweighted_mean(snapshots: &[Snapshot]) -> i64 {
    let sum: i128 = snapshots.iter().map(|s| s.price as i128).sum();
    sum.div_euclid(snapshots.len() as i128) as i64
}
