//! Percentile and probability helpers for Monte Carlo output.
//!
//! Percentiles use linear interpolation between closest ranks: for `n`
//! sorted values the `p`-th percentile sits at rank `p / 100 * (n - 1)`.
//! This is the same definition spreadsheet `PERCENTILE.INC` uses, so
//! numbers can be checked by hand.

/// Percentile bands reported with every result
pub const STANDARD_PERCENTILES: [u8; 5] = [10, 25, 50, 75, 90];

/// Percentile of an ascending slice. Returns 0.0 for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let p = p.clamp(0.0, 100.0);
            let rank = p * (n - 1) as f64 / 100.0;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let (lo, hi) = (sorted[lower], sorted[upper]);
                let frac = rank - lower as f64;
                (lo + (hi - lo) * frac).max(lo).min(hi)
            }
        }
    }
}

/// Sort in place and take the percentile
pub fn percentile_of(values: &mut [f64], p: f64) -> f64 {
    sort_values(values);
    percentile(values, p)
}

pub fn sort_values(values: &mut [f64]) {
    values.sort_by(f64::total_cmp);
}

/// Fraction of values greater than or equal to `threshold`
pub fn fraction_at_least(values: &[f64], threshold: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let hits = values.iter().filter(|v| **v >= threshold).count();
    hits as f64 / values.len() as f64
}
