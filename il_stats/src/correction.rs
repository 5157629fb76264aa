//! Multiple-testing correction.
//!
//! The correction is applied uniformly across all per-feature p-values from
//! one comparison batch. Mixing batches with different denominators corrupts
//! the false-discovery-rate guarantee, so the batch runner is the only caller
//! and hands over exactly one batch at a time.

use crate::error::StatsError;

/// Benjamini-Hochberg false-discovery-rate adjustment.
///
/// Returns adjusted p-values in the same order as the input. Each adjusted
/// value is `p * n / rank`, made monotone from the largest p-value downwards
/// and clamped to 1; the adjusted value is never below the raw one.
pub fn benjamini_hochberg(p_values: &[f64]) -> Result<Vec<f64>, StatsError> {
    if let Some((index, &value)) = p_values
        .iter()
        .enumerate()
        .find(|&(_, &p)| !(0.0..=1.0).contains(&p))
    {
        return Err(StatsError::InvalidPValue { index, value });
    }

    let n = p_values.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let n_f = n as f64;
    let mut adjusted = vec![0.0; n];
    let mut running_min = f64::INFINITY;
    for i in (0..n).rev() {
        let rank = (i + 1) as f64;
        let adj = (p_values[order[i]] * n_f / rank).min(1.0).min(running_min);
        adjusted[order[i]] = adj;
        running_min = adj;
    }
    Ok(adjusted)
}
