//! Ordinal 1-5 scores from raw counts.

use anyhow::{Context, Result};
use polars::prelude::{Column, DataType};

/// Percentile-rank quintile score of every value.
///
/// Ties share their average rank. A series without variation scores 1 throughout.
/// NaN counts as 0.
pub fn quintile_scores(values: &[f64]) -> Vec<u32> {
    let values = values.iter()
        .map(|&v| if v.is_nan() { 0.0 } else { v })
        .collect::<Vec<_>>();

    let Some(first) = values.first() else { return Vec::new() };
    if values.iter().all(|v| v == first) {
        return vec![1; values.len()];
    }

    let n = values.len();
    let mut order = (0..n).collect::<Vec<_>>();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut scores = vec![0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1..=end share their mean
        let rank = (start + 1 + end) as f64 / 2.0;
        let score = (rank / n as f64 * 5.0).ceil().clamp(1.0, 5.0) as u32;
        for &i in &order[start..end] {
            scores[i] = score;
        }
        start = end;
    }
    scores
}

/// [`quintile_scores`] over a table column; values that do not parse as numbers count as 0.
pub fn quintile_scores_column(column: &Column) -> Result<Vec<u32>> {
    let numeric = column.cast(&DataType::Float64)
        .with_context(|| format!("[score] column {:?} is not numeric", column.name()))?;
    let values = numeric.f64()?
        .into_iter()
        .map(|value| value.unwrap_or(0.0))
        .collect::<Vec<_>>();
    Ok(quintile_scores(&values))
}
