/// Visibility ranking used to discard the least visible splats first
use crate::error::Result;
use crate::math::sigmoid;
use crate::table::DataTable;
use constants::columns::{OPACITY, SCALE};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ellipsoid volume factor, 4/3 π.
const ELLIPSOID_VOLUME: f32 = 4.0 / 3.0 * std::f32::consts::PI;

/// How many splats a visibility filter keeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeepAmount {
    Count(usize),
    /// Percentage of rows, clamped to 0..=100.
    Percent(f32),
}

impl KeepAmount {
    pub fn resolve(&self, num_rows: usize) -> usize {
        match *self {
            KeepAmount::Count(count) => count.min(num_rows),
            KeepAmount::Percent(percent) => {
                let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
                ((num_rows as f64 * percent as f64 / 100.0).round() as usize).min(num_rows)
            }
        }
    }
}

/// Opacity times ellipsoid volume, per row.
pub fn visibility_scores(table: &DataTable) -> Result<Vec<f32>> {
    let opacity = table.f32_column(OPACITY)?;
    let s0 = table.f32_column(SCALE[0])?;
    let s1 = table.f32_column(SCALE[1])?;
    let s2 = table.f32_column(SCALE[2])?;

    Ok((0..table.num_rows())
        .into_par_iter()
        .map(|i| sigmoid(opacity[i]) * (s0[i] + s1[i] + s2[i]).exp() * ELLIPSOID_VOLUME)
        .collect())
}

/// Row indices by descending score. NaN scores sort last, ties keep row order.
pub fn rank_by_visibility(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.par_sort_by(|&a, &b| compare_desc(scores[a], scores[b]));
    order
}

fn compare_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Rows to keep for `amount`, in their original order.
pub fn visible_rows(table: &DataTable, amount: KeepAmount) -> Result<Vec<usize>> {
    let scores = visibility_scores(table)?;
    let keep = amount.resolve(table.num_rows());
    let mut rows = rank_by_visibility(&scores);
    rows.truncate(keep);
    rows.sort_unstable();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn table(opacity: Vec<f32>, log_scale: Vec<f32>) -> DataTable {
        DataTable::new(vec![
            Column::from_f32("opacity", opacity),
            Column::from_f32("scale_0", log_scale.clone()),
            Column::from_f32("scale_1", log_scale.clone()),
            Column::from_f32("scale_2", log_scale),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_clamps() {
        assert_eq!(KeepAmount::Count(50).resolve(10), 10);
        assert_eq!(KeepAmount::Percent(150.0).resolve(10), 10);
        assert_eq!(KeepAmount::Percent(-5.0).resolve(10), 0);
        assert_eq!(KeepAmount::Percent(25.0).resolve(10), 3);
    }

    #[test]
    fn test_kept_scores_dominate_discarded() {
        let n = 40;
        let opacity: Vec<f32> = (0..n).map(|i| ((i * 7) % 13) as f32 - 6.0).collect();
        let scale: Vec<f32> = (0..n).map(|i| ((i * 5) % 11) as f32 * 0.1 - 0.5).collect();
        let t = table(opacity, scale);
        let scores = visibility_scores(&t).unwrap();

        let kept = visible_rows(&t, KeepAmount::Count(15)).unwrap();
        assert_eq!(kept.len(), 15);
        let min_kept = kept.iter().map(|&i| scores[i]).fold(f32::INFINITY, f32::min);
        for i in (0..n).filter(|i| !kept.contains(i)) {
            assert!(scores[i] <= min_kept);
        }
    }

    #[test]
    fn test_count_and_percent_agree() {
        let n = 40;
        let opacity: Vec<f32> = (0..n).map(|i| (i as f32 * 0.37).sin() * 4.0).collect();
        let t = table(opacity, vec![0.0; n]);
        let k = 10;
        let by_count = visible_rows(&t, KeepAmount::Count(k)).unwrap();
        let by_percent = visible_rows(&t, KeepAmount::Percent(100.0 * k as f32 / n as f32)).unwrap();
        assert_eq!(by_count, by_percent);
    }

    #[test]
    fn test_nan_ranks_last() {
        assert_eq!(rank_by_visibility(&[1.0, f32::NAN, 3.0, 2.0]), vec![2, 3, 0, 1]);
    }
}
