/// Per-column statistics for the summary action
use rayon::prelude::*;
use serde::Serialize;

use crate::math::ValueSpace;
use crate::table::{Column, DataTable};

pub const HISTOGRAM_BINS: usize = 16;

/// Statistics of one column in display space. Moments and quantiles cover
/// finite values only; NaN means there were none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub nan_count: usize,
    pub inf_count: usize,
    pub histogram: [usize; HISTOGRAM_BINS],
}

impl ColumnSummary {
    pub fn of_column(column: &Column) -> Self {
        let space = ValueSpace::for_column(&column.name);
        let mut nan_count = 0;
        let mut inf_count = 0;
        let mut values: Vec<f64> = Vec::with_capacity(column.len());
        for i in 0..column.len() {
            let v = space.forward(column.data.get_f64(i));
            if v.is_nan() {
                nan_count += 1;
            } else if v.is_infinite() {
                inf_count += 1;
            } else {
                values.push(v);
            }
        }
        values.sort_unstable_by(f64::total_cmp);

        let mut summary = Self {
            name: column.name.clone(),
            min: f64::NAN,
            max: f64::NAN,
            median: f64::NAN,
            mean: f64::NAN,
            std_dev: f64::NAN,
            nan_count,
            inf_count,
            histogram: [0; HISTOGRAM_BINS],
        };
        let (Some(&min), Some(&max)) = (values.first(), values.last()) else {
            return summary;
        };

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let mid = values.len() / 2;
        summary.median = if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };
        summary.min = min;
        summary.max = max;
        summary.mean = mean;
        summary.std_dev = variance.sqrt();

        let range = max - min;
        for v in &values {
            let bin = if range > 0.0 {
                (((v - min) / range) * HISTOGRAM_BINS as f64) as usize
            } else {
                0
            };
            summary.histogram[bin.min(HISTOGRAM_BINS - 1)] += 1;
        }
        summary
    }

    /// One line of the text report.
    pub fn to_row(&self) -> String {
        format!(
            "{:<12} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>6} {:>6}",
            self.name,
            self.min,
            self.max,
            self.median,
            self.mean,
            self.std_dev,
            self.nan_count,
            self.inf_count
        )
    }
}

pub fn summarize(table: &DataTable) -> Vec<ColumnSummary> {
    table
        .columns()
        .par_iter()
        .map(ColumnSummary::of_column)
        .collect()
}

pub fn report_header() -> String {
    format!(
        "{:<12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>6} {:>6}",
        "column", "min", "max", "median", "mean", "std_dev", "nan", "inf"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_statistics() {
        let column = Column::from_f32("x", vec![4.0, 1.0, f32::NAN, 3.0, 2.0, f32::INFINITY]);
        let s = ColumnSummary::of_column(&column);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.mean, 2.5);
        assert_relative_eq!(s.std_dev, 1.25f64.sqrt());
        assert_eq!(s.nan_count, 1);
        assert_eq!(s.inf_count, 1);
        assert_eq!(s.histogram.iter().sum::<usize>(), 4);
        assert_eq!(s.histogram[0], 1);
        assert_eq!(s.histogram[HISTOGRAM_BINS - 1], 1);
    }

    #[test]
    fn test_opacity_reported_linear() {
        let column = Column::from_f32("opacity", vec![0.0, 0.0]);
        let s = ColumnSummary::of_column(&column);
        assert_eq!(s.min, 0.5);
        assert_eq!(s.histogram[0], 2);
    }

    #[test]
    fn test_empty_column() {
        let s = ColumnSummary::of_column(&Column::from_f32("x", vec![]));
        assert!(s.mean.is_nan());
        assert_eq!(s.histogram, [0; HISTOGRAM_BINS]);
    }
}
