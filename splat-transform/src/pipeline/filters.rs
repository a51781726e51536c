/// Row and column filters over splat tables
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, SplatError};
use crate::math::ValueSpace;
use crate::table::{Column, DataTable};
use constants::columns::{OPACITY, POSITION, RAW_SUFFIX, SCALE, sh_rest_name};
use constants::sh::{CHANNELS, COEFFS_PER_CHANNEL, MAX_SH_BANDS};

/// Comparison used by value filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

impl Comparator {
    pub fn test(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Lt => value < threshold,
            Comparator::Lte => value <= threshold,
            Comparator::Gt => value > threshold,
            Comparator::Gte => value >= threshold,
            Comparator::Eq => value == threshold,
            Comparator::Neq => value != threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Lt => "lt",
            Comparator::Lte => "lte",
            Comparator::Gt => "gt",
            Comparator::Gte => "gte",
            Comparator::Eq => "eq",
            Comparator::Neq => "neq",
        }
    }
}

impl FromStr for Comparator {
    type Err = SplatError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lt" => Ok(Comparator::Lt),
            "lte" => Ok(Comparator::Lte),
            "gt" => Ok(Comparator::Gt),
            "gte" => Ok(Comparator::Gte),
            "eq" => Ok(Comparator::Eq),
            "neq" => Ok(Comparator::Neq),
            other => Err(SplatError::config(format!("unknown comparator '{}'", other))),
        }
    }
}

/// Row indices satisfying `keep`, in ascending order.
fn matching_rows<F>(num_rows: usize, keep: F) -> Vec<usize>
where
    F: Fn(usize) -> bool + Sync,
{
    (0..num_rows).into_par_iter().filter(|&i| keep(i)).collect()
}

/// Drops rows holding NaN or infinite values. Opacity may be infinite and
/// log-scale may be negative infinity, both meaning a fully degenerate splat.
pub fn filter_nan(table: &DataTable) -> Result<DataTable> {
    let columns = table.columns();
    let keep = matching_rows(table.num_rows(), |i| {
        columns.iter().all(|column| {
            let v = column.data.get_f64(i);
            if v.is_finite() {
                true
            } else if column.name == OPACITY {
                !v.is_nan()
            } else if SCALE.contains(&column.name.as_str()) {
                v == f64::NEG_INFINITY
            } else {
                false
            }
        })
    });
    table.permute_rows(&keep)
}

/// Keeps rows where `column cmp value` holds.
///
/// `value` is given in display space (linear opacity, linear scale, 0-1
/// colour) and converted to the stored space before comparing. Naming the
/// column with a `_raw` suffix compares stored values directly.
pub fn filter_by_value(
    table: &DataTable,
    column: &str,
    comparator: Comparator,
    value: f64,
) -> Result<DataTable> {
    let (name, threshold) = match column.strip_suffix(RAW_SUFFIX) {
        Some(base) if !table.has_column(column) => (base, value),
        _ => (column, ValueSpace::for_column(column).inverse(value)),
    };
    let data = &table.column(name)?.data;
    let keep = matching_rows(table.num_rows(), |i| comparator.test(data.get_f64(i), threshold));
    table.permute_rows(&keep)
}

/// Drops SH coefficients above `bands`, renumbering the kept `f_rest_*`
/// columns contiguously per channel.
pub fn filter_bands(table: &DataTable, bands: usize) -> Result<DataTable> {
    let current = table.sh_bands();
    let target = bands.min(MAX_SH_BANDS);
    if target >= current {
        return Ok(table.clone());
    }

    let old_per_channel = COEFFS_PER_CHANNEL[current];
    let new_per_channel = COEFFS_PER_CHANNEL[target];
    let old_names: Vec<String> = (0..CHANNELS * old_per_channel).map(sh_rest_name).collect();

    let mut result = DataTable::with_rows(table.num_rows());
    for column in table.columns() {
        if !old_names.contains(&column.name) {
            result.add_column(column.clone())?;
        }
    }
    for channel in 0..CHANNELS {
        for k in 0..new_per_channel {
            let source = table.column(&sh_rest_name(channel * old_per_channel + k))?;
            result.add_column(Column::new(
                sh_rest_name(channel * new_per_channel + k),
                source.data.clone(),
            ))?;
        }
    }
    Ok(result)
}

fn positions(table: &DataTable) -> Result<[&[f32]; 3]> {
    Ok([
        table.f32_column(POSITION[0])?,
        table.f32_column(POSITION[1])?,
        table.f32_column(POSITION[2])?,
    ])
}

/// Keeps rows inside the closed box. Infinite bounds leave an axis open.
pub fn filter_box(table: &DataTable, min: [f32; 3], max: [f32; 3]) -> Result<DataTable> {
    let p = positions(table)?;
    let keep = matching_rows(table.num_rows(), |i| {
        (0..3).all(|axis| p[axis][i] >= min[axis] && p[axis][i] <= max[axis])
    });
    table.permute_rows(&keep)
}

/// Keeps rows strictly inside the sphere.
pub fn filter_sphere(table: &DataTable, center: [f32; 3], radius: f32) -> Result<DataTable> {
    let p = positions(table)?;
    let radius_sq = radius * radius;
    let keep = matching_rows(table.num_rows(), |i| {
        let dist_sq: f32 = (0..3).map(|axis| (p[axis][i] - center[axis]).powi(2)).sum();
        dist_sq < radius_sq
    });
    table.permute_rows(&keep)
}
