//! Ordered transform and filter actions over a splat table.
//!
//! Every action takes the current table and yields the next one. Actions
//! that keep the row set mutate in place; filters and reorders go through
//! [`DataTable::permute_rows`].

mod filters;
mod summary;
mod transform;

pub use filters::{Comparator, filter_bands, filter_box, filter_by_value, filter_nan, filter_sphere};
pub use summary::{ColumnSummary, HISTOGRAM_BINS, summarize};
pub use transform::Transform;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::context::ProcessContext;
use crate::error::{Result, SplatError};
use crate::math::ValueSpace;
use crate::spatial_layout::morton_order;
use crate::table::{Column, ColumnData, DataTable};
use crate::visibility::{KeepAmount, visible_rows};
use constants::columns::LOD;
use constants::sh::MAX_SH_BANDS;

/// One step of a processing pipeline.
///
/// Serialised with a `kind` tag using the same names as the command line,
/// e.g. `{"kind": "scale", "factor": 0.5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProcessAction {
    Translate {
        offset: [f32; 3],
    },
    /// Euler angles in degrees, applied about X, then Y, then Z.
    Rotate {
        degrees: [f32; 3],
    },
    Scale {
        factor: f32,
    },
    #[serde(rename = "filter-nan")]
    FilterNaN,
    #[serde(rename = "filter-value")]
    FilterByValue {
        column: String,
        comparator: Comparator,
        value: f64,
    },
    FilterBands {
        bands: usize,
    },
    FilterBox {
        min: [f32; 3],
        max: [f32; 3],
    },
    FilterSphere {
        center: [f32; 3],
        radius: f32,
    },
    Lod {
        level: i32,
    },
    Summary,
    MortonOrder,
    FilterVisibility {
        keep: KeepAmount,
    },
    /// Generator parameter; has no effect on an existing table.
    Param {
        name: String,
        value: String,
    },
}

impl ProcessAction {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessAction::Translate { .. } => "translate",
            ProcessAction::Rotate { .. } => "rotate",
            ProcessAction::Scale { .. } => "scale",
            ProcessAction::FilterNaN => "filter-nan",
            ProcessAction::FilterByValue { .. } => "filter-value",
            ProcessAction::FilterBands { .. } => "filter-bands",
            ProcessAction::FilterBox { .. } => "filter-box",
            ProcessAction::FilterSphere { .. } => "filter-sphere",
            ProcessAction::Lod { .. } => "lod",
            ProcessAction::Summary => "summary",
            ProcessAction::MortonOrder => "morton-order",
            ProcessAction::FilterVisibility { .. } => "filter-visibility",
            ProcessAction::Param { .. } => "param",
        }
    }

    /// Rejects parameters no run could use, before any file is touched.
    pub fn validate(&self) -> Result<()> {
        let all_finite = |v: &[f32]| v.iter().all(|c| c.is_finite());
        let invalid = |detail: String| Err(SplatError::config(format!("{}: {}", self.name(), detail)));

        match self {
            ProcessAction::Translate { offset } if !all_finite(offset) => {
                invalid(format!("offset {:?} is not finite", offset))
            }
            ProcessAction::Rotate { degrees } if !all_finite(degrees) => {
                invalid(format!("angles {:?} are not finite", degrees))
            }
            ProcessAction::Scale { factor } if !(factor.is_finite() && *factor > 0.0) => {
                invalid(format!("factor {} must be finite and positive", factor))
            }
            ProcessAction::FilterBands { bands } if *bands > MAX_SH_BANDS => {
                invalid(format!("{} bands requested, at most {} supported", bands, MAX_SH_BANDS))
            }
            ProcessAction::FilterBox { min, max }
                if min.iter().chain(max).any(|v| v.is_nan()) =>
            {
                invalid("bounds contain NaN".to_string())
            }
            ProcessAction::FilterSphere { center, radius }
                if !all_finite(center) || !(radius.is_finite() && *radius >= 0.0) =>
            {
                invalid(format!("center {:?} radius {} is not a valid sphere", center, radius))
            }
            ProcessAction::FilterVisibility {
                keep: KeepAmount::Percent(p),
            } if !(0.0..=100.0).contains(p) => {
                invalid(format!("percentage {} is outside 0-100", p))
            }
            ProcessAction::FilterByValue { column, .. } if column.is_empty() => {
                invalid("column name is empty".to_string())
            }
            ProcessAction::FilterByValue { column, value, .. }
                if !ValueSpace::for_column(column).contains(*value) =>
            {
                invalid(format!("value {} is outside the display range of '{}'", value, column))
            }
            _ => Ok(()),
        }
    }
}

fn parse_floats<const N: usize>(action: &str, args: &str) -> Result<[f32; N]> {
    let values = args
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SplatError::config(format!("{}: {}", action, e)))?;
    values.try_into().map_err(|values: Vec<f32>| {
        SplatError::config(format!(
            "{}: expected {} values, got {}",
            action,
            N,
            values.len()
        ))
    })
}

fn parse_value<T: FromStr>(action: &str, arg: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    arg.trim()
        .parse()
        .map_err(|e| SplatError::config(format!("{}: invalid value '{}': {}", action, arg, e)))
}

impl FromStr for ProcessAction {
    type Err = SplatError;

    /// Parses the command-line form, `name` or `name=arguments`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, args) = match s.split_once('=') {
            Some((name, args)) => (name.trim(), Some(args)),
            None => (s.trim(), None),
        };
        let required = || args.ok_or_else(|| SplatError::config(format!("{}: missing arguments", name)));

        let action = match name {
            "translate" => ProcessAction::Translate {
                offset: parse_floats(name, required()?)?,
            },
            "rotate" => ProcessAction::Rotate {
                degrees: parse_floats(name, required()?)?,
            },
            "scale" => ProcessAction::Scale {
                factor: parse_value(name, required()?)?,
            },
            "filter-nan" => ProcessAction::FilterNaN,
            "filter-value" => {
                let parts: Vec<&str> = required()?.split(',').map(str::trim).collect();
                let [column, comparator, value] = parts[..] else {
                    return Err(SplatError::config(format!(
                        "{}: expected column,comparator,value",
                        name
                    )));
                };
                ProcessAction::FilterByValue {
                    column: column.to_string(),
                    comparator: comparator.parse()?,
                    value: parse_value(name, value)?,
                }
            }
            "filter-bands" => ProcessAction::FilterBands {
                bands: parse_value(name, required()?)?,
            },
            "filter-box" => {
                let [x0, y0, z0, x1, y1, z1] = parse_floats(name, required()?)?;
                ProcessAction::FilterBox {
                    min: [x0, y0, z0],
                    max: [x1, y1, z1],
                }
            }
            "filter-sphere" => {
                let [x, y, z, radius] = parse_floats(name, required()?)?;
                ProcessAction::FilterSphere {
                    center: [x, y, z],
                    radius,
                }
            }
            "lod" => ProcessAction::Lod {
                level: parse_value(name, required()?)?,
            },
            "summary" => ProcessAction::Summary,
            "morton-order" => ProcessAction::MortonOrder,
            "filter-visibility" => {
                let arg = required()?.trim();
                let keep = match arg.strip_suffix('%') {
                    Some(percent) => KeepAmount::Percent(parse_value(name, percent)?),
                    None => KeepAmount::Count(parse_value(name, arg)?),
                };
                ProcessAction::FilterVisibility { keep }
            }
            "param" => {
                let (key, value) = required()?
                    .split_once('=')
                    .ok_or_else(|| SplatError::config("param: expected name=value"))?;
                ProcessAction::Param {
                    name: key.trim().to_string(),
                    value: value.trim().to_string(),
                }
            }
            other => return Err(SplatError::config(format!("unknown action '{}'", other))),
        };
        Ok(action)
    }
}

/// Tags every row with `level`. An existing `lod` column of another type is
/// replaced by a float32 one so negative levels survive.
fn set_lod(mut table: DataTable, level: i32) -> Result<DataTable> {
    let values = vec![level as f32; table.num_rows()];
    match table.get_column_mut(LOD) {
        Some(column) => column.data = ColumnData::Float32(values),
        None => table.add_column(Column::from_f32(LOD, values))?,
    }
    Ok(table)
}

fn log_summary(table: &DataTable, ctx: &ProcessContext) -> Result<()> {
    let summaries = summarize(table);
    ctx.info(&format!("summary of {} rows", table.num_rows()));
    ctx.info(&summary::report_header());
    for s in &summaries {
        ctx.info(&s.to_row());
    }
    if ctx.enabled(log::Level::Debug) {
        ctx.debug(&serde_json::to_string(&summaries)?);
    }
    Ok(())
}

/// Applies one action.
pub fn apply_action(
    mut table: DataTable,
    action: &ProcessAction,
    ctx: &ProcessContext,
) -> Result<DataTable> {
    match action {
        ProcessAction::Translate { offset } => {
            Transform::translation(*offset).apply(&mut table)?;
            Ok(table)
        }
        ProcessAction::Rotate { degrees } => {
            Transform::rotation(*degrees).apply(&mut table)?;
            Ok(table)
        }
        ProcessAction::Scale { factor } => {
            Transform::uniform_scale(*factor).apply(&mut table)?;
            Ok(table)
        }
        ProcessAction::FilterNaN => filter_nan(&table),
        ProcessAction::FilterByValue {
            column,
            comparator,
            value,
        } => filter_by_value(&table, column, *comparator, *value),
        ProcessAction::FilterBands { bands } => filter_bands(&table, *bands),
        ProcessAction::FilterBox { min, max } => filter_box(&table, *min, *max),
        ProcessAction::FilterSphere { center, radius } => filter_sphere(&table, *center, *radius),
        ProcessAction::Lod { level } => set_lod(table, *level),
        ProcessAction::Summary => {
            log_summary(&table, ctx)?;
            Ok(table)
        }
        ProcessAction::MortonOrder => {
            let order = morton_order(&table)?;
            table.permute_rows_in_place(&order)?;
            Ok(table)
        }
        ProcessAction::FilterVisibility { keep } => {
            let rows = visible_rows(&table, *keep)?;
            table.permute_rows(&rows)
        }
        ProcessAction::Param { name, value } => {
            ctx.debug(&format!("ignoring parameter {}={}", name, value));
            Ok(table)
        }
    }
}

/// Applies `actions` in order and returns the resulting table.
pub fn process_data_table(
    table: DataTable,
    actions: &[ProcessAction],
    ctx: &ProcessContext,
) -> Result<DataTable> {
    if actions.is_empty() {
        return Ok(table);
    }

    let progress = ctx.progress();
    progress.begin("actions", actions.len() as u64);
    let mut table = table;
    for (i, action) in actions.iter().enumerate() {
        let rows_before = table.num_rows();
        table = apply_action(table, action, ctx)?;
        ctx.debug(&format!(
            "{}: {} -> {} rows",
            action.name(),
            rows_before,
            table.num_rows()
        ));
        progress.step(i as u64 + 1, action.name());
    }
    progress.finish("actions applied");
    Ok(table)
}
