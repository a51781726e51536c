/// Plain splat table to packed-chunk layout
use rayon::prelude::*;

use super::ChunkBounds;
use super::packing::{normalize, pack_rgba, pack_rotation, pack_sh, pack_vec3};
use crate::bounds::Bounds3;
use crate::context::ProcessContext;
use crate::error::Result;
use crate::math::sigmoid;
use crate::ply::DataSection;
use crate::table::{Column, ColumnData, DataTable};
use constants::codec::{
    CHUNK_BOUND_COLUMNS, CHUNK_COLOR_COLUMNS, CHUNK_ELEMENT, CHUNK_SIZE, PACKED_COLUMNS,
    SCALE_CLAMP, SH_ELEMENT, VERTEX_ELEMENT,
};
use constants::columns::{COLOR_DC, OPACITY, ROTATION, SCALE, X, Y, Z, sh_rest_name};
use constants::sh::{REST_COLUMN_COUNTS, SH_C0};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Store per-chunk colour bounds (18 chunk columns instead of 12).
    pub color_bounds: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self { color_bounds: true }
    }
}

/// Borrowed core columns of the table being encoded.
struct SplatColumns<'a> {
    position: [&'a [f32]; 3],
    rotation: [&'a [f32]; 4],
    scale: [&'a [f32]; 3],
    color: [&'a [f32]; 3],
    opacity: &'a [f32],
}

impl<'a> SplatColumns<'a> {
    fn new(table: &'a DataTable) -> Result<Self> {
        Ok(Self {
            position: [table.f32_column(X)?, table.f32_column(Y)?, table.f32_column(Z)?],
            rotation: [
                table.f32_column(ROTATION[0])?,
                table.f32_column(ROTATION[1])?,
                table.f32_column(ROTATION[2])?,
                table.f32_column(ROTATION[3])?,
            ],
            scale: [
                table.f32_column(SCALE[0])?,
                table.f32_column(SCALE[1])?,
                table.f32_column(SCALE[2])?,
            ],
            color: [
                table.f32_column(COLOR_DC[0])?,
                table.f32_column(COLOR_DC[1])?,
                table.f32_column(COLOR_DC[2])?,
            ],
            opacity: table.f32_column(OPACITY)?,
        })
    }

    fn position(&self, i: usize) -> [f32; 3] {
        self.position.map(|c| c[i])
    }

    fn log_scale(&self, i: usize) -> [f32; 3] {
        self.scale.map(|c| c[i].clamp(-SCALE_CLAMP, SCALE_CLAMP))
    }

    fn color(&self, i: usize) -> [f32; 3] {
        self.color.map(|c| c[i] * SH_C0 + 0.5)
    }

    fn chunk_bounds(&self, rows: std::ops::Range<usize>, color_bounds: bool) -> ChunkBounds {
        let mut position = Bounds3::new();
        let mut scale = Bounds3::new();
        let mut color = Bounds3::new();
        for i in rows {
            position.update(self.position(i));
            scale.update(self.log_scale(i));
            if color_bounds {
                color.update(self.color(i));
            }
        }
        ChunkBounds {
            position,
            scale,
            color: color_bounds.then_some(color),
        }
        .sanitized()
    }

    fn pack_splat(&self, bounds: &ChunkBounds, i: usize) -> [u32; 4] {
        let quantise = |b: &Bounds3, v: [f32; 3]| -> [f32; 3] {
            std::array::from_fn(|axis| normalize(v[axis], b.min[axis], b.max[axis]))
        };

        let color = self.color(i);
        let [r, g, b] = match &bounds.color {
            Some(range) => quantise(range, color),
            None => color,
        };

        [
            pack_vec3(quantise(&bounds.position, self.position(i))),
            pack_rotation(self.rotation.map(|c| c[i])),
            pack_vec3(quantise(&bounds.scale, self.log_scale(i))),
            pack_rgba([r, g, b, sigmoid(self.opacity[i])]),
        ]
    }
}

fn chunk_section(bounds: &[ChunkBounds], color_bounds: bool) -> Result<DataSection> {
    let mut values: Vec<Vec<f32>> = Vec::new();
    let mut push_bounds = |pick: &dyn Fn(&ChunkBounds) -> Bounds3| {
        for axis in 0..3 {
            values.push(bounds.iter().map(|b| pick(b).min[axis]).collect());
        }
        for axis in 0..3 {
            values.push(bounds.iter().map(|b| pick(b).max[axis]).collect());
        }
    };
    push_bounds(&|b| b.position);
    push_bounds(&|b| b.scale);
    if color_bounds {
        push_bounds(&|b| b.color.unwrap_or_default());
    }

    let names = CHUNK_BOUND_COLUMNS.iter().chain(CHUNK_COLOR_COLUMNS.iter());
    let mut table = DataTable::with_rows(bounds.len());
    for (name, data) in names.zip(values) {
        table.add_column(Column::from_f32(*name, data))?;
    }
    Ok(DataSection::new(CHUNK_ELEMENT, table))
}

fn sh_section(table: &DataTable) -> Result<Option<DataSection>> {
    let bands = table.sh_bands();
    if bands == 0 {
        return Ok(None);
    }

    let mut sh = DataTable::with_rows(table.num_rows());
    for i in 0..REST_COLUMN_COUNTS[bands] {
        let name = sh_rest_name(i);
        let bytes = table
            .f32_column(&name)?
            .par_iter()
            .map(|&v| pack_sh(v))
            .collect();
        sh.add_column(Column::new(name, ColumnData::UInt8(bytes)))?;
    }
    Ok(Some(DataSection::new(SH_ELEMENT, sh)))
}

/// Encodes a splat table into `chunk`, `vertex` and optional `sh` sections.
/// Rows are packed in their current order.
pub fn encode_compressed(
    table: &DataTable,
    options: &EncodeOptions,
    ctx: &ProcessContext,
) -> Result<Vec<DataSection>> {
    let columns = SplatColumns::new(table)?;
    let num_splats = table.num_rows();
    let num_chunks = num_splats.div_ceil(CHUNK_SIZE);

    let chunks: Vec<(ChunkBounds, Vec<[u32; 4]>)> = (0..num_chunks)
        .into_par_iter()
        .map(|c| {
            let rows = c * CHUNK_SIZE..((c + 1) * CHUNK_SIZE).min(num_splats);
            let bounds = columns.chunk_bounds(rows.clone(), options.color_bounds);
            let words = rows.map(|i| columns.pack_splat(&bounds, i)).collect();
            (bounds, words)
        })
        .collect();

    let bounds: Vec<ChunkBounds> = chunks.iter().map(|(b, _)| *b).collect();
    let mut packed: [Vec<u32>; 4] = std::array::from_fn(|_| Vec::with_capacity(num_splats));
    for (_, words) in &chunks {
        for word in words {
            for (column, w) in packed.iter_mut().zip(word) {
                column.push(*w);
            }
        }
    }

    let mut vertex = DataTable::with_rows(num_splats);
    for (name, data) in PACKED_COLUMNS.iter().zip(packed) {
        vertex.add_column(Column::new(*name, ColumnData::UInt32(data)))?;
    }

    let mut sections = vec![
        chunk_section(&bounds, options.color_bounds)?,
        DataSection::new(VERTEX_ELEMENT, vertex),
    ];
    if let Some(sh) = sh_section(table)? {
        sections.push(sh);
    }

    ctx.debug(&format!(
        "encoded {} splats into {} chunks",
        num_splats, num_chunks
    ));
    Ok(sections)
}
