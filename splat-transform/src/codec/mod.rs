//! Packed-chunk splat codec, the layout used by `.compressed.ply` files.
//!
//! Splats are grouped into chunks of 256. Each chunk stores min/max bounds
//! for position, log-scale and optionally colour, and every splat is reduced
//! to four 32-bit words quantised against its chunk's bounds:
//!
//! | column            | layout                                   |
//! |-------------------|------------------------------------------|
//! | `packed_position` | x 11 bits, y 10 bits, z 11 bits          |
//! | `packed_rotation` | 2-bit selector, three 10-bit components  |
//! | `packed_scale`    | same as position, over log-scale         |
//! | `packed_color`    | r, g, b, alpha as 8-bit fields           |
//!
//! Higher-order SH coefficients go in an optional `sh` element of one byte
//! per coefficient.

mod decode;
mod encode;
pub mod packing;

pub use decode::decode_compressed;
pub use encode::{EncodeOptions, encode_compressed};

use crate::bounds::Bounds3;
use crate::ply::DataSection;
use crate::table::{DataTable, DataType};
use constants::codec::{
    CHUNK_BOUND_COLUMNS, CHUNK_COLOR_COLUMNS, CHUNK_ELEMENT, CHUNK_SIZE, PACKED_COLUMNS,
    SH_COLUMN_COUNTS, SH_ELEMENT, VERTEX_ELEMENT,
};
use constants::columns::{COLOR_DC, OPACITY, ROTATION, SCALE, X, Y, Z, sh_rest_name};

/// Columns produced by decoding, and required for encoding, in output order.
pub const CORE_COLUMNS: [&str; 14] = [
    X,
    Y,
    Z,
    COLOR_DC[0],
    COLOR_DC[1],
    COLOR_DC[2],
    OPACITY,
    ROTATION[0],
    ROTATION[1],
    ROTATION[2],
    ROTATION[3],
    SCALE[0],
    SCALE[1],
    SCALE[2],
];

pub(crate) fn find_section<'a>(sections: &'a [DataSection], name: &str) -> Option<&'a DataTable> {
    sections.iter().find(|s| s.name == name).map(|s| &s.table)
}

fn all_columns_typed(table: &DataTable, names: &[&str], data_type: DataType) -> bool {
    names
        .iter()
        .all(|name| table.get_column(name).is_some_and(|c| c.data_type() == data_type))
}

/// True when `sections` are exactly a packed-chunk layout. Anything else,
/// including near misses, is reported as `false` rather than an error.
pub fn is_compressed(sections: &[DataSection]) -> bool {
    let expected_names: &[&str] = match sections.len() {
        2 => &[CHUNK_ELEMENT, VERTEX_ELEMENT],
        3 => &[CHUNK_ELEMENT, VERTEX_ELEMENT, SH_ELEMENT],
        _ => return false,
    };
    if !expected_names
        .iter()
        .all(|name| sections.iter().filter(|s| s.name == *name).count() == 1)
    {
        return false;
    }

    let (Some(chunk), Some(vertex)) = (
        find_section(sections, CHUNK_ELEMENT),
        find_section(sections, VERTEX_ELEMENT),
    ) else {
        return false;
    };

    let chunk_ok = match chunk.num_columns() {
        12 => all_columns_typed(chunk, &CHUNK_BOUND_COLUMNS, DataType::Float32),
        18 => {
            all_columns_typed(chunk, &CHUNK_BOUND_COLUMNS, DataType::Float32)
                && all_columns_typed(chunk, &CHUNK_COLOR_COLUMNS, DataType::Float32)
        }
        _ => false,
    };
    if !chunk_ok {
        return false;
    }

    if vertex.num_columns() != PACKED_COLUMNS.len()
        || !all_columns_typed(vertex, &PACKED_COLUMNS, DataType::UInt32)
    {
        return false;
    }
    if vertex.num_rows().div_ceil(CHUNK_SIZE) != chunk.num_rows() {
        return false;
    }

    match find_section(sections, SH_ELEMENT) {
        None => true,
        Some(sh) => {
            let count = sh.num_columns();
            SH_COLUMN_COUNTS.contains(&count)
                && sh.num_rows() == vertex.num_rows()
                && (0..count).all(|i| {
                    sh.get_column(&sh_rest_name(i))
                        .is_some_and(|c| c.data_type() == DataType::UInt8)
                })
        }
    }
}

/// Quantisation bounds of one chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ChunkBounds {
    pub position: Bounds3,
    pub scale: Bounds3,
    pub color: Option<Bounds3>,
}

impl ChunkBounds {
    /// Axes that saw no finite value collapse to `[0, 0]`.
    pub fn sanitized(self) -> Self {
        Self {
            position: collapse_empty_axes(self.position),
            scale: collapse_empty_axes(self.scale),
            color: self.color.map(collapse_empty_axes),
        }
    }
}

fn collapse_empty_axes(mut bounds: Bounds3) -> Bounds3 {
    for axis in 0..3 {
        if bounds.min[axis] > bounds.max[axis] {
            bounds.min[axis] = 0.0;
            bounds.max[axis] = 0.0;
        }
    }
    bounds
}
