/// Packed-chunk layout to a plain splat table
use rayon::prelude::*;

use super::packing::{lerp, unpack_rgba, unpack_rotation, unpack_sh, unpack_vec3};
use super::{CORE_COLUMNS, ChunkBounds, find_section, is_compressed};
use crate::bounds::Bounds3;
use crate::context::ProcessContext;
use crate::error::{Result, SplatError};
use crate::math::logit;
use crate::ply::DataSection;
use crate::table::{Column, DataTable};
use constants::codec::{
    CHUNK_BOUND_COLUMNS, CHUNK_COLOR_COLUMNS, CHUNK_ELEMENT, CHUNK_SIZE, PACKED_COLOR,
    PACKED_POSITION, PACKED_ROTATION, PACKED_SCALE, SH_ELEMENT, VERTEX_ELEMENT,
};
use constants::sh::SH_C0;

fn read_chunk_bounds(chunk: &DataTable) -> Result<Vec<ChunkBounds>> {
    let bound_columns = CHUNK_BOUND_COLUMNS
        .iter()
        .map(|name| chunk.f32_column(name))
        .collect::<Result<Vec<_>>>()?;
    let color_columns = if chunk.has_column(CHUNK_COLOR_COLUMNS[0]) {
        Some(
            CHUNK_COLOR_COLUMNS
                .iter()
                .map(|name| chunk.f32_column(name))
                .collect::<Result<Vec<_>>>()?,
        )
    } else {
        None
    };

    let bounds_at = |columns: &[&[f32]], offset: usize, c: usize| Bounds3 {
        min: std::array::from_fn(|axis| columns[offset + axis][c]),
        max: std::array::from_fn(|axis| columns[offset + 3 + axis][c]),
    };

    Ok((0..chunk.num_rows())
        .map(|c| ChunkBounds {
            position: bounds_at(&bound_columns, 0, c),
            scale: bounds_at(&bound_columns, 6, c),
            color: color_columns.as_deref().map(|cols| bounds_at(cols, 0, c)),
        })
        .collect())
}

fn decode_splat(bounds: &ChunkBounds, words: [u32; 4]) -> [f32; 14] {
    let [position, rotation, scale, color] = words;

    let p = unpack_vec3(position);
    let s = unpack_vec3(scale);
    let q = unpack_rotation(rotation);
    let rgba = unpack_rgba(color);

    let at = |b: &Bounds3, axis: usize, t: f32| lerp(b.min[axis], b.max[axis], t);
    let channel = |axis: usize| match &bounds.color {
        Some(color) => at(color, axis, rgba[axis]),
        None => rgba[axis],
    };

    [
        at(&bounds.position, 0, p[0]),
        at(&bounds.position, 1, p[1]),
        at(&bounds.position, 2, p[2]),
        (channel(0) - 0.5) / SH_C0,
        (channel(1) - 0.5) / SH_C0,
        (channel(2) - 0.5) / SH_C0,
        logit(rgba[3]),
        q[0],
        q[1],
        q[2],
        q[3],
        at(&bounds.scale, 0, s[0]),
        at(&bounds.scale, 1, s[1]),
        at(&bounds.scale, 2, s[2]),
    ]
}

/// Decodes a packed-chunk layout into a splat table with the core columns
/// followed by any `f_rest_*` columns.
pub fn decode_compressed(
    sections: &[DataSection],
    source_name: &str,
    ctx: &ProcessContext,
) -> Result<DataTable> {
    if !is_compressed(sections) {
        return Err(SplatError::malformed(
            source_name,
            "sections do not form a packed-chunk layout",
        ));
    }
    let (Some(chunk), Some(vertex)) = (
        find_section(sections, CHUNK_ELEMENT),
        find_section(sections, VERTEX_ELEMENT),
    ) else {
        return Err(SplatError::malformed(source_name, "missing chunk or vertex element"));
    };

    let bounds = read_chunk_bounds(chunk)?;
    let position = vertex.column(PACKED_POSITION)?.as_u32()?;
    let rotation = vertex.column(PACKED_ROTATION)?.as_u32()?;
    let scale = vertex.column(PACKED_SCALE)?.as_u32()?;
    let color = vertex.column(PACKED_COLOR)?.as_u32()?;

    let num_splats = vertex.num_rows();
    let splats: Vec<[f32; 14]> = (0..num_splats)
        .into_par_iter()
        .map(|i| {
            decode_splat(
                &bounds[i / CHUNK_SIZE],
                [position[i], rotation[i], scale[i], color[i]],
            )
        })
        .collect();

    let mut values: Vec<Vec<f32>> = (0..CORE_COLUMNS.len())
        .map(|_| Vec::with_capacity(num_splats))
        .collect();
    for splat in &splats {
        for (column, v) in values.iter_mut().zip(splat) {
            column.push(*v);
        }
    }

    let mut table = DataTable::with_rows(num_splats);
    for (name, data) in CORE_COLUMNS.iter().zip(values) {
        table.add_column(Column::from_f32(*name, data))?;
    }

    if let Some(sh) = find_section(sections, SH_ELEMENT) {
        for column in sh.columns() {
            let bytes = column.as_u8()?;
            let coeffs = bytes.par_iter().map(|&b| unpack_sh(b)).collect();
            table.add_column(Column::from_f32(column.name.clone(), coeffs))?;
        }
    }

    ctx.debug(&format!(
        "decoded {} splats from {} chunks in '{}'",
        num_splats,
        bounds.len(),
        source_name
    ));
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::packing::{pack_rgba, pack_rotation, pack_vec3};
    use crate::table::ColumnData;
    use approx::assert_abs_diff_eq;

    fn single_splat(position: [f32; 3], rgba: [f32; 4], with_color: bool) -> Vec<DataSection> {
        let mut chunk_values: Vec<(&str, f32)> = vec![
            ("min_x", -1.0),
            ("min_y", 0.0),
            ("min_z", 2.0),
            ("max_x", 1.0),
            ("max_y", 4.0),
            ("max_z", 2.0),
            ("min_scale_x", -3.0),
            ("min_scale_y", -3.0),
            ("min_scale_z", -3.0),
            ("max_scale_x", 1.0),
            ("max_scale_y", 1.0),
            ("max_scale_z", 1.0),
        ];
        if with_color {
            chunk_values.extend([
                ("min_r", 0.0),
                ("min_g", 0.0),
                ("min_b", 0.0),
                ("max_r", 2.0),
                ("max_g", 2.0),
                ("max_b", 2.0),
            ]);
        }
        let chunk = DataTable::new(
            chunk_values
                .into_iter()
                .map(|(n, v)| Column::from_f32(n, vec![v]))
                .collect(),
        )
        .unwrap();
        let vertex = DataTable::new(vec![
            Column::new("packed_position", ColumnData::UInt32(vec![pack_vec3(position)])),
            Column::new(
                "packed_rotation",
                ColumnData::UInt32(vec![pack_rotation([1.0, 0.0, 0.0, 0.0])]),
            ),
            Column::new("packed_scale", ColumnData::UInt32(vec![pack_vec3([0.75; 3])])),
            Column::new("packed_color", ColumnData::UInt32(vec![pack_rgba(rgba)])),
        ])
        .unwrap();
        vec![
            DataSection::new("chunk", chunk),
            DataSection::new("vertex", vertex),
        ]
    }

    #[test]
    fn test_decodes_into_chunk_bounds() {
        let sections = single_splat([0.5, 0.25, 1.0], [0.5, 0.5, 0.5, 1.0], false);
        let table = decode_compressed(&sections, "test", &ProcessContext::silent()).unwrap();

        assert_eq!(table.column_names().collect::<Vec<_>>(), CORE_COLUMNS.to_vec());
        assert_abs_diff_eq!(table.f32_column("x").unwrap()[0], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(table.f32_column("y").unwrap()[0], 1.0, epsilon = 1e-2);
        // Zero-extent axis decodes to its bound.
        assert_eq!(table.f32_column("z").unwrap()[0], 2.0);
        assert_abs_diff_eq!(table.f32_column("scale_0").unwrap()[0], 0.0, epsilon = 1e-2);
        assert_abs_diff_eq!(table.f32_column("rot_0").unwrap()[0], 1.0, epsilon = 1e-3);
        assert_eq!(table.f32_column("opacity").unwrap()[0], f32::INFINITY);
    }

    #[test]
    fn test_colour_uses_bounds_when_present() {
        let rgba = [1.0, 0.0, 0.5, 0.0];
        let plain = decode_compressed(&single_splat([0.0; 3], rgba, false), "a", &ProcessContext::silent()).unwrap();
        let ranged = decode_compressed(&single_splat([0.0; 3], rgba, true), "b", &ProcessContext::silent()).unwrap();

        assert_abs_diff_eq!(plain.f32_column("f_dc_0").unwrap()[0], 0.5 / SH_C0, epsilon = 1e-4);
        assert_abs_diff_eq!(ranged.f32_column("f_dc_0").unwrap()[0], 1.5 / SH_C0, epsilon = 1e-4);
        assert_abs_diff_eq!(ranged.f32_column("f_dc_1").unwrap()[0], -0.5 / SH_C0, epsilon = 1e-4);
        assert_eq!(plain.f32_column("opacity").unwrap()[0], f32::NEG_INFINITY);
    }

    #[test]
    fn test_sh_bytes_become_float_columns() {
        let mut sections = single_splat([0.0; 3], [0.0; 4], false);
        let sh = DataTable::new(
            (0..9)
                .map(|i| Column::new(format!("f_rest_{i}"), ColumnData::UInt8(vec![if i == 0 { 255 } else { 0 }])))
                .collect(),
        )
        .unwrap();
        sections.push(DataSection::new("sh", sh));

        let table = decode_compressed(&sections, "sh", &ProcessContext::silent()).unwrap();
        assert_eq!(table.num_columns(), 14 + 9);
        assert_eq!(table.f32_column("f_rest_0").unwrap()[0], 4.0);
        assert_eq!(table.f32_column("f_rest_8").unwrap()[0], -4.0);
        assert_eq!(table.sh_bands(), 1);
    }

    #[test]
    fn test_rejects_non_packed_sections() {
        let vertex = DataTable::new(vec![Column::from_f32("x", vec![1.0])]).unwrap();
        let result = decode_compressed(&[DataSection::new("vertex", vertex)], "plain.ply", &ProcessContext::silent());
        assert!(matches!(result, Err(SplatError::MalformedInput { .. })));
    }
}
