/// Z-order (Morton) row ordering for spatial locality
use crate::bounds::Bounds3;
use crate::error::Result;
use crate::table::DataTable;
use constants::codec::CHUNK_SIZE;
use constants::columns::{X, Y, Z};
use rayon::prelude::*;

/// Bits per axis of the quantisation grid.
pub const MORTON_BITS: u32 = 10;

/// Rows sharing one code beyond this count are re-sorted against their own bounds.
const REFINE_THRESHOLD: usize = CHUNK_SIZE;

/// Recursion limit for re-sorting runs of equal codes.
const MAX_REFINE_DEPTH: usize = 8;

/// Morton encoding for 3D grid coordinates
/// Interleaves x into bit 0, y into bit 1 and z into bit 2 of each triple.
pub fn morton_encode_3d(x: u32, y: u32, z: u32) -> u32 {
    let mut result = 0u32;
    for i in 0..MORTON_BITS {
        result |= ((x >> i) & 1) << (3 * i);
        result |= ((y >> i) & 1) << (3 * i + 1);
        result |= ((z >> i) & 1) << (3 * i + 2);
    }
    result
}

/// Grid cell of `v` along `axis`; non-finite values fall into cell 0.
fn quantize(bounds: &Bounds3, axis: usize, v: f32) -> u32 {
    let max_cell = ((1u32 << MORTON_BITS) - 1) as f32;
    let cell = (bounds.normalize(axis, v) * (max_cell + 1.0)).floor();
    if cell.is_finite() {
        cell.clamp(0.0, max_cell) as u32
    } else {
        0
    }
}

/// Row permutation ordering the table by ascending Morton code of position.
/// Equal codes keep their original relative order.
pub fn morton_order(table: &DataTable) -> Result<Vec<usize>> {
    let x = table.f32_column(X)?;
    let y = table.f32_column(Y)?;
    let z = table.f32_column(Z)?;

    let mut rows: Vec<usize> = (0..table.num_rows()).collect();
    sort_rows(x, y, z, &mut rows, 0);
    Ok(rows)
}

fn sort_rows(x: &[f32], y: &[f32], z: &[f32], rows: &mut [usize], depth: usize) {
    let bounds = Bounds3::of_rows(x, y, z, rows);
    if bounds.is_empty() || bounds.dimensions().iter().all(|&d| d == 0.0) {
        return;
    }

    let mut keyed: Vec<(u32, usize)> = rows
        .par_iter()
        .map(|&i| {
            let code = morton_encode_3d(
                quantize(&bounds, 0, x[i]),
                quantize(&bounds, 1, y[i]),
                quantize(&bounds, 2, z[i]),
            );
            (code, i)
        })
        .collect();
    keyed.par_sort_by_key(|&(code, _)| code);

    for (slot, &(_, i)) in rows.iter_mut().zip(&keyed) {
        *slot = i;
    }

    if depth >= MAX_REFINE_DEPTH {
        return;
    }

    // Crowded cells get a finer grid of their own.
    let mut start = 0;
    while start < keyed.len() {
        let code = keyed[start].0;
        let end = start + keyed[start..].iter().take_while(|(c, _)| *c == code).count();
        if end - start > REFINE_THRESHOLD {
            sort_rows(x, y, z, &mut rows[start..end], depth + 1);
        }
        start = end;
    }
}
