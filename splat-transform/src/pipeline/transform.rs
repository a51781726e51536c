/// Rigid-plus-uniform-scale transform applied to every splat of a table
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use rayon::prelude::*;

use crate::error::Result;
use crate::math::quat_from_euler_degrees;
use crate::sh_rotation::ShRotation;
use crate::table::DataTable;
use constants::columns::{POSITION, ROTATION, SCALE, sh_rest_name};
use constants::sh::{CHANNELS, COEFFS_PER_CHANNEL};

/// Applied as scale, then rotation, then translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn translation(offset: [f32; 3]) -> Self {
        Self {
            translation: Vector3::from(offset),
            ..Self::default()
        }
    }

    /// Rotation from Euler angles in degrees.
    pub fn rotation(euler_degrees: [f32; 3]) -> Self {
        Self {
            rotation: quat_from_euler_degrees(euler_degrees),
            ..Self::default()
        }
    }

    pub fn uniform_scale(factor: f32) -> Self {
        Self {
            scale: factor,
            ..Self::default()
        }
    }

    fn has_rotation(&self) -> bool {
        self.rotation != UnitQuaternion::identity()
    }

    /// Transforms positions, orientations, scales and SH coefficients of
    /// `table` in place. Column groups the table lacks are skipped.
    pub fn apply(&self, table: &mut DataTable) -> Result<()> {
        if POSITION.iter().all(|name| table.has_column(name)) {
            self.apply_to_positions(table)?;
        }
        if self.has_rotation() && ROTATION.iter().all(|name| table.has_column(name)) {
            self.apply_to_rotations(table)?;
        }
        if self.scale != 1.0 {
            let log_scale = self.scale.ln();
            for name in SCALE {
                if let Some(column) = table.get_column_mut(name) {
                    column.as_f32_mut()?.par_iter_mut().for_each(|s| *s += log_scale);
                }
            }
        }
        if self.has_rotation() {
            self.apply_to_sh(table)?;
        }
        Ok(())
    }

    fn apply_to_positions(&self, table: &mut DataTable) -> Result<()> {
        let [x, y, z] = POSITION.map(|name| table.f32_column(name));
        let (x, y, z) = (x?, y?, z?);
        let moved: Vec<Vector3<f32>> = (0..table.num_rows())
            .into_par_iter()
            .map(|i| self.rotation * (Vector3::new(x[i], y[i], z[i]) * self.scale) + self.translation)
            .collect();

        for (axis, name) in POSITION.iter().enumerate() {
            let column = table.column_mut(name)?.as_f32_mut()?;
            for (v, p) in column.iter_mut().zip(&moved) {
                *v = p[axis];
            }
        }
        Ok(())
    }

    fn apply_to_rotations(&self, table: &mut DataTable) -> Result<()> {
        let [w, i, j, k] = ROTATION.map(|name| table.f32_column(name));
        let (w, i, j, k) = (w?, i?, j?, k?);
        let r = self.rotation.into_inner();
        let composed: Vec<Quaternion<f32>> = (0..table.num_rows())
            .into_par_iter()
            .map(|row| r * Quaternion::new(w[row], i[row], j[row], k[row]))
            .collect();

        for (component, name) in ROTATION.iter().enumerate() {
            let column = table.column_mut(name)?.as_f32_mut()?;
            for (v, q) in column.iter_mut().zip(&composed) {
                // nalgebra stores (i, j, k, w).
                *v = q.coords[(component + 3) % 4];
            }
        }
        Ok(())
    }

    fn apply_to_sh(&self, table: &mut DataTable) -> Result<()> {
        let bands = table.sh_bands();
        if bands == 0 {
            return Ok(());
        }
        let per_channel = COEFFS_PER_CHANNEL[bands];
        let names: Vec<String> = (0..CHANNELS * per_channel).map(sh_rest_name).collect();
        let sh_rotation = ShRotation::new(self.rotation.to_rotation_matrix().matrix());

        let rotated: Vec<Vec<f32>> = {
            let src = names
                .iter()
                .map(|name| table.f32_column(name))
                .collect::<Result<Vec<_>>>()?;
            (0..table.num_rows())
                .into_par_iter()
                .map(|row| {
                    let mut out = vec![0.0f32; names.len()];
                    let mut coeffs = [0.0f32; 15];
                    for channel in 0..CHANNELS {
                        let base = channel * per_channel;
                        for k in 0..per_channel {
                            coeffs[k] = src[base + k][row];
                        }
                        sh_rotation.apply_to(
                            &coeffs[..per_channel],
                            &mut out[base..base + per_channel],
                        );
                    }
                    out
                })
                .collect()
        };

        for (slot, name) in names.iter().enumerate() {
            let column = table.column_mut(name)?.as_f32_mut()?;
            for (v, row) in column.iter_mut().zip(&rotated) {
                *v = row[slot];
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use approx::assert_relative_eq;

    fn single_splat() -> DataTable {
        DataTable::new(vec![
            Column::from_f32("x", vec![1.0]),
            Column::from_f32("y", vec![0.0]),
            Column::from_f32("z", vec![0.0]),
            Column::from_f32("rot_0", vec![1.0]),
            Column::from_f32("rot_1", vec![0.0]),
            Column::from_f32("rot_2", vec![0.0]),
            Column::from_f32("rot_3", vec![0.0]),
            Column::from_f32("scale_0", vec![0.0]),
            Column::from_f32("scale_1", vec![0.0]),
            Column::from_f32("scale_2", vec![0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_order_is_scale_rotate_translate() {
        let mut table = single_splat();
        let transform = Transform {
            translation: Vector3::new(0.0, 0.0, 5.0),
            rotation: quat_from_euler_degrees([0.0, 0.0, 90.0]),
            scale: 2.0,
        };
        transform.apply(&mut table).unwrap();

        assert_relative_eq!(table.f32_column("x").unwrap()[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(table.f32_column("y").unwrap()[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(table.f32_column("z").unwrap()[0], 5.0, epsilon = 1e-6);
        assert_relative_eq!(table.f32_column("scale_1").unwrap()[0], 2f32.ln(), epsilon = 1e-6);
    }

    #[test]
    fn test_orientation_composes_on_the_left() {
        let mut table = single_splat();
        let r = quat_from_euler_degrees([30.0, 0.0, 0.0]);
        Transform {
            rotation: r,
            ..Transform::default()
        }
        .apply(&mut table)
        .unwrap();

        assert_relative_eq!(table.f32_column("rot_0").unwrap()[0], r.w, epsilon = 1e-6);
        assert_relative_eq!(table.f32_column("rot_1").unwrap()[0], r.i, epsilon = 1e-6);
        assert_relative_eq!(table.f32_column("rot_2").unwrap()[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sh_rotation_is_reversible() {
        let mut table = single_splat();
        let original: Vec<f32> = (0..24).map(|i| (i as f32 * 0.37).cos()).collect();
        for (i, v) in original.iter().enumerate() {
            table.add_column(Column::from_f32(sh_rest_name(i), vec![*v])).unwrap();
        }

        Transform::rotation([20.0, -35.0, 70.0]).apply(&mut table).unwrap();
        let rotated = table.f32_column("f_rest_4").unwrap()[0];
        assert!((rotated - original[4]).abs() > 1e-4);

        let inverse = quat_from_euler_degrees([20.0, -35.0, 70.0]).inverse();
        Transform {
            rotation: inverse,
            ..Transform::default()
        }
        .apply(&mut table)
        .unwrap();
        for (i, v) in original.iter().enumerate() {
            assert_relative_eq!(table.f32_column(&sh_rest_name(i)).unwrap()[0], *v, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_missing_groups_are_skipped() {
        let mut table = DataTable::new(vec![Column::from_f32("opacity", vec![0.3])]).unwrap();
        Transform::rotation([0.0, 90.0, 0.0]).apply(&mut table).unwrap();
        assert_eq!(table.f32_column("opacity").unwrap(), &[0.3]);
    }
}
