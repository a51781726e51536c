//! Rotation of real spherical harmonic coefficients, bands 1 to 3.
//!
//! Rotating a splat rotates its view-dependent colour with it. For a rotation
//! `R`, band `l` coefficients transform by a `(2l+1)²` matrix. Band 1 is `R`
//! itself, permuted into the real-SH axis order (y, z, x). Bands 2 and 3
//! follow from the Ivanic–Ruedenberg recurrence, which expresses every entry
//! of band `l` as a fixed combination of band 1 and band `l-1` entries
//! weighted by √ rational coefficients (√(3/2), √(1/3), √(2/3), ...).
//!
//! The 3DGS basis includes the Condon–Shortley phase `(-1)^m`, so each entry
//! is finally multiplied by `(-1)^(m+n)`.

use nalgebra::Matrix3;

/// Square rotation block for one SH band.
#[derive(Debug, Clone, PartialEq)]
struct BandMatrix {
    band: usize,
    data: Vec<f32>,
}

impl BandMatrix {
    fn zeros(band: usize) -> Self {
        let dim = 2 * band + 1;
        Self {
            band,
            data: vec![0.0; dim * dim],
        }
    }

    fn dim(&self) -> usize {
        2 * self.band + 1
    }

    /// Entry for orders `m`, `n` in `-l..=l`.
    fn at(&self, m: i32, n: i32) -> f32 {
        let l = self.band as i32;
        self.data[((m + l) as usize) * self.dim() + (n + l) as usize]
    }

    fn set(&mut self, m: i32, n: i32, value: f32) {
        let l = self.band as i32;
        let dim = self.dim();
        self.data[((m + l) as usize) * dim + (n + l) as usize] = value;
    }

    /// `dst = self * src`, both of length `dim`.
    fn mul_vec(&self, src: &[f32], dst: &mut [f32]) {
        let dim = self.dim();
        for (i, out) in dst.iter_mut().enumerate().take(dim) {
            let row = &self.data[i * dim..(i + 1) * dim];
            *out = row.iter().zip(src).map(|(a, b)| a * b).sum();
        }
    }
}

/// Precomputed SH rotation for one rotation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ShRotation {
    bands: [BandMatrix; 3],
}

impl ShRotation {
    pub fn new(rotation: &Matrix3<f32>) -> Self {
        // Real-SH band 1 order is (y, z, x).
        const AXIS: [usize; 3] = [1, 2, 0];

        let mut band1 = BandMatrix::zeros(1);
        for m in -1..=1i32 {
            for n in -1..=1i32 {
                let value = rotation[(AXIS[(m + 1) as usize], AXIS[(n + 1) as usize])];
                band1.set(m, n, value);
            }
        }

        let band2 = next_band(&band1, &band1);
        let band3 = next_band(&band1, &band2);

        let mut bands = [band1, band2, band3];
        for band in &mut bands {
            apply_condon_shortley(band);
        }
        Self { bands }
    }

    pub fn identity() -> Self {
        Self::new(&Matrix3::identity())
    }

    /// Rotates 3, 8 or 15 coefficients (bands 1, 1–2 or 1–3) of one colour
    /// channel in place. Bands beyond the input length are left alone.
    pub fn apply(&self, coeffs: &mut [f32]) {
        let mut snapshot = [0.0f32; 15];
        let len = coeffs.len().min(15);
        snapshot[..len].copy_from_slice(&coeffs[..len]);
        self.apply_to(&snapshot[..len], &mut coeffs[..len]);
    }

    /// Rotates `src` into `dst`; the slices must not alias.
    pub fn apply_to(&self, src: &[f32], dst: &mut [f32]) {
        let mut offset = 0;
        for band in &self.bands {
            let dim = band.dim();
            if src.len() < offset + dim || dst.len() < offset + dim {
                break;
            }
            band.mul_vec(&src[offset..offset + dim], &mut dst[offset..offset + dim]);
            offset += dim;
        }
    }
}

fn apply_condon_shortley(band: &mut BandMatrix) {
    let l = band.band as i32;
    for m in -l..=l {
        for n in -l..=l {
            if (m + n).rem_euclid(2) == 1 {
                band.set(m, n, -band.at(m, n));
            }
        }
    }
}

/// Band `prev.band + 1` from band 1 and the previous band.
fn next_band(r1: &BandMatrix, prev: &BandMatrix) -> BandMatrix {
    let l = prev.band as i32 + 1;
    let mut out = BandMatrix::zeros(l as usize);

    // P(i, a, b) from the recurrence; `i` indexes band 1, `a`/`b` the previous band.
    let p = |i: i32, a: i32, b: i32| -> f32 {
        if b == l {
            r1.at(i, 1) * prev.at(a, l - 1) - r1.at(i, -1) * prev.at(a, -l + 1)
        } else if b == -l {
            r1.at(i, 1) * prev.at(a, -l + 1) + r1.at(i, -1) * prev.at(a, l - 1)
        } else {
            r1.at(i, 0) * prev.at(a, b)
        }
    };

    for m in -l..=l {
        for n in -l..=l {
            let d = if m == 0 { 1.0f32 } else { 0.0 };
            let am = m.abs();
            let denom = if n.abs() == l {
                ((2 * l) * (2 * l - 1)) as f32
            } else {
                ((l + n) * (l - n)) as f32
            };

            let u = (((l + m) * (l - m)) as f32 / denom).sqrt();
            let v = 0.5 * ((1.0 + d) * ((l + am - 1) * (l + am)) as f32 / denom).sqrt() * (1.0 - 2.0 * d);
            let w = -0.5 * (((l - am - 1) * (l - am)) as f32 / denom).sqrt() * (1.0 - d);

            let mut value = 0.0;
            if u != 0.0 {
                value += u * p(0, m, n);
            }
            if v != 0.0 {
                let term_v = if m == 0 {
                    p(1, 1, n) + p(-1, -1, n)
                } else if m > 0 {
                    let d1 = if m == 1 { 1.0f32 } else { 0.0 };
                    p(1, m - 1, n) * (1.0 + d1).sqrt() - p(-1, -m + 1, n) * (1.0 - d1)
                } else {
                    let d1 = if m == -1 { 1.0f32 } else { 0.0 };
                    p(1, m + 1, n) * (1.0 - d1) + p(-1, -m - 1, n) * (1.0 + d1).sqrt()
                };
                value += v * term_v;
            }
            if w != 0.0 {
                let term_w = if m > 0 {
                    p(1, m + 1, n) + p(-1, -m - 1, n)
                } else {
                    p(1, m - 1, n) - p(-1, -m + 1, n)
                };
                value += w * term_w;
            }
            out.set(m, n, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quat_from_euler_degrees;
    use approx::assert_abs_diff_eq;

    const SH_C1: f32 = 0.4886025119029199;
    const SH_C2: [f32; 5] = [
        1.0925484305920792,
        -1.0925484305920792,
        0.31539156525252005,
        -1.0925484305920792,
        0.5462742152960396,
    ];
    const SH_C3: [f32; 7] = [
        -0.5900435899266435,
        2.890611442640554,
        -0.4570457994644658,
        0.3731763325901154,
        -0.4570457994644658,
        1.445305721320277,
        -0.5900435899266435,
    ];

    /// 3DGS basis functions of bands 1 to 3 for a unit direction.
    fn basis(d: [f32; 3]) -> [f32; 15] {
        let [x, y, z] = d;
        let (xx, yy, zz) = (x * x, y * y, z * z);
        [
            -SH_C1 * y,
            SH_C1 * z,
            -SH_C1 * x,
            SH_C2[0] * x * y,
            SH_C2[1] * y * z,
            SH_C2[2] * (2.0 * zz - xx - yy),
            SH_C2[3] * x * z,
            SH_C2[4] * (xx - yy),
            SH_C3[0] * y * (3.0 * xx - yy),
            SH_C3[1] * x * y * z,
            SH_C3[2] * y * (4.0 * zz - xx - yy),
            SH_C3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy),
            SH_C3[4] * x * (4.0 * zz - xx - yy),
            SH_C3[5] * z * (xx - yy),
            SH_C3[6] * x * (xx - 3.0 * yy),
        ]
    }

    fn eval(coeffs: &[f32; 15], d: [f32; 3]) -> f32 {
        coeffs.iter().zip(basis(d)).map(|(c, b)| c * b).sum()
    }

    fn sample_coeffs() -> [f32; 15] {
        [
            0.3, -0.2, 0.5, 0.1, -0.4, 0.25, 0.05, -0.3, 0.2, -0.1, 0.15, 0.35, -0.25, 0.4, -0.05,
        ]
    }

    #[test]
    fn test_identity_leaves_coefficients() {
        let rot = ShRotation::identity();
        let mut coeffs = sample_coeffs();
        rot.apply(&mut coeffs);
        for (a, b) in coeffs.iter().zip(sample_coeffs()) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rotation_then_inverse_restores() {
        let q = quat_from_euler_degrees([30.0, -70.0, 115.0]);
        let r = q.to_rotation_matrix().into_inner();
        let forward = ShRotation::new(&r);
        let backward = ShRotation::new(&r.transpose());

        let mut coeffs = sample_coeffs();
        forward.apply(&mut coeffs);
        backward.apply(&mut coeffs);
        for (a, b) in coeffs.iter().zip(sample_coeffs()) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_rotated_colour_follows_direction() {
        let q = quat_from_euler_degrees([17.0, -63.0, 114.0]);
        let r = q.to_rotation_matrix().into_inner();
        let rot = ShRotation::new(&r);

        let original = sample_coeffs();
        let mut rotated = original;
        rot.apply(&mut rotated);

        let directions = [[0.0, 0.0, 1.0], [0.6, 0.0, 0.8], [-0.48, 0.6, 0.64], [0.0, -1.0, 0.0]];
        for d in directions {
            // Colour seen along d after rotating equals colour seen along Rᵀd before.
            let back = r.transpose() * nalgebra::Vector3::from(d);
            let expected = eval(&original, [back.x, back.y, back.z]);
            assert_abs_diff_eq!(eval(&rotated, d), expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_short_inputs_rotate_present_bands_only() {
        let r = quat_from_euler_degrees([0.0, 0.0, 90.0])
            .to_rotation_matrix()
            .into_inner();
        let rot = ShRotation::new(&r);

        let full = {
            let mut c = sample_coeffs();
            rot.apply(&mut c);
            c
        };
        let mut band1 = [0.3f32, -0.2, 0.5];
        rot.apply(&mut band1);
        for i in 0..3 {
            assert_abs_diff_eq!(band1[i], full[i], epsilon = 1e-6);
        }

        let mut bands12: Vec<f32> = sample_coeffs()[..8].to_vec();
        rot.apply(&mut bands12);
        for i in 0..8 {
            assert_abs_diff_eq!(bands12[i], full[i], epsilon = 1e-6);
        }
    }
}
