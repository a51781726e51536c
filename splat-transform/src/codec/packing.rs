/// Bit-level packing of quantised splat attributes into 32-bit words
use constants::codec::{COLOR_BITS, ROTATION_BITS, VEC3_BITS};
use std::f32::consts::SQRT_2;

/// Largest value of an unsigned `bits`-wide field.
fn max_value(bits: u32) -> u32 {
    (1u32 << bits) - 1
}

/// Quantise a 0-1 value; out-of-range input is clamped, NaN packs as 0.
pub fn pack_unorm(v: f32, bits: u32) -> u32 {
    let t = max_value(bits) as f32;
    (v.clamp(0.0, 1.0) * t).round() as u32
}

pub fn unpack_unorm(v: u32, bits: u32) -> f32 {
    let t = max_value(bits);
    (v & t) as f32 / t as f32
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Position of `v` within `min..max` as 0-1; zero range maps to 0.
pub fn normalize(v: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range > 0.0 { (v - min) / range } else { 0.0 }
}

/// 11/10/11-bit word: x in bits 31-21, y in 20-11, z in 10-0.
pub fn pack_vec3(v: [f32; 3]) -> u32 {
    let [bx, by, bz] = VEC3_BITS;
    (pack_unorm(v[0], bx) << (by + bz)) | (pack_unorm(v[1], by) << bz) | pack_unorm(v[2], bz)
}

pub fn unpack_vec3(word: u32) -> [f32; 3] {
    let [bx, by, bz] = VEC3_BITS;
    [
        unpack_unorm(word >> (by + bz), bx),
        unpack_unorm(word >> bz, by),
        unpack_unorm(word, bz),
    ]
}

/// Four 8-bit channels, first channel in the top byte.
pub fn pack_rgba(v: [f32; 4]) -> u32 {
    v.iter()
        .fold(0u32, |word, &c| (word << COLOR_BITS) | pack_unorm(c, COLOR_BITS))
}

pub fn unpack_rgba(word: u32) -> [f32; 4] {
    std::array::from_fn(|i| unpack_unorm(word >> (COLOR_BITS * (3 - i as u32)), COLOR_BITS))
}

/// Smallest-three quaternion word.
///
/// The top two bits hold the index of the largest-magnitude component, which
/// is dropped and rebuilt on decode. The other three follow in component
/// order, each mapped from `[-1/√2, 1/√2]` onto 10 bits.
pub fn pack_rotation(q: [f32; 4]) -> u32 {
    let len = q.iter().map(|c| c * c).sum::<f32>().sqrt();
    let q = if len > 0.0 { q.map(|c| c / len) } else { [1.0, 0.0, 0.0, 0.0] };

    let mut largest = 0;
    for i in 1..4 {
        if q[i].abs() > q[largest].abs() {
            largest = i;
        }
    }
    // Keep the dropped component non-negative.
    let sign = if q[largest] < 0.0 { -1.0 } else { 1.0 };

    let norm = SQRT_2 * 0.5;
    let mut word = largest as u32;
    for (i, &c) in q.iter().enumerate() {
        if i != largest {
            word = (word << ROTATION_BITS) | pack_unorm(c * sign * norm + 0.5, ROTATION_BITS);
        }
    }
    word
}

pub fn unpack_rotation(word: u32) -> [f32; 4] {
    let norm = 1.0 / (SQRT_2 * 0.5);
    let a = (unpack_unorm(word >> (2 * ROTATION_BITS), ROTATION_BITS) - 0.5) * norm;
    let b = (unpack_unorm(word >> ROTATION_BITS, ROTATION_BITS) - 0.5) * norm;
    let c = (unpack_unorm(word, ROTATION_BITS) - 0.5) * norm;
    let m = (1.0 - (a * a + b * b + c * c)).max(0.0).sqrt();

    match word >> (3 * ROTATION_BITS) {
        0 => [m, a, b, c],
        1 => [a, m, b, c],
        2 => [a, b, m, c],
        _ => [a, b, c, m],
    }
}

/// Stored SH byte to coefficient.
pub fn unpack_sh(byte: u8) -> f32 {
    let n = match byte {
        0 => 0.0,
        255 => 1.0,
        b => (b as f32 + 0.5) / 256.0,
    };
    (n - 0.5) * constants::codec::SH_BYTE_RANGE
}

/// Coefficient to stored SH byte.
pub fn pack_sh(v: f32) -> u8 {
    let n = v / constants::codec::SH_BYTE_RANGE + 0.5;
    (n * 256.0).floor().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_vec3_bit_layout() {
        assert_eq!(pack_vec3([1.0, 0.0, 0.0]), 0x7ff << 21);
        assert_eq!(pack_vec3([0.0, 1.0, 0.0]), 0x3ff << 11);
        assert_eq!(pack_vec3([0.0, 0.0, 1.0]), 0x7ff);
        assert_eq!(unpack_vec3(0xffff_ffff), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_vec3_error_within_half_step() {
        let v = [0.123, 0.456, 0.789];
        let back = unpack_vec3(pack_vec3(v));
        assert_abs_diff_eq!(back[0], v[0], epsilon = 0.5 / 2047.0);
        assert_abs_diff_eq!(back[1], v[1], epsilon = 0.5 / 1023.0);
        assert_abs_diff_eq!(back[2], v[2], epsilon = 0.5 / 2047.0);
    }

    #[test]
    fn test_rgba_byte_order() {
        assert_eq!(pack_rgba([1.0, 0.0, 0.0, 0.0]), 0xff00_0000);
        assert_eq!(pack_rgba([0.0, 0.0, 0.0, 1.0]), 0x0000_00ff);
        assert_eq!(unpack_rgba(0x00ff_0000), [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rotation_roundtrip_and_hemisphere() {
        let q = [0.2f32, -0.3, -0.9, 0.1];
        let len = q.iter().map(|c| c * c).sum::<f32>().sqrt();
        let q = q.map(|c| c / len);

        let word = pack_rotation(q);
        assert_eq!(word >> 30, 2);
        let back = unpack_rotation(word);
        // Largest component was negative, so the decoded quaternion is -q.
        for i in 0..4 {
            assert_abs_diff_eq!(back[i], -q[i], epsilon = 2e-3);
        }
    }

    #[test]
    fn test_rotation_identity() {
        let back = unpack_rotation(pack_rotation([1.0, 0.0, 0.0, 0.0]));
        assert_abs_diff_eq!(back[0], 1.0, epsilon = 1e-3);
        for c in &back[1..] {
            assert_abs_diff_eq!(*c, 0.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_sh_byte_mapping() {
        assert_eq!(unpack_sh(0), -4.0);
        assert_eq!(unpack_sh(255), 4.0);
        for b in 1..255u8 {
            assert_eq!(pack_sh(unpack_sh(b)), b);
        }
        assert_eq!(pack_sh(-10.0), 0);
        assert_eq!(pack_sh(10.0), 255);
        assert_abs_diff_eq!(unpack_sh(pack_sh(0.3)), 0.3, epsilon = 0.5 * 8.0 / 256.0);
    }

    #[test]
    fn test_normalize_zero_range() {
        assert_eq!(normalize(5.0, 2.0, 2.0), 0.0);
        assert_eq!(normalize(3.0, 2.0, 4.0), 0.5);
    }
}
