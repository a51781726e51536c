//! Scalar helpers and the raw/display value-space conversions.
//!
//! Splat attributes are stored in optimisation space (logit opacity,
//! log scale, SH-coded colour). Filters and summaries accept and report
//! values in display space, so each such column has a forward transform
//! (raw to display) and a strictly increasing inverse.

use constants::columns::{COLOR_DC, OPACITY, SCALE};
use constants::sh::SH_C0;
use nalgebra::UnitQuaternion;

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Inverse sigmoid. Returns ±∞ at 0 and 1 rather than clamping.
pub fn logit(p: f32) -> f32 {
    -(1.0 / p - 1.0).ln()
}

/// Quaternion for Euler angles in degrees, applied about X, then Y, then Z.
pub fn quat_from_euler_degrees(euler: [f32; 3]) -> UnitQuaternion<f32> {
    let [x, y, z] = euler.map(f32::to_radians);
    UnitQuaternion::from_euler_angles(x, y, z)
}

/// Conversion between stored and display values for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSpace {
    /// Stored as is.
    Identity,
    /// Opacity, stored as a logit.
    Logit,
    /// Scale, stored as a natural log.
    Log,
    /// Colour, stored as an SH band 0 coefficient.
    ShColor,
}

impl ValueSpace {
    /// Value space of a named column.
    pub fn for_column(name: &str) -> Self {
        if name == OPACITY {
            ValueSpace::Logit
        } else if SCALE.contains(&name) {
            ValueSpace::Log
        } else if COLOR_DC.contains(&name) {
            ValueSpace::ShColor
        } else {
            ValueSpace::Identity
        }
    }

    /// Raw to display.
    pub fn forward(&self, raw: f64) -> f64 {
        match self {
            ValueSpace::Identity => raw,
            ValueSpace::Logit => 1.0 / (1.0 + (-raw).exp()),
            ValueSpace::Log => raw.exp(),
            ValueSpace::ShColor => raw * SH_C0 as f64 + 0.5,
        }
    }

    /// Display to raw. Values past the ends of the display range saturate
    /// to the matching infinity.
    pub fn inverse(&self, value: f64) -> f64 {
        match self {
            ValueSpace::Identity => value,
            ValueSpace::Logit if value <= 0.0 => f64::NEG_INFINITY,
            ValueSpace::Logit if value >= 1.0 => f64::INFINITY,
            ValueSpace::Logit => -(1.0 / value - 1.0).ln(),
            ValueSpace::Log if value <= 0.0 => f64::NEG_INFINITY,
            ValueSpace::Log => value.ln(),
            ValueSpace::ShColor => (value - 0.5) / SH_C0 as f64,
        }
    }

    /// Whether `value` is a display value this space can produce.
    pub fn contains(&self, value: f64) -> bool {
        match self {
            ValueSpace::Logit => (0.0..=1.0).contains(&value),
            ValueSpace::Log => value >= 0.0,
            ValueSpace::Identity | ValueSpace::ShColor => !value.is_nan(),
        }
    }
}
