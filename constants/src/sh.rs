/// Spherical harmonic constants

/// Normalisation of the band 0 basis function.
pub const SH_C0: f32 = 0.28209479177387814;

/// Highest SH band handled anywhere in the pipeline.
pub const MAX_SH_BANDS: usize = 3;

/// Coefficients per colour channel for 0..=3 bands.
pub const COEFFS_PER_CHANNEL: [usize; 4] = [0, 3, 8, 15];

/// Total `f_rest_*` columns for 0..=3 bands (three colour channels).
pub const REST_COLUMN_COUNTS: [usize; 4] = [0, 9, 24, 45];

pub const CHANNELS: usize = 3;
