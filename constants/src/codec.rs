/// Packed-chunk layout constants for compressed PLY files

/// Splats sharing one set of quantisation bounds.
pub const CHUNK_SIZE: usize = 256;

pub const CHUNK_ELEMENT: &str = "chunk";
pub const VERTEX_ELEMENT: &str = "vertex";
pub const SH_ELEMENT: &str = "sh";

/// Chunk bound columns, position and log-scale.
pub const CHUNK_BOUND_COLUMNS: [&str; 12] = [
    "min_x",
    "min_y",
    "min_z",
    "max_x",
    "max_y",
    "max_z",
    "min_scale_x",
    "min_scale_y",
    "min_scale_z",
    "max_scale_x",
    "max_scale_y",
    "max_scale_z",
];

/// Optional chunk bound columns for colour.
pub const CHUNK_COLOR_COLUMNS: [&str; 6] = ["min_r", "min_g", "min_b", "max_r", "max_g", "max_b"];

pub const PACKED_POSITION: &str = "packed_position";
pub const PACKED_ROTATION: &str = "packed_rotation";
pub const PACKED_SCALE: &str = "packed_scale";
pub const PACKED_COLOR: &str = "packed_color";

pub const PACKED_COLUMNS: [&str; 4] = [PACKED_POSITION, PACKED_ROTATION, PACKED_SCALE, PACKED_COLOR];

/// Bit widths of the x, y and z fields in position and scale words.
pub const VEC3_BITS: [u32; 3] = [11, 10, 11];

/// Bits per smallest-three quaternion component.
pub const ROTATION_BITS: u32 = 10;

/// Bits per colour channel.
pub const COLOR_BITS: u32 = 8;

/// Log-scale values are clamped to this range before quantisation.
pub const SCALE_CLAMP: f32 = 20.0;

/// Range covered by quantised SH bytes, centred on zero.
pub const SH_BYTE_RANGE: f32 = 8.0;

/// Valid SH byte column counts in a packed file.
pub const SH_COLUMN_COUNTS: [usize; 3] = [9, 24, 45];
