/// Splat column names shared by every reader, writer and pipeline stage.
/// Renaming any of these breaks compatibility with existing files.

pub const X: &str = "x";
pub const Y: &str = "y";
pub const Z: &str = "z";

pub const POSITION: [&str; 3] = [X, Y, Z];

/// Quaternion stored as (w, x, y, z).
pub const ROTATION: [&str; 4] = ["rot_0", "rot_1", "rot_2", "rot_3"];

/// Log-space scale per axis.
pub const SCALE: [&str; 3] = ["scale_0", "scale_1", "scale_2"];

/// SH band 0 colour term per channel.
pub const COLOR_DC: [&str; 3] = ["f_dc_0", "f_dc_1", "f_dc_2"];

/// Opacity in logit space.
pub const OPACITY: &str = "opacity";

pub const LOD: &str = "lod";

/// Marks rows holding environment/background data rather than a real LOD level.
pub const ENVIRONMENT_LOD: f32 = -1.0;

pub const SH_REST_PREFIX: &str = "f_rest_";

/// Suffix that makes value filters compare raw stored values.
pub const RAW_SUFFIX: &str = "_raw";

/// Name of the n-th higher-order SH coefficient column.
pub fn sh_rest_name(index: usize) -> String {
    format!("{}{}", SH_REST_PREFIX, index)
}
