/// Gaussian splat conversion: columnar tables, packed-chunk codec, SH rotation
/// and the transform/filter pipeline.
pub mod bounds;
pub mod codec;
pub mod config;
pub mod context;
pub mod converter;
pub mod error;
pub mod math;
pub mod pipeline;
pub mod ply;
pub mod sh_rotation;
pub mod spatial_layout;
pub mod table;
pub mod visibility;

pub use context::ProcessContext;
pub use error::{Result, SplatError};
pub use table::{Column, ColumnData, DataTable, DataType};
