/// Splat converter orchestrating reading, processing and writing.
use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::codec::{EncodeOptions, decode_compressed, encode_compressed, is_compressed};
use crate::config::{InputSpec, PipelineConfig};
use crate::context::{ProcessContext, SilentProgress};
use crate::error::{Result, SplatError};
use crate::pipeline::process_data_table;
use crate::ply::{DataSection, PlyData, ply_to_bytes, read_ply};
use crate::spatial_layout::morton_order;
use crate::table::{DataTable, combine};
use constants::codec::VERTEX_ELEMENT;
use constants::columns::{ENVIRONMENT_LOD, LOD};

const COMPRESSED_SUFFIX: &str = ".compressed.ply";
const PLY_SUFFIX: &str = ".ply";
const ENVIRONMENT_INFIX: &str = ".env";

/// Output container, chosen from the output file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `*.compressed.ply`, packed-chunk layout.
    CompressedPly,
    /// `*.ply`, one plain `vertex` element.
    Ply,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = file_name(path).to_lowercase();
        if name.ends_with(COMPRESSED_SUFFIX) {
            Ok(OutputFormat::CompressedPly)
        } else if name.ends_with(PLY_SUFFIX) {
            Ok(OutputFormat::Ply)
        } else {
            Err(SplatError::config(format!(
                "unsupported output format '{}'",
                path.display()
            )))
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            OutputFormat::CompressedPly => COMPRESSED_SUFFIX,
            OutputFormat::Ply => PLY_SUFFIX,
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Sibling path for environment rows: `scene.ply` becomes `scene.env.ply`.
pub fn environment_path(path: &Path, format: OutputFormat) -> PathBuf {
    let name = file_name(path);
    let suffix = format.suffix();
    let stem = &name[..name.len().saturating_sub(suffix.len())];
    path.with_file_name(format!("{}{}{}", stem, ENVIRONMENT_INFIX, &name[stem.len()..]))
}

/// Splat table from the sections of a PLY file: packed layouts are decoded,
/// anything else must carry a plain `vertex` element.
pub fn read_splat_sections(
    sections: &[DataSection],
    source_name: &str,
    ctx: &ProcessContext,
) -> Result<DataTable> {
    if is_compressed(sections) {
        return decode_compressed(sections, source_name, ctx);
    }
    sections
        .iter()
        .find(|s| s.name == VERTEX_ELEMENT)
        .map(|s| s.table.clone())
        .ok_or_else(|| SplatError::malformed(source_name, "no vertex element"))
}

/// Serialises a table in `format` to bytes.
pub fn write_splat_bytes(
    table: &DataTable,
    format: OutputFormat,
    options: &EncodeOptions,
    ctx: &ProcessContext,
) -> Result<Vec<u8>> {
    let data = match format {
        OutputFormat::CompressedPly => {
            let mut ordered = table.clone();
            let order = morton_order(&ordered)?;
            ordered.permute_rows_in_place(&order)?;
            PlyData {
                comments: vec!["Generated by splat-transform".to_string()],
                sections: encode_compressed(&ordered, options, ctx)?,
            }
        }
        OutputFormat::Ply => PlyData {
            comments: vec!["Generated by splat-transform".to_string()],
            sections: vec![DataSection::new(VERTEX_ELEMENT, table.clone())],
        },
    };
    ply_to_bytes(&data)
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_file_name(format!(".{}.tmp", file_name(path)))
}

/// Writes every output through a temporary sibling, renaming only once all
/// of them are staged. On failure no output from this run is left behind.
fn write_outputs(outputs: &[(&Path, &[u8])]) -> Result<()> {
    let temps: Vec<PathBuf> = outputs.iter().map(|(path, _)| temp_path(path)).collect();
    let discard = |paths: &[PathBuf]| {
        for path in paths {
            let _ = fs::remove_file(path);
        }
    };

    for (i, (path, bytes)) in outputs.iter().enumerate() {
        if let Err(e) = fs::write(&temps[i], bytes) {
            discard(&temps[..=i]);
            return Err(SplatError::file(path, e));
        }
    }
    for (i, (path, _)) in outputs.iter().enumerate() {
        if let Err(e) = fs::rename(&temps[i], path) {
            discard(&temps[i..]);
            let renamed: Vec<PathBuf> = outputs[..i].iter().map(|(p, _)| p.to_path_buf()).collect();
            discard(&renamed);
            return Err(SplatError::file(path, e));
        }
    }
    Ok(())
}

/// Splits rows marked with the environment LOD into a second table.
fn split_environment(table: DataTable) -> Result<(DataTable, DataTable)> {
    let Some(lod) = table.get_column(LOD) else {
        let empty = table.permute_rows(&[])?;
        return Ok((table, empty));
    };

    let (environment, scene): (Vec<usize>, Vec<usize>) = (0..table.num_rows())
        .partition(|&i| lod.data.get_f64(i) == ENVIRONMENT_LOD as f64);
    if environment.is_empty() {
        let empty = table.permute_rows(&[])?;
        return Ok((table, empty));
    }
    Ok((table.permute_rows(&scene)?, table.permute_rows(&environment)?))
}

/// Outcome of a conversion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub output_path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub environment_path: Option<PathBuf>,
    pub environment_rows: usize,
}

/// Reads splat files, applies per-input and global actions, and writes a
/// single combined output.
pub struct SplatConverter {
    /// Input files with their own actions.
    inputs: Vec<InputSpec>,
    /// Destination; the file name selects the format.
    output_path: PathBuf,
    config: PipelineConfig,
}

impl SplatConverter {
    pub fn new(inputs: Vec<InputSpec>, output_path: impl Into<PathBuf>, config: PipelineConfig) -> Self {
        Self {
            inputs,
            output_path: output_path.into(),
            config,
        }
    }

    /// Runs the conversion. Everything is decided and serialised before the
    /// first byte is written.
    pub fn convert(&self, ctx: &ProcessContext) -> Result<ConversionReport> {
        // Configuration first, before any file is touched.
        self.config.validate()?;
        for input in &self.inputs {
            for action in &input.actions {
                action.validate()?;
            }
        }
        if self.inputs.is_empty() {
            return Err(SplatError::config("no input files"));
        }
        let format = OutputFormat::from_path(&self.output_path)?;
        let env_path = environment_path(&self.output_path, format);

        if !self.config.overwrite {
            for path in [&self.output_path, &env_path] {
                if path.exists() {
                    return Err(SplatError::config(format!(
                        "'{}' already exists, use --overwrite to replace it",
                        path.display()
                    )));
                }
            }
        }

        ctx.info(&format!("reading {} input file(s)", self.inputs.len()));
        let tables = self
            .inputs
            .par_iter()
            .map(|input| self.read_input(input, ctx))
            .collect::<Result<Vec<_>>>()?;

        let combined = combine(&tables)?;
        drop(tables);
        ctx.info(&format!(
            "combined {} rows, {} columns",
            combined.num_rows(),
            combined.num_columns()
        ));

        let processed = process_data_table(combined, &self.config.actions, ctx)?;
        let (scene, environment) = split_environment(processed)?;
        if scene.num_rows() == 0 {
            return Err(SplatError::NoData);
        }

        let options = EncodeOptions {
            color_bounds: self.config.color_bounds,
        };
        let scene_bytes = write_splat_bytes(&scene, format, &options, ctx)?;
        let environment_bytes = if environment.num_rows() > 0 {
            Some(write_splat_bytes(&environment, format, &options, ctx)?)
        } else {
            None
        };

        let mut outputs: Vec<(&Path, &[u8])> = vec![(self.output_path.as_path(), scene_bytes.as_slice())];
        if let Some(bytes) = &environment_bytes {
            outputs.push((env_path.as_path(), bytes.as_slice()));
        }
        write_outputs(&outputs)?;
        ctx.info(&format!(
            "wrote {} rows to {}",
            scene.num_rows(),
            self.output_path.display()
        ));
        if environment_bytes.is_some() {
            ctx.info(&format!(
                "wrote {} environment rows to {}",
                environment.num_rows(),
                env_path.display()
            ));
        }

        Ok(ConversionReport {
            output_path: self.output_path.clone(),
            rows: scene.num_rows(),
            columns: scene.num_columns(),
            environment_path: environment_bytes.map(|_| env_path),
            environment_rows: environment.num_rows(),
        })
    }

    fn read_input(&self, input: &InputSpec, ctx: &ProcessContext) -> Result<DataTable> {
        let source_name = input.path.display().to_string();
        let file = File::open(&input.path).map_err(|e| SplatError::file(&input.path, e))?;
        let ply = read_ply(BufReader::new(file)).map_err(|e| e.in_file(&input.path))?;
        // Per-input work runs in parallel, so only the combined pass gets a progress bar.
        let input_ctx = ProcessContext::new(ctx.level(), Box::new(SilentProgress));
        let table = read_splat_sections(&ply.sections, &source_name, &input_ctx)?;
        ctx.debug(&format!("{}: {} rows", source_name, table.num_rows()));
        process_data_table(table, &input.actions, &input_ctx)
    }
}
