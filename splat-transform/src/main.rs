/// Gaussian splat converter command line entry point
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::process;

use splat_transform::config::{InputSpec, PipelineConfig};
use splat_transform::context::{BarProgress, ProcessContext, Progress, SilentProgress};
use splat_transform::converter::SplatConverter;
use splat_transform::error::Result;
use splat_transform::pipeline::ProcessAction;

#[derive(Parser)]
#[command(
    name = "splat-transform",
    version,
    about = "Convert, combine and transform Gaussian splat PLY files"
)]
struct Cli {
    /// Input PLY or compressed PLY files, added to any listed in the config
    inputs: Vec<PathBuf>,

    /// Output file; `.compressed.ply` writes the packed layout
    #[arg(short, long)]
    output: PathBuf,

    /// Action applied to the combined data, e.g. `scale=0.5` or `filter-visibility=50%`
    #[arg(short, long = "action")]
    actions: Vec<ProcessAction>,

    /// JSON pipeline config; its actions run before command-line actions
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replace existing output files
    #[arg(short = 'w', long)]
    overwrite: bool,

    /// Omit per-chunk colour bounds from packed output
    #[arg(long)]
    no_color_bounds: bool,

    /// Log per-action detail
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only, no progress bar
    #[arg(short, long)]
    quiet: bool,
}

fn run(cli: Cli) -> Result<()> {
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.actions.extend(cli.actions);
    config.overwrite |= cli.overwrite;
    if cli.no_color_bounds {
        config.color_bounds = false;
    }

    let mut inputs: Vec<InputSpec> = cli.inputs.into_iter().map(InputSpec::new).collect();
    inputs.extend(config.inputs.drain(..));

    let progress: Box<dyn Progress> = if cli.quiet {
        Box::new(SilentProgress)
    } else {
        Box::new(BarProgress::new())
    };
    let ctx = ProcessContext::new(level, progress);

    let converter = SplatConverter::new(inputs, cli.output, config);
    let report = converter.convert(&ctx)?;
    ctx.info(&format!(
        "done: {} rows, {} columns",
        report.rows, report.columns
    ));
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
