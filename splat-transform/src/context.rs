/// Logging and progress reporting handed to codec and pipeline entry points
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter};

/// Progress sink for multi-step work.
pub trait Progress: Send + Sync {
    /// Starts a new task of `total` steps.
    fn begin(&self, name: &str, total: u64);

    /// Reports that `current` steps are done; `name` describes the step.
    fn step(&self, current: u64, name: &str);

    fn finish(&self, message: &str);
}

/// Discards all progress.
#[derive(Debug, Default)]
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn begin(&self, _name: &str, _total: u64) {}
    fn step(&self, _current: u64, _name: &str) {}
    fn finish(&self, _message: &str) {}
}

/// Terminal progress bar.
#[derive(Debug)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{bar:40.green/blue}] {pos}/{len} {prefix} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("▉▊▋▌▍▎▏ "));
        }
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for BarProgress {
    fn begin(&self, name: &str, total: u64) {
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_prefix(name.to_string());
    }

    fn step(&self, current: u64, name: &str) {
        self.bar.set_position(current);
        self.bar.set_message(name.to_string());
    }

    fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Per-run reporting context.
///
/// Messages below `level` are dropped here; the rest go to the `log` facade.
pub struct ProcessContext {
    level: LevelFilter,
    progress: Box<dyn Progress>,
}

impl ProcessContext {
    pub fn new(level: LevelFilter, progress: Box<dyn Progress>) -> Self {
        Self { level, progress }
    }

    /// Warnings only, no progress output.
    pub fn silent() -> Self {
        Self::new(LevelFilter::Warn, Box::new(SilentProgress))
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn progress(&self) -> &dyn Progress {
        self.progress.as_ref()
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub fn log(&self, level: Level, message: &str) {
        if self.enabled(level) {
            log::log!(level, "{}", message);
        }
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::silent()
    }
}
