use std::io::{self, Write};
use std::path::PathBuf;

/// The stream frames are written to.
///
/// Pick [`Stderr`](OutputTarget::Stderr) when stdout is redirected, e.g. when
/// the application prints a result for a pipeline after the UI exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write to stdout (default).
    #[default]
    Stdout,
    /// Write to stderr.
    Stderr,
}

impl OutputTarget {
    /// A fresh handle on the target stream.
    pub(crate) fn writer(self) -> Box<dyn Write + Send> {
        match self {
            OutputTarget::Stdout => Box::new(io::stdout()),
            OutputTarget::Stderr => Box::new(io::stderr()),
        }
    }
}

/// Configuration for [`TerminalHost::run`](crate::TerminalHost::run).
///
/// Override only what you need with struct update syntax:
///
/// ```rust,ignore
/// use treadle_term::{OutputTarget, TermOptions};
///
/// let opts = TermOptions {
///     fps: 30,
///     title: Some("sprite".into()),
///     output: OutputTarget::Stderr,
///     ..TermOptions::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermOptions {
    /// Frames per second for the update and draw signals (default: 60,
    /// clamped to 1..=120).
    pub fps: u32,
    /// Draw in the alternate screen (default: true).
    pub alt_screen: bool,
    /// Terminal window title.
    pub title: Option<String>,
    /// Restore the terminal before a panic message is printed (default: true).
    pub catch_panics: bool,
    /// Stop the frame loop on ctrl+c (default: true).
    pub handle_signals: bool,
    /// Send `tracing` output to this file for the duration of the process.
    pub log_file: Option<PathBuf>,
    /// Output target: stdout (default) or stderr.
    pub output: OutputTarget,
}

impl Default for TermOptions {
    fn default() -> Self {
        Self {
            fps: 60,
            alt_screen: true,
            title: None,
            catch_panics: true,
            handle_signals: true,
            log_file: None,
            output: OutputTarget::default(),
        }
    }
}

impl TermOptions {
    pub(crate) fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.fps.clamp(1, 120)))
    }
}
