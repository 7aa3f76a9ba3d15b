/// Errors from setting up, drawing to, or restoring the terminal.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    /// An I/O error from terminal setup, rendering, or teardown.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A global `tracing` subscriber was already installed.
    #[error("unable to install the log subscriber: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}
