use crate::error::TermError;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Send `tracing` output to `path`, appending to it.
///
/// A terminal app cannot log to the screen it draws on, so this installs the
/// global subscriber with a file writer instead.  The filter comes from
/// `RUST_LOG`, defaulting to `info`.  Fails if a global subscriber is
/// already set.
///
/// # Example
///
/// ```no_run
/// treadle_term::log_to_file("sprite.log").unwrap();
/// tracing::info!("logging initialized");
/// ```
pub fn log_to_file(path: impl AsRef<Path>) -> Result<(), TermError> {
    let path = path.as_ref();
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()?;

    tracing::info!(path = %path.display(), "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test in this crate that installs the global subscriber.
    #[test]
    fn log_to_file_appends_and_refuses_a_second_install() {
        let path = std::env::temp_dir().join(format!("treadle-log-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        log_to_file(&path).unwrap();
        tracing::warn!("frame loop stalled");

        let second = log_to_file(&path);
        assert!(matches!(second, Err(TermError::Logging(_))));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("logging initialized"));
        assert!(text.contains("frame loop stalled"));
        let _ = std::fs::remove_file(&path);
    }
}
