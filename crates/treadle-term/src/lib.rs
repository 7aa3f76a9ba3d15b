//! Terminal host for **treadle**.
//!
//! [`TerminalHost`] owns a ratatui terminal and provides the signals a
//! [`treadle_core::Runner`] needs: an "initialize once" signal when the
//! terminal is ready, then an update and a draw signal every frame at
//! [`TermOptions::fps`].  Views are ratatui widgets; key presses are forwarded
//! to handlers registered with [`TerminalHost::on_key`].
//!
//! Because a terminal UI cannot log to the screen it draws on,
//! [`log_to_file`] installs a `tracing` subscriber that writes to a file.

mod error;
mod host;
mod logging;
mod options;
mod terminal;

pub use error::TermError;
pub use host::{render_views, KeyHandler, QuitHandle, TerminalHost};
pub use logging::log_to_file;
pub use options::{OutputTarget, TermOptions};
