//! **treadle** -- An Elm-style dispatch runtime for frame-driven hosts.
//!
//! This is the umbrella crate that re-exports everything you need from a
//! single dependency:
//!
//! ```toml
//! [dependencies]
//! treadle = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`treadle_core`] are available at the crate root
//!   ([`Cmd`], [`Dispatch`], [`DispatchRegistry`], [`Program`], [`Runner`],
//!   [`run_with_dynamic_view`], etc.).
//! * The [`term`] module re-exports the terminal host from [`treadle_term`].
//! * [`ratatui`], [`crossterm`], and [`tokio`] are re-exported so downstream
//!   crates do not need to depend on them directly.
//!
//! # Quick start
//!
//! ```ignore
//! use treadle::ratatui::widgets::Paragraph;
//! use treadle::term::{TermOptions, TerminalHost};
//! use treadle::{run_with_dynamic_view, Program};
//!
//! #[derive(Debug)]
//! enum Msg {}
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = TerminalHost::new();
//!     let program = Program::simple(
//!         || (),
//!         |msg: Msg, _: &()| match msg {},
//!         |_: &(), _| Paragraph::new("Hello, treadle!"),
//!     );
//!     let _runner = run_with_dynamic_view(host.clone(), program);
//!     host.run(TermOptions::default()).await.unwrap();
//! }
//! ```

pub use treadle_core::*;
pub mod term {
    pub use treadle_term::*;
}

// Re-export dependencies for use in demos and downstream crates
pub use crossterm;
pub use ratatui;
pub use tokio;
