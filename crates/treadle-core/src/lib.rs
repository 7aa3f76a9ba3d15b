//! Core runtime for **treadle**, an [Elm Architecture] dispatch loop for
//! frame-driven hosts.
//!
//! `treadle-core` drives an application expressed as a pure
//! **init -> update -> view** cycle inside a host that owns the real loop (a
//! terminal, a game engine, a test harness).  Side effects are pushed to the
//! edges through [`Cmd`]s, and every message travels through a
//! [`DispatchRegistry`] so closures created before a program change keep
//! reaching whichever program is current.
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Cmd`] | Ordered list of deferred effects that may dispatch messages |
//! | [`Dispatch`] | Cloneable "send a message" handle |
//! | [`DispatchRegistry`] | Swappable slot that all dispatch goes through |
//! | [`Program`] | Immutable `init` / `update` / `subscribe` / `view` record |
//! | [`Host`] | The signals a host provides: initialize once, update, draw |
//! | [`Signals`] | Handler bookkeeping for writing a [`Host`] |
//! | [`Runner`] | Executes one program against a host's signals |
//! | [`TestHost`](testing::TestHost) | Headless host fired by hand from tests |
//!
//! # Architecture
//!
//! 1. **init** -- When the host initializes, the runner calls `init`, binds
//!    the registry to itself, and starts `subscribe(model)` together with the
//!    init command.
//! 2. **update** -- Each dispatched message goes through `update`.  The new
//!    model replaces the old one and the returned command runs before the
//!    next message is taken.
//! 3. **view** -- On every draw signal the runner renders the latest model
//!    and hands the result to the host.
//! 4. **change** -- [`Runner::change_program`] moves the host over to a new
//!    program, optionally carrying a converted model across.
//!
//! Application code signals failure by panicking.  The runner catches those
//! panics at its isolation points and reports them through the program's
//! error handler, so one bad message never takes the loop down.
//!
//! # Quick example
//!
//! ```ignore
//! use treadle_core::testing::TestHost;
//! use treadle_core::{Cmd, DispatchRegistry, Program, Runner};
//!
//! #[derive(Debug)]
//! enum Msg { Inc }
//!
//! let program = Program::new(
//!     || (0i64, Cmd::none()),
//!     |Msg::Inc, n: &i64| (n + 1, Cmd::none()),
//!     |n: &i64, _| format!("count: {n}"),
//! );
//!
//! let host = TestHost::new();
//! let registry = DispatchRegistry::new();
//! let runner = Runner::with_registry(program, host.clone(), registry.clone());
//!
//! host.initialize();
//! registry.dispatcher().dispatch(Msg::Inc);
//! assert_eq!(host.draw(), vec!["count: 1".to_string()]);
//! ```
//!
//! [Elm Architecture]: https://guide.elm-lang.org/architecture/

pub mod cmd;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod program;
pub mod runner;
pub mod testing;
pub mod trace;

pub use cmd::{Cmd, Sub};
pub use dispatch::{Dispatch, DispatchRegistry, FailureHandler};
pub use error::{panic_message, Error};
pub use host::{DrawHandler, FrameTick, Host, InitHandler, Signals, UpdateHandler};
pub use program::{
    default_error_reporter, ErrorHandler, InitFn, Program, SubscribeFn, UpdateFn, ViewFn,
};
pub use runner::{
    run_with_dynamic_view, Conversion, ModelReplacement, Runner, COMMAND_FAILED,
    SUBSCRIPTION_FAILED, UPDATE_FAILED, VIEW_FAILED,
};
pub use trace::TRACE_TARGET;
