//! Console tracing for [`Program`]s.

use crate::dispatch::Dispatch;
use crate::error::panic_message;
use crate::program::Program;
use std::fmt::Debug;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Target used for every event emitted by
/// [`with_console_trace`](Program::with_console_trace).
pub const TRACE_TARGET: &str = "treadle::trace";

/// Run `f`, logging a failure under `stage` before letting it continue to
/// unwind unchanged.
fn traced<T>(stage: &'static str, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            tracing::error!(
                target: TRACE_TARGET,
                stage,
                error = %panic_message(payload.as_ref()),
                "{stage} failed"
            );
            resume_unwind(payload)
        }
    }
}

impl<M, Msg, V> Program<M, Msg, V>
where
    M: Debug + Send + Sync + 'static,
    Msg: Debug + Send + 'static,
    V: Debug + 'static,
{
    /// Log the inputs and outputs of `init`, `update`, and `view`.
    ///
    /// Events go to `tracing` under [`TRACE_TARGET`]: `init` and `update` at
    /// `info`, `view` (which runs every frame) at `debug`.  A panic in the
    /// wrapped function is logged at `error` and re-raised as-is.
    pub fn with_console_trace(self) -> Self {
        let init = self.init.clone();
        let update = self.update.clone();
        let view = self.view.clone();

        Self {
            init: Arc::new(move || {
                traced("init", || {
                    let (model, cmd) = init();
                    tracing::info!(
                        target: TRACE_TARGET,
                        commands = cmd.len(),
                        "initial state: {model:?}"
                    );
                    (model, cmd)
                })
            }),
            update: Arc::new(move |msg: Msg, model: &M| {
                tracing::info!(target: TRACE_TARGET, "new message: {msg:?}");
                traced("update", || {
                    let (next, cmd) = update(msg, model);
                    tracing::info!(
                        target: TRACE_TARGET,
                        commands = cmd.len(),
                        "updated state: {next:?}"
                    );
                    (next, cmd)
                })
            }),
            view: Arc::new(move |model: &M, dispatch: &Dispatch<Msg>| {
                tracing::debug!(target: TRACE_TARGET, "rendering: {model:?}");
                traced("view", || {
                    let out = view(model, dispatch);
                    tracing::debug!(target: TRACE_TARGET, "view: {out:?}");
                    out
                })
            }),
            ..self
        }
    }
}
