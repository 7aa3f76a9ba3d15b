use crate::dispatch::Dispatch;
use crate::error::Error;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// A single effect: given a [`Dispatch`], arrange for zero or more messages to
/// be delivered, now or later, without blocking the caller.
pub type Sub<Msg> = Box<dyn FnOnce(Dispatch<Msg>) + Send>;

/// An ordered list of [`Sub`]s returned from `init`, `update`, or `subscribe`.
///
/// All subscriptions in one command are considered to start together; the
/// order only matters for deterministic tests.  The runtime runs a command
/// exactly once, right after the model transition it accompanies.
///
/// # Examples
///
/// ```rust,ignore
/// // Do nothing:
/// let cmd = Cmd::none();
///
/// // Feed a message straight back into update:
/// let cmd = Cmd::of_msg(Msg::Tick);
///
/// // Run an async task and dispatch its result:
/// let cmd = Cmd::perform(async { load_level(3).await }, Msg::LevelLoaded);
/// ```
pub struct Cmd<Msg: Send + 'static> {
    pub(crate) subs: Vec<Sub<Msg>>,
}

impl<Msg: Send + 'static> Default for Cmd<Msg> {
    fn default() -> Self {
        Cmd::none()
    }
}

impl<Msg: Send + 'static> std::fmt::Debug for Cmd<Msg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cmd").field("subs", &self.subs.len()).finish()
    }
}

impl<Msg: Send + 'static> Cmd<Msg> {
    /// No-op command.
    pub fn none() -> Self {
        Cmd { subs: Vec::new() }
    }

    /// Dispatch `msg` once, synchronously, when the command runs.
    pub fn of_msg(msg: Msg) -> Self {
        Cmd::of_sub(move |dispatch| dispatch.dispatch(msg))
    }

    /// Like [`of_msg`](Cmd::of_msg), but dispatches nothing for `None`.
    pub fn of_msg_option(msg: Option<Msg>) -> Self {
        match msg {
            Some(msg) => Cmd::of_msg(msg),
            None => Cmd::none(),
        }
    }

    /// Lift a raw subscription into a one-element command.
    pub fn of_sub(sub: impl FnOnce(Dispatch<Msg>) + Send + 'static) -> Self {
        Cmd {
            subs: vec![Box::new(sub)],
        }
    }

    /// Concatenate commands, keeping the relative order of their
    /// subscriptions.
    pub fn batch(cmds: impl IntoIterator<Item = Cmd<Msg>>) -> Self {
        Cmd {
            subs: cmds.into_iter().flat_map(|cmd| cmd.subs).collect(),
        }
    }

    /// Transform the message type (for component composition).
    ///
    /// Each subscription keeps its own timing; whatever it dispatches, whenever
    /// it dispatches it, passes through `f` first.
    pub fn map<Parent: Send + 'static>(
        self,
        f: impl Fn(Msg) -> Parent + Send + Sync + 'static,
    ) -> Cmd<Parent> {
        let f = Arc::new(f);
        Cmd {
            subs: self
                .subs
                .into_iter()
                .map(|sub| {
                    let f = f.clone();
                    Box::new(move |dispatch: Dispatch<Parent>| sub(dispatch.map(move |m| f(m))))
                        as Sub<Parent>
                })
                .collect(),
        }
    }

    /// Invoke every subscription with `dispatch`, in order.
    ///
    /// A panicking subscription is not caught here; the runner isolates
    /// subscriptions individually when it runs commands.
    pub fn run(self, dispatch: &Dispatch<Msg>) {
        for sub in self.subs {
            sub(dispatch.clone());
        }
    }

    /// Run `future` in the background and dispatch its output.
    pub fn of_async<F>(future: F) -> Self
    where
        F: Future<Output = Msg> + Send + 'static,
    {
        Cmd::of_sub(move |dispatch| {
            let failures = dispatch.clone();
            spawn_detached(async move { dispatch.dispatch(future.await) }, failures);
        })
    }

    /// Run `future` in the background and dispatch its output if it is `Some`.
    pub fn of_async_option<F>(future: F) -> Self
    where
        F: Future<Output = Option<Msg>> + Send + 'static,
    {
        Cmd::of_sub(move |dispatch| {
            let failures = dispatch.clone();
            spawn_detached(
                async move {
                    if let Some(msg) = future.await {
                        dispatch.dispatch(msg);
                    }
                },
                failures,
            );
        })
    }

    /// Run an async future, map the result to a message.
    pub fn perform<F, T>(future: F, map: impl FnOnce(T) -> Msg + Send + 'static) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Cmd::of_async(async move { map(future.await) })
    }

    /// Run a fallible future, mapping success and failure to separate
    /// messages.
    pub fn attempt<F, T, E>(
        future: F,
        on_ok: impl FnOnce(T) -> Msg + Send + 'static,
        on_err: impl FnOnce(E) -> Msg + Send + 'static,
    ) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Cmd::of_async(async move {
            match future.await {
                Ok(value) => on_ok(value),
                Err(err) => on_err(err),
            }
        })
    }

    // --- Inspection methods (useful for testing) ---

    /// Returns `true` if this command has no subscriptions.
    pub fn is_none(&self) -> bool {
        self.subs.is_empty()
    }

    /// Number of subscriptions in this command.
    pub fn len(&self) -> usize {
        self.subs.len()
    }

    /// Returns `true` if this command has no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.is_none()
    }
}

/// Drive `future` to completion without blocking the caller.
///
/// Uses the ambient tokio runtime when there is one, otherwise a detached
/// thread.  A panic inside the future is logged and handed to the failure
/// handler of `failures`, if it has one.
fn spawn_detached<F, Msg>(future: F, failures: Dispatch<Msg>)
where
    F: Future<Output = ()> + Send + 'static,
    Msg: Send + 'static,
{
    let guarded = async move {
        if let Err(payload) = AssertUnwindSafe(future).catch_unwind().await {
            let error = Error::from_panic(payload);
            tracing::error!(%error, "async command failed");
            failures.report_failure(&error);
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(guarded);
        }
        Err(_) => {
            let spawned = std::thread::Builder::new()
                .name("treadle-cmd".into())
                .spawn(move || futures::executor::block_on(guarded));
            if let Err(err) = spawned {
                tracing::error!(error = %err, "unable to start async command thread");
            }
        }
    }
}
