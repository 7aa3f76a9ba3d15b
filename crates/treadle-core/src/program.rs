use crate::cmd::Cmd;
use crate::dispatch::Dispatch;
use crate::error::Error;
use std::sync::Arc;

/// `init` slot of a [`Program`].
pub type InitFn<M, Msg> = Arc<dyn Fn() -> (M, Cmd<Msg>) + Send + Sync>;
/// `update` slot of a [`Program`].
pub type UpdateFn<M, Msg> = Arc<dyn Fn(Msg, &M) -> (M, Cmd<Msg>) + Send + Sync>;
/// `subscribe` slot of a [`Program`].
pub type SubscribeFn<M, Msg> = Arc<dyn Fn(&M) -> Cmd<Msg> + Send + Sync>;
/// `view` slot of a [`Program`].
pub type ViewFn<M, Msg, V> = Arc<dyn Fn(&M, &Dispatch<Msg>) -> V + Send + Sync>;
/// `on_error` slot of a [`Program`]: receives a label and the failure.
pub type ErrorHandler = Arc<dyn Fn(&str, &Error) + Send + Sync>;

/// Immutable description of an application: how to start, how to react to a
/// message, what to subscribe to, how to render, and where to report
/// failures.
///
/// A `Program` holds no state and never changes.  The `with_*` combinators
/// return a new program wrapping the old one's functions; cloning is cheap
/// because every slot is reference-counted.
///
/// * `M` -- the model, replaced wholesale by every `update`.
/// * `Msg` -- the message type interpreted by `update`.
/// * `V` -- whatever `view` produces for the host to present.
///
/// # Example
///
/// ```rust,ignore
/// use treadle_core::{Cmd, Program};
///
/// #[derive(Debug)]
/// enum Msg { Inc }
///
/// let program = Program::simple(
///     || 0i64,
///     |Msg::Inc, n: &i64| n + 1,
///     |n: &i64, _dispatch| format!("count: {n}"),
/// )
/// .with_console_trace();
/// ```
pub struct Program<M, Msg: Send + 'static, V> {
    pub(crate) init: InitFn<M, Msg>,
    pub(crate) update: UpdateFn<M, Msg>,
    pub(crate) subscribe: SubscribeFn<M, Msg>,
    pub(crate) view: ViewFn<M, Msg, V>,
    pub(crate) debug: bool,
    pub(crate) on_error: ErrorHandler,
}

impl<M, Msg: Send + 'static, V> Clone for Program<M, Msg, V> {
    fn clone(&self) -> Self {
        Self {
            init: self.init.clone(),
            update: self.update.clone(),
            subscribe: self.subscribe.clone(),
            view: self.view.clone(),
            debug: self.debug,
            on_error: self.on_error.clone(),
        }
    }
}

impl<M, Msg: Send + 'static, V> std::fmt::Debug for Program<M, Msg, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

/// Print `label` and the failure to stdout.
pub fn default_error_reporter(label: &str, error: &Error) {
    tracing::error!(%error, "{label}");
    println!("{label}: {error:?}");
}

impl<M, Msg, V> Program<M, Msg, V>
where
    M: Send + Sync + 'static,
    Msg: Send + 'static,
    V: 'static,
{
    /// Create a program from its three essential functions.
    ///
    /// `subscribe` defaults to no subscriptions, `debug` to `false`, and
    /// failures go to [`default_error_reporter`].
    pub fn new(
        init: impl Fn() -> (M, Cmd<Msg>) + Send + Sync + 'static,
        update: impl Fn(Msg, &M) -> (M, Cmd<Msg>) + Send + Sync + 'static,
        view: impl Fn(&M, &Dispatch<Msg>) -> V + Send + Sync + 'static,
    ) -> Self {
        Self {
            init: Arc::new(init),
            update: Arc::new(update),
            subscribe: Arc::new(|_: &M| Cmd::none()),
            view: Arc::new(view),
            debug: false,
            on_error: Arc::new(default_error_reporter),
        }
    }

    /// Create a program whose `init` and `update` never produce commands.
    pub fn simple(
        init: impl Fn() -> M + Send + Sync + 'static,
        update: impl Fn(Msg, &M) -> M + Send + Sync + 'static,
        view: impl Fn(&M, &Dispatch<Msg>) -> V + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            move || (init(), Cmd::none()),
            move |msg, model| (update(msg, model), Cmd::none()),
            view,
        )
    }

    /// Add subscriptions on top of the existing ones.
    ///
    /// Whenever subscriptions are (re-)established, the old set and `extra`
    /// fire together, old ones first.
    pub fn with_subscription(
        self,
        extra: impl Fn(&M) -> Cmd<Msg> + Send + Sync + 'static,
    ) -> Self {
        let subscribe = self.subscribe.clone();
        Self {
            subscribe: Arc::new(move |model: &M| Cmd::batch([subscribe(model), extra(model)])),
            ..self
        }
    }

    /// Call `tracer` with every message and the model it is about to update,
    /// right before `update` runs.
    pub fn with_trace(self, tracer: impl Fn(&Msg, &M) + Send + Sync + 'static) -> Self {
        let update = self.update.clone();
        Self {
            update: Arc::new(move |msg: Msg, model: &M| {
                tracer(&msg, model);
                update(msg, model)
            }),
            ..self
        }
    }

    /// Replace the error handler.
    pub fn with_error_handler(self, handler: impl Fn(&str, &Error) + Send + Sync + 'static) -> Self {
        Self {
            on_error: Arc::new(handler),
            ..self
        }
    }

    /// Mark the program as running in debug mode.
    pub fn with_debug(self) -> Self {
        Self { debug: true, ..self }
    }

    /// Run `init`.
    pub fn init(&self) -> (M, Cmd<Msg>) {
        (self.init)()
    }

    /// Run `update` for one message.
    pub fn update(&self, msg: Msg, model: &M) -> (M, Cmd<Msg>) {
        (self.update)(msg, model)
    }

    /// The subscriptions for `model`.
    pub fn subscribe(&self, model: &M) -> Cmd<Msg> {
        (self.subscribe)(model)
    }

    /// Render `model`.
    pub fn view(&self, model: &M, dispatch: &Dispatch<Msg>) -> V {
        (self.view)(model, dispatch)
    }

    /// Hand a failure to the error handler.
    pub fn report(&self, label: &str, error: &Error) {
        (self.on_error)(label, error)
    }

    /// Whether [`with_debug`](Program::with_debug) was applied.
    pub fn is_debug(&self) -> bool {
        self.debug
    }
}
