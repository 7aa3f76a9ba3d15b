use crate::cmd::Cmd;
use crate::dispatch::{Dispatch, DispatchRegistry};
use crate::error::Error;
use crate::host::Host;
use crate::program::Program;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Error label for a panicking `update`.
pub const UPDATE_FAILED: &str = "Unable to process a message";
/// Error label for a panicking subscription from a processed message.
pub const COMMAND_FAILED: &str = "Unable to run a command";
/// Error label for a panicking subscription started by `init`.
pub const SUBSCRIPTION_FAILED: &str = "Unable to start a subscription";
/// Error label for a panicking `view`.
pub const VIEW_FAILED: &str = "Unable to process the view";

/// Outcome of [`Runner::set_current_model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum ModelReplacement {
    /// The model was replaced and its subscriptions started.
    Applied,
    /// The runner was superseded by [`Runner::change_program`]; nothing
    /// happened.
    Ignored,
}

/// Result of converting the current model for a new program in
/// [`Runner::change_program`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion<M> {
    /// The new program starts from this model instead of calling its `init`.
    Converted(M),
    /// The old model has no counterpart; the new program runs its own `init`.
    Unconvertible,
}

/// What a runner needs from the runner that superseded it.
trait Alternate: Send + Sync {
    fn reset_view(&self);
}

/// Executes one [`Program`] against a [`Host`]'s signals.
///
/// A `Runner` owns the current model, processes one message at a time, runs
/// the resulting commands, and renders on the host's draw signal.  It is a
/// cheap, cloneable handle; every clone refers to the same engine.
///
/// # Lifecycle
///
/// 1. Construction registers an init handler and a draw handler with the
///    host.  Nothing else happens yet.
/// 2. When the host initializes, the runner calls `init`, stores the model,
///    binds its registry to itself, and starts `subscribe(model)` plus the
///    init command.
/// 3. Every dispatched message goes through `update`; the new model replaces
///    the old one and its command runs before the next message is taken.
/// 4. On every draw signal the runner renders the latest model.
///
/// # Message ordering
///
/// Dispatches go through a queue.  The first caller to find the queue idle
/// drains it; dispatches made while it drains (re-entrantly from a command,
/// or from another thread when an async command completes) are queued and
/// processed by that same drainer.  A message's update and its command
/// therefore always finish before the next message's update starts.
pub struct Runner<M, Msg: Send + 'static, V> {
    shared: Arc<Shared<M, Msg, V>>,
}

impl<M, Msg: Send + 'static, V> Clone for Runner<M, Msg, V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<M, Msg: Send + 'static, V> std::fmt::Debug for Runner<M, Msg, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("registry", &self.shared.registry)
            .field("started", &lock(&self.shared.model).is_some())
            .field("superseded", &lock(&self.shared.alternate).is_some())
            .finish_non_exhaustive()
    }
}

struct Shared<M, Msg: Send + 'static, V> {
    program: Program<M, Msg, V>,
    host: Weak<dyn Host<V>>,
    registry: DispatchRegistry<Msg>,
    /// Handed to subscriptions and views; resolves through the registry.
    outbound: Dispatch<Msg>,
    /// Feeds this runner's queue; bound into the registry on start.
    inbound: Dispatch<Msg>,
    model: Mutex<Option<Arc<M>>>,
    /// Converted model that replaces `init` on start.
    seed: Mutex<Option<M>>,
    queue: Mutex<VecDeque<Msg>>,
    draining: AtomicBool,
    alternate: Mutex<Option<Arc<dyn Alternate>>>,
    reset_action: Mutex<Arc<dyn Fn() + Send + Sync>>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the draining flag even if processing unwinds.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Construct a [`Runner`] for `program` wired to `host`, using the
/// process-wide registry for its message type.
pub fn run_with_dynamic_view<M, Msg, V, H>(host: Arc<H>, program: Program<M, Msg, V>) -> Runner<M, Msg, V>
where
    M: Send + Sync + 'static,
    Msg: Send + 'static,
    V: 'static,
    H: Host<V> + 'static,
{
    Runner::new(program, host)
}

impl<M, Msg, V> Runner<M, Msg, V>
where
    M: Send + Sync + 'static,
    Msg: Send + 'static,
    V: 'static,
{
    /// Wire `program` to `host` using [`DispatchRegistry::global`].
    pub fn new<H: Host<V> + 'static>(program: Program<M, Msg, V>, host: Arc<H>) -> Self {
        Self::with_registry(program, host, DispatchRegistry::global())
    }

    /// Wire `program` to `host`, routing dispatch through `registry`.
    pub fn with_registry<H: Host<V> + 'static>(
        program: Program<M, Msg, V>,
        host: Arc<H>,
        registry: DispatchRegistry<Msg>,
    ) -> Self {
        let host: Arc<dyn Host<V>> = host;
        let runner = Self::build(program, &host, registry, None);
        runner.wire(&host);
        runner
    }

    fn build(
        program: Program<M, Msg, V>,
        host: &Arc<dyn Host<V>>,
        registry: DispatchRegistry<Msg>,
        seed: Option<M>,
    ) -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<Shared<M, Msg, V>>| {
            let weak = weak.clone();
            Shared {
                program,
                host: Arc::downgrade(host),
                outbound: registry.dispatcher(),
                inbound: Dispatch::new(move |msg| {
                    if let Some(shared) = weak.upgrade() {
                        shared.enqueue(msg);
                    }
                }),
                registry,
                model: Mutex::new(None),
                seed: Mutex::new(seed),
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                alternate: Mutex::new(None),
                reset_action: Mutex::new(Arc::new(|| {})),
            }
        });
        Runner { shared }
    }

    /// Register the init and draw handlers.  Starts immediately if the host
    /// has already initialized.
    fn wire(&self, host: &Arc<dyn Host<V>>) {
        let on_draw = self.clone();
        host.on_draw(Box::new(move |_tick| on_draw.update_view()));
        let on_init = self.clone();
        host.on_init(Box::new(move || on_init.start()));
    }

    /// Run `init` and start subscriptions.
    ///
    /// The host calls this through its "initialize once" signal; calling it
    /// again restarts the program from `init`.  A panic in `init` propagates.
    pub fn start(&self) {
        let shared = &self.shared;
        let seeded = lock(&shared.seed).take();
        let (model, cmd) = match seeded {
            Some(model) => (model, Cmd::none()),
            None => shared.program.init(),
        };
        let model = Arc::new(model);
        *lock(&shared.model) = Some(model.clone());
        shared.registry.bind(shared.inbound.clone());
        *lock(&shared.reset_action) = Arc::new(|| {});
        tracing::debug!(debug = shared.program.is_debug(), "runner started");

        let cmd = Cmd::batch([shared.program.subscribe(&model), cmd]);
        shared.run_isolated(cmd, SUBSCRIPTION_FAILED);
    }

    /// Whether [`start`](Runner::start) has run (or a model was set).
    pub fn is_started(&self) -> bool {
        lock(&self.shared.model).is_some()
    }

    /// Whether [`change_program`](Runner::change_program) has replaced this
    /// runner.
    pub fn is_superseded(&self) -> bool {
        lock(&self.shared.alternate).is_some()
    }

    /// The registry this runner binds itself into.
    pub fn registry(&self) -> &DispatchRegistry<Msg> {
        &self.shared.registry
    }

    /// Process `msg` against this runner directly.
    ///
    /// # Panics
    ///
    /// Dispatching before the runner has started is a wiring bug and panics.
    pub fn dispatch(&self, msg: Msg) {
        if !self.is_started() {
            panic!("{}", Error::NotStarted);
        }
        self.shared.enqueue(msg);
    }

    /// The latest model, or `None` before start.
    pub fn current_model(&self) -> Option<Arc<M>> {
        lock(&self.shared.model).clone()
    }

    /// Render the latest model, as one draw signal would.
    ///
    /// Returns `None` before start, after the runner was superseded, or when
    /// `view` panics (the failure goes to the error handler).
    pub fn update_view(&self) -> Option<V> {
        let shared = &self.shared;
        if self.is_superseded() {
            return None;
        }
        let model = self.current_model()?;
        match catch_unwind(AssertUnwindSafe(|| {
            shared.program.view(&model, &shared.outbound)
        })) {
            Ok(view) => Some(view),
            Err(payload) => {
                shared.program.report(VIEW_FAILED, &Error::from_panic(payload));
                None
            }
        }
    }

    /// Replace the action run by [`reset_view`](Runner::reset_view).
    ///
    /// [`start`](Runner::start) installs a no-op.
    pub fn set_reset_action(&self, action: impl Fn() + Send + Sync + 'static) {
        *lock(&self.shared.reset_action) = Arc::new(action);
    }

    /// Run the reset action, or forward to the runner that superseded this
    /// one.
    pub fn reset_view(&self) {
        let alternate = lock(&self.shared.alternate).clone();
        match alternate {
            Some(alternate) => alternate.reset_view(),
            None => {
                let action = lock(&self.shared.reset_action).clone();
                action();
            }
        }
    }

    /// Overwrite the model and (re-)establish its subscriptions together
    /// with `cmd`.
    ///
    /// Unlike message processing, subscriptions started here are not
    /// isolated: a panic propagates to the caller.  Async commands that fail
    /// later still go to the error handler.  After a program change the call
    /// is ignored and `cmd` is dropped unrun.
    pub fn set_current_model(&self, model: M, cmd: Cmd<Msg>) -> ModelReplacement {
        let shared = &self.shared;
        if self.is_superseded() {
            tracing::warn!("ignoring set_current_model: the program was already switched");
            return ModelReplacement::Ignored;
        }
        let model = Arc::new(model);
        *lock(&shared.model) = Some(model.clone());
        Cmd::batch([shared.program.subscribe(&model), cmd]).run(&shared.reporting(COMMAND_FAILED));
        ModelReplacement::Applied
    }

    /// Switch the host over to `program`, using the process-wide registry
    /// for its message type.
    ///
    /// See [`change_program_with_registry`](Runner::change_program_with_registry).
    pub fn change_program<M2, Msg2>(
        &self,
        program: Program<M2, Msg2, V>,
        convert: impl FnOnce(&M) -> Conversion<M2>,
    ) -> Result<Runner<M2, Msg2, V>, Error>
    where
        M2: Send + Sync + 'static,
        Msg2: Send + 'static,
    {
        self.change_program_with_registry(program, DispatchRegistry::global(), convert)
    }

    /// Start a second runner for `program` on the same host and hand it
    /// this runner's place.
    ///
    /// `convert` receives the current model.  A
    /// [`Conversion::Converted`] model replaces the new program's `init`;
    /// with [`Conversion::Unconvertible`] the new program starts from its
    /// own `init`.  The new runner starts immediately if the host has
    /// already initialized.
    ///
    /// Afterwards this runner stops drawing, ignores
    /// [`set_current_model`](Runner::set_current_model), and forwards
    /// [`reset_view`](Runner::reset_view) to the new runner.
    pub fn change_program_with_registry<M2, Msg2>(
        &self,
        program: Program<M2, Msg2, V>,
        registry: DispatchRegistry<Msg2>,
        convert: impl FnOnce(&M) -> Conversion<M2>,
    ) -> Result<Runner<M2, Msg2, V>, Error>
    where
        M2: Send + Sync + 'static,
        Msg2: Send + 'static,
    {
        let host = self.shared.host.upgrade().ok_or(Error::HostDropped)?;
        let conversion = match self.current_model() {
            Some(model) => convert(&model),
            None => Conversion::Unconvertible,
        };
        let seed = match conversion {
            Conversion::Converted(model) => {
                tracing::debug!("changing program with a converted model");
                Some(model)
            }
            Conversion::Unconvertible => {
                tracing::debug!("changing program; the new program starts from init");
                None
            }
        };

        // Supersede first so this runner goes dormant before the new one
        // can draw or take over the registry.
        let alternate = Runner::build(program, &host, registry, seed);
        *lock(&self.shared.alternate) = Some(Arc::new(alternate.clone()));
        alternate.wire(&host);
        Ok(alternate)
    }
}

impl<M, Msg, V> Alternate for Runner<M, Msg, V>
where
    M: Send + Sync + 'static,
    Msg: Send + 'static,
    V: 'static,
{
    fn reset_view(&self) {
        Runner::reset_view(self)
    }
}

impl<M, Msg, V> Shared<M, Msg, V>
where
    M: Send + Sync + 'static,
    Msg: Send + 'static,
    V: 'static,
{
    fn enqueue(&self, msg: Msg) {
        lock(&self.queue).push_back(msg);
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Someone else is draining and will pick the message up.
                return;
            }
            {
                let _guard = DrainGuard(&self.draining);
                loop {
                    let next = lock(&self.queue).pop_front();
                    match next {
                        Some(msg) => self.process_message(msg),
                        None => break,
                    }
                }
            }
            // A message may have arrived between the last pop and releasing
            // the flag; its sender saw us draining and returned.
            if lock(&self.queue).is_empty() {
                return;
            }
        }
    }

    fn process_message(&self, msg: Msg) {
        let model = match lock(&self.model).clone() {
            Some(model) => model,
            None => panic!("{}", Error::NotStarted),
        };
        tracing::trace!("processing message");
        match catch_unwind(AssertUnwindSafe(|| self.program.update(msg, &model))) {
            Ok((next, cmd)) => {
                *lock(&self.model) = Some(Arc::new(next));
                self.run_isolated(cmd, COMMAND_FAILED);
            }
            Err(payload) => {
                self.program.report(UPDATE_FAILED, &Error::from_panic(payload));
            }
        }
    }

    /// Run each subscription on its own, reporting failures under `label`.
    fn run_isolated(&self, cmd: Cmd<Msg>, label: &'static str) {
        let dispatch = self.reporting(label);
        for sub in cmd.subs {
            let dispatch = dispatch.clone();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(move || sub(dispatch))) {
                self.program.report(label, &Error::from_panic(payload));
            }
        }
    }

    /// The outbound dispatcher, with later failures (async commands) going
    /// to the error handler under `label`.
    fn reporting(&self, label: &'static str) -> Dispatch<Msg> {
        let program = self.program.clone();
        self.outbound
            .clone()
            .with_failure_handler(move |error| program.report(label, error))
    }
}
