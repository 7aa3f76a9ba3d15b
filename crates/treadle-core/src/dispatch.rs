//! Dispatch capabilities and the swappable registry slot that routes them to
//! whichever [`Runner`](crate::Runner) is currently authoritative.

use crate::error::Error;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

/// A callable that injects one message into the runtime.
///
/// `Dispatch` is cheap to clone and can be moved into async tasks, host
/// callbacks, or closures captured by a view.  It carries no reference to a
/// particular runner: the runtime hands out dispatchers obtained from a
/// [`DispatchRegistry`], which resolve their target on every call.
pub struct Dispatch<Msg> {
    f: Arc<dyn Fn(Msg) + Send + Sync>,
    on_failure: Option<FailureHandler>,
}

/// Receives failures of effects that outlive the call that started them,
/// such as a panicking async command.
pub type FailureHandler = Arc<dyn Fn(&Error) + Send + Sync>;

impl<Msg> Clone for Dispatch<Msg> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<Msg> fmt::Debug for Dispatch<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").finish_non_exhaustive()
    }
}

impl<Msg: Send + 'static> Dispatch<Msg> {
    /// Wrap a closure as a dispatch capability.
    pub fn new(f: impl Fn(Msg) + Send + Sync + 'static) -> Self {
        Self {
            f: Arc::new(f),
            on_failure: None,
        }
    }

    /// Attach a handler for failures of effects started with this
    /// dispatcher.  The runner attaches the program's error handler before
    /// it runs a command.
    pub fn with_failure_handler(self, handler: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        Self {
            on_failure: Some(Arc::new(handler)),
            ..self
        }
    }

    /// Hand `error` to the failure handler.  Returns `false` when none is
    /// attached.
    pub fn report_failure(&self, error: &Error) -> bool {
        match self.on_failure {
            Some(ref handler) => {
                handler(error);
                true
            }
            None => false,
        }
    }

    /// Deliver `msg`.
    pub fn dispatch(&self, msg: Msg) {
        (self.f)(msg)
    }

    /// Build a dispatcher for a child message type.
    ///
    /// Every child message is converted with `f` and then forwarded here,
    /// which is how [`Cmd::map`](crate::Cmd::map) re-labels a component's
    /// messages into its parent's message type.
    pub fn map<Child: Send + 'static>(
        &self,
        f: impl Fn(Child) -> Msg + Send + Sync + 'static,
    ) -> Dispatch<Child> {
        let parent = self.clone();
        Dispatch {
            f: Arc::new(move |child| parent.dispatch(f(child))),
            on_failure: self.on_failure.clone(),
        }
    }
}

/// A single swappable slot holding "the current dispatch function".
///
/// The slot starts out poisoned: dispatching through it before any runner has
/// bound itself panics, because that can only happen when a subscription
/// fires before initialization.  [`bind`](DispatchRegistry::bind) replaces the
/// target unconditionally; the last write wins.
///
/// Closures capture [`dispatcher`](DispatchRegistry::dispatcher) rather than
/// a runner's own dispatch, so they keep working after the slot is rebound by
/// a restart or a program change.
pub struct DispatchRegistry<Msg> {
    slot: Arc<RwLock<Slot<Msg>>>,
}

struct Slot<Msg> {
    target: Dispatch<Msg>,
    bound: bool,
}

impl<Msg> Clone for DispatchRegistry<Msg> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<Msg: Send + 'static> Default for DispatchRegistry<Msg> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Msg> fmt::Debug for DispatchRegistry<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bound;
        f.debug_struct("DispatchRegistry")
            .field("bound", &bound)
            .finish()
    }
}

type GlobalMap = Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>;

static GLOBAL: OnceLock<GlobalMap> = OnceLock::new();

impl<Msg: Send + 'static> DispatchRegistry<Msg> {
    /// Create an unbound registry whose slot panics when invoked.
    pub fn new() -> Self {
        let poisoned = Dispatch::new(|_msg: Msg| panic!("{}", Error::NotStarted));
        Self {
            slot: Arc::new(RwLock::new(Slot {
                target: poisoned,
                bound: false,
            })),
        }
    }

    /// The process-wide registry for `Msg`.
    ///
    /// Created lazily on first use; every call for the same message type
    /// returns a handle to the same slot.
    pub fn global() -> Self {
        let map = GLOBAL.get_or_init(Default::default);
        let mut map = map.lock().unwrap_or_else(PoisonError::into_inner);
        let key = TypeId::of::<Msg>();
        if let Some(registry) = map.get(&key).and_then(|e| e.downcast_ref::<Self>()) {
            return registry.clone();
        }
        let registry = Self::new();
        map.insert(key, Box::new(registry.clone()));
        registry
    }

    /// Point the slot at `target`.
    pub fn bind(&self, target: Dispatch<Msg>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.target = target;
        slot.bound = true;
        tracing::debug!("dispatch registry rebound");
    }

    /// Whether any runner has bound the slot yet.
    pub fn is_bound(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bound
    }

    /// A stable dispatcher that reads the slot on every call.
    pub fn dispatcher(&self) -> Dispatch<Msg> {
        let slot = self.slot.clone();
        Dispatch::new(move |msg| {
            // Clone the target out so the lock is not held while the message
            // is processed (processing may rebind the slot).
            let target = slot
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .target
                .clone();
            target.dispatch(msg)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Dispatch<i32>, Arc<Mutex<Vec<i32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Dispatch::new(move |m| sink.lock().unwrap().push(m)), seen)
    }

    #[test]
    #[should_panic(expected = "before any runner was started")]
    fn unbound_registry_panics() {
        let registry = DispatchRegistry::<i32>::new();
        registry.dispatcher().dispatch(1);
    }

    #[test]
    fn dispatcher_follows_rebinding() {
        let registry = DispatchRegistry::<i32>::new();
        let dispatch = registry.dispatcher();

        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();

        registry.bind(first);
        dispatch.dispatch(1);
        registry.bind(second);
        dispatch.dispatch(2);

        assert_eq!(*first_seen.lock().unwrap(), vec![1]);
        assert_eq!(*second_seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn is_bound_tracks_binding() {
        let registry = DispatchRegistry::<i32>::new();
        assert!(!registry.is_bound());
        registry.bind(Dispatch::new(|_| {}));
        assert!(registry.is_bound());
    }

    #[test]
    fn target_may_rebind_while_dispatching() {
        let registry = DispatchRegistry::<i32>::new();
        let (after, after_seen) = recorder();
        let rebinder = registry.clone();
        registry.bind(Dispatch::new(move |_| rebinder.bind(after.clone())));

        let dispatch = registry.dispatcher();
        dispatch.dispatch(1);
        dispatch.dispatch(2);
        assert_eq!(*after_seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn global_is_shared_per_message_type() {
        struct GlobalMsg(u8);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        DispatchRegistry::<GlobalMsg>::global().bind(Dispatch::new(move |p: GlobalMsg| {
            counter.fetch_add(p.0 as usize, Ordering::SeqCst);
        }));

        DispatchRegistry::<GlobalMsg>::global()
            .dispatcher()
            .dispatch(GlobalMsg(3));
        assert_eq!(count.load(Ordering::SeqCst), 3);

        struct Untouched;
        assert!(!DispatchRegistry::<Untouched>::global().is_bound());
    }

    #[test]
    fn map_converts_child_messages() {
        let (parent, seen) = recorder();
        let child: Dispatch<&'static str> = parent.map(|s: &str| s.len() as i32);
        child.dispatch("four");
        assert_eq!(*seen.lock().unwrap(), vec![4]);
    }

    #[test]
    fn failure_handler_follows_clones_and_maps() {
        let (parent, _) = recorder();
        assert!(!parent.report_failure(&Error::NotStarted));

        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        let parent = parent.with_failure_handler(move |err| sink.lock().unwrap().push(err.clone()));
        let child: Dispatch<u8> = parent.clone().map(i32::from);

        assert!(child.report_failure(&Error::NotStarted));
        assert_eq!(*failures.lock().unwrap(), vec![Error::NotStarted]);
    }
}
