use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Timing payload carried by a host's per-frame signals.
///
/// The runtime never inspects it; applications forward it into their own
/// messages (e.g. `Msg::Tick(tick)`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTick {
    /// Time since the host started its frame loop.
    pub total: Duration,
    /// Time since the previous frame.
    pub elapsed: Duration,
}

impl FrameTick {
    /// Create a tick from total and per-frame elapsed time.
    pub fn new(total: Duration, elapsed: Duration) -> Self {
        Self { total, elapsed }
    }

    /// The tick that follows this one after `elapsed`.
    pub fn advance(self, elapsed: Duration) -> Self {
        Self {
            total: self.total + elapsed,
            elapsed,
        }
    }
}

/// Handler for the host's "initialize once" signal.
pub type InitHandler = Box<dyn FnOnce() + Send>;

/// Handler for the host's per-frame update signal.
pub type UpdateHandler = Box<dyn FnMut(FrameTick) + Send>;

/// Handler for the host's per-frame draw signal.  Returning `Some(view)` asks
/// the host to present that view for the frame.
pub type DrawHandler<V> = Box<dyn FnMut(FrameTick) -> Option<V> + Send>;

/// The event sources a host application provides to the runtime.
///
/// A host is typically a game engine or terminal frame loop.  It fires one
/// "initialize" signal after its own setup is done, then an update and a draw
/// signal once per frame.  Implementations are shared handles, so every
/// method takes `&self`.
///
/// # Contract
///
/// * [`on_init`](Host::on_init) is a latch: a handler registered after the
///   host has already initialized runs immediately, on the registering
///   thread.  Otherwise it runs exactly once when the host initializes.
/// * Update handlers run before draw handlers within a frame, each in
///   registration order.
/// * Every `Some(view)` returned by a draw handler in one frame is presented,
///   in registration order.
pub trait Host<V>: Send + Sync {
    /// Register a handler for the "initialize once" signal.
    fn on_init(&self, handler: InitHandler);

    /// Register a handler for the per-frame update signal.
    fn on_update(&self, handler: UpdateHandler);

    /// Register a handler for the per-frame draw signal.
    fn on_draw(&self, handler: DrawHandler<V>);
}

/// Handler bookkeeping shared by host implementations.
///
/// `Signals` stores registered handlers, implements the [`on_init`](Host::on_init)
/// latch, and fires update and draw handlers in registration order.  A host
/// embeds one and calls [`initialize`](Signals::initialize),
/// [`tick`](Signals::tick), and [`draw`](Signals::draw) from its own loop.
///
/// Handlers are taken out of the lock while they run, so a handler may
/// register further handlers (a [`Runner`](crate::Runner) changing program
/// does exactly that).  Handlers registered while firing join at the end and
/// first run on the next signal.  If a handler panics, every taken handler is
/// put back before the panic leaves `tick` or `draw`.
pub struct Signals<V> {
    state: Mutex<State<V>>,
}

struct State<V> {
    initialized: bool,
    tick: FrameTick,
    init: Vec<InitHandler>,
    update: Vec<UpdateHandler>,
    draw: Vec<DrawHandler<V>>,
}

impl<V> State<V> {
    fn updates(&mut self) -> &mut Vec<UpdateHandler> {
        &mut self.update
    }

    fn draws(&mut self) -> &mut Vec<DrawHandler<V>> {
        &mut self.draw
    }
}

/// Handlers taken out of a [`Signals`] slot while they run.
///
/// Dropping puts them back ahead of any handler registered in the meantime.
/// This also happens while unwinding, so a panicking handler does not take
/// its siblings down with it.
struct Taken<'a, V, T> {
    signals: &'a Signals<V>,
    slot: fn(&mut State<V>) -> &mut Vec<T>,
    handlers: Vec<T>,
}

impl<'a, V, T> Taken<'a, V, T> {
    fn new(signals: &'a Signals<V>, slot: fn(&mut State<V>) -> &mut Vec<T>, handlers: Vec<T>) -> Self {
        Self {
            signals,
            slot,
            handlers,
        }
    }
}

impl<V, T> Drop for Taken<'_, V, T> {
    fn drop(&mut self) {
        let mut state = self.signals.lock();
        let slot = (self.slot)(&mut *state);
        let mut handlers = std::mem::take(&mut self.handlers);
        handlers.append(slot);
        *slot = handlers;
    }
}

impl<V> Default for Signals<V> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                initialized: false,
                tick: FrameTick::default(),
                init: Vec::new(),
                update: Vec::new(),
                draw: Vec::new(),
            }),
        }
    }
}

impl<V> std::fmt::Debug for Signals<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Signals")
            .field("initialized", &state.initialized)
            .field("tick", &state.tick)
            .field("update", &state.update.len())
            .field("draw", &state.draw.len())
            .finish()
    }
}

impl<V> Signals<V> {
    fn lock(&self) -> MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire the "initialize once" signal.  Returns `false` if it already
    /// fired.
    pub fn initialize(&self) -> bool {
        let handlers = {
            let mut state = self.lock();
            if state.initialized {
                return false;
            }
            state.initialized = true;
            std::mem::take(&mut state.init)
        };
        for handler in handlers {
            handler();
        }
        true
    }

    /// Whether [`initialize`](Signals::initialize) has fired.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// The tick passed to the most recent update signal.
    pub fn current_tick(&self) -> FrameTick {
        self.lock().tick
    }

    /// Advance the clock by `elapsed` and fire every update handler.
    pub fn tick(&self, elapsed: Duration) -> FrameTick {
        let (tick, handlers) = {
            let mut state = self.lock();
            state.tick = state.tick.advance(elapsed);
            (state.tick, std::mem::take(&mut state.update))
        };
        let mut taken = Taken::new(self, State::updates, handlers);
        for handler in taken.handlers.iter_mut() {
            handler(tick);
        }
        tick
    }

    /// Fire every draw handler for the current tick and collect the views
    /// they asked to present.
    pub fn draw(&self) -> Vec<V> {
        let (tick, handlers) = {
            let mut state = self.lock();
            (state.tick, std::mem::take(&mut state.draw))
        };
        let mut taken = Taken::new(self, State::draws, handlers);
        let views = taken
            .handlers
            .iter_mut()
            .filter_map(|handler| handler(tick))
            .collect();
        views
    }

    /// Number of registered update handlers.
    pub fn update_handlers(&self) -> usize {
        self.lock().update.len()
    }

    /// Number of registered draw handlers.
    pub fn draw_handlers(&self) -> usize {
        self.lock().draw.len()
    }
}

impl<V: 'static> Host<V> for Signals<V> {
    fn on_init(&self, handler: InitHandler) {
        let mut state = self.lock();
        if state.initialized {
            drop(state);
            handler();
        } else {
            state.init.push(handler);
        }
    }

    fn on_update(&self, handler: UpdateHandler) {
        self.lock().update.push(handler);
    }

    fn on_draw(&self, handler: DrawHandler<V>) {
        self.lock().draw.push(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn advance_accumulates_total() {
        let tick = FrameTick::default()
            .advance(Duration::from_millis(16))
            .advance(Duration::from_millis(17));
        assert_eq!(tick.total, Duration::from_millis(33));
        assert_eq!(tick.elapsed, Duration::from_millis(17));
    }

    #[test]
    fn init_latch_runs_late_handlers_immediately() {
        let signals = Signals::<()>::default();
        let seen = Arc::new(AtomicUsize::new(0));

        let early = seen.clone();
        signals.on_init(Box::new(move || {
            early.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        assert!(signals.initialize());
        assert!(!signals.initialize());
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let late = seen.clone();
        signals.on_init(Box::new(move || {
            late.fetch_add(10, Ordering::SeqCst);
        }));
        assert_eq!(seen.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn draw_handler_registered_while_drawing_waits_a_frame() {
        let signals = Arc::new(Signals::<u8>::default());
        let inner = signals.clone();
        signals.on_draw(Box::new(move |_| {
            if inner.draw_handlers() == 0 {
                inner.on_draw(Box::new(|_| Some(2)));
            }
            Some(1)
        }));

        assert_eq!(signals.draw(), vec![1]);
        assert_eq!(signals.draw(), vec![1, 2]);
    }

    #[test]
    fn panicking_handlers_stay_registered() {
        let signals = Signals::<u8>::default();
        let ticks = Arc::new(AtomicUsize::new(0));

        let counted = ticks.clone();
        signals.on_update(Box::new(move |_| {
            if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first tick failed");
            }
        }));
        let draws = Arc::new(AtomicUsize::new(0));
        let counted = draws.clone();
        signals.on_draw(Box::new(move |_| {
            if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first draw failed");
            }
            Some(1)
        }));
        signals.on_draw(Box::new(|_| Some(2)));

        let tick = catch_unwind(AssertUnwindSafe(|| signals.tick(Duration::from_millis(1))));
        assert!(tick.is_err());
        let draw = catch_unwind(AssertUnwindSafe(|| signals.draw()));
        assert!(draw.is_err());

        assert_eq!(signals.update_handlers(), 1);
        assert_eq!(signals.draw_handlers(), 2);
        signals.tick(Duration::from_millis(1));
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert_eq!(signals.draw(), vec![1, 2]);
    }

    #[test]
    fn tick_is_visible_to_draw() {
        let signals = Signals::<FrameTick>::default();
        signals.on_draw(Box::new(|tick| Some(tick)));
        signals.tick(Duration::from_millis(5));
        signals.tick(Duration::from_millis(7));

        assert_eq!(
            signals.draw(),
            vec![FrameTick::new(Duration::from_millis(12), Duration::from_millis(7))]
        );
        assert_eq!(signals.current_tick().total, Duration::from_millis(12));
    }
}
