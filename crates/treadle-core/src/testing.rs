use crate::host::{DrawHandler, FrameTick, Host, InitHandler, Signals, UpdateHandler};
use std::sync::Arc;
use std::time::Duration;

/// A headless host that fires its signals only when a test asks it to.
///
/// `TestHost` lets you drive a [`Runner`](crate::Runner) through its whole
/// lifecycle in a plain `#[test]` function: no engine, terminal, or tokio
/// runtime required.  Handlers registered by runners are stored and fired by
/// [`initialize`](TestHost::initialize), [`tick`](TestHost::tick),
/// [`draw`](TestHost::draw), and [`frame`](TestHost::frame).
///
/// # Example
///
/// ```rust,ignore
/// use treadle_core::testing::TestHost;
/// use treadle_core::{DispatchRegistry, Runner};
///
/// let host = TestHost::new();
/// let registry = DispatchRegistry::new();
/// let runner = Runner::with_registry(counter_program(), host.clone(), registry.clone());
///
/// host.initialize();                      // runs init, binds the registry
/// registry.dispatcher().dispatch(Msg::Inc);
/// assert_eq!(*runner.current_model().unwrap(), 1);
///
/// let views = host.draw();                // every view presented this frame
/// assert_eq!(views, vec!["count: 1".to_string()]);
/// ```
pub struct TestHost<V> {
    signals: Signals<V>,
}

impl<V: 'static> TestHost<V> {
    /// Create an uninitialized host.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            signals: Signals::default(),
        })
    }

    /// Fire the "initialize once" signal.  Later calls do nothing.
    pub fn initialize(&self) {
        self.signals.initialize();
    }

    /// Whether [`initialize`](TestHost::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.signals.is_initialized()
    }

    /// Advance the clock by `elapsed` and fire every update handler.
    pub fn tick(&self, elapsed: Duration) -> FrameTick {
        self.signals.tick(elapsed)
    }

    /// Fire every draw handler for the current tick and return the views
    /// they asked to present.
    pub fn draw(&self) -> Vec<V> {
        self.signals.draw()
    }

    /// One full frame: [`tick`](TestHost::tick) then [`draw`](TestHost::draw).
    pub fn frame(&self, elapsed: Duration) -> Vec<V> {
        self.tick(elapsed);
        self.draw()
    }

    /// Number of registered update handlers.
    pub fn update_handlers(&self) -> usize {
        self.signals.update_handlers()
    }

    /// Number of registered draw handlers.
    pub fn draw_handlers(&self) -> usize {
        self.signals.draw_handlers()
    }
}

impl<V: 'static> Host<V> for TestHost<V> {
    fn on_init(&self, handler: InitHandler) {
        self.signals.on_init(handler);
    }

    fn on_update(&self, handler: UpdateHandler) {
        self.signals.on_update(handler);
    }

    fn on_draw(&self, handler: DrawHandler<V>) {
        self.signals.on_draw(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn init_handlers_fire_once() {
        let host = TestHost::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        host.on_init(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        host.initialize();
        host.initialize();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_init_handler_runs_immediately() {
        let host = TestHost::<()>::new();
        host.initialize();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        host.on_init(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tick_advances_clock() {
        let host = TestHost::<()>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        host.on_update(Box::new(move |tick| s.lock().unwrap().push(tick)));

        host.tick(Duration::from_millis(10));
        let last = host.tick(Duration::from_millis(20));

        assert_eq!(last.total, Duration::from_millis(30));
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(seen.lock().unwrap()[1].elapsed, Duration::from_millis(20));
    }

    #[test]
    fn draw_collects_presented_views() {
        let host = TestHost::<&'static str>::new();
        host.on_draw(Box::new(|_| Some("a")));
        host.on_draw(Box::new(|_| None));
        host.on_draw(Box::new(|_| Some("c")));

        assert_eq!(host.frame(Duration::from_millis(16)), vec!["a", "c"]);
        assert_eq!(host.draw_handlers(), 3);
    }

    #[test]
    fn handlers_registered_while_firing_are_kept() {
        let host = TestHost::<()>::new();
        let inner = host.clone();
        host.on_update(Box::new(move |_| {
            if inner.update_handlers() == 0 {
                inner.on_update(Box::new(|_| {}));
            }
        }));

        host.tick(Duration::from_millis(1));
        assert_eq!(host.update_handlers(), 2);
    }
}
