use crate::error::TermError;
use crate::options::TermOptions;
use crate::terminal::{init_terminal, restore_terminal, Term};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::widgets::Widget;
use ratatui::Frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use treadle_core::{DrawHandler, FrameTick, Host, InitHandler, Signals, UpdateHandler};

/// Handler for key presses forwarded by a [`TerminalHost`].
pub type KeyHandler = Box<dyn FnMut(KeyEvent) + Send>;

/// A cloneable handle that stops a running [`TerminalHost`] frame loop.
///
/// `QuitHandle` is [`Clone`] and can be moved into handlers, commands, or
/// other threads.  The loop notices the request before its next frame.
#[derive(Debug, Clone, Default)]
pub struct QuitHandle {
    requested: Arc<AtomicBool>,
}

impl QuitHandle {
    /// Ask the frame loop to stop.
    pub fn quit(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Whether [`quit`](QuitHandle::quit) has been called.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// A [`Host`] driven by a ratatui terminal.
///
/// [`run`](TerminalHost::run) sets the terminal up, fires the "initialize
/// once" signal, and then fires update and draw at the configured frame rate
/// until ctrl+c or a [`QuitHandle`] stops it.  Every view returned by a draw
/// handler is a ratatui [`Widget`] rendered over the whole frame, in
/// registration order.  Key presses go to handlers registered with
/// [`on_key`](TerminalHost::on_key).
///
/// # Example
///
/// ```rust,ignore
/// use treadle_term::{TermOptions, TerminalHost};
///
/// let host = TerminalHost::new();
/// let runner = treadle_core::run_with_dynamic_view(host.clone(), program());
/// host.run(TermOptions::default()).await?;
/// ```
pub struct TerminalHost<W> {
    signals: Signals<W>,
    keys: Mutex<Vec<KeyHandler>>,
    quit: QuitHandle,
}

impl<W> std::fmt::Debug for TerminalHost<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalHost")
            .field("signals", &self.signals)
            .field("quit", &self.quit)
            .finish_non_exhaustive()
    }
}

impl<W: Widget + 'static> TerminalHost<W> {
    /// Create a host.  Nothing touches the terminal until
    /// [`run`](TerminalHost::run).
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            signals: Signals::default(),
            keys: Mutex::new(Vec::new()),
            quit: QuitHandle::default(),
        })
    }

    fn keys(&self) -> MutexGuard<'_, Vec<KeyHandler>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler for key presses.
    pub fn on_key(&self, handler: impl FnMut(KeyEvent) + Send + 'static) {
        self.keys().push(Box::new(handler));
    }

    /// A handle that stops the frame loop.
    pub fn quit_handle(&self) -> QuitHandle {
        self.quit.clone()
    }

    /// Forward one key press to every key handler.
    pub fn press(&self, key: KeyEvent) {
        let mut taken = TakenKeys {
            keys: &self.keys,
            handlers: std::mem::take(&mut *self.keys()),
        };
        for handler in taken.handlers.iter_mut() {
            handler(key);
        }
    }

    /// Fire the update then the draw signal and return the views to present.
    pub fn frame(&self, elapsed: Duration) -> Vec<W> {
        self.signals.tick(elapsed);
        self.signals.draw()
    }

    /// The tick passed to the most recent update signal.
    pub fn current_tick(&self) -> FrameTick {
        self.signals.current_tick()
    }

    /// Take over the terminal and run the frame loop until quit.
    ///
    /// The terminal is restored on return, including when the loop fails.
    pub async fn run(&self, options: TermOptions) -> Result<(), TermError> {
        if let Some(ref path) = options.log_file {
            crate::log_to_file(path)?;
        }
        let mut terminal = init_terminal(&options)?;
        let result = self.event_loop(&mut terminal, &options).await;
        restore_terminal()?;
        result
    }

    async fn event_loop(&self, terminal: &mut Term, options: &TermOptions) -> Result<(), TermError> {
        self.signals.initialize();
        tracing::debug!(fps = options.fps, "frame loop started");

        let mut interval = tokio::time::interval(options.frame_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frames = IntervalStream::new(interval);
        let mut events = EventStream::new();
        let mut last = Instant::now();

        loop {
            if self.quit.is_requested() {
                tracing::debug!("quit requested");
                return Ok(());
            }

            tokio::select! {
                biased;

                _ = tokio::signal::ctrl_c(), if options.handle_signals => {
                    tracing::debug!("received ctrl+c signal");
                    return Ok(());
                }

                Some(event) = events.next() => {
                    match event? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            if options.handle_signals && is_interrupt(&key) {
                                tracing::debug!("received ctrl+c key");
                                return Ok(());
                            }
                            self.press(key);
                        }
                        _ => {}
                    }
                }

                Some(now) = frames.next() => {
                    let elapsed = now.saturating_duration_since(last);
                    last = now;
                    let views = self.frame(elapsed);
                    terminal.draw(|frame| render_views(frame, views))?;
                }
            }
        }
    }
}

impl<W: Widget + 'static> Host<W> for TerminalHost<W> {
    fn on_init(&self, handler: InitHandler) {
        self.signals.on_init(handler);
    }

    fn on_update(&self, handler: UpdateHandler) {
        self.signals.on_update(handler);
    }

    fn on_draw(&self, handler: DrawHandler<W>) {
        self.signals.on_draw(handler);
    }
}

/// Key handlers out of the lock while a press is forwarded.  Dropping puts
/// them back, also when a handler panics.
struct TakenKeys<'a> {
    keys: &'a Mutex<Vec<KeyHandler>>,
    handlers: Vec<KeyHandler>,
}

impl Drop for TakenKeys<'_> {
    fn drop(&mut self) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let mut handlers = std::mem::take(&mut self.handlers);
        handlers.append(&mut keys);
        *keys = handlers;
    }
}

/// Raw mode delivers ctrl+c as a key press instead of a signal.
fn is_interrupt(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Render each view over the whole frame, later views on top.
pub fn render_views<W: Widget>(frame: &mut Frame, views: impl IntoIterator<Item = W>) {
    let area = frame.area();
    for view in views {
        frame.render_widget(view, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::layout::Rect;
    use ratatui::widgets::Paragraph;
    use ratatui::Terminal;
    use treadle_core::{Cmd, DispatchRegistry, Program, Runner};

    fn render_string(views: Vec<Paragraph<'static>>, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render_views(frame, views)).unwrap();
        buffer_string(terminal.backend().buffer())
    }

    fn buffer_string(buf: &Buffer) -> String {
        let area: Rect = buf.area;
        let mut output = String::new();
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                output.push_str(buf[(x, y)].symbol());
            }
            if y < area.bottom() - 1 {
                output.push('\n');
            }
        }
        output
    }

    #[derive(Debug)]
    enum Msg {
        Tick(FrameTick),
        Key(char),
    }

    fn typing_program() -> Program<String, Msg, Paragraph<'static>> {
        Program::new(
            || (String::new(), Cmd::none()),
            |msg, text: &String| match msg {
                Msg::Tick(_) => (text.clone(), Cmd::none()),
                Msg::Key(c) => (format!("{text}{c}"), Cmd::none()),
            },
            |text: &String, _| Paragraph::new(text.clone()),
        )
    }

    #[test]
    fn render_views_draws_the_view() {
        assert_eq!(
            render_string(vec![Paragraph::new("hi")], 4, 2),
            "hi  \n    "
        );
    }

    #[test]
    fn no_views_leaves_the_frame_blank() {
        assert_eq!(render_string(Vec::new(), 3, 1), "   ");
    }

    #[test]
    fn keys_reach_the_runner_through_the_registry() {
        let host = TerminalHost::new();
        let registry = DispatchRegistry::new();

        let keys = registry.dispatcher();
        host.on_key(move |key: KeyEvent| {
            if let KeyCode::Char(c) = key.code {
                keys.dispatch(Msg::Key(c));
            }
        });
        let ticks = registry.dispatcher();
        host.on_update(Box::new(move |tick| ticks.dispatch(Msg::Tick(tick))));

        let runner = Runner::with_registry(typing_program(), host.clone(), registry);
        host.signals.initialize();

        host.press(KeyEvent::from(KeyCode::Char('o')));
        host.press(KeyEvent::from(KeyCode::Char('k')));
        let views = host.frame(Duration::from_millis(16));

        assert_eq!(runner.current_model().unwrap().as_str(), "ok");
        assert_eq!(render_string(views, 3, 1), "ok ");
        assert_eq!(host.current_tick().total, Duration::from_millis(16));
    }

    #[test]
    fn panicking_key_handler_stays_registered() {
        let host = TerminalHost::<Paragraph<'static>>::new();
        let presses = Arc::new(Mutex::new(Vec::new()));

        let seen = presses.clone();
        host.on_key(move |key: KeyEvent| {
            if key.code == KeyCode::Char('x') {
                panic!("bad key");
            }
            seen.lock().unwrap().push(key.code);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            host.press(KeyEvent::from(KeyCode::Char('x')))
        }));
        assert!(result.is_err());

        host.press(KeyEvent::from(KeyCode::Char('y')));
        assert_eq!(*presses.lock().unwrap(), vec![KeyCode::Char('y')]);
        assert_eq!(host.keys().len(), 1);
    }

    #[test]
    fn quit_handle_is_shared() {
        let host = TerminalHost::<Paragraph<'static>>::new();
        let handle = host.quit_handle();
        assert!(!host.quit.is_requested());
        handle.quit();
        assert!(host.quit.is_requested());
    }

    #[test]
    fn ctrl_c_key_is_an_interrupt() {
        assert!(is_interrupt(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_interrupt(&KeyEvent::from(KeyCode::Char('c'))));
    }
}
