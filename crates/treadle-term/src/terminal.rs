use crate::error::TermError;
use crate::options::{OutputTarget, TermOptions};
use crossterm::cursor;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

pub(crate) type Term = Terminal<CrosstermBackend<Box<dyn Write + Send>>>;

/// What has to be undone to hand the terminal back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Teardown {
    alt_screen: bool,
    output: OutputTarget,
    on_panic: bool,
}

impl Teardown {
    /// Every step runs even if an earlier one failed; the first error wins.
    fn run(self) -> io::Result<()> {
        let raw = disable_raw_mode();
        let mut writer = self.output.writer();
        let shown = execute!(writer, cursor::Show);
        let screen = if self.alt_screen {
            execute!(writer, LeaveAlternateScreen)
        } else {
            Ok(())
        };
        raw.and(shown).and(screen)
    }
}

/// Present while a frame loop owns the terminal.  Whoever takes it runs the
/// teardown, so it happens once per session.
static ACTIVE: Mutex<Option<Teardown>> = Mutex::new(None);

fn active() -> MutexGuard<'static, Option<Teardown>> {
    ACTIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Chain a hook that hands the terminal back before the panic is printed.
/// Installed at most once per process; later sessions reuse it through
/// [`ACTIVE`].
fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let pending = {
                let mut active = active();
                match *active {
                    Some(teardown) if teardown.on_panic => active.take(),
                    _ => None,
                }
            };
            if let Some(teardown) = pending {
                teardown.run().ok();
            }
            previous(info);
        }));
    });
}

/// Take over the terminal: raw mode, then the alternate screen and title
/// when asked for, with the cursor hidden.
pub(crate) fn init_terminal(options: &TermOptions) -> Result<Term, TermError> {
    if options.catch_panics {
        install_panic_hook();
    }

    enable_raw_mode()?;
    *active() = Some(Teardown {
        alt_screen: options.alt_screen,
        output: options.output,
        on_panic: options.catch_panics,
    });

    match enter(options) {
        Ok(terminal) => {
            tracing::debug!(alt_screen = options.alt_screen, "terminal initialized");
            Ok(terminal)
        }
        Err(err) => {
            restore_terminal().ok();
            Err(err)
        }
    }
}

fn enter(options: &TermOptions) -> Result<Term, TermError> {
    let mut writer = options.output.writer();
    if options.alt_screen {
        execute!(writer, EnterAlternateScreen)?;
    }
    if let Some(ref title) = options.title {
        execute!(writer, SetTitle(title))?;
    }
    execute!(writer, cursor::Hide)?;
    Ok(Terminal::new(CrosstermBackend::new(writer))?)
}

/// Hand the terminal back.  Does nothing when no session owns it, e.g.
/// because the panic hook already restored it.
pub(crate) fn restore_terminal() -> Result<(), TermError> {
    let Some(teardown) = active().take() else {
        return Ok(());
    };
    teardown.run()?;
    tracing::debug!("terminal restored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_without_a_session_does_nothing() {
        assert!(active().is_none());
        assert!(restore_terminal().is_ok());
        assert!(active().is_none());
    }
}
