//! # Sprite Example
//!
//! A glyph that moves around a bounded play-field:
//! - Arrow keys or `wasd` steer, space stops, `q`/Esc quits
//! - Host signals (frame ticks, key presses) are wired through the dispatch
//!   registry *before* any program exists
//! - The quit request is a [`Cmd`] returned from `update`
//!
//! Run with: `cargo run --example sprite`
//! Set `SPRITE_TRACE=1` to log every message and model to `sprite.log`.

use std::time::Duration;
use treadle::crossterm::event::{KeyCode, KeyEvent};
use treadle::ratatui::buffer::Buffer;
use treadle::ratatui::layout::Rect;
use treadle::ratatui::widgets::{Block, Widget};
use treadle::term::{QuitHandle, TermError, TermOptions, TerminalHost};
use treadle::{run_with_dynamic_view, Cmd, DispatchRegistry, FrameTick, Host, Program};

/// Play-field size in cells, excluding the border.
const FIELD: (u16, u16) = (40, 12);
/// Cells per second.
const SPEED: f32 = 12.0;

#[derive(Debug, Clone, PartialEq)]
struct Sprite {
    x: f32,
    y: f32,
    heading: (f32, f32),
}

impl Sprite {
    fn centered() -> Self {
        Sprite {
            x: f32::from(FIELD.0) / 2.0,
            y: f32::from(FIELD.1) / 2.0,
            heading: (0.0, 0.0),
        }
    }

    /// Move along the heading for `elapsed`, staying inside the play-field.
    fn advance(&self, elapsed: Duration) -> Self {
        let step = SPEED * elapsed.as_secs_f32();
        Sprite {
            x: (self.x + self.heading.0 * step).clamp(0.0, f32::from(FIELD.0 - 1)),
            y: (self.y + self.heading.1 * step).clamp(0.0, f32::from(FIELD.1 - 1)),
            heading: self.heading,
        }
    }

    fn cell(&self) -> (u16, u16) {
        (self.x.round() as u16, self.y.round() as u16)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Msg {
    Tick(FrameTick),
    Steer(f32, f32),
    Quit,
}

/// Map a key press to a message.
fn key_to_msg(key: KeyEvent) -> Option<Msg> {
    match key.code {
        KeyCode::Left | KeyCode::Char('a') => Some(Msg::Steer(-1.0, 0.0)),
        KeyCode::Right | KeyCode::Char('d') => Some(Msg::Steer(1.0, 0.0)),
        KeyCode::Up | KeyCode::Char('w') => Some(Msg::Steer(0.0, -1.0)),
        KeyCode::Down | KeyCode::Char('s') => Some(Msg::Steer(0.0, 1.0)),
        KeyCode::Char(' ') => Some(Msg::Steer(0.0, 0.0)),
        KeyCode::Char('q') | KeyCode::Esc => Some(Msg::Quit),
        _ => None,
    }
}

/// The play-field with the sprite drawn in it.
#[derive(Debug)]
struct Field {
    sprite: (u16, u16),
}

impl Widget for Field {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let area = Rect {
            width: area.width.min(FIELD.0 + 2),
            height: area.height.min(FIELD.1 + 2),
            ..area
        };
        let block = Block::bordered().title(" sprite ");
        let inner = block.inner(area);
        block.render(area, buf);

        let (x, y) = self.sprite;
        if x < inner.width && y < inner.height {
            if let Some(cell) = buf.cell_mut((inner.x + x, inner.y + y)) {
                cell.set_symbol("@");
            }
        }
    }
}

fn program(quit: QuitHandle) -> Program<Sprite, Msg, Field> {
    Program::new(
        || (Sprite::centered(), Cmd::none()),
        move |msg, sprite: &Sprite| match msg {
            Msg::Tick(tick) => (sprite.advance(tick.elapsed), Cmd::none()),
            Msg::Steer(dx, dy) => (
                Sprite {
                    heading: (dx, dy),
                    ..sprite.clone()
                },
                Cmd::none(),
            ),
            Msg::Quit => {
                let quit = quit.clone();
                (sprite.clone(), Cmd::of_sub(move |_| quit.quit()))
            }
        },
        |sprite: &Sprite, _| Field {
            sprite: sprite.cell(),
        },
    )
}

#[tokio::main]
async fn main() -> Result<(), TermError> {
    let options = TermOptions {
        title: Some("treadle sprite".into()),
        log_file: Some("sprite.log".into()),
        ..TermOptions::default()
    };

    let host = TerminalHost::new();
    let registry = DispatchRegistry::<Msg>::global();

    // Wired before the program exists; resolves through the registry.
    let ticks = registry.dispatcher();
    host.on_update(Box::new(move |tick| ticks.dispatch(Msg::Tick(tick))));
    let keys = registry.dispatcher();
    host.on_key(move |key| {
        if let Some(msg) = key_to_msg(key) {
            keys.dispatch(msg);
        }
    });

    let mut program = program(host.quit_handle());
    if std::env::var_os("SPRITE_TRACE").is_some() {
        program = program.with_console_trace();
    }
    let _runner = run_with_dynamic_view(host.clone(), program);

    host.run(options).await?;
    tracing::info!("sprite exited");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use treadle::testing::TestHost;
    use treadle::Runner;

    #[test]
    fn moves_along_heading() {
        let sprite = Sprite {
            heading: (1.0, 0.0),
            ..Sprite::centered()
        };
        let moved = sprite.advance(Duration::from_millis(500));
        assert_eq!(moved.x, sprite.x + 6.0);
        assert_eq!(moved.y, sprite.y);
    }

    #[test]
    fn stays_inside_the_field() {
        let sprite = Sprite {
            x: 1.0,
            y: 10.0,
            heading: (-1.0, 1.0),
        };
        let moved = sprite.advance(Duration::from_secs(5));
        assert_eq!(moved.cell(), (0, FIELD.1 - 1));
    }

    #[test]
    fn keys_map_to_messages() {
        assert_eq!(key_to_msg(KeyEvent::from(KeyCode::Left)), Some(Msg::Steer(-1.0, 0.0)));
        assert_eq!(key_to_msg(KeyEvent::from(KeyCode::Char('s'))), Some(Msg::Steer(0.0, 1.0)));
        assert_eq!(key_to_msg(KeyEvent::from(KeyCode::Esc)), Some(Msg::Quit));
        assert_eq!(key_to_msg(KeyEvent::from(KeyCode::Char('x'))), None);
    }

    #[test]
    fn ticks_wired_before_the_runner_move_the_sprite() {
        let host = TestHost::new();
        let registry = DispatchRegistry::new();
        let ticks = registry.dispatcher();
        host.on_update(Box::new(move |tick| ticks.dispatch(Msg::Tick(tick))));

        let quit = QuitHandle::default();
        let runner = Runner::with_registry(program(quit.clone()), host.clone(), registry.clone());
        host.initialize();

        registry.dispatcher().dispatch(Msg::Steer(1.0, 0.0));
        let views = host.frame(Duration::from_millis(250));

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].sprite, (23, 6));
        assert_eq!(runner.current_model().unwrap().cell(), (23, 6));

        registry.dispatcher().dispatch(Msg::Quit);
        assert!(quit.is_requested());
    }
}
