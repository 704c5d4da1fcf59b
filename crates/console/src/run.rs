//! Interactive console loop.
//!
//! A blocking thread reads crossterm key events and queues them for the
//! async loop, which owns the composer, forwards submissions to the
//! dispatcher, and prints session events as they arrive.

use std::io::Write;
use std::sync::Arc;

use crossterm::event::{Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;
use tracing::debug;

use webpilot_commands::dispatcher::{CommandDispatcher, Outcome};
use webpilot_commands::TaskResolution;
use webpilot_core::session::{SessionEvent, SessionState};
use webpilot_core::Result;

use crate::composer::{Composer, ComposerAction, InputEvent, InputMode};

enum ConsoleInput {
    Key(InputEvent),
    Quit,
}

/// Restores the terminal even when the loop errors out.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

pub async fn run(dispatcher: Arc<CommandDispatcher>, session: Arc<SessionState>) -> Result<()> {
    let _guard = RawModeGuard::enable()?;
    let mut events = session.subscribe();
    let (input_tx, mut input_rx) = mpsc::channel::<ConsoleInput>(64);

    // Blocking key reader; exits when the receiver goes away.
    let reader = tokio::task::spawn_blocking(move || loop {
        match crossterm::event::read() {
            Ok(TermEvent::Key(key)) => {
                if let Some(input) = map_key(key) {
                    let quitting = matches!(input, ConsoleInput::Quit);
                    if input_tx.blocking_send(input).is_err() || quitting {
                        break;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Key read error, leaving console");
                break;
            }
        }
    });

    print_line("webpilot console — / opens the palette, Ctrl+C exits");
    let mut composer = Composer::new();
    draw_prompt(&composer);

    loop {
        tokio::select! {
            input = input_rx.recv() => {
                match input {
                    Some(ConsoleInput::Key(event)) => {
                        let action = composer.handle(event);
                        if let ComposerAction::Submitted { command_id, text } = action {
                            print_line("");
                            submit(&dispatcher, &command_id, &text).await;
                        }
                        draw_prompt(&composer);
                    }
                    Some(ConsoleInput::Quit) | None => break,
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Some(line) = describe_event(&event) {
                            print_line(&line);
                            draw_prompt(&composer);
                        }
                    }
                    // Lagged observers just miss old events.
                    Err(_) => {}
                }
            }
        }
    }

    reader.abort();
    print_line("");
    Ok(())
}

async fn submit(dispatcher: &CommandDispatcher, command_id: &str, text: &str) {
    match dispatcher.submit(command_id, text).await {
        Ok(Outcome::Completed { .. }) => {}
        Ok(Outcome::Started { resolution, .. }) => {
            // Terminal resolution is also logged by the correlator; this
            // just keeps the receiver alive until then.
            tokio::spawn(async move {
                match resolution.await {
                    Ok(TaskResolution::Completed(_)) | Ok(TaskResolution::Failed(_)) => {}
                    Err(_) => debug!("Resolution channel dropped"),
                }
            });
        }
        Err(e) => print_line(&format!("✗ {}", e)),
    }
}

fn map_key(key: KeyEvent) -> Option<ConsoleInput> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let input = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Some(ConsoleInput::Quit)
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Some(ConsoleInput::Quit)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => InputEvent::Clear,
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => InputEvent::Char(c),
        KeyCode::Backspace => InputEvent::Backspace,
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => InputEvent::Newline,
        KeyCode::Enter => InputEvent::Submit,
        KeyCode::Esc => InputEvent::Escape,
        KeyCode::Up => InputEvent::Up,
        KeyCode::Down => InputEvent::Down,
        _ => return None,
    };
    Some(ConsoleInput::Key(input))
}

fn describe_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Log(entry) => {
            let marker = if entry.is_error { "✗" } else { "•" };
            Some(format!("{} [{}] {}", marker, entry.origin, entry.text))
        }
        SessionEvent::Phase(phase) => Some(format!("• browser {}", phase)),
        SessionEvent::Connectivity(connectivity) => Some(format!("• channel {:?}", connectivity)),
        SessionEvent::Progress(Some(note)) => Some(format!("… {}", note)),
        SessionEvent::Progress(None) => None,
        SessionEvent::FrameRate(hz) => Some(format!("• streaming at {} Hz", hz)),
        // Frame and loading flips redraw the screen view, not the log.
        SessionEvent::FrameReplaced | SessionEvent::Loading(_) => None,
    }
}

/// Raw mode needs explicit carriage returns.
fn print_line(text: &str) {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "\r{}\r\n", text);
    let _ = stdout.flush();
}

fn draw_prompt(composer: &Composer) {
    let mut stdout = std::io::stdout();
    if composer.mode() == InputMode::PaletteOpen {
        for (i, cmd) in composer.palette_entries().iter().enumerate() {
            let marker = if i == composer.palette_index() {
                ">"
            } else {
                " "
            };
            let _ = write!(
                stdout,
                "\r{} /{:<12} {}\r\n",
                marker, cmd.id, cmd.description
            );
        }
    }
    let hint = match composer.mode() {
        InputMode::CommandArmed => {
            let cmd = composer.active_command();
            format!("[{}] ", cmd.display_name)
        }
        _ => String::new(),
    };
    let _ = write!(
        stdout,
        "\r> {}{}",
        hint,
        composer.buffer().replace('\n', " ⏎ ")
    );
    let _ = stdout.flush();
}
