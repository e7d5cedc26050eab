use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::display::{draw_top, TopState};
use crate::metrics::Snapshot;

/// Redraw cadence when no snapshot arrives, so resizes are picked up
const IDLE_REDRAW: Duration = Duration::from_secs(1);
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Whether a key press asks the view to close
pub fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Leaves raw mode and the alternate screen when dropped, on every exit path
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            error!("Failed to disable raw mode: {}", e);
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, cursor::Show) {
            error!("Failed to restore terminal: {}", e);
        }
    }
}

/// Take over the terminal and render snapshots until `cancel` fires.
///
/// Quitting from the keyboard cancels `cancel`, which also stops the poller.
pub async fn run_top(
    snapshots: mpsc::Receiver<Snapshot>,
    cancel: CancellationToken,
    backend: String,
) -> Result<()> {
    enable_raw_mode()?;
    let guard = TerminalGuard;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;

    let input = spawn_input_listener(cancel.clone());
    let result = run_top_loop(&mut terminal, snapshots, &cancel, TopState::new(backend)).await;

    // A render failure must not leave the poller running
    cancel.cancel();
    drop(guard);

    if let Err(e) = input.await {
        error!("Keyboard listener failed: {}", e);
    }
    result
}

async fn run_top_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    mut snapshots: mpsc::Receiver<Snapshot>,
    cancel: &CancellationToken,
    mut state: TopState,
) -> Result<()> {
    let mut redraw = tokio::time::interval(IDLE_REDRAW);

    loop {
        terminal.draw(|f| draw_top(f, &state))?;

        tokio::select! {
            _ = cancel.cancelled() => break,
            snapshot = snapshots.recv() => match snapshot {
                Some(snapshot) => {
                    debug!("Rendering snapshot observed at {}", snapshot.observed_at);
                    state.update(snapshot);
                }
                None => {
                    info!("Snapshot channel closed");
                    break;
                }
            },
            _ = redraw.tick() => {}
        }
    }
    Ok(())
}

/// Read keys on a blocking thread and cancel on a quit key
fn spawn_input_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !cancel.is_cancelled() {
            match event::poll(INPUT_POLL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if is_quit_key(&key) => {
                        info!("Quit requested from keyboard");
                        cancel.cancel();
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Failed to read terminal event: {}", e);
                        cancel.cancel();
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    error!("Failed to poll terminal events: {}", e);
                    cancel.cancel();
                }
            }
        }
    })
}
