use {
    crate::aggregator_core::SnapshotBoard,
    crossterm::event::{Event, KeyCode, KeyEventKind},
    ratatui::{backend::CrosstermBackend, Terminal},
    std::{io::Stdout, time::Duration},
    tokio_util::sync::CancellationToken,
};

const INPUT_POLL: Duration = Duration::from_millis(250);

/// Run the TUI event loop
///
/// Draws whatever the board holds, pulls on every tick. `q`/`Esc` cancels
/// `cancel` so the refresher stops too.
pub async fn run_ui(
    board: SnapshotBoard,
    window_size: usize,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = std::io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    crossterm::terminal::enable_raw_mode()?;

    // Alternate screen keeps stderr logs out of the drawing area
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::cursor::Hide
    )?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, &board, window_size, &cancel).await;

    // Restore the terminal even when the loop failed
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    crossterm::terminal::disable_raw_mode()?;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    board: &SnapshotBoard,
    window_size: usize,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    while !cancel.is_cancelled() {
        let state = board.current().await;
        terminal.draw(|f| {
            let area = f.size();
            crate::ui::layout::render_layout(f, area, &state, window_size);
        })?;

        // Non-blocking keyboard check
        if crossterm::event::poll(INPUT_POLL)? {
            if let Event::Key(key) = crossterm::event::read()? {
                if key.kind == KeyEventKind::Press && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    log::info!("👋 Quit requested from dashboard");
                    cancel.cancel();
                }
            }
        } else {
            tokio::task::yield_now().await;
        }
    }
    Ok(())
}
