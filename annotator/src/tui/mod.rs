pub mod app;
pub mod frame_view;
pub mod ui;

use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use annotation_common::{FrameSource, Session};
use crossterm::{
    cursor::Show,
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use app::App;

const UI_FPS: u64 = 60;
const UI_FRAME_TIME: Duration = Duration::from_millis(1000 / UI_FPS);

/// Runs the interactive annotator until the user quits.
///
/// The session always comes back, also when the terminal fails, so the
/// caller can flush it.
pub fn run<S: FrameSource>(session: Session<S>) -> (Session<S>, Result<()>) {
    if let Err(err) = setup_terminal() {
        if let Err(restore_err) = restore_terminal() {
            log::warn!("Restoring terminal failed: {restore_err}");
        }
        return (session, Err(err));
    }

    let (session, result) = match Terminal::new(CrosstermBackend::new(io::stdout())) {
        Ok(mut terminal) => drive(&mut terminal, session, poll_event),
        Err(err) => (session, Err(err.into())),
    };

    let restored = restore_terminal();
    (session, result.and(restored))
}

fn setup_terminal() -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    Ok(())
}

/// Undoes every setup step, even when one of them fails.
fn restore_terminal() -> Result<()> {
    let raw = disable_raw_mode();
    let mut stdout = io::stdout();
    let screen = execute!(stdout, LeaveAlternateScreen, DisableMouseCapture, Show);
    raw?;
    screen?;
    Ok(())
}

fn poll_event(timeout: Duration) -> io::Result<Option<Event>> {
    if event::poll(timeout)? {
        event::read().map(Some)
    } else {
        Ok(None)
    }
}

/// Runs the event loop on any backend, handing the session back when it ends.
pub fn drive<B, S, E>(
    terminal: &mut Terminal<B>,
    session: Session<S>,
    next_event: E,
) -> (Session<S>, Result<()>)
where
    B: Backend,
    S: FrameSource,
    E: FnMut(Duration) -> io::Result<Option<Event>>,
{
    let mut app = App::new(session);
    let result = run_tui_loop(terminal, &mut app, next_event);
    (app.into_session(), result)
}

fn run_tui_loop<B, S, E>(terminal: &mut Terminal<B>, app: &mut App<S>, mut next_event: E) -> Result<()>
where
    B: Backend,
    S: FrameSource,
    E: FnMut(Duration) -> io::Result<Option<Event>>,
{
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let now = Instant::now();
        let timeout = app
            .playback
            .time_to_next(now)
            .map_or(UI_FRAME_TIME, |due| due.min(UI_FRAME_TIME));

        match next_event(timeout)? {
            Some(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                app.handle_key(key, Instant::now())
            }
            Some(Event::Mouse(mouse)) => app.handle_mouse(mouse),
            _ => {}
        }

        app.tick(Instant::now());

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use annotation_common::store::{self, SIDECAR_FILE_NAME};
    use annotation_common::{ClassPalette, ImageSequence};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use image::RgbImage;
    use ratatui::backend::TestBackend;

    use super::*;

    fn session(dir: &std::path::Path) -> Session<ImageSequence> {
        let frames_dir = dir.join("frames");
        std::fs::create_dir_all(&frames_dir).unwrap();
        for i in 0..3 {
            RgbImage::new(4, 4).save(frames_dir.join(format!("{i:04}.png"))).unwrap();
        }
        let source = ImageSequence::open(&frames_dir, (100, 50), 10.0).unwrap();
        let palette = ClassPalette::new(&["a".to_string(), "b".to_string()]).unwrap();
        Session::open(source, dir.join("out"), palette).unwrap()
    }

    fn key(code: KeyCode) -> io::Result<Option<Event>> {
        Ok(Some(Event::Key(KeyEvent::new(code, KeyModifiers::NONE))))
    }

    fn scripted(
        events: Vec<io::Result<Option<Event>>>,
    ) -> impl FnMut(Duration) -> io::Result<Option<Event>> {
        let mut events = VecDeque::from(events);
        move |_| events.pop_front().unwrap_or(Ok(None))
    }

    #[test]
    fn quit_key_ends_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let events = scripted(vec![key(KeyCode::Right), key(KeyCode::Char('q'))]);

        let (session, result) = drive(&mut terminal, session(dir.path()), events);
        assert!(result.is_ok());
        assert_eq!(session.frame_index(), 1);
    }

    #[test]
    fn terminal_failure_hands_back_unsaved_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        session.start_box(10, 10);
        session.commit_box(40, 30).unwrap();

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let events = scripted(vec![
            key(KeyCode::Right),
            Err(io::Error::other("terminal went away")),
        ]);

        let (session, result) = drive(&mut terminal, session, events);
        assert!(result.is_err());
        assert_eq!(session.frame_index(), 1);

        session.close().unwrap();
        let rows = store::load(&dir.path().join("out").join(SIDECAR_FILE_NAME)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].frame_index, 0);
        assert_eq!((rows[0].x_min, rows[0].y_max), (10, 30));
    }
}
