use std::time::Instant;

use annotation_common::{BoundingBox, FrameSource, Playback, Session};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

const SKIP_SMALL: i64 = 100;
const SKIP_MEDIUM: i64 = 500;
const SKIP_LARGE: i64 = 1800;

pub struct App<S: FrameSource> {
    pub session: Session<S>,
    pub playback: Playback,
    /// Where the frame was drawn last, in terminal cells.
    pub frame_area: Rect,
    pub preview: Option<BoundingBox>,
    pub status: String,
    pub unsaved: bool,
    should_quit: bool,
}

impl<S: FrameSource> App<S> {
    pub fn new(session: Session<S>) -> Self {
        let playback = Playback::new(session.fps());
        Self {
            session,
            playback,
            frame_area: Rect::default(),
            preview: None,
            status: String::from("Drag with the left mouse button to draw a box"),
            unsaved: false,
            should_quit: false,
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn into_session(self) -> Session<S> {
        self.session
    }

    pub fn progress_percentage(&self) -> f32 {
        let total = self.session.frame_count();
        if total > 0 {
            (self.session.frame_index() + 1) as f32 / total as f32 * 100.0
        } else {
            0.0
        }
    }

    // -- navigation --

    fn navigated(&mut self, moved: bool) {
        if moved {
            self.preview = None;
        }
    }

    pub fn next_frame(&mut self) -> bool {
        let moved = self.session.next_frame();
        self.navigated(moved);
        moved
    }

    pub fn skip(&mut self, frames: i64) {
        let moved = self.session.skip(frames);
        self.navigated(moved);
        if !moved {
            self.status = format!("Cannot skip {frames:+} frames from here");
        }
    }

    pub fn seek(&mut self, index: u64) {
        let moved = self.session.seek(index);
        self.navigated(moved);
    }

    /// Advances playback when its timer is due, stopping at the end of the video.
    pub fn tick(&mut self, now: Instant) {
        if self.playback.poll(now) && !self.next_frame() {
            self.playback.stop();
            self.status = String::from("Playback stopped");
        }
    }

    pub fn toggle_playback(&mut self, now: Instant) {
        self.playback.toggle(now);
        self.status = if self.playback.is_playing() {
            format!("Playing at {:.1} fps", self.session.fps())
        } else {
            String::from("Paused")
        };
    }

    // -- annotation edits --

    pub fn set_active_class(&mut self, class_id: usize) {
        if self.session.palette_mut().set_active(class_id) {
            self.status = format!("Active class: {}", self.active_class_name());
        }
    }

    pub fn toggle_active_class(&mut self) {
        self.session.palette_mut().toggle();
        self.status = format!("Active class: {}", self.active_class_name());
    }

    fn active_class_name(&self) -> &str {
        let palette = self.session.palette();
        palette
            .get(palette.active())
            .map(|c| c.name.as_str())
            .unwrap_or("?")
    }

    pub fn recolor_selected(&mut self) {
        self.session.recolor_selected();
        self.unsaved |= self.session.selected().is_some();
    }

    pub fn delete_selected(&mut self) {
        if self.session.selected().is_some() {
            self.session.delete_selected();
            self.unsaved = true;
            self.status = String::from("Deleted box");
        }
    }

    pub fn save(&mut self) {
        match self.session.save() {
            Ok(()) => {
                self.unsaved = false;
                self.status = format!("Saved {} rows", self.session.store().len());
            }
            Err(err) => {
                log::error!("Saving failed: {err}");
                self.status = format!("Saving failed: {err}");
            }
        }
    }

    // -- input --

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') | KeyCode::Char('S') => self.save(),
                KeyCode::Char('c') => self.quit(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.quit(),
            KeyCode::Char(' ') => self.toggle_playback(now),
            KeyCode::Right => {
                if !self.next_frame() {
                    self.status = String::from("Last frame");
                }
            }
            KeyCode::Left => self.skip(-1),
            KeyCode::PageDown => self.skip(SKIP_SMALL),
            KeyCode::PageUp => self.skip(-SKIP_SMALL),
            KeyCode::Char(']') => self.skip(SKIP_MEDIUM),
            KeyCode::Char('[') => self.skip(-SKIP_MEDIUM),
            KeyCode::Char('+') => self.skip(SKIP_LARGE),
            KeyCode::Char('-') => self.skip(-SKIP_LARGE),
            KeyCode::Home => self.seek(0),
            KeyCode::End => self.seek(u64::MAX),
            KeyCode::Up => self.session.select_prev(),
            KeyCode::Down => self.session.select_next(),
            KeyCode::Enter => self.recolor_selected(),
            KeyCode::Delete | KeyCode::Backspace => self.delete_selected(),
            KeyCode::Tab => self.toggle_active_class(),
            KeyCode::Char(c) => {
                if let Some(class_id) = self.session.palette().class_for_key(c) {
                    self.set_active_class(class_id);
                }
            }
            _ => {}
        }
    }

    /// Terminal cell to frame pixel. Cells outside the frame map outside the
    /// frame range; the session clamps them.
    pub fn cell_to_frame(&self, column: u16, row: u16) -> Option<(i32, i32)> {
        let area = self.frame_area;
        if area.width == 0 || area.height == 0 {
            return None;
        }
        let (width, height) = self.session.frame_size();
        // Sample the cell centre; each cell covers two pixel rows of the view.
        let cx = (column as i32 - area.x as i32) * 2 + 1;
        let cy = (row as i32 - area.y as i32) * 2 + 1;
        let x = cx as i64 * width as i64 / (area.width as i64 * 2);
        let y = cy as i64 * height as i64 / (area.height as i64 * 2);
        Some((x as i32, y as i32))
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        let Some((x, y)) = self.cell_to_frame(mouse.column, mouse.row) else {
            return;
        };
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let inside = mouse.column >= self.frame_area.x
                    && mouse.column < self.frame_area.right()
                    && mouse.row >= self.frame_area.y
                    && mouse.row < self.frame_area.bottom();
                if inside {
                    self.session.start_box(x, y);
                    self.preview = self.session.update_box_preview(x, y);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                self.preview = self.session.update_box_preview(x, y);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(idx) = self.session.commit_box(x, y) {
                    let bbox = self.session.boxes()[idx];
                    self.status = format!(
                        "Added box #{} ({}, {})-({}, {})",
                        idx + 1,
                        bbox.x_min(),
                        bbox.y_min(),
                        bbox.x_max(),
                        bbox.y_max()
                    );
                    self.unsaved = true;
                }
                self.preview = None;
            }
            MouseEventKind::Down(MouseButton::Right) => {
                self.session.cancel_box();
                self.preview = None;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use annotation_common::{ClassPalette, ImageSequence};
    use image::RgbImage;

    use super::*;

    fn app(frames: u32, dir: &std::path::Path) -> App<ImageSequence> {
        let frames_dir = dir.join("frames");
        std::fs::create_dir_all(&frames_dir).unwrap();
        for i in 0..frames {
            RgbImage::new(4, 4).save(frames_dir.join(format!("{i:04}.png"))).unwrap();
        }
        let source = ImageSequence::open(&frames_dir, (100, 50), 10.0).unwrap();
        let palette = ClassPalette::new(&["a".to_string(), "b".to_string()]).unwrap();
        let session = Session::open(source, dir.join("out"), palette).unwrap();
        let mut app = App::new(session);
        app.frame_area = Rect::new(10, 5, 50, 25);
        app
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn maps_cells_to_frame_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(1, dir.path());
        assert_eq!(app.cell_to_frame(10, 5), Some((1, 1)));
        assert_eq!(app.cell_to_frame(59, 29), Some((99, 49)));
        assert_eq!(app.cell_to_frame(0, 0), Some((-19, -9)));
    }

    #[test]
    fn mouse_drag_adds_box() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(1, dir.path());
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 10, 5));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 30, 15));
        assert!(app.preview.is_some());
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 200, 200));
        assert!(app.preview.is_none());
        assert_eq!(app.session.boxes(), &[BoundingBox::from_coords(1, 1, 100, 50, 0)]);
        assert!(app.unsaved);
    }

    #[test]
    fn press_outside_frame_does_not_start_box() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(1, dir.path());
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 0, 0));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 30, 15));
        assert!(app.session.boxes().is_empty());
    }

    #[test]
    fn keys_drive_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(3, dir.path());
        let now = Instant::now();

        app.handle_key(press(KeyCode::Char('2')), now);
        assert_eq!(app.session.palette().active(), 1);
        app.handle_key(press(KeyCode::Tab), now);
        assert_eq!(app.session.palette().active(), 0);

        app.handle_key(press(KeyCode::Right), now);
        assert_eq!(app.session.frame_index(), 1);
        app.handle_key(press(KeyCode::PageDown), now);
        assert_eq!(app.session.frame_index(), 2);
        app.handle_key(press(KeyCode::Char('-')), now);
        assert_eq!(app.session.frame_index(), 0);

        app.handle_key(press(KeyCode::End), now);
        assert_eq!(app.session.frame_index(), 2);
        app.handle_key(press(KeyCode::Home), now);
        assert_eq!(app.session.frame_index(), 0);

        app.handle_key(press(KeyCode::Char('q')), now);
        assert!(app.should_quit());
    }

    #[test]
    fn playback_stops_at_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(2, dir.path());
        let start = Instant::now();
        app.toggle_playback(start);
        let step = app.playback.interval();

        app.tick(start + step);
        assert_eq!(app.session.frame_index(), 1);
        assert!(app.playback.is_playing());
        app.tick(start + step * 3);
        assert!(!app.playback.is_playing());
    }
}
