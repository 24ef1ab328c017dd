use annotation_common::FrameSource;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table},
    Frame,
};

use crate::tui::app::App;
use crate::tui::frame_view::{self, FrameView};

const SIDEBAR_WIDTH: u16 = 40;

/// Draws the whole screen and records where the frame landed for mouse mapping.
pub fn draw<S: FrameSource>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Frame + sidebar
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(SIDEBAR_WIDTH)])
        .split(chunks[1]);

    draw_frame(f, app, main_chunks[0]);
    draw_sidebar(f, app, main_chunks[1]);
    draw_footer(f, app, chunks[2]);
}

fn draw_header<S: FrameSource>(f: &mut Frame, app: &App<S>, area: Rect) {
    let (state, color) = if app.playback.is_playing() {
        ("PLAYING", Color::Green)
    } else {
        ("PAUSED", Color::Yellow)
    };
    let mut spans = vec![
        Span::styled(
            format!(" Frame Annotator - {state} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::raw(app.session.source_path().display().to_string()),
    ];
    if app.unsaved {
        spans.push(Span::styled(" [modified]", Style::default().fg(Color::Red)));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_frame<S: FrameSource>(f: &mut Frame, app: &mut App<S>, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", app.session.image_path().display()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let view = frame_view::fit(inner, app.session.frame_size());
    app.frame_area = view;
    f.render_widget(
        FrameView {
            image: app.session.image(),
            boxes: app.session.boxes(),
            selected: app.session.selected(),
            preview: app.preview,
            palette: app.session.palette(),
        },
        view,
    );
}

fn draw_sidebar<S: FrameSource>(f: &mut Frame, app: &App<S>, area: Rect) {
    let n_classes = app.session.palette().len() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(n_classes.min(10) + 2),
            Constraint::Min(5),
            Constraint::Length(11),
        ])
        .split(area);

    draw_video_info(f, app, chunks[0]);
    draw_classes(f, app, chunks[1]);
    draw_boxes(f, app, chunks[2]);
    draw_help(f, chunks[3]);
}

fn draw_video_info<S: FrameSource>(f: &mut Frame, app: &App<S>, area: Rect) {
    let session = &app.session;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(3)])
        .split(area);

    let info = Paragraph::new(format!(
        " {:.2} fps | {:.1}s | {} rows saved",
        session.fps(),
        session.duration(),
        session.store().len()
    ));
    f.render_widget(info, chunks[0]);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .label(format!(
            "Frame {}/{}",
            session.frame_index() + 1,
            session.frame_count()
        ))
        .percent((app.progress_percentage() as u16).min(100));
    f.render_widget(gauge, chunks[1]);
}

fn draw_classes<S: FrameSource>(f: &mut Frame, app: &App<S>, area: Rect) {
    let palette = app.session.palette();
    let items: Vec<ListItem> = palette
        .classes()
        .iter()
        .enumerate()
        .map(|(id, class)| {
            let marker = if id == palette.active() { ">" } else { " " };
            let key = class
                .shortcut
                .map(|c| format!("[{c}]"))
                .unwrap_or_else(|| "   ".to_string());
            let mut style = Style::default().fg(frame_view::display_color(class.color));
            if id == palette.active() {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            }
            ListItem::new(format!("{marker} {key} {}", class.name)).style(style)
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Classes"));
    f.render_widget(list, area);
}

fn draw_boxes<S: FrameSource>(f: &mut Frame, app: &App<S>, area: Rect) {
    let session = &app.session;
    let header = Row::new(vec!["#", "Class", "Corners"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = session
        .boxes()
        .iter()
        .enumerate()
        .map(|(idx, bbox)| {
            let style = if session.selected() == Some(idx) {
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let class = session
                .palette()
                .get(bbox.class_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| bbox.class_id.to_string());
            Row::new(vec![
                Cell::from(format!("{}", idx + 1)),
                Cell::from(class).style(
                    Style::default().fg(frame_view::display_color(
                        session.palette().color(bbox.class_id),
                    )),
                ),
                Cell::from(format!(
                    "({},{})-({},{})",
                    bbox.x_min(),
                    bbox.y_min(),
                    bbox.x_max(),
                    bbox.y_max()
                )),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(10),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Boxes ({})", session.boxes().len())),
    );
    f.render_widget(table, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan));
    let lines = vec![
        Line::from(vec![key("→ ←"), Span::raw(" next / back 1")]),
        Line::from(vec![key("PgDn PgUp"), Span::raw(" ±100  "), key("] ["), Span::raw(" ±500")]),
        Line::from(vec![key("+ -"), Span::raw(" ±1800  "), key("Space"), Span::raw(" play")]),
        Line::from(vec![key("Home End"), Span::raw(" first / last frame")]),
        Line::from(vec![key("↑ ↓"), Span::raw(" select  "), key("Enter"), Span::raw(" recolor")]),
        Line::from(vec![key("Del"), Span::raw(" delete  "), key("Tab"), Span::raw(" class")]),
        Line::from(vec![key("Ctrl+S"), Span::raw(" save  "), key("Q/Esc"), Span::raw(" quit")]),
        Line::from(vec![key("Mouse"), Span::raw(" drag to draw, right to cancel")]),
    ];
    let help = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(help, area);
}

fn draw_footer<S: FrameSource>(f: &mut Frame, app: &App<S>, area: Rect) {
    let pending = app.session.pending_images().count();
    let mut status = app.status.clone();
    if pending > 0 {
        status.push_str(&format!(" | {pending} frame image(s) waiting for save"));
    }

    let footer = Paragraph::new(status)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}
