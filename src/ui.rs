use aac_stream_player::PlayerEvent;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

// Layout constants for better maintainability
const HEADER_HEIGHT: u16 = 4;
const FOOTER_HEIGHT: u16 = 3;
const STATUS_HEIGHT: u16 = 3;
const GAUGE_HEIGHT: u16 = 3;
const MARGIN: u16 = 1;

pub struct UIState {
    pub url: String,
    pub event: PlayerEvent,
    /// Master volume, `0.0..=1.0`.
    pub volume: f32,
    /// `-1.0` is full left, `1.0` full right.
    pub balance: f32,
    pub should_quit: bool,
    pub status_message: String,
}

impl UIState {
    pub fn new(url: String) -> Self {
        Self {
            url,
            event: PlayerEvent::Idle,
            volume: 1.0,
            balance: 0.0,
            should_quit: false,
            status_message: String::new(),
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn status_label(event: &PlayerEvent) -> (&'static str, Color) {
    match event {
        PlayerEvent::Idle => ("IDLE", Color::Gray),
        PlayerEvent::Started => ("CONNECTING", Color::Yellow),
        PlayerEvent::Streaming => ("PLAYING", Color::Green),
        PlayerEvent::Error(_) => ("ERROR", Color::Red),
        PlayerEvent::Stopped => ("STOPPED", Color::Gray),
    }
}

pub fn render_ui(f: &mut Frame, app: &UIState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(MARGIN)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Length(GAUGE_HEIGHT),
            Constraint::Length(GAUGE_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(STATUS_HEIGHT),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(f.area());

    render_header(f, chunks[0], app);
    render_volume(f, chunks[1], app);
    render_balance(f, chunks[2], app);
    render_status(f, chunks[4], app);
    render_footer(f, chunks[5]);
}

fn render_header(f: &mut Frame, area: Rect, app: &UIState) {
    let (status, color) = status_label(&app.event);
    let content = vec![
        Line::from(vec![
            Span::styled(
                "AAC STREAM PLAYER ",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(status, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::styled("Stream: ", Style::default()),
            Span::styled(app.url.as_str(), Style::default().fg(Color::Cyan)),
        ]),
    ];

    let header = Paragraph::new(Text::from(content)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .title("Now Playing"),
    );

    f.render_widget(header, area);
}

fn render_volume(f: &mut Frame, area: Rect, app: &UIState) {
    let percent = (app.volume * 100.0).round() as u16;
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title("Volume"),
        )
        .gauge_style(Style::default().fg(Color::Yellow))
        .percent(percent.min(100))
        .label(format!("{}%", percent));

    f.render_widget(gauge, area);
}

fn render_balance(f: &mut Frame, area: Rect, app: &UIState) {
    let label = match (app.balance * 100.0).round() as i32 {
        0 => "Center".to_string(),
        n if n < 0 => format!("Left {}%", -n),
        n => format!("Right {}%", n),
    };
    // Gauge runs from full left (0) to full right (1).
    let ratio = f64::from((app.balance + 1.0) / 2.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title("Balance"),
        )
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(label);

    f.render_widget(gauge, area);
}

fn render_status(f: &mut Frame, area: Rect, app: &UIState) {
    let text = match &app.event {
        PlayerEvent::Error(message) => message.clone(),
        _ if !app.status_message.is_empty() => app.status_message.clone(),
        PlayerEvent::Idle => "Opening stream…".to_string(),
        PlayerEvent::Started => "Connecting…".to_string(),
        PlayerEvent::Streaming => "Streaming".to_string(),
        PlayerEvent::Stopped => "Playback finished. Press Q to quit".to_string(),
    };
    let color = match app.event {
        PlayerEvent::Error(_) => Color::Red,
        _ => Color::White,
    };

    let status = Paragraph::new(text)
        .style(Style::default().fg(color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Gray))
                .title("Status"),
        );

    f.render_widget(status, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let controls_text = vec![Line::from(vec![
        Span::styled(
            "↑/↓ ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("Volume • ", Style::default().fg(Color::White)),
        Span::styled(
            "←/→ ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled("Balance • ", Style::default().fg(Color::White)),
        Span::styled(
            "S ",
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ),
        Span::styled("Stop • ", Style::default().fg(Color::White)),
        Span::styled(
            "Q ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::styled("Quit", Style::default().fg(Color::White)),
    ])];

    let controls = Paragraph::new(Text::from(controls_text))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Gray))
                .title("Controls"),
        );

    f.render_widget(controls, area);
}
