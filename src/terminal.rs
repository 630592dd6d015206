// SPDX-License-Identifier: GPL-3.0-only

//! Terminal scanning UI
//!
//! Renders the camera feed with Unicode half-block characters next to the
//! session's scan history, and drives the scan session state machine from
//! a single event loop: drain frames, poll the decoder, tick timers,
//! execute effects, draw, handle input.

use crate::backends::camera::{
    CameraDevice, CameraFrame, CameraSession, FocusController, TorchController, enumerate_cameras,
};
use crate::config::Config;
use crate::decoder::{QrDecoder, SymbolDecoder};
use crate::errors::CameraError;
use crate::feedback;
use crate::session::{Effect, ScanSession, SessionEvent, SessionState};
use crate::{constants::timing, storage};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, List, ListItem, Paragraph, Widget},
};
use std::io::{self, stdout};
use std::time::Instant;
use tracing::{error, info, warn};

/// Run the terminal scanner
pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    gstreamer::init()?;

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, config);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

struct App {
    session: ScanSession,
    camera: Option<CameraSession>,
    cameras: Vec<CameraDevice>,
    camera_index: usize,
    torch: TorchController,
    decoder: QrDecoder,
    config: Config,
    frame_widget: FrameWidget,
    last_decode_poll: Instant,
    status_message: Option<String>,
    show_help: bool,
}

impl App {
    fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let cameras = enumerate_cameras();
        info!(count = cameras.len(), "Found cameras");

        let camera_index = config
            .preferred_camera
            .as_ref()
            .and_then(|wanted| {
                cameras
                    .iter()
                    .position(|c| c.name.to_lowercase().contains(&wanted.to_lowercase()))
            })
            .unwrap_or(0);

        Ok(Self {
            session: ScanSession::new(config.session_options()),
            camera: None,
            cameras,
            camera_index,
            torch: TorchController::discover(),
            decoder: QrDecoder::new(),
            config,
            frame_widget: FrameWidget::new(),
            last_decode_poll: Instant::now(),
            status_message: None,
            show_help: false,
        })
    }

    fn current_device(&self) -> &CameraDevice {
        &self.cameras[self.camera_index]
    }

    fn focus_controller(&self) -> FocusController {
        FocusController::new(self.current_device().v4l2_path.clone())
    }

    /// Execute the effects a transition requested. Camera acquisition can
    /// itself fail, which feeds a CameraFailed event back into the machine;
    /// that recursion terminates because the failure transition only
    /// requests ReleaseCamera.
    fn run_effects(&mut self, effects: Vec<Effect>, now: Instant) {
        for effect in effects {
            match effect {
                Effect::AcquireCamera => {
                    match CameraSession::start(
                        self.current_device(),
                        self.config.resolution_hints(),
                    ) {
                        Ok(camera) => {
                            self.camera = Some(camera);
                            self.frame_widget = FrameWidget::new();
                        }
                        Err(e) => {
                            error!(error = %e, "Camera acquisition failed");
                            let failure = CameraError::Unavailable(e.to_string());
                            let followup =
                                self.session.apply(SessionEvent::CameraFailed(failure), now);
                            self.run_effects(followup, now);
                        }
                    }
                }
                Effect::ReleaseCamera => {
                    if let Some(mut camera) = self.camera.take() {
                        camera.stop();
                    }
                    self.torch.force_off();
                    self.frame_widget = FrameWidget::new();
                }
                Effect::PlaySuccessCue => {
                    if self.config.play_success_cue {
                        feedback::play_success_cue();
                    }
                }
            }
        }
    }

    /// One iteration of frame intake and decode polling
    fn pump(&mut self, now: Instant) {
        if let Some(camera) = &mut self.camera
            && let Some(frame) = camera.latest_frame()
        {
            self.frame_widget.update_frame(frame);
        }

        // Decode at a fixed cadence; camera frames arrive faster than the
        // decoder needs them.
        if self.session.state() == SessionState::Scanning
            && now.duration_since(self.last_decode_poll) >= self.config.decode_interval()
        {
            self.last_decode_poll = now;
            if let Some(frame) = self.frame_widget.frame.clone()
                && let Some(decoded) = self.decoder.decode_frame(&frame)
            {
                let effects = self.session.apply(SessionEvent::Decoded(decoded), now);
                self.run_effects(effects, now);
            }
        }

        self.session.tick(now);

        // Camera loss detected outside a transition (e.g. unplugged): the
        // session still wants frames but the stream is gone.
        if self.session.wants_camera() && self.camera.as_ref().is_none_or(|c| !c.is_active()) {
            let effects = self
                .session
                .apply(SessionEvent::CameraFailed(CameraError::Disconnected), now);
            self.run_effects(effects, now);
        }
    }

    fn toggle_scanning(&mut self, now: Instant) {
        let event = match self.session.state() {
            SessionState::Idle | SessionState::ErrorShown => SessionEvent::StartRequested,
            _ => SessionEvent::StopRequested,
        };
        let effects = self.session.apply(event, now);
        self.run_effects(effects, now);
    }

    fn toggle_torch(&mut self, now: Instant) {
        match self.torch.toggle() {
            Ok(on) => {
                self.status_message = Some(if on { "Torch on" } else { "Torch off" }.to_string());
            }
            Err(e) => {
                warn!(error = %e, "Torch toggle failed");
                self.session.advise(e.to_string(), now);
            }
        }
    }

    fn request_focus(&mut self, now: Instant) {
        match self.focus_controller().request_focus() {
            Ok(()) => self.status_message = Some("Refocusing".to_string()),
            Err(e) => {
                warn!(error = %e, "Focus request failed");
                self.session.advise(e.to_string(), now);
            }
        }
    }

    /// Switch to the next camera. Only allowed while idle so the session
    /// never observes frames from two devices.
    fn switch_camera(&mut self) {
        if self.session.state() != SessionState::Idle {
            self.status_message = Some("Stop scanning before switching cameras".to_string());
            return;
        }
        if self.cameras.len() < 2 {
            self.status_message = Some("Only one camera available".to_string());
            return;
        }
        self.camera_index = (self.camera_index + 1) % self.cameras.len();
        let name = self.current_device().name.clone();

        // Remember the choice for the next run
        self.config.preferred_camera = Some(name.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to persist camera choice");
        }

        self.status_message = Some(format!("Camera: {}", name));
    }

    fn export_history(&mut self) {
        if self.session.records().is_empty() {
            self.status_message = Some("Nothing to export".to_string());
            return;
        }
        match storage::save_history(self.session.id(), self.session.records()) {
            Ok(path) => self.status_message = Some(format!("Exported: {}", path.display())),
            Err(e) => {
                error!(error = %e, "History export failed");
                self.status_message = Some(format!("Export failed: {}", e));
            }
        }
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(config)?;

    loop {
        let now = Instant::now();
        app.pump(now);

        terminal.draw(|f| draw(f, &app))?;

        if event::poll(timing::INPUT_POLL)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            let now = Instant::now();

            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }

            match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Char('s') | KeyCode::Char(' ') => {
                    app.show_help = false;
                    app.toggle_scanning(now);
                }
                KeyCode::Char('t') => app.toggle_torch(now),
                KeyCode::Char('f') => app.request_focus(now),
                KeyCode::Char('c') => app.switch_camera(),
                KeyCode::Char('e') => app.export_history(),
                KeyCode::Char('h') => app.show_help = !app.show_help,
                _ => {}
            }
        }
    }

    // Release hardware before leaving the alternate screen
    let effects = app.session.apply(SessionEvent::StopRequested, Instant::now());
    app.run_effects(effects, Instant::now());

    Ok(())
}

fn draw(f: &mut ratatui::Frame, app: &App) {
    let area = f.area();

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(34)])
        .split(Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height: area.height.saturating_sub(1),
        });

    draw_preview(f, app, columns[0]);
    draw_history(f, app, columns[1]);

    let status_area = Rect {
        x: area.x,
        y: area.height.saturating_sub(1),
        width: area.width,
        height: 1,
    };
    let message = status_line(app);
    f.render_widget(StatusBar { message: &message }, status_area);
}

fn draw_preview(f: &mut ratatui::Frame, app: &App, area: Rect) {
    // Banner rows above the camera feed
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    draw_banner(f, app, rows[0]);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", app.current_device().name));
    let inner = block.inner(rows[1]);
    f.render_widget(block, rows[1]);

    if app.session.state() == SessionState::Idle {
        let hint = Paragraph::new("Press 's' to start scanning")
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(hint, centered_line(inner));
    } else {
        f.render_widget(&app.frame_widget, inner);
    }
}

fn draw_banner(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let (text, color) = match app.session.state() {
        SessionState::ResultShown => {
            let key = app
                .session
                .records()
                .last()
                .map(|r| r.key.as_str())
                .unwrap_or("");
            (
                format!("Tracking number: {}  |  Status: Package found", key),
                Color::Green,
            )
        }
        SessionState::ErrorShown => {
            let notice = app.session.notice();
            let text = notice.map(|n| n.text.clone()).unwrap_or_default();
            let color = if notice.is_some_and(|n| n.fatal) {
                Color::Red
            } else {
                Color::Yellow
            };
            (text, color)
        }
        SessionState::Scanning => {
            if let Some(advisory) = app.session.advisory() {
                (advisory.to_string(), Color::Yellow)
            } else {
                ("Scanning... hold a code in front of the camera".to_string(), Color::Cyan)
            }
        }
        SessionState::Idle => ("Ready".to_string(), Color::DarkGray),
    };

    let banner = Paragraph::new(Line::from(text))
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(banner, area);
}

fn draw_history(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .session
        .records()
        .iter()
        .rev()
        .map(|r| {
            ListItem::new(format!(
                "{} {}",
                r.scanned_at.format("%H:%M:%S"),
                r.key
            ))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Scanned ({}) ", app.session.records().len())),
    );
    f.render_widget(list, area);
}

fn status_line(app: &App) -> String {
    if app.show_help {
        return "s/space: start-stop | t: torch | f: focus | c: switch camera | \
                e: export | h: help | q: quit"
            .to_string();
    }
    if let Some(msg) = &app.status_message {
        return msg.clone();
    }
    "'s' scan | 't' torch | 'f' focus | 'e' export | 'h' help | 'q' quit".to_string()
}

fn centered_line(area: Rect) -> Rect {
    Rect {
        x: area.x,
        y: area.y + area.height / 2,
        width: area.width,
        height: 1.min(area.height),
    }
}

/// Widget that renders an RGBA camera frame using half-block characters
struct FrameWidget {
    frame: Option<CameraFrame>,
}

impl FrameWidget {
    fn new() -> Self {
        Self { frame: None }
    }

    fn update_frame(&mut self, frame: CameraFrame) {
        self.frame = Some(frame);
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = &self.frame else {
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        // Each terminal cell shows two vertical pixels: upper half (▀) via
        // fg, lower half via bg.
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width.max(1) as f64;
        let y_scale = frame.height as f64 / (display_height.max(1) * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

fn sample_pixel(frame: &CameraFrame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let idx = (y * frame.stride + x * 4) as usize;
    if idx + 2 < frame.data.len() {
        Color::Rgb(frame.data[idx], frame.data[idx + 1], frame.data[idx + 2])
    } else {
        Color::Rgb(0, 0, 0)
    }
}

/// Truncate to at most `width` characters, always on a char boundary.
/// Messages carry arbitrary text (device names, file paths), so a byte
/// slice could split a multibyte character and panic.
fn truncate_to_width(message: &str, width: usize) -> &str {
    message
        .char_indices()
        .nth(width)
        .map_or(message, |(i, _)| &message[..i])
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text = truncate_to_width(self.message, area.width as usize);

        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
