// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based camera setup
//!
//! Renders the latest frame with Unicode half-block characters, overlays the
//! ROIs and maps keys and mouse drags onto the session controller. A side
//! panel lists the device controls and steps the selected one.

use crate::app::roi::{NormalizedRect, PendingRoi, RoiEditState, RoiSlot};
use crate::app::{SessionController, SessionOptions};
use crate::backends::camera::v4l2_utils::list_video_devices;
use crate::backends::camera::{ControlDescriptor, ControlKind, Frame, Resolution, SystemBackend};
use crate::config::{AppConfig, SessionConfig};
use crate::constants::file_formats;
use crate::errors::AppError;
use crate::storage;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

const ROI_COLOR: Color = Color::Rgb(0, 255, 0);
const PENDING_COLOR: Color = Color::Rgb(255, 255, 0);
const EDIT_COLOR: Color = Color::Rgb(255, 0, 0);
const CONTROLS_PANEL_WIDTH: u16 = 44;

/// Run the terminal viewer
///
/// `device` is opened on start; `session` is loaded on start and is also the
/// file `s` and `l` write and read.
pub fn run(
    config: AppConfig,
    device: Option<String>,
    session: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = TerminalApp::new(config, device.clone(), session.clone());
    if session.is_some() {
        app.load_session();
    } else if device.is_some() {
        app.open_selected();
    }

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app.controller.close();
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TerminalApp,
) -> Result<(), Box<dyn std::error::Error>> {
    let tick = app.config.update_interval();

    loop {
        app.frame = app.controller.read(None);

        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom two lines for status and help
            let mut camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(2),
            };
            if app.show_controls {
                let panel_width = CONTROLS_PANEL_WIDTH.min(camera_area.width / 2);
                camera_area.width -= panel_width;
                let panel_area = Rect {
                    x: camera_area.x + camera_area.width,
                    width: panel_width,
                    ..camera_area
                };
                f.render_widget(
                    ControlsPanel {
                        controls: &app.controls,
                        selected: app.selected_control,
                    },
                    panel_area,
                );
            }
            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(2),
                width: area.width,
                height: 1,
            };
            let help_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };

            app.viewport = app
                .frame
                .as_ref()
                .and_then(|frame| Viewport::fit(frame.size(), camera_area));

            let widget = FrameWidget {
                frame: app.frame.as_ref(),
                viewport: app.viewport,
                slots: app.controller.rois().slots(),
                pending: app.controller.rois().pending(),
                editing: match app.controller.rois().edit_state() {
                    RoiEditState::Editing { slot } => Some(slot),
                    RoiEditState::Idle => None,
                },
                waiting: if app.controller.is_active() {
                    "Waiting for frames..."
                } else {
                    "No source open, press 'o'"
                },
            };
            f.render_widget(widget, camera_area);

            let status = app.status_line();
            f.render_widget(StatusBar { message: &status }, status_area);
            f.render_widget(
                StatusBar {
                    message: &app.help_line(),
                },
                help_area,
            );
        })?;

        // Handle input with timeout for frame updates
        if event::poll(tick)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if !app.handle_key(key) {
                        break;
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }
    }

    Ok(())
}

/// Interactive state of the terminal front end
struct TerminalApp {
    config: AppConfig,
    controller: SessionController,
    devices: Vec<String>,
    selected_device: usize,
    selected_slot: usize,
    session_path: PathBuf,
    frame: Option<Frame>,
    viewport: Option<Viewport>,
    drag_start: Option<(f64, f64)>,
    show_help: bool,
    show_controls: bool,
    controls: Vec<ControlDescriptor>,
    selected_control: usize,
    message: String,
}

impl TerminalApp {
    fn new(config: AppConfig, device: Option<String>, session: Option<PathBuf>) -> Self {
        let backend = Arc::new(SystemBackend::new(
            &config.control_tool,
            config.control_timeout(),
        ));
        let controller = SessionController::new(backend, SessionOptions::from(&config));

        let mut devices = list_video_devices();
        let mut selected_device = 0;
        if let Some(device) = device {
            selected_device = match devices.iter().position(|d| *d == device) {
                Some(index) => index,
                None => {
                    devices.insert(0, device);
                    0
                }
            };
        }
        info!(count = devices.len(), "Found video devices");

        let session_path = session.unwrap_or_else(|| storage::default_session_path(&config));

        Self {
            config,
            controller,
            devices,
            selected_device,
            selected_slot: 1,
            session_path,
            frame: None,
            viewport: None,
            drag_start: None,
            show_help: false,
            show_controls: false,
            controls: Vec::new(),
            selected_control: 0,
            message: String::new(),
        }
    }

    /// Returns false when the user asked to quit
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return false;
        }

        if self.show_controls {
            match key.code {
                KeyCode::Up => {
                    self.selected_control = self.selected_control.saturating_sub(1);
                    return true;
                }
                KeyCode::Down => {
                    if self.selected_control + 1 < self.controls.len() {
                        self.selected_control += 1;
                    }
                    return true;
                }
                KeyCode::Left => {
                    self.step_selected_control(-1);
                    return true;
                }
                KeyCode::Right => {
                    self.step_selected_control(1);
                    return true;
                }
                KeyCode::Char('R') => {
                    self.reset_controls();
                    return true;
                }
                KeyCode::Char('f') => {
                    self.refresh_controls();
                    return true;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Char('h') => self.show_help = !self.show_help,
            KeyCode::Char('o') => self.open_selected(),
            KeyCode::Char('c') => {
                self.controller.close();
                self.controls.clear();
                self.message = "Source closed".into();
            }
            KeyCode::Char('k') => {
                self.show_controls = !self.show_controls;
                if self.show_controls {
                    self.refresh_controls();
                }
            }
            KeyCode::Char('d') => self.cycle_device(),
            KeyCode::Char('r') => self.cycle_resolution(),
            KeyCode::Char(c @ '0'..='9') => {
                self.selected_slot = match c.to_digit(10) {
                    Some(0) | None => 10,
                    Some(n) => n as usize,
                };
            }
            KeyCode::Char('u') => self.toggle_update(),
            KeyCode::Char('a') => {
                if self.controller.is_active() {
                    self.controller.compact_rois();
                    self.message = "ROIs rearranged".into();
                }
            }
            KeyCode::Char('p') => self.snapshot(),
            KeyCode::Char('s') => self.save_session(),
            KeyCode::Char('l') => self.load_session(),
            _ => {}
        }
        true
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !self.controller.rois().edit_state().is_editing() {
            return;
        }
        let Some(viewport) = self.viewport else {
            return;
        };
        let point = viewport.canvas_point(mouse.column, mouse.row);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.drag_start = Some(point);
            }
            MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Up(MouseButton::Left) => {
                if let Some((x_start, y_start)) = self.drag_start {
                    self.controller
                        .set_pending_roi(PendingRoi::new(x_start, y_start, point.0, point.1));
                }
                if matches!(mouse.kind, MouseEventKind::Up(_)) {
                    self.drag_start = None;
                }
            }
            _ => {}
        }
    }

    fn open_selected(&mut self) {
        let Some(path) = self.devices.get(self.selected_device).cloned() else {
            self.message = "No video devices found".into();
            return;
        };
        let size = self.config.default_size;
        self.open(&path, size);
    }

    fn open(&mut self, path: &str, size: Resolution) {
        match self.controller.open(path, size) {
            Ok(()) => {
                self.message = format!("Opened {} at {}", path, size);
                if self.show_controls {
                    self.refresh_controls();
                }
            }
            Err(e) => {
                error!(path, error = %e, "Failed to open source");
                self.message = format!("Error: {}", e);
            }
        }
    }

    fn cycle_device(&mut self) {
        self.devices = merge_devices(&self.devices, list_video_devices());
        if self.devices.is_empty() {
            self.message = "No video devices found".into();
            return;
        }
        self.selected_device = (self.selected_device + 1) % self.devices.len();
        self.message = format!(
            "Selected {}, press 'o' to open",
            self.devices[self.selected_device]
        );
    }

    fn cycle_resolution(&mut self) {
        let Some(current) = self.controller.size() else {
            self.message = "Please open a video source first".into();
            return;
        };
        let Some(next) = next_resolution(self.controller.resolutions(), current) else {
            return;
        };
        match self.controller.change_resolution(next) {
            Ok(()) => self.message = format!("Resolution {}", next),
            Err(e) => {
                error!(error = %e, "Failed to change resolution");
                self.message = format!("Error: {}", e);
            }
        }
    }

    fn toggle_update(&mut self) {
        // ROIs are drawn in canvas pixels, normalized by the visible frame area
        let view = self
            .viewport
            .map(|v| v.canvas_size())
            .unwrap_or(Resolution::new(0, 0));

        match self.controller.toggle_roi_update(self.selected_slot, view) {
            Ok(RoiEditState::Editing { slot }) => {
                self.message = format!("Drawing ROI {}, drag with the mouse then press 'u'", slot);
            }
            Ok(RoiEditState::Idle) => {
                self.drag_start = None;
                self.message = "ROI update finished".into();
            }
            Err(e) => self.message = format!("Error: {}", e),
        }
    }

    fn refresh_controls(&mut self) {
        match self.controller.list_controls() {
            Ok(controls) => {
                self.selected_control = self
                    .selected_control
                    .min(controls.len().saturating_sub(1));
                self.controls = controls;
            }
            Err(e) => {
                self.controls.clear();
                self.message = format!("Error: {}", e);
            }
        }
    }

    fn step_selected_control(&mut self, direction: i64) {
        let Some(control) = self.controls.get(self.selected_control) else {
            return;
        };
        match self.controller.step_control(control, direction) {
            Ok(Some(updated)) => {
                self.message = format!("{} = {}", updated.name, control_label(&updated));
                self.controls[self.selected_control] = updated;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(control = %control.name, error = %e, "Failed to set control");
                self.message = format!("Error: {}", e);
            }
        }
    }

    fn reset_controls(&mut self) {
        match self.controller.reset_controls() {
            Ok(()) => self.message = "Controls reset to defaults".into(),
            Err(e) => {
                error!(error = %e, "Failed to reset controls");
                self.message = format!("Error: {}", e);
            }
        }
        self.refresh_controls();
    }

    fn snapshot(&mut self) {
        let dir = storage::snapshot_directory(&self.config);
        let dest = storage::timestamped_snapshot_path(&dir, file_formats::SNAPSHOT_EXTENSIONS[0]);
        match self.controller.snapshot(&dest, None) {
            Ok(Some(path)) => self.message = format!("Saved: {}", path.display()),
            Ok(None) => self.message = "No frame available yet".into(),
            Err(e) => {
                error!(error = %e, "Failed to save snapshot");
                self.message = format!("Error: {}", e);
            }
        }
    }

    fn save_session(&mut self) {
        let result = self
            .controller
            .save_config()
            .and_then(|session| Ok(session.save(&self.session_path)?));
        match result {
            Ok(()) => {
                self.message = format!("Saved setup to {}", self.session_path.display());
                self.remember_session_dir();
            }
            Err(e) => self.message = format!("Error: {}", e),
        }
    }

    fn load_session(&mut self) {
        let result = SessionConfig::load(&self.session_path)
            .map_err(AppError::from)
            .and_then(|session| self.controller.load_config(&session));
        match result {
            Ok(()) => {
                self.message = format!("Loaded setup from {}", self.session_path.display());
                self.remember_session_dir();
            }
            Err(e) => {
                warn!(path = %self.session_path.display(), error = %e, "Failed to load setup");
                self.message = format!("Error: {}", e);
            }
        }
        if let Some(path) = self.controller.path()
            && let Some(index) = self.devices.iter().position(|d| d == path)
        {
            self.selected_device = index;
        }
    }

    fn remember_session_dir(&mut self) {
        if self.config.remember_dir(&self.session_path)
            && let Err(e) = self.config.save()
        {
            warn!(error = %e, "Failed to save app config");
        }
    }

    fn status_line(&self) -> String {
        let mut parts = Vec::new();
        match (self.controller.path(), self.controller.size()) {
            (Some(path), Some(size)) => parts.push(format!("{} {}", path, size)),
            _ => parts.push(format!(
                "[{}]",
                self.devices
                    .get(self.selected_device)
                    .map(String::as_str)
                    .unwrap_or("no device")
            )),
        }
        if let Some(stats) = self.controller.stats() {
            parts.push(format!("{:.1} fps", stats.fps));
        }
        match self.controller.rois().edit_state() {
            RoiEditState::Editing { slot } => parts.push(format!("editing ROI {}", slot)),
            RoiEditState::Idle => parts.push(format!("slot {}", self.selected_slot)),
        }
        if !self.message.is_empty() {
            parts.push(self.message.clone());
        }
        parts.join(" | ")
    }

    fn help_line(&self) -> String {
        if self.show_help {
            "o: Open | c: Close | d: Next device | r: Next resolution | 1-0: ROI slot | \
             u: Update ROI | a: Rearrange | p: Snapshot | s: Save | l: Load | k: Controls | \
             q/Ctrl+C: Quit"
                .to_string()
        } else if self.show_controls {
            "Up/Down select | Left/Right step | 'R' reset all | 'f' refresh | 'k' close".to_string()
        } else {
            "'o' open | 'u' update ROI | 'p' snapshot | 'h' help | 'q' quit".to_string()
        }
    }
}

/// Keep known entries (e.g. a file given on the command line) and add new devices
fn merge_devices(current: &[String], found: Vec<String>) -> Vec<String> {
    let mut devices = current.to_vec();
    for device in found {
        if !devices.contains(&device) {
            devices.push(device);
        }
    }
    devices
}

/// Resolution after `current` in `list`, wrapping around
fn next_resolution(list: &[Resolution], current: Resolution) -> Option<Resolution> {
    if list.is_empty() {
        return None;
    }
    let next = match list.iter().position(|r| *r == current) {
        Some(index) => (index + 1) % list.len(),
        None => 0,
    };
    Some(list[next])
}

/// Where the frame lands inside the preview area
///
/// Each cell shows two vertical pixels, so the canvas is `width` pixels wide
/// and `2 * height` pixels tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Viewport {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
}

impl Viewport {
    /// Largest area with the frame's aspect ratio, centered in `area`
    fn fit(frame: Resolution, area: Rect) -> Option<Self> {
        if !frame.is_valid() || area.width == 0 || area.height == 0 {
            return None;
        }
        let frame_aspect = f64::from(frame.width) / f64::from(frame.height);
        let term_width = f64::from(area.width);
        let term_height = f64::from(area.height) * 2.0;

        let (width, height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let w = term_height * frame_aspect;
            (w as u16, area.height)
        } else {
            // Terminal is taller - fit to width
            let h = term_width / frame_aspect;
            (area.width, (h / 2.0) as u16)
        };
        if width == 0 || height == 0 {
            return None;
        }

        Some(Self {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        })
    }

    fn canvas_size(&self) -> Resolution {
        Resolution::new(u32::from(self.width), u32::from(self.height) * 2)
    }

    /// Canvas pixel under a terminal cell, clamped to the canvas
    fn canvas_point(&self, column: u16, row: u16) -> (f64, f64) {
        let x = column.saturating_sub(self.x).min(self.width);
        let y = row.saturating_sub(self.y).min(self.height);
        (f64::from(x), f64::from(y) * 2.0)
    }
}

/// Widget that renders a frame using half-block characters
struct FrameWidget<'a> {
    frame: Option<&'a Frame>,
    viewport: Option<Viewport>,
    slots: Vec<RoiSlot>,
    pending: Option<PendingRoi>,
    /// Slot being redrawn; its old box is shown dashed in red
    editing: Option<usize>,
    waiting: &'a str,
}

impl FrameWidget<'_> {
    fn slot_color(&self, number: usize) -> Color {
        if self.editing == Some(number) {
            EDIT_COLOR
        } else {
            ROI_COLOR
        }
    }

    /// Color of the overlay at canvas pixel `(x, y)`, if any
    fn overlay(&self, outlines: &[(Outline, Color)], x: u32, y: u32) -> Option<Color> {
        outlines
            .iter()
            .rev()
            .find(|(outline, _)| outline.contains(x, y))
            .map(|(_, color)| *color)
    }
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (Some(frame), Some(viewport)) = (self.frame, self.viewport) else {
            let msg = self.waiting;
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        let canvas = viewport.canvas_size();
        let mut outlines: Vec<(Outline, Color)> = self
            .slots
            .iter()
            .filter_map(|slot| {
                let mut outline = Outline::new(slot.rect?, canvas);
                outline.dashed = self.editing == Some(slot.number);
                Some((outline, self.slot_color(slot.number)))
            })
            .collect();
        if let Some(rect) = self.pending.and_then(|p| p.normalize(canvas)) {
            outlines.push((Outline::new(rect, canvas), PENDING_COLOR));
        }

        let x_scale = f64::from(frame.width) / f64::from(canvas.width);
        let y_scale = f64::from(frame.height) / f64::from(canvas.height);

        for ty in 0..viewport.height {
            for tx in 0..viewport.width {
                let term_x = viewport.x + tx;
                let term_y = viewport.y + ty;
                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let px = u32::from(tx);
                let py_top = u32::from(ty) * 2;
                let py_bottom = py_top + 1;

                let color_at = |py: u32| {
                    self.overlay(&outlines, px, py).unwrap_or_else(|| {
                        let (r, g, b) = frame.pixel(
                            (f64::from(px) * x_scale) as u32,
                            (f64::from(py) * y_scale) as u32,
                        );
                        Color::Rgb(r, g, b)
                    })
                };

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(color_at(py_top));
                    cell.set_bg(color_at(py_bottom));
                }
            }
        }

        // Labels sit on the first cell row of each box
        for slot in &self.slots {
            let Some(rect) = slot.rect else {
                continue;
            };
            let outline = Outline::new(rect, canvas);
            let label = format!("ROI {}", slot.number);
            let x = viewport.x + outline.x_min as u16;
            let y = viewport.y + (outline.y_min / 2) as u16;
            let width = (area.x + area.width).saturating_sub(x) as usize;
            if width > 0 && y < area.y + area.height {
                buf.set_stringn(
                    x,
                    y,
                    &label,
                    width,
                    Style::default()
                        .fg(Color::Black)
                        .bg(self.slot_color(slot.number)),
                );
            }
        }
    }
}

/// One-pixel box outline on the canvas
#[derive(Debug, Clone, Copy)]
struct Outline {
    x_min: u32,
    y_min: u32,
    x_max: u32,
    y_max: u32,
    /// Two pixels on, two off along each edge
    dashed: bool,
}

impl Outline {
    fn new(rect: NormalizedRect, canvas: Resolution) -> Self {
        let p = rect.to_pixels(canvas.width, canvas.height);
        let max_x = canvas.width.saturating_sub(1);
        let max_y = canvas.height.saturating_sub(1);
        Self {
            x_min: p.x_min.min(max_x),
            y_min: p.y_min.min(max_y),
            x_max: p.x_max.min(max_x),
            y_max: p.y_max.min(max_y),
            dashed: false,
        }
    }

    fn contains(&self, x: u32, y: u32) -> bool {
        let inside = (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y);
        let vertical = x == self.x_min || x == self.x_max;
        if !inside || !(vertical || y == self.y_min || y == self.y_max) {
            return false;
        }
        // Vertical edges dash along y, horizontal ones along x
        let along = if vertical { y } else { x };
        !self.dashed || (along / 2) % 2 == 0
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        buf.set_stringn(
            area.x,
            area.y,
            self.message,
            area.width as usize,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

/// Short display form of a control's current value
fn control_label(control: &ControlDescriptor) -> String {
    match &control.kind {
        ControlKind::Int { value, .. } => value.to_string(),
        ControlKind::Bool { value, .. } => String::from(if *value { "on" } else { "off" }),
        ControlKind::Menu { value, items, .. } => items
            .get(value)
            .cloned()
            .unwrap_or_else(|| value.to_string()),
        ControlKind::Other { value, .. } => value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string()),
    }
}

/// Side panel listing the device controls
struct ControlsPanel<'a> {
    controls: &'a [ControlDescriptor],
    selected: usize,
}

impl Widget for ControlsPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let width = area.width as usize;
        buf.set_stringn(
            area.x,
            area.y,
            "Controls",
            width,
            Style::default().fg(Color::Black).bg(Color::Gray),
        );

        let rows = area.height.saturating_sub(1) as usize;
        if self.controls.is_empty() {
            if rows > 0 {
                buf.set_stringn(area.x, area.y + 1, "No controls", width, Style::default());
            }
            return;
        }

        // Keep the selection on screen
        let offset = (self.selected + 1).saturating_sub(rows);
        for (row, (index, control)) in self
            .controls
            .iter()
            .enumerate()
            .skip(offset)
            .take(rows)
            .enumerate()
        {
            let line = format!(
                "{:<name_width$} {}",
                control.name,
                control_label(control),
                name_width = width.saturating_sub(12).min(28),
            );
            let style = if index == self.selected {
                Style::default().fg(Color::Black).bg(Color::White)
            } else if control.is_inactive() {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            buf.set_stringn(area.x, area.y + 1 + row as u16, &line, width, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_fit_keeps_aspect() {
        // 80x20 cells = 80x40 canvas; a 4:3 frame is height bound
        let area = Rect::new(0, 0, 80, 20);
        let viewport = Viewport::fit(Resolution::new(640, 480), area).unwrap();
        assert_eq!(viewport.height, 20);
        assert_eq!(viewport.width, 53);
        assert_eq!(viewport.x, (80 - 53) / 2);
        assert_eq!(viewport.canvas_size(), Resolution::new(53, 40));

        assert!(Viewport::fit(Resolution::new(0, 480), area).is_none());
    }

    #[test]
    fn test_canvas_point_clamps() {
        let viewport = Viewport {
            x: 10,
            y: 2,
            width: 40,
            height: 20,
        };
        assert_eq!(viewport.canvas_point(15, 5), (5.0, 6.0));
        assert_eq!(viewport.canvas_point(0, 0), (0.0, 0.0));
        assert_eq!(viewport.canvas_point(200, 200), (40.0, 40.0));
    }

    #[test]
    fn test_next_resolution_wraps() {
        let list = [Resolution::new(640, 480), Resolution::new(1280, 720)];
        assert_eq!(
            next_resolution(&list, Resolution::new(640, 480)),
            Some(Resolution::new(1280, 720))
        );
        assert_eq!(
            next_resolution(&list, Resolution::new(1280, 720)),
            Some(Resolution::new(640, 480))
        );
        assert_eq!(
            next_resolution(&list, Resolution::new(320, 240)),
            Some(Resolution::new(640, 480))
        );
        assert_eq!(next_resolution(&[], Resolution::new(640, 480)), None);
    }

    #[test]
    fn test_merge_devices_keeps_order() {
        let current = vec!["clip.mp4".to_string(), "/dev/video0".to_string()];
        let merged = merge_devices(
            &current,
            vec!["/dev/video0".to_string(), "/dev/video2".to_string()],
        );
        assert_eq!(merged, vec!["clip.mp4", "/dev/video0", "/dev/video2"]);
    }

    #[test]
    fn test_frame_widget_draws_roi_outline() {
        let frame = Frame::from_rgb(20, 20, vec![0; 20 * 20 * 3]).unwrap();
        let area = Rect::new(0, 0, 20, 10);
        let viewport = Viewport::fit(frame.size(), area).unwrap();
        assert_eq!(viewport.canvas_size(), Resolution::new(20, 20));

        let widget = FrameWidget {
            frame: Some(&frame),
            viewport: Some(viewport),
            slots: vec![RoiSlot {
                number: 1,
                rect: Some(NormalizedRect::new(0.5, 0.5, 1.0, 1.0)),
            }],
            pending: None,
            editing: None,
            waiting: "",
        };
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);

        // Canvas (10, 10) is the top half of cell (10, 5), covered by the label
        let label = buf.cell((10, 5)).unwrap();
        assert_eq!(label.symbol(), "R");
        // Right edge, canvas x = 19
        let edge = buf.cell((19, 7)).unwrap();
        assert_eq!(edge.fg, ROI_COLOR);
        assert_eq!(edge.bg, ROI_COLOR);
        // Outside the box
        let outside = buf.cell((2, 2)).unwrap();
        assert_eq!(outside.fg, Color::Rgb(0, 0, 0));
    }

    #[test]
    fn test_frame_widget_placeholder() {
        let area = Rect::new(0, 0, 30, 3);
        let widget = FrameWidget {
            frame: None,
            viewport: None,
            slots: Vec::new(),
            pending: None,
            editing: None,
            waiting: "Waiting",
        };
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        assert_eq!(buf.cell((11, 1)).unwrap().symbol(), "W");
    }

    fn row_text(buf: &Buffer, y: u16, from: u16, len: u16) -> String {
        (from..from + len)
            .map(|x| buf.cell((x, y)).unwrap().symbol().to_string())
            .collect()
    }

    #[test]
    fn test_label_uses_slot_number() {
        let frame = Frame::from_rgb(20, 20, vec![0; 20 * 20 * 3]).unwrap();
        let area = Rect::new(0, 0, 20, 10);
        let viewport = Viewport::fit(frame.size(), area).unwrap();

        // Only slot 3 holds a rectangle
        let mut slots: Vec<RoiSlot> = (1..=10).map(|number| RoiSlot { number, rect: None }).collect();
        slots[2].rect = Some(NormalizedRect::new(0.0, 0.5, 1.0, 1.0));

        let widget = FrameWidget {
            frame: Some(&frame),
            viewport: Some(viewport),
            slots,
            pending: None,
            editing: None,
            waiting: "",
        };
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);

        assert_eq!(row_text(&buf, 5, 0, 5), "ROI 3");
    }

    #[test]
    fn test_editing_slot_is_dashed_red() {
        let frame = Frame::from_rgb(20, 20, vec![0; 20 * 20 * 3]).unwrap();
        let area = Rect::new(0, 0, 20, 10);
        let viewport = Viewport::fit(frame.size(), area).unwrap();

        let widget = FrameWidget {
            frame: Some(&frame),
            viewport: Some(viewport),
            slots: vec![
                RoiSlot {
                    number: 1,
                    rect: Some(NormalizedRect::new(0.0, 0.0, 0.5, 1.0)),
                },
                RoiSlot {
                    number: 2,
                    rect: Some(NormalizedRect::new(0.75, 0.0, 1.0, 1.0)),
                },
            ],
            pending: None,
            editing: Some(1),
            waiting: "",
        };
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);

        // Left edge of slot 1: canvas y 4 and 5 drawn, 2 and 3 skipped
        let on = buf.cell((0, 2)).unwrap();
        assert_eq!(on.fg, EDIT_COLOR);
        assert_eq!(on.bg, EDIT_COLOR);
        let off = buf.cell((0, 1)).unwrap();
        assert_eq!(off.fg, Color::Rgb(0, 0, 0));

        // Slot 2 keeps a solid green edge and label
        assert_eq!(buf.cell((19, 1)).unwrap().fg, ROI_COLOR);
        assert_eq!(buf.cell((19, 2)).unwrap().fg, ROI_COLOR);
        assert_eq!(buf.cell((15, 0)).unwrap().bg, ROI_COLOR);
        assert_eq!(buf.cell((0, 0)).unwrap().bg, EDIT_COLOR);
    }

    #[test]
    fn test_control_labels() {
        let controls = crate::backends::camera::v4l2_controls::parse_controls(
            "brightness 0x1 (int) : min=0 max=9 step=1 default=0 value=4\n\
             led 0x2 (bool) : default=0 value=1\n\
             power_line_frequency 0x3 (menu) : min=0 max=1 default=1 value=1\n\
             \t0: Disabled\n\
             \t1: 50 Hz\n",
        )
        .unwrap();
        let labels: Vec<String> = controls.iter().map(control_label).collect();
        assert_eq!(labels, ["4", "on", "50 Hz"]);
    }

    #[test]
    fn test_controls_panel_scrolls_to_selection() {
        let listing: String = (0..8)
            .map(|i| format!("ctrl_{} 0x{} (int) : min=0 max=9 step=1 value={}\n", i, i, i))
            .collect();
        let controls = crate::backends::camera::v4l2_controls::parse_controls(&listing).unwrap();
        let area = Rect::new(0, 0, 30, 4);

        let mut buf = Buffer::empty(area);
        ControlsPanel {
            controls: &controls,
            selected: 6,
        }
        .render(area, &mut buf);

        assert_eq!(row_text(&buf, 0, 0, 8), "Controls");
        // Three rows visible: ctrl_4, ctrl_5, ctrl_6 with the last highlighted
        assert_eq!(row_text(&buf, 1, 0, 6), "ctrl_4");
        assert_eq!(row_text(&buf, 3, 0, 6), "ctrl_6");
        assert_eq!(buf.cell((0, 3)).unwrap().bg, Color::White);
    }
}
