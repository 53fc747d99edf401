//! TUI application state and event loop.
//!
//! Design: the dashboard never talks to the simulation service itself. Key
//! presses become [`Intent`]s queued to the control task, and every frame
//! draws the latest [`RenderState`] the task published. A slow service
//! therefore never freezes the UI; it only shows up as the busy marker.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::sync::{mpsc, watch};

use outbreak_core::series;
use outbreak_core::{Intent, RenderState, SessionState, SimulationParameters};

/// Step for `[` `]` and `-` `+`.
const LEVEL_STEP: f64 = 0.05;

/// Frame period while idle.
const FRAME: Duration = Duration::from_millis(33);

/// Keep an intervention level in [0, 1] on a 0.05 grid.
pub fn nudge(level: f64, delta: f64) -> f64 {
    let next = ((level + delta) / LEVEL_STEP).round() * LEVEL_STEP;
    next.clamp(0.0, 1.0)
}

pub struct App {
    intents: mpsc::Sender<Intent>,
    render: watch::Receiver<RenderState>,
    view: RenderState,
    params: SimulationParameters,
    lockdown_strength: f64,
    vaccination_fraction: f64,
    running: bool,
    notice: Option<String>,
    export_dir: PathBuf,
    last_export: Option<PathBuf>,
}

impl App {
    pub fn new(
        intents: mpsc::Sender<Intent>,
        render: watch::Receiver<RenderState>,
        params: SimulationParameters,
        lockdown_strength: f64,
        vaccination_fraction: f64,
    ) -> Self {
        let view = render.borrow().clone();
        Self {
            intents,
            render,
            view,
            params,
            lockdown_strength: lockdown_strength.clamp(0.0, 1.0),
            vaccination_fraction: vaccination_fraction.clamp(0.0, 1.0),
            running: true,
            notice: None,
            export_dir: PathBuf::from("."),
            last_export: None,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Restore the terminal before a panic message is printed.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running {
            self.refresh();
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(FRAME)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }

    /// Pull the latest published state, if any.
    pub fn refresh(&mut self) {
        if self.render.has_changed().unwrap_or(false) {
            self.view = self.render.borrow_and_update().clone();
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Enter => {
                if self.view.state == SessionState::Idle {
                    self.send_remote(Intent::Start(self.params.clone()));
                }
            }
            KeyCode::Char(' ') => self.send_remote(Intent::Step),
            KeyCode::Char('a') => self.send(Intent::ToggleAutoPlay),
            KeyCode::Char('x') => self.send(Intent::StopAutoPlay),
            KeyCode::Char('l') => self.send_remote(Intent::Lockdown(self.lockdown_strength)),
            KeyCode::Char('v') => self.send_remote(Intent::Vaccinate(self.vaccination_fraction)),
            KeyCode::Char('[') => {
                self.lockdown_strength = nudge(self.lockdown_strength, -LEVEL_STEP);
            }
            KeyCode::Char(']') => {
                self.lockdown_strength = nudge(self.lockdown_strength, LEVEL_STEP);
            }
            KeyCode::Char('-') => {
                self.vaccination_fraction = nudge(self.vaccination_fraction, -LEVEL_STEP);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.vaccination_fraction = nudge(self.vaccination_fraction, LEVEL_STEP);
            }
            KeyCode::Char('r') => {
                self.notice = None;
                self.send(Intent::Reset);
            }
            KeyCode::Char('e') => {
                self.notice = Some(match self.export_series() {
                    Ok(path) => format!("Exported {}", path.display()),
                    Err(e) => format!("Export failed: {e}"),
                });
            }
            _ => {}
        }
    }

    /// Queue an intent that makes a remote call. Dropped while a request is
    /// already outstanding, like a disabled button.
    fn send_remote(&mut self, intent: Intent) {
        if self.view.busy {
            self.notice = Some("Request in flight".to_string());
            return;
        }
        self.send(intent);
    }

    fn send(&mut self, intent: Intent) {
        if self.intents.try_send(intent).is_err() {
            self.notice = Some("Controller not responding".to_string());
        }
    }

    /// Write the charted series as CSV into the export directory.
    pub fn export_series(&mut self) -> io::Result<PathBuf> {
        let name = match self.view.session_id {
            Some(id) => format!("outbreak-{id}.csv"),
            None => {
                let epoch = SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                format!("outbreak-{epoch}.csv")
            }
        };
        let path = self.export_dir.join(name);
        std::fs::write(&path, series::to_csv(&self.view.series))?;
        self.last_export = Some(path.clone());
        Ok(path)
    }

    pub fn set_export_dir(&mut self, dir: &Path) {
        self.export_dir = dir.to_path_buf();
    }

    // --- Accessors ---

    pub fn view(&self) -> &RenderState {
        &self.view
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn lockdown_strength(&self) -> f64 {
        self.lockdown_strength
    }

    pub fn vaccination_fraction(&self) -> f64 {
        self.vaccination_fraction
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn last_export(&self) -> Option<&PathBuf> {
        self.last_export.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbreak_core::SeriesPoint;

    fn app() -> (App, mpsc::Receiver<Intent>, watch::Sender<RenderState>) {
        let (tx, rx) = mpsc::channel(8);
        let (render_tx, render_rx) = watch::channel(RenderState::default());
        let app = App::new(tx, render_rx, SimulationParameters::default(), 0.5, 0.1);
        (app, rx, render_tx)
    }

    fn live(render: &watch::Sender<RenderState>, busy: bool) {
        render.send_replace(RenderState {
            state: SessionState::Running,
            busy,
            ..RenderState::default()
        });
    }

    #[test]
    fn nudge_stays_on_grid_and_in_range() {
        assert!((nudge(0.5, 0.05) - 0.55).abs() < 1e-9);
        assert!((nudge(0.1, -0.05) - 0.05).abs() < 1e-9);
        assert_eq!(nudge(0.0, -0.05), 0.0);
        assert_eq!(nudge(1.0, 0.05), 1.0);
        assert!((nudge(0.33, 0.0) - 0.35).abs() < 1e-9);
    }

    #[test]
    fn enter_starts_only_when_idle() {
        let (mut app, mut rx, render) = app();
        app.handle_key(KeyCode::Enter);
        assert_eq!(
            rx.try_recv().unwrap(),
            Intent::Start(SimulationParameters::default())
        );

        live(&render, false);
        app.refresh();
        app.handle_key(KeyCode::Enter);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn intervention_keys_use_current_levels() {
        let (mut app, mut rx, render) = app();
        live(&render, false);
        app.refresh();
        app.handle_key(KeyCode::Char(']'));
        app.handle_key(KeyCode::Char('l'));
        app.handle_key(KeyCode::Char('-'));
        app.handle_key(KeyCode::Char('v'));
        match rx.try_recv().unwrap() {
            Intent::Lockdown(s) => assert!((s - 0.55).abs() < 1e-9),
            other => panic!("unexpected {other:?}"),
        }
        match rx.try_recv().unwrap() {
            Intent::Vaccinate(f) => assert!((f - 0.05).abs() < 1e-9),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn busy_blocks_remote_keys_but_not_stop() {
        let (mut app, mut rx, render) = app();
        live(&render, true);
        app.refresh();
        app.handle_key(KeyCode::Char(' '));
        assert!(rx.try_recv().is_err());
        assert_eq!(app.notice(), Some("Request in flight"));

        app.handle_key(KeyCode::Char('x'));
        app.handle_key(KeyCode::Char('r'));
        assert_eq!(rx.try_recv().unwrap(), Intent::StopAutoPlay);
        assert_eq!(rx.try_recv().unwrap(), Intent::Reset);
    }

    #[test]
    fn quit_keys() {
        let (mut app, _rx, _render) = app();
        assert!(app.is_running());
        app.handle_key(KeyCode::Esc);
        assert!(!app.is_running());
    }

    #[test]
    fn export_writes_csv() {
        let (mut app, _rx, render) = app();
        render.send_replace(RenderState {
            state: SessionState::Running,
            series: vec![SeriesPoint {
                day: 0,
                susceptible: 495,
                infected: 5,
                recovered: 0,
            }],
            ..RenderState::default()
        });
        app.refresh();
        let dir = tempfile::tempdir().unwrap();
        app.set_export_dir(dir.path());
        app.handle_key(KeyCode::Char('e'));

        let path = app.last_export().unwrap().clone();
        assert!(path.starts_with(dir.path()));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "day,susceptible,infected,recovered\n0,495,5,0\n"
        );
        assert!(app.notice().unwrap().starts_with("Exported"));
    }
}
