//! TUI application state and event loop.
//!
//! Every chart of every job has its own driver running on the tokio runtime.
//! Drivers hand finished charts to [`TuiRenderer`], which copies them into the
//! shared state; the draw loop only ever reads those copies, so a slow fetch
//! never blocks a frame.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tokio::runtime::Handle;

use lagopus_core::{Chart, ChartSpec, RenderAdapter, SyncStats};

use crate::commands::{HttpDriver, build_drivers, make_client};
use crate::config::MonitorConfig;

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Copy of a chart as of its latest redraw.
#[derive(Debug, Clone)]
pub struct ChartSnapshot {
    pub chart: Chart,
}

/// Everything the UI needs for one frame, captured in a single lock.
pub struct Snapshot {
    /// Panels of the selected job, in chart order.
    pub panels: Vec<Option<ChartSnapshot>>,
    pub redraws: u64,
}

struct SharedState {
    panels: Vec<Option<ChartSnapshot>>,
    redraws: u64,
}

fn lock(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Render adapter that publishes a driver's chart into one UI panel slot.
pub struct TuiRenderer {
    slot: usize,
    shared: Arc<Mutex<SharedState>>,
}

impl RenderAdapter for TuiRenderer {
    fn redraw(&self, chart: &Chart) {
        let mut state = lock(&self.shared);
        if let Some(panel) = state.panels.get_mut(self.slot) {
            *panel = Some(ChartSnapshot {
                chart: chart.clone(),
            });
        }
        state.redraws += 1;
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    drivers: Vec<Arc<HttpDriver<TuiRenderer>>>,
    handle: Handle,
    shared: Arc<Mutex<SharedState>>,
    jobs: Vec<String>,
    specs: Vec<ChartSpec>,
    /// Last stats read from each driver; refreshed whenever it is idle.
    stats: Vec<SyncStats>,
    job_cursor: usize,
    running: bool,
    paused: bool,
    url: String,
    poll_interval: Duration,
}

impl App {
    pub fn new(config: &MonitorConfig, handle: Handle) -> Self {
        let jobs: Vec<String> = config
            .jobs
            .iter()
            .filter(|j| !j.trim().is_empty())
            .cloned()
            .collect();
        let specs = config.chart_specs();
        let slots = jobs.len() * specs.len();

        let shared = Arc::new(Mutex::new(SharedState {
            panels: vec![None; slots],
            redraws: 0,
        }));
        let client = make_client(config);
        let drivers = build_drivers(config, &client, |slot, _, _| TuiRenderer {
            slot,
            shared: Arc::clone(&shared),
        });

        Self {
            stats: vec![SyncStats::default(); drivers.len()],
            drivers,
            handle,
            shared,
            jobs,
            specs,
            job_cursor: 0,
            running: true,
            paused: false,
            url: config.url.clone(),
            poll_interval: config.sync.poll_interval,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        let _runtime = self.handle.enter();

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

        self.start_all();
        let result = self.run_loop(&mut terminal);
        self.stop_all();

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
            self.refresh_stats();
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(Duration::from_millis(100))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('p') => {
                if self.paused {
                    self.start_all();
                } else {
                    self.stop_all();
                }
                self.paused = !self.paused;
            }
            KeyCode::Char('r') => self.tick_now(),
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => {
                if !self.jobs.is_empty() {
                    self.job_cursor = (self.job_cursor + 1) % self.jobs.len();
                }
            }
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
                if !self.jobs.is_empty() {
                    self.job_cursor = (self.job_cursor + self.jobs.len() - 1) % self.jobs.len();
                }
            }
            _ => {}
        }
    }

    fn start_all(&self) {
        for driver in &self.drivers {
            driver.start();
        }
    }

    fn stop_all(&self) {
        for driver in &self.drivers {
            driver.stop();
        }
    }

    /// One extra tick for every chart of the selected job; busy charts skip it.
    fn tick_now(&self) {
        for driver in &self.drivers[self.job_range()] {
            let driver = Arc::clone(driver);
            self.handle.spawn(async move {
                driver.tick().await;
            });
        }
    }

    fn refresh_stats(&mut self) {
        for (cached, driver) in self.stats.iter_mut().zip(&self.drivers) {
            if let Some(stats) = driver.try_stats() {
                *cached = stats;
            }
        }
    }

    fn job_range(&self) -> std::ops::Range<usize> {
        let start = self.job_cursor * self.specs.len();
        start..(start + self.specs.len()).min(self.drivers.len())
    }

    // --- Accessors for the UI ---

    pub fn current_job(&self) -> &str {
        self.jobs.get(self.job_cursor).map_or("-", String::as_str)
    }

    pub fn job_position(&self) -> (usize, usize) {
        (self.job_cursor + 1, self.jobs.len())
    }

    pub fn specs(&self) -> &[ChartSpec] {
        &self.specs
    }

    pub fn panel_stats(&self) -> &[SyncStats] {
        &self.stats[self.job_range()]
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = lock(&self.shared);
        Snapshot {
            panels: state
                .panels
                .get(self.job_range())
                .map(<[_]>::to_vec)
                .unwrap_or_default(),
            redraws: state.redraws,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lagopus_core::{Sample, merge};

    fn config(jobs: &[&str]) -> MonitorConfig {
        MonitorConfig {
            jobs: jobs.iter().map(|j| j.to_string()).collect(),
            ..Default::default()
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn renderer_fills_its_slot() {
        let rt = runtime();
        let app = App::new(&config(&["a", "b"]), rt.handle().clone());
        let charts = app.specs().len();

        let renderer = TuiRenderer {
            slot: charts + 1,
            shared: Arc::clone(&app.shared),
        };
        let mut chart = Chart::from_spec("b", &app.specs()[1]);
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        merge(&mut chart.series[0], &[Sample::new(t).with("memory", 12.0)], 20);
        renderer.redraw(&chart);

        let snap = app.snapshot();
        assert_eq!(snap.redraws, 1);
        assert!(snap.panels.iter().all(Option::is_none));

        let mut app = app;
        app.handle_key(KeyCode::Tab);
        assert_eq!(app.current_job(), "b");
        let snap = app.snapshot();
        assert_eq!(snap.panels.len(), charts);
        let panel = snap.panels[1].as_ref().unwrap();
        assert_eq!(panel.chart.series[0].last().unwrap().y, 12.0);
    }

    #[test]
    fn job_cursor_wraps() {
        let rt = runtime();
        let mut app = App::new(&config(&["a", "b", "c"]), rt.handle().clone());
        app.handle_key(KeyCode::Left);
        assert_eq!(app.current_job(), "c");
        assert_eq!(app.job_position(), (3, 3));
        app.handle_key(KeyCode::Right);
        assert_eq!(app.current_job(), "a");
    }

    #[test]
    fn pause_stops_and_resumes_drivers() {
        let rt = runtime();
        let _guard = rt.enter();
        let mut app = App::new(&config(&["a"]), rt.handle().clone());
        app.start_all();
        assert!(app.drivers.iter().all(|d| d.is_running()));

        app.handle_key(KeyCode::Char('p'));
        assert!(app.is_paused());
        assert!(app.drivers.iter().all(|d| !d.is_running()));

        app.handle_key(KeyCode::Char('p'));
        assert!(!app.is_paused());
        assert!(app.drivers.iter().all(|d| d.is_running()));
        app.stop_all();
    }

    #[test]
    fn quit_keys() {
        let rt = runtime();
        let mut app = App::new(&config(&["a"]), rt.handle().clone());
        app.handle_key(KeyCode::Char('x'));
        assert!(app.running);
        app.handle_key(KeyCode::Char('q'));
        assert!(!app.running);
    }
}
