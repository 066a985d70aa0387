//! Chart sync driver: the perpetual refresh loop of one chart.
//!
//! Each tick fetches what the chart is missing, merges it series by series and
//! redraws when something changed. The loop reschedules itself only after a
//! tick has fully settled, so ticks of one chart never overlap.
//!
//! ```text
//!  start ──► tick ──► sleep(poll_interval) ──► tick ──► ...
//!             │                                  ▲
//!             └─ fetch(es) ─► merge ─► redraw ───┘
//!  stop  ──► cancel sleep, discard results of in-flight ticks
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{FetchStrategy, SyncSettings};
use crate::error::SyncError;
use crate::fetch::{FetchRequest, StatsSource};
use crate::render::RenderAdapter;
use crate::sample::FetchResult;
use crate::series::{Chart, SyncStats};
use crate::tracker::{self, MergeReport};

// ---------------------------------------------------------------------------
// Tick reporting
// ---------------------------------------------------------------------------

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// At least one buffer changed and the chart was redrawn.
    Redrawn,
    /// Fetches settled but no buffer changed.
    Unchanged,
    /// The driver was stopped while fetches were in flight; nothing merged.
    Discarded,
    /// Another tick of this chart was still active; nothing fetched.
    Busy,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Number of fetches issued.
    pub fetches: usize,
    /// Merge result per series name, in chart order.
    pub merges: Vec<(String, MergeReport)>,
    /// Recovered errors observed during the tick.
    pub errors: Vec<SyncError>,
}

impl TickReport {
    fn empty(outcome: TickOutcome, fetches: usize) -> Self {
        Self {
            outcome,
            fetches,
            merges: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn changed(&self) -> bool {
        self.outcome == TickOutcome::Redrawn
    }

    pub fn fetch_failures(&self) -> usize {
        self.errors.iter().filter(|e| e.is_fetch_failure()).count()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct Timer {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns one chart and keeps it in sync with the stats backend.
pub struct ChartDriver<S, R> {
    chart: tokio::sync::Mutex<Chart>,
    label: String,
    source: S,
    render: R,
    settings: SyncSettings,
    /// Bumped by `stop`; ticks that began under an older value are discarded.
    generation: AtomicU64,
    timer: Mutex<Option<Timer>>,
}

impl<S, R> ChartDriver<S, R>
where
    S: StatsSource + 'static,
    R: RenderAdapter + 'static,
{
    pub fn new(chart: Chart, source: S, render: R, settings: SyncSettings) -> Self {
        let label = format!("{}:{}", chart.job_id, chart.title);
        Self {
            chart: tokio::sync::Mutex::new(chart),
            label,
            source,
            render,
            settings,
            generation: AtomicU64::new(0),
            timer: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// `job:title` label used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Copy of the chart, waiting for an active tick to finish.
    pub async fn snapshot(&self) -> Chart {
        self.chart.lock().await.clone()
    }

    /// Copy of the chart unless a tick is active right now.
    pub fn try_snapshot(&self) -> Option<Chart> {
        self.chart.try_lock().ok().map(|c| c.clone())
    }

    /// Sync counters unless a tick is active right now.
    pub fn try_stats(&self) -> Option<SyncStats> {
        self.chart.try_lock().ok().map(|c| c.stats.clone())
    }

    /// Whether the refresh loop is armed.
    pub fn is_running(&self) -> bool {
        self.timer_slot()
            .as_ref()
            .is_some_and(|t| !t.task.is_finished())
    }

    /// Tick now, then every `poll_interval` after each tick settles.
    ///
    /// Returns `false` without doing anything if the loop is already armed.
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut slot = self.timer_slot();
        if slot.as_ref().is_some_and(|t| !t.task.is_finished()) {
            log::debug!("[{}] refresh loop already running", self.label);
            return false;
        }

        let cancel = CancellationToken::new();
        let driver = Arc::clone(self);
        let token = cancel.clone();
        let task = tokio::spawn(async move { driver.run(token).await });
        *slot = Some(Timer { cancel, task });
        true
    }

    /// Cancel the refresh loop.
    ///
    /// Fetches already in flight are left to finish, but their results are
    /// dropped instead of merged.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(timer) = self.timer_slot().take() {
            timer.cancel.cancel();
            log::info!("[{}] refresh loop stopped", self.label);
        }
    }

    /// Run one fetch/merge/redraw cycle.
    pub async fn tick(&self) -> TickReport {
        let Ok(mut chart) = self.chart.try_lock() else {
            log::debug!("[{}] tick skipped, previous tick still active", self.label);
            return TickReport::empty(TickOutcome::Busy, 0);
        };
        let generation = self.generation.load(Ordering::Acquire);

        let fetched = self.fetch_all(&chart).await;
        let fetches = fetched.len();

        if self.generation.load(Ordering::Acquire) != generation {
            log::debug!(
                "[{}] stopped during tick, discarding {fetches} result(s)",
                self.label
            );
            return TickReport::empty(TickOutcome::Discarded, fetches);
        }

        let window = self.settings.display_window;
        let mut report = TickReport::empty(TickOutcome::Unchanged, fetches);

        for (targets, result) in fetched {
            let samples = match result {
                Ok(samples) => {
                    chart.stats.record_fetch(Ok(()));
                    samples
                }
                Err(err) => {
                    log::warn!("[{}] {err}", self.label);
                    chart.stats.record_fetch(Err(&err));
                    report.errors.push(err);
                    continue;
                }
            };

            for index in targets {
                let series = &mut chart.series[index];
                let merge = tracker::merge(series, &samples, window);
                if merge.missing_column > 0 {
                    let err = SyncError::ColumnMissing {
                        series: series.name.clone(),
                        column: series.column.clone(),
                        count: merge.missing_column,
                    };
                    log::debug!("[{}] {err}", self.label);
                    report.errors.push(err);
                }
                report.merges.push((series.name.clone(), merge));
            }
        }

        chart.stats.ticks += 1;
        if report.merges.iter().any(|(_, m)| m.changed()) {
            chart.stats.redraws += 1;
            chart.stats.last_update = Some(Utc::now());
            self.render.redraw(&chart);
            report.outcome = TickOutcome::Redrawn;
        }

        log::debug!(
            "[{}] tick #{}: {:?}, {} fetch(es), {} error(s)",
            self.label,
            chart.stats.ticks,
            report.outcome,
            report.fetches,
            report.errors.len()
        );
        report
    }

    /// Issue this tick's fetches and wait for all of them to settle.
    ///
    /// Each result is paired with the indices of the series it feeds.
    async fn fetch_all(&self, chart: &Chart) -> Vec<(Vec<usize>, Result<FetchResult, SyncError>)> {
        if chart.series.is_empty() {
            return Vec::new();
        }
        match self.settings.strategy {
            FetchStrategy::Unified => {
                let cursor = tracker::chart_cursor(chart, self.settings.display_window);
                let request = FetchRequest::job(&chart.job_id, cursor);
                let result = self.source.fetch(&request).await;
                vec![((0..chart.series.len()).collect(), result)]
            }
            FetchStrategy::PerSeries => {
                let requests: Vec<FetchRequest> = chart
                    .series
                    .iter()
                    .map(|s| {
                        FetchRequest::series(&chart.job_id, &s.name, &s.column, tracker::cursor_for(s))
                    })
                    .collect();
                let results = join_all(requests.iter().map(|r| self.source.fetch(r))).await;
                results
                    .into_iter()
                    .enumerate()
                    .map(|(i, result)| (vec![i], result))
                    .collect()
            }
        }
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        log::info!(
            "[{}] refresh loop started, every {:?}",
            self.label,
            self.settings.poll_interval
        );
        if self.tick().await.outcome == TickOutcome::Busy {
            // A tick begun before a restart still holds the chart.
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.chart.lock() => {}
            }
            self.tick().await;
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
            self.tick().await;
        }
    }

    fn timer_slot(&self) -> MutexGuard<'_, Option<Timer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
