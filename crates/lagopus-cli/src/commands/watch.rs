use std::fmt::Write;
use std::sync::Arc;

use chrono::SecondsFormat;
use lagopus_core::{Chart, ChartDriver, RenderAdapter, StatsSource};

use crate::config::MonitorConfig;

/// One line per redraw: the newest point of every series.
pub fn format_latest(chart: &Chart) -> String {
    let mut line = format!("[{}] {}", chart.job_id, chart.title);
    if let Some(unit) = &chart.unit {
        let _ = write!(line, " ({unit})");
    }
    for series in &chart.series {
        match series.last() {
            Some(p) => {
                let _ = write!(
                    line,
                    "  {}={:.2} @{}",
                    series.name,
                    p.y,
                    p.x.to_rfc3339_opts(SecondsFormat::Secs, true)
                );
            }
            None => {
                let _ = write!(line, "  {}=-", series.name);
            }
        }
    }
    line
}

pub fn run(config: MonitorConfig) {
    let client = super::make_client(&config);
    let drivers = super::build_drivers(&config, &client, |_, _, _| {
        |chart: &Chart| println!("{}", format_latest(chart))
    });

    eprintln!(
        "Watching {} job(s), {} chart(s), every {:?} ({}); Ctrl-C to stop",
        config.jobs.len(),
        drivers.len(),
        config.sync.poll_interval,
        config.sync.strategy,
    );

    let rt = super::runtime();
    rt.block_on(async {
        for driver in &drivers {
            driver.start();
        }
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("cannot listen for Ctrl-C: {e}");
        }
        for driver in &drivers {
            driver.stop();
        }
        for line in summary(&drivers).await {
            eprintln!("{line}");
        }
    });
}

/// Final counters per driver, waiting out ticks still in flight.
pub async fn summary<S, R>(drivers: &[Arc<ChartDriver<S, R>>]) -> Vec<String>
where
    S: StatsSource + 'static,
    R: RenderAdapter + 'static,
{
    let mut lines = Vec::with_capacity(drivers.len());
    for driver in drivers {
        let stats = driver.snapshot().await.stats;
        lines.push(format!(
            "{}: {} tick(s), {} fetch(es), {} failure(s)",
            driver.label(),
            stats.ticks,
            stats.fetches,
            stats.failures
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use lagopus_core::{
        ChartSpec, FetchRequest, FetchResult, MergeReport, NoRender, Sample, SeriesSpec,
        SyncError, SyncSettings, merge,
    };
    use tokio::sync::Semaphore;

    #[test]
    fn latest_line_lists_every_series() {
        let spec = ChartSpec::new("Faults")
            .series(SeriesSpec::new("Crashes", "crashes"))
            .series(SeriesSpec::new("Hangs", "hangs"));
        let mut chart = Chart::from_spec("fuzz", &spec);
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap();
        let report: MergeReport = merge(
            &mut chart.series[0],
            &[Sample::new(t).with("crashes", 3.0)],
            20,
        );
        assert!(report.changed());

        assert_eq!(
            format_latest(&chart),
            "[fuzz] Faults  Crashes=3.00 @2024-03-01T12:00:05Z  Hangs=-"
        );
    }

    /// Holds every fetch until a permit is released.
    struct Slow(Semaphore);

    impl StatsSource for Slow {
        async fn fetch(&self, _request: &FetchRequest) -> Result<FetchResult, SyncError> {
            let _permit = self
                .0
                .acquire()
                .await
                .map_err(|e| SyncError::transport("slow", e.to_string()))?;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn summary_includes_drivers_with_a_tick_in_flight() {
        let source = Arc::new(Slow(Semaphore::new(0)));
        let chart = Chart::from_spec("fuzz", &ChartSpec::single("Memory", "memory"));
        let driver = Arc::new(ChartDriver::new(
            chart,
            source.clone(),
            NoRender,
            SyncSettings::default(),
        ));

        assert!(driver.start());
        while driver.try_stats().is_some() {
            tokio::task::yield_now().await;
        }
        driver.stop();
        source.0.add_permits(1);

        let lines = summary(&[driver]).await;
        assert_eq!(lines, vec!["fuzz:Memory: 0 tick(s), 0 fetch(es), 0 failure(s)"]);
    }

    #[test]
    fn unit_is_shown() {
        let chart = Chart::from_spec("j", &ChartSpec::single("Memory", "memory").unit("Mi"));
        assert_eq!(format_latest(&chart), "[j] Memory (Mi)  Memory=-");
    }
}
