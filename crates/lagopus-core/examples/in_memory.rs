//! Drive a chart from an in-memory stats source and print every redraw.
//!
//! Run: `cargo run -p lagopus-core --example in_memory`

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use lagopus_core::{
    Chart, ChartDriver, ChartSpec, FetchRequest, FetchResult, Sample, StatsSource, SyncError,
    SyncSettings,
};

/// Appends a growing row on every fetch, like a live job would.
#[derive(Default)]
struct Growing {
    rows: Mutex<Vec<Sample>>,
}

impl StatsSource for Growing {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, SyncError> {
        let mut rows = self.rows.lock().unwrap();
        let n = rows.len() as f64;
        rows.push(
            Sample::new(Utc::now())
                .with("total_paths", 10.0 + n * 3.0)
                .with("pending", (20.0 - n).max(0.0))
                .with("pending_fav", (5.0 - n / 2.0).max(0.0)),
        );
        Ok(rows
            .iter()
            .filter(|s| request.since.is_none_or(|since| s.time >= since))
            .cloned()
            .collect())
    }
}

#[tokio::main]
async fn main() {
    let spec = ChartSpec::lagopus_defaults().remove(2);
    let driver = Arc::new(ChartDriver::new(
        Chart::from_spec("demo", &spec),
        Growing::default(),
        |chart: &Chart| {
            let line: Vec<String> = chart
                .series
                .iter()
                .filter_map(|s| s.last().map(|p| format!("{}={}", s.name, p.y)))
                .collect();
            println!("redraw #{}: {}", chart.stats.redraws, line.join("  "));
        },
        SyncSettings::default()
            .poll_interval(Duration::from_millis(200))
            .display_window(5),
    ));

    driver.start();
    tokio::time::sleep(Duration::from_secs(2)).await;
    driver.stop();

    let chart = driver.snapshot().await;
    println!(
        "{} ticks, {} points kept per series",
        chart.stats.ticks,
        chart.series[0].len()
    );
}
