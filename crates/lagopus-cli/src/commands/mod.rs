pub mod fetch;
pub mod monitor;
pub mod serve;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use lagopus_core::{Chart, ChartDriver, ChartSpec, HttpStatsClient, RenderAdapter};

use crate::config::{MonitorConfig, Overrides};

/// Chart driver polling the configured HTTP endpoint.
pub type HttpDriver<R> = ChartDriver<Arc<HttpStatsClient>, R>;

/// Resolve the monitor config, or exit with the reason.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> MonitorConfig {
    match MonitorConfig::resolve(path, overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Build the stats client for `config`, or exit with the reason.
pub fn make_client(config: &MonitorConfig) -> Arc<HttpStatsClient> {
    match HttpStatsClient::new(&config.url, config.endpoint) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// One driver per job per chart, in job-major order.
///
/// `render_for` receives the driver's slot index and returns its adapter.
pub fn build_drivers<R, F>(
    config: &MonitorConfig,
    client: &Arc<HttpStatsClient>,
    mut render_for: F,
) -> Vec<Arc<HttpDriver<R>>>
where
    R: RenderAdapter + 'static,
    F: FnMut(usize, &str, &ChartSpec) -> R,
{
    let specs = config.chart_specs();
    let mut drivers = Vec::with_capacity(config.jobs.len() * specs.len());
    for job in config.jobs.iter().filter(|j| !j.trim().is_empty()) {
        for spec in &specs {
            let render = render_for(drivers.len(), job, spec);
            drivers.push(Arc::new(ChartDriver::new(
                Chart::from_spec(job.as_str(), spec),
                Arc::clone(client),
                render,
                config.sync,
            )));
        }
    }
    drivers
}

/// Multi-threaded runtime for the async commands, or exit.
pub fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: cannot start async runtime: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lagopus_core::NoRender;

    fn config(jobs: &[&str]) -> MonitorConfig {
        MonitorConfig {
            jobs: jobs.iter().map(|j| j.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn drivers_are_job_major() {
        let config = config(&["a", "b"]);
        let client = make_client(&config);
        let mut slots = Vec::new();
        let drivers = build_drivers(&config, &client, |slot, job, spec| {
            slots.push((slot, job.to_string(), spec.title.clone()));
            NoRender
        });

        let charts = ChartSpec::lagopus_defaults().len();
        assert_eq!(drivers.len(), 2 * charts);
        assert_eq!(drivers[0].label(), "a:Executions");
        assert_eq!(drivers[charts].label(), "b:Executions");
        assert_eq!(slots[charts].0, charts);
        assert_eq!(slots[charts].1, "b");
    }

    #[test]
    fn blank_jobs_skipped() {
        let config = config(&["a", " "]);
        let client = make_client(&config);
        let drivers = build_drivers(&config, &client, |_, _, _| NoRender);
        assert_eq!(drivers.len(), ChartSpec::lagopus_defaults().len());
    }

    #[test]
    fn drivers_share_settings() {
        let mut config = config(&["a"]);
        config.sync = config.sync.display_window(7);
        let client = make_client(&config);
        let drivers = build_drivers(&config, &client, |_, _, _| NoRender);
        assert!(drivers.iter().all(|d| d.settings().display_window == 7));
    }
}
