//! CLI for Lagopus — live charts of running fuzzing jobs.

mod commands;
mod config;
mod tui;

use std::fs::File;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lagopus_core::{EndpointStyle, FetchStrategy};
use lagopus_server::SinceBoundary;

use config::{DEFAULT_URL, Overrides};

#[derive(Parser)]
#[command(name = "lagopus")]
#[command(about = "lagopus — live telemetry charts for fuzzing jobs")]
#[command(version = lagopus_core::VERSION)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG also works
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where to poll and what to chart.
#[derive(Args)]
struct TargetArgs {
    /// TOML config file (url, endpoint, jobs, [sync], [[charts]])
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Base URL of the stats endpoint
    #[arg(long)]
    url: Option<String>,

    /// Endpoint layout: job_path (`/api/jobs/<id>/stats?since=`), job_query
    /// (`/api/jobs/stats?job=`) or series_path (`/api/jobs/<id>/stats/<column>?since=`)
    #[arg(long)]
    endpoint: Option<EndpointStyle>,

    /// Job id to chart (repeatable)
    #[arg(long = "job")]
    jobs: Vec<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Points kept per series
    #[arg(long)]
    window: Option<usize>,

    /// Fetch strategy: unified (one request per chart) or per_series
    #[arg(long)]
    strategy: Option<FetchStrategy>,
}

impl TargetArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            endpoint: self.endpoint,
            jobs: self.jobs.clone(),
            interval_ms: self.interval_ms,
            window: self.window,
            strategy: self.strategy,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Live dashboard of every chart of the given jobs (TUI)
    Monitor {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Headless: print the newest point of each series whenever a chart changes
    Watch {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Fetch a job's samples once and print them as JSON
    Fetch {
        /// Job id
        job: String,

        /// Base URL of the stats endpoint
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,

        /// Endpoint layout: job_path, job_query or series_path
        #[arg(long, default_value = "job_path")]
        endpoint: EndpointStyle,

        /// Only samples from this ISO-8601 instant on
        #[arg(long)]
        since: Option<String>,

        /// Print only the newest N samples
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run the reference stats endpoint
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// `since` excludes the cursor row (time > since) instead of echoing it
        #[arg(long)]
        exclusive: bool,

        /// Feed synthetic fuzzer stats into this job (repeatable)
        #[arg(long = "demo-job")]
        demo_jobs: Vec<String>,

        /// Synthetic feed period in milliseconds
        #[arg(long, default_value = "1000")]
        feed_ms: u64,
    },
}

fn setup_logging(verbose: u8, log_file: Option<&PathBuf>, stderr_allowed: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        2 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }

    match log_file {
        Some(path) => match File::create(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Error: cannot open log file {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        // Log lines would tear through the dashboard.
        None if !stderr_allowed => {
            builder.filter_level(log::LevelFilter::Off);
        }
        None => {}
    }

    builder.init();
}

fn main() {
    let cli = Cli::parse();
    let is_tui = matches!(cli.command, Commands::Monitor { .. });
    setup_logging(cli.verbose, cli.log_file.as_ref(), !is_tui);

    match cli.command {
        Commands::Monitor { target } => {
            let config = commands::load_config(target.config.as_deref(), &target.overrides());
            commands::monitor::run(config)
        }
        Commands::Watch { target } => {
            let config = commands::load_config(target.config.as_deref(), &target.overrides());
            commands::watch::run(config)
        }
        Commands::Fetch {
            job,
            url,
            endpoint,
            since,
            limit,
        } => commands::fetch::run(&url, endpoint, &job, since.as_deref(), limit),
        Commands::Serve {
            port,
            host,
            exclusive,
            demo_jobs,
            feed_ms,
        } => {
            let boundary = if exclusive {
                SinceBoundary::Exclusive
            } else {
                SinceBoundary::Inclusive
            };
            commands::serve::run(&host, port, boundary, &demo_jobs, feed_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn monitor_flags_become_overrides() {
        let cli = Cli::parse_from([
            "lagopus",
            "monitor",
            "--job",
            "a",
            "--job",
            "b",
            "--interval-ms",
            "250",
            "--strategy",
            "per-series",
            "--endpoint",
            "query",
        ]);
        let Commands::Monitor { target } = cli.command else {
            panic!("expected monitor");
        };
        let o = target.overrides();
        assert_eq!(o.jobs, vec!["a", "b"]);
        assert_eq!(o.interval_ms, Some(250));
        assert_eq!(o.strategy, Some(FetchStrategy::PerSeries));
        assert_eq!(o.endpoint, Some(EndpointStyle::JobQuery));
        assert_eq!(o.url, None);
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::parse_from(["lagopus", "serve", "--demo-job", "demo"]);
        let Commands::Serve {
            port,
            exclusive,
            demo_jobs,
            feed_ms,
            ..
        } = cli.command
        else {
            panic!("expected serve");
        };
        assert_eq!(port, 8080);
        assert!(!exclusive);
        assert_eq!(demo_jobs, vec!["demo"]);
        assert_eq!(feed_ms, 1000);
    }

    #[test]
    fn global_verbosity() {
        let cli = Cli::parse_from(["lagopus", "fetch", "job-1", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
