//! Synthetic AFL-style stats feed for demo jobs.
//!
//! Produces the same columns a Lagopus fuzzer analyzer reports, with plausible
//! dynamics: throughput jitter, slowly growing memory, path discovery that
//! tails off, and occasional crashes and hangs.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;

use lagopus_core::Sample;

use crate::SharedStore;

/// Evolving counters of one simulated fuzzing job.
#[derive(Debug, Clone)]
pub struct FuzzerModel {
    pub alive: f64,
    pub execs: f64,
    pub execs_per_sec: f64,
    pub memory: f64,
    pub total_paths: f64,
    pub pending: f64,
    pub pending_fav: f64,
    pub current_path: f64,
    pub crashes: f64,
    pub hangs: f64,
    pub cpu_hours: f64,
}

impl FuzzerModel {
    pub fn new(cores: u32) -> Self {
        Self {
            alive: cores as f64,
            execs: 0.0,
            execs_per_sec: 900.0 * cores as f64,
            memory: 24.0,
            total_paths: 1.0,
            pending: 1.0,
            pending_fav: 1.0,
            current_path: 0.0,
            crashes: 0.0,
            hangs: 0.0,
            cpu_hours: 0.0,
        }
    }

    /// Advance the model by `dt` and return the resulting row.
    pub fn step<R: Rng>(&mut self, rng: &mut R, dt: Duration) -> Sample {
        let secs = dt.as_secs_f64();
        let base = 900.0 * self.alive;
        self.execs_per_sec = (base * rng.random_range(0.8_f64..1.2)).max(0.0);
        self.execs += self.execs_per_sec * secs;

        // Discovery slows as the corpus grows.
        let discovery = 3.0 * secs / (1.0 + self.total_paths / 200.0);
        let found = (discovery * rng.random_range(0.0_f64..2.0)).round();
        self.total_paths += found;
        self.pending = (self.pending + found - rng.random_range(0.0_f64..1.5).round()).max(0.0);
        self.pending_fav = self.pending_fav.min(self.pending).max(0.0);
        if found > 0.0 && rng.random_bool(0.3) {
            self.pending_fav += 1.0;
        }
        self.current_path = rng.random_range(0.0..self.total_paths.max(1.0)).floor();

        self.memory += rng.random_range(0.0_f64..0.05) * secs;
        if rng.random_bool(0.01) {
            self.crashes += 1.0;
        }
        if rng.random_bool(0.005) {
            self.hangs += 1.0;
        }
        self.cpu_hours += self.alive * secs / 3600.0;

        Sample::new(Utc::now())
            .with("alive", self.alive)
            .with("execs", self.execs.round())
            .with("execs_per_sec", self.execs_per_sec)
            .with("memory", self.memory)
            .with("total_paths", self.total_paths)
            .with("pending", self.pending)
            .with("pending_fav", self.pending_fav)
            .with("current_path", self.current_path)
            .with("crashes", self.crashes)
            .with("hangs", self.hangs)
            .with("cpu_hours", self.cpu_hours)
    }
}

/// Append a synthetic row for `job_id` every `period` until aborted.
pub fn spawn_feed(store: SharedStore, job_id: String, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_os_rng();
        let mut model = FuzzerModel::new(rng.random_range(1..=4));
        let mut ticker = tokio::time::interval(period);
        log::info!("synthetic feed for '{job_id}' every {period:?}");
        loop {
            ticker.tick().await;
            let sample = model.step(&mut rng, period);
            if let Err(e) = store.write().await.insert(&job_id, sample) {
                log::warn!("synthetic feed for '{job_id}': {e}");
            }
        }
    })
}
