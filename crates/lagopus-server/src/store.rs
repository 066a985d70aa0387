//! In-memory per-job stats history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use lagopus_core::{Sample, format_instant};

/// How `since` bounds a stats query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinceBoundary {
    /// Rows at or after `since`; the cursor row is echoed back.
    #[default]
    Inclusive,
    /// Rows strictly after `since`.
    Exclusive,
}

impl SinceBoundary {
    fn admits(self, time: DateTime<Utc>, since: DateTime<Utc>) -> bool {
        match self {
            Self::Inclusive => time >= since,
            Self::Exclusive => time > since,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("job id must not be empty")]
    EmptyJobId,
    #[error("sample has no metric columns")]
    NoColumns,
}

/// Job listing entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobSummary {
    pub id: String,
    pub samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Stats rows per job, each kept ascending by time with unique timestamps.
#[derive(Debug, Default)]
pub struct StatsStore {
    jobs: BTreeMap<String, Vec<Sample>>,
    boundary: SinceBoundary,
}

impl StatsStore {
    pub fn new(boundary: SinceBoundary) -> Self {
        Self {
            jobs: BTreeMap::new(),
            boundary,
        }
    }

    pub fn boundary(&self) -> SinceBoundary {
        self.boundary
    }

    /// Record a sample. A row with an existing timestamp replaces it.
    pub fn insert(&mut self, job_id: &str, sample: Sample) -> Result<(), StoreError> {
        check(job_id, &sample)?;
        self.put(job_id, sample);
        Ok(())
    }

    /// Record a batch, all or nothing: the store is untouched if any row is rejected.
    pub fn insert_all(&mut self, job_id: &str, samples: Vec<Sample>) -> Result<usize, StoreError> {
        for sample in &samples {
            check(job_id, sample)?;
        }
        let accepted = samples.len();
        for sample in samples {
            self.put(job_id, sample);
        }
        Ok(accepted)
    }

    fn put(&mut self, job_id: &str, sample: Sample) {
        let rows = self.jobs.entry(job_id.to_string()).or_default();
        let at = rows.partition_point(|s| s.time < sample.time);
        match rows.get(at) {
            Some(existing) if existing.time == sample.time => rows[at] = sample,
            _ => rows.insert(at, sample),
        }
    }

    /// Full history of a job; empty for unknown jobs.
    pub fn history(&self, job_id: &str) -> &[Sample] {
        self.jobs.get(job_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows admitted by `since` under this store's boundary.
    pub fn since(&self, job_id: &str, since: Option<DateTime<Utc>>) -> &[Sample] {
        let rows = self.history(job_id);
        match since {
            None => rows,
            Some(since) => {
                let start = rows.partition_point(|s| !self.boundary.admits(s.time, since));
                &rows[start..]
            }
        }
    }

    pub fn jobs(&self) -> Vec<JobSummary> {
        self.jobs
            .iter()
            .map(|(id, rows)| JobSummary {
                id: id.clone(),
                samples: rows.len(),
                last: rows.last().map(|s| format_instant(&s.time)),
            })
            .collect()
    }

    pub fn total_samples(&self) -> usize {
        self.jobs.values().map(Vec::len).sum()
    }
}

fn check(job_id: &str, sample: &Sample) -> Result<(), StoreError> {
    if job_id.trim().is_empty() {
        return Err(StoreError::EmptyJobId);
    }
    if sample.values.is_empty() {
        return Err(StoreError::NoColumns);
    }
    Ok(())
}
