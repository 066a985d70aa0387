//! Error taxonomy for stats synchronization.
//!
//! None of these are fatal to a chart's refresh loop. A failed fetch is
//! treated as an empty result for that tick, and missing columns only cost
//! the affected points.

use thiserror::Error;

/// A recoverable failure observed during one tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// Connection failure or non-success HTTP status.
    #[error("transport error fetching '{target}': {message}")]
    Transport {
        target: String,
        status: Option<u16>,
        message: String,
    },

    /// Payload was not a JSON array of stats samples.
    #[error("malformed stats payload from '{target}': {message}")]
    Decode { target: String, message: String },

    /// Samples lacked the column a series is bound to.
    #[error("series '{series}': {count} sample(s) missing column '{column}'")]
    ColumnMissing {
        series: String,
        column: String,
        count: usize,
    },
}

impl SyncError {
    pub fn transport(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            target: target.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn status(target: impl Into<String>, status: u16) -> Self {
        Self::Transport {
            target: target.into(),
            status: Some(status),
            message: format!("server responded with status {status}"),
        }
    }

    pub fn decode(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Whether this error meant the fetch itself failed (as opposed to a
    /// partially usable response).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Decode { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_carries_code() {
        let err = SyncError::status("http://x/api/jobs/a/stats", 503);
        match &err {
            SyncError::Transport { status, .. } => assert_eq!(*status, Some(503)),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("503"));
        assert!(err.is_fetch_failure());
    }

    #[test]
    fn column_missing_is_not_a_fetch_failure() {
        let err = SyncError::ColumnMissing {
            series: "Execs/sec".into(),
            column: "execs_per_sec".into(),
            count: 2,
        };
        assert!(!err.is_fetch_failure());
        assert_eq!(
            err.to_string(),
            "series 'Execs/sec': 2 sample(s) missing column 'execs_per_sec'"
        );
    }
}
