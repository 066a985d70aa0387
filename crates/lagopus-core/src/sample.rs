//! Stats samples as produced by the job metrics endpoint.
//!
//! A sample is a flat JSON object: a `time` field plus any number of numeric
//! metric columns.
//!
//! ```json
//! { "time": "2024-03-01T12:00:05Z", "execs_per_sec": 812.5, "memory": 41.0 }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// Name of the timestamp field in a stats object.
pub const TIME_FIELD: &str = "time";

/// One timestamped row of job metrics. Immutable once received.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

/// The samples returned by one poll, ascending by time.
pub type FetchResult = Vec<Sample>;

impl Sample {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style column insert.
    pub fn with(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Value of `column`, if present and finite.
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().filter(|v| v.is_finite())
    }

    /// Build a sample from one decoded JSON object.
    ///
    /// `null` and non-numeric columns are left out rather than rejected; only
    /// a missing or unparsable `time` makes the object invalid.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self, String> {
        let time = match object.get(TIME_FIELD) {
            Some(Value::String(s)) => {
                parse_instant(s).ok_or_else(|| format!("unparsable time '{s}'"))?
            }
            Some(other) => return Err(format!("time is not a string: {other}")),
            None => return Err("sample has no time field".to_string()),
        };

        let values = object
            .iter()
            .filter(|(k, _)| k.as_str() != TIME_FIELD)
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
            .collect();

        Ok(Self { time, values })
    }
}

/// Parse an ISO-8601 instant.
///
/// Accepts RFC 3339 with an offset, and offset-less timestamps which are taken
/// to be UTC.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Render an instant as RFC 3339 in UTC with a `Z` suffix.
pub fn format_instant(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Decode a stats response body into samples.
///
/// `target` names the endpoint in any resulting error.
pub fn decode_samples(target: &str, body: &[u8]) -> Result<FetchResult, SyncError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SyncError::decode(target, format!("invalid JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(SyncError::decode(target, "expected a JSON array of samples"));
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(object) => Sample::from_object(object)
                .map_err(|e| SyncError::decode(target, format!("sample {i}: {e}"))),
            _ => Err(SyncError::decode(
                target,
                format!("sample {i} is not an object"),
            )),
        })
        .collect()
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry(TIME_FIELD, &format_instant(&self.time))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Sample {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        Sample::from_object(&object).map_err(de::Error::custom)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_instant(&self.time))?;
        for (column, value) in &self.values {
            write!(f, " {column}={value}")?;
        }
        Ok(())
    }
}
