//! crates/schoolhub_core/src/status.rs
//!
//! Task lifecycle derivation. A task's status is never stored; it is computed
//! from the deadline and an explicitly supplied "now".

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::{PortError, PortResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Expired,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Expired => "expired",
        }
    }
}

/// `Expired` iff the deadline lies strictly before `now`. No deadline means `Active`.
pub fn derive_status(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> TaskStatus {
    match deadline {
        Some(deadline) if deadline < now => TaskStatus::Expired,
        _ => TaskStatus::Active,
    }
}

/// Same as [`derive_status`], for a deadline that has not been normalized yet.
pub fn derive_status_raw(
    deadline: Option<&RawTimestamp>,
    now: DateTime<Utc>,
) -> PortResult<TaskStatus> {
    let deadline = deadline.map(RawTimestamp::normalize).transpose()?;
    Ok(derive_status(deadline, now))
}

//=========================================================================================
// Timestamp Encodings
//=========================================================================================

/// The encodings a timestamp may arrive in from clients and legacy documents.
///
/// Deserialization tries the variants in order, so an RFC 3339 string becomes
/// `Native`, an object with `seconds`/`_seconds` becomes `Epoch`, and any other
/// string is kept as `Iso` to be parsed leniently by [`RawTimestamp::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Native(DateTime<Utc>),
    Epoch {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: u32,
    },
    Iso(String),
}

impl RawTimestamp {
    /// Converts to the canonical UTC representation.
    pub fn normalize(&self) -> PortResult<DateTime<Utc>> {
        match self {
            RawTimestamp::Native(dt) => Ok(*dt),
            RawTimestamp::Epoch {
                seconds,
                nanoseconds,
            } => DateTime::from_timestamp(*seconds, *nanoseconds).ok_or_else(|| {
                PortError::InvalidInput(format!(
                    "Timestamp {}s/{}ns is out of range",
                    seconds, nanoseconds
                ))
            }),
            RawTimestamp::Iso(raw) => parse_iso(raw),
        }
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        RawTimestamp::Native(dt)
    }
}

// Strings without an offset are read as UTC.
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

fn parse_iso(raw: &str) -> PortResult<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| PortError::InvalidInput(format!("'{}' is not a valid date", raw)))
}
