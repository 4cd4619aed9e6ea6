//! Patient record sources.
//!
//! A `PatientSource` delivers the full record set in one call. How records
//! are fetched is up to the implementation:
//!
//! - `HttpPatientSource`: REST endpoint with bearer token and rate-limit backoff
//! - `FilePatientSource`: JSON file on disk
//! - `CachingSource`: wraps another source with a local cache for offline use
//!
//! The controller calls `fetch`, which pairs the records with a
//! [`DataOrigin`] so a live list can be told apart from a cached one.

pub mod caching;
pub mod error;
pub mod file;
pub mod http;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheStamp, PatientSnapshot};
use crate::models::PatientRecord;

pub use caching::{CacheMode, CachingSource};
pub use error::SourceError;
pub use file::FilePatientSource;
pub use http::HttpPatientSource;

/// Asynchronous provider of the full patient record set.
#[async_trait]
pub trait PatientSource: Send + Sync {
    /// Fetch every record, in the order the source defines.
    async fn get_all(&self) -> Result<Vec<PatientRecord>>;

    /// `get_all` plus where the records came from.
    /// Sources that always hit their backend keep this default.
    async fn fetch(&self) -> Result<FetchedPatients> {
        Ok(FetchedPatients::live(self.get_all().await?))
    }

    /// Short label used in log events
    fn name(&self) -> &str {
        "patients"
    }
}

/// Why cached records were served instead of live ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheReason {
    /// Offline mode; the backend was not contacted
    Offline,
    /// The live fetch failed
    Fallback { error: String },
}

/// Provenance of a loaded record set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DataOrigin {
    Live,
    Cache { stamp: CacheStamp, reason: CacheReason },
}

impl DataOrigin {
    pub fn is_cached(&self) -> bool {
        matches!(self, DataOrigin::Cache { .. })
    }
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Live => write!(f, "live"),
            DataOrigin::Cache { stamp, reason: CacheReason::Offline } => {
                write!(f, "cache (offline, {})", stamp)
            }
            DataOrigin::Cache { stamp, reason: CacheReason::Fallback { .. } } => {
                write!(f, "cache (fallback, {})", stamp)
            }
        }
    }
}

/// Records returned by `PatientSource::fetch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPatients {
    pub records: Vec<PatientRecord>,
    pub origin: DataOrigin,
}

impl FetchedPatients {
    pub fn live(records: Vec<PatientRecord>) -> Self {
        Self { records, origin: DataOrigin::Live }
    }

    pub fn cached(snapshot: PatientSnapshot, reason: CacheReason) -> Self {
        Self {
            records: snapshot.patients,
            origin: DataOrigin::Cache { stamp: snapshot.saved_at, reason },
        }
    }
}

/// Accepted payload shapes: a bare array, or an object with a `patients` array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatientsPayload {
    List(Vec<PatientRecord>),
    Wrapped { patients: Vec<PatientRecord> },
}

impl PatientsPayload {
    fn into_records(self) -> Vec<PatientRecord> {
        match self {
            PatientsPayload::List(records) => records,
            PatientsPayload::Wrapped { patients } => patients,
        }
    }
}

/// Parse a patients payload from JSON text
pub(crate) fn parse_patients(text: &str) -> serde_json::Result<Vec<PatientRecord>> {
    serde_json::from_str::<PatientsPayload>(text).map(PatientsPayload::into_records)
}
