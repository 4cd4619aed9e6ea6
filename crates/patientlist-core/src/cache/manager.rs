use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::PatientRecord;

/// Cached patients older than this are flagged as stale.
const STALE_AFTER_MINUTES: i64 = 60;

/// File holding the last good patient list
const SNAPSHOT_FILE: &str = "patients.json";

/// When a patient list was written to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheStamp(DateTime<Utc>);

impl CacheStamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn at(saved_at: DateTime<Utc>) -> Self {
        Self(saved_at)
    }

    pub fn saved_at(&self) -> DateTime<Utc> {
        self.0
    }

    /// Whole minutes since the save; clock skew never yields a negative age.
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.0).num_minutes().max(0)
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > STALE_AFTER_MINUTES
    }
}

impl fmt::Display for CacheStamp {
    /// Coarse age: "just now", "12m ago", "3h ago", "2d ago"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.age_minutes() {
            0 => write!(f, "just now"),
            m if m < 60 => write!(f, "{}m ago", m),
            m if m < 24 * 60 => write!(f, "{}h ago", m / 60),
            m => write!(f, "{}d ago", m / (24 * 60)),
        }
    }
}

/// Last successfully fetched patient list, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    pub saved_at: CacheStamp,
    /// Name of the source the records were fetched from
    pub source: String,
    pub patients: Vec<PatientRecord>,
}

/// Disk cache for the patient list. Clone is cheap; I/O goes through `tokio::fs`.
#[derive(Debug, Clone)]
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn snapshot_path(&self) -> PathBuf {
        self.cache_dir.join(SNAPSHOT_FILE)
    }

    /// `Ok(None)` when nothing has been cached yet
    pub async fn load_snapshot(&self) -> Result<Option<PatientSnapshot>> {
        let path = self.snapshot_path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read patient cache: {}", path.display()))
            }
        };

        let snapshot: PatientSnapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse patient cache: {}", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Replace the cached list. Returns the stamp written.
    pub async fn save_snapshot(&self, source: &str, patients: &[PatientRecord]) -> Result<CacheStamp> {
        let snapshot = PatientSnapshot {
            saved_at: CacheStamp::now(),
            source: source.to_string(),
            patients: patients.to_vec(),
        };
        let contents = serde_json::to_string_pretty(&snapshot)?;
        let path = self.snapshot_path();
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write patient cache: {}", path.display()))?;
        debug!(count = patients.len(), source, "Patient cache updated");
        Ok(snapshot.saved_at)
    }

    /// Remove the cached list. Returns whether there was one.
    pub async fn clear(&self) -> Result<bool> {
        let path = self.snapshot_path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove patient cache: {}", path.display())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn stamp_minutes_ago(minutes: i64) -> CacheStamp {
        CacheStamp::at(Utc::now() - Duration::minutes(minutes))
    }

    #[test]
    fn test_stamp_display() {
        assert_eq!(CacheStamp::now().to_string(), "just now");
        assert_eq!(stamp_minutes_ago(15).to_string(), "15m ago");
        assert_eq!(stamp_minutes_ago(95).to_string(), "1h ago");
        assert_eq!(stamp_minutes_ago(3 * 60).to_string(), "3h ago");
        assert_eq!(stamp_minutes_ago(26 * 60).to_string(), "1d ago");
        // Future timestamps from clock skew
        assert_eq!(CacheStamp::at(Utc::now() + Duration::minutes(5)).to_string(), "just now");
    }

    #[test]
    fn test_stamp_staleness() {
        assert!(!CacheStamp::now().is_stale());
        assert!(!stamp_minutes_ago(59).is_stale());
        assert!(stamp_minutes_ago(61).is_stale());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_preserves_order() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cache = CacheManager::new(dir.path().join("cache")).unwrap();
        assert!(cache.load_snapshot().await.unwrap().is_none());

        let patients = vec![
            PatientRecord::new(2, "Jane", "Smith", "navy", "o-3"),
            PatientRecord::new(1, "John", "Doe", "army", "e-5"),
        ];
        let stamp = cache.save_snapshot("http", &patients).await.unwrap();

        let snapshot = cache.load_snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.patients, patients);
        assert_eq!(snapshot.source, "http");
        assert_eq!(snapshot.saved_at, stamp);
        assert!(!snapshot.saved_at.is_stale());
    }

    #[tokio::test]
    async fn test_snapshot_file_layout() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        cache
            .save_snapshot("file", &[PatientRecord::new(1, "A", "B", "army", "e-1")])
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join(SNAPSHOT_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(json["savedAt"].is_string());
        assert_eq!(json["source"], "file");
        assert_eq!(json["patients"][0]["firstName"], "A");
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        cache
            .save_snapshot("http", &[PatientRecord::new(1, "A", "B", "army", "e-1")])
            .await
            .unwrap();
        assert!(cache.clear().await.unwrap());
        assert!(cache.load_snapshot().await.unwrap().is_none());
        assert!(!cache.clear().await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE), "garbage").unwrap();
        let err = cache.load_snapshot().await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse patient cache"));
    }
}
