use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{parse_patients, PatientSource};
use crate::models::PatientRecord;

/// Reads patient records from a JSON file (bare array or `{"patients": [...]}`).
/// The file is re-read on every `get_all`.
#[derive(Debug, Clone)]
pub struct FilePatientSource {
    path: PathBuf,
}

impl FilePatientSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PatientSource for FilePatientSource {
    async fn get_all(&self) -> Result<Vec<PatientRecord>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read patients file: {}", self.path.display()))?;
        let records = parse_patients(&contents)
            .with_context(|| format!("Failed to parse patients file: {}", self.path.display()))?;
        debug!(path = %self.path.display(), count = records.len(), "Patients file read");
        Ok(records)
    }

    fn name(&self) -> &str {
        "file"
    }
}
