use serde::{Deserialize, Serialize};

use crate::models::PatientRecord;
use crate::utils::normalize_term;

/// Service and rank constraints applied before search.
/// `None` (or a blank string before normalisation) means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientFilters {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
}

impl PatientFilters {
    /// Build filters from raw form values.
    /// Values are trimmed; blank values become unset.
    pub fn new(service: Option<&str>, rank: Option<&str>) -> Self {
        Self {
            service: normalize_term(service),
            rank: normalize_term(rank),
        }
    }

    pub fn service(service: &str) -> Self {
        Self::new(Some(service), None)
    }

    pub fn rank(rank: &str) -> Self {
        Self::new(None, Some(rank))
    }

    /// Re-apply trimming to values that may have been set directly
    pub fn normalized(self) -> Self {
        Self::new(self.service.as_deref(), self.rank.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.rank.is_none()
    }

    pub fn matches(&self, record: &PatientRecord) -> bool {
        record.matches_filters(self.service.as_deref(), self.rank.as_deref())
    }
}
