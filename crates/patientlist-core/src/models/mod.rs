//! Data models for patient list entities.
//!
//! - `PatientRecord`: one patient entry as delivered by a source
//! - `PatientFilters`: equality constraints on service and rank
//! - `Service`, `PayGrade`: display helpers for service and rank codes

pub mod filters;
pub mod patient;

pub use filters::PatientFilters;
pub use patient::{GradeKind, PatientRecord, PayGrade, Service};
