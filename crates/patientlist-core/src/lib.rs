//! Core library for patientlist.
//!
//! The centre of this crate is [`PatientListController`], which holds a
//! loaded set of patient records and derives the filtered, searched and
//! paginated view a list page displays, together with the user's selection.
//!
//! Records come from a [`PatientSource`]. The crate ships an HTTP source,
//! a JSON file source and a caching decorator for offline use.

pub mod cache;
pub mod config;
pub mod controller;
pub mod models;
pub mod source;
pub mod utils;

pub use cache::{CacheManager, CacheStamp, PatientSnapshot};
pub use config::{Config, ControllerOptions};
pub use controller::{LoadPhase, PatientListController, PatientListView};
pub use models::{PatientFilters, PatientRecord, PayGrade, Service};
pub use source::{
    CacheMode, CacheReason, CachingSource, DataOrigin, FetchedPatients, FilePatientSource,
    HttpPatientSource, PatientSource, SourceError,
};
