//! Local caching module for offline data access.
//!
//! `CacheManager` stores the last successfully fetched patient list as a
//! `PatientSnapshot` together with a `CacheStamp`. Data is considered stale
//! after 60 minutes.

pub mod manager;

pub use manager::{CacheManager, CacheStamp, PatientSnapshot};
