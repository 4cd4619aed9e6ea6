use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{CacheReason, FetchedPatients, PatientSource, SourceError};
use crate::cache::CacheManager;
use crate::models::PatientRecord;

/// How `CachingSource` uses the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Fetch from the inner source, writing through to the cache.
    /// Falls back to cached data when the fetch fails.
    Online,
    /// Serve cached data only
    Offline,
}

/// Wraps a source with a local patients cache.
/// Every result says whether it is live or cached, and how old the cache is.
pub struct CachingSource<S> {
    inner: S,
    cache: CacheManager,
    mode: CacheMode,
}

impl<S: PatientSource> CachingSource<S> {
    pub fn new(inner: S, cache: CacheManager, mode: CacheMode) -> Self {
        Self { inner, cache, mode }
    }

    async fn serve_cached(&self, reason: CacheReason) -> Result<FetchedPatients> {
        let snapshot = self.cache.load_snapshot().await?.ok_or(SourceError::CacheMiss)?;
        debug!(
            age = %snapshot.saved_at,
            stale = snapshot.saved_at.is_stale(),
            count = snapshot.patients.len(),
            "Serving cached patients"
        );
        Ok(FetchedPatients::cached(snapshot, reason))
    }
}

#[async_trait]
impl<S: PatientSource> PatientSource for CachingSource<S> {
    async fn get_all(&self) -> Result<Vec<PatientRecord>> {
        self.fetch().await.map(|fetched| fetched.records)
    }

    async fn fetch(&self) -> Result<FetchedPatients> {
        if self.mode == CacheMode::Offline {
            return self.serve_cached(CacheReason::Offline).await;
        }

        let fetch_err = match self.inner.get_all().await {
            Ok(records) => {
                if let Err(e) = self.cache.save_snapshot(self.inner.name(), &records).await {
                    warn!(error = %e, "Failed to cache patients");
                }
                return Ok(FetchedPatients::live(records));
            }
            Err(e) => e,
        };

        let reason = CacheReason::Fallback { error: format!("{:#}", fetch_err) };
        match self.serve_cached(reason).await {
            Ok(fetched) => {
                warn!(
                    source = self.inner.name(),
                    error = %fetch_err,
                    origin = %fetched.origin,
                    "Fetch failed, falling back to cached patients"
                );
                Ok(fetched)
            }
            Err(cache_err) => {
                debug!(error = %cache_err, "Cache unusable for fallback");
                Err(fetch_err)
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
