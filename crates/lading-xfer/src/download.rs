use std::sync::Arc;
use std::time::Duration;

use lading_cache::Transfer;
use lading_core::{NotFoundCache, Result, WorkerPool};
use lading_transport::Transport;

use crate::pending::{Claim, PendingMap, await_outcome, join_result, outcome_channel, submit_guarded};

/// Deduplicates concurrent downloads of the same resource.
///
/// Unlike uploads, a caller that joins an in-flight download takes that
/// download's result instead of issuing another request.
pub struct DownloadCoordinator {
    pool:    WorkerPool,
    nfc:     Arc<dyn NotFoundCache>,
    pending: PendingMap<Option<Transfer>>,
}

impl DownloadCoordinator {
    pub fn new(pool: WorkerPool, nfc: Arc<dyn NotFoundCache>) -> Self {
        Self {
            pool,
            nfc,
            pending: PendingMap::default(),
        }
    }

    pub fn pending(&self) -> usize { self.pending.len() }

    /// Fetch `transfer`'s resource into the cache.
    ///
    /// `None` means the remote does not have it; such misses are remembered
    /// in the not-found cache and answered without a request until they expire.
    pub async fn download(
        &self,
        transfer: &Transfer,
        timeout: Duration,
        transport: &dyn Transport,
    ) -> Result<Option<Transfer>> {
        let resource = transfer.resource();
        if self.nfc.is_missing(resource) {
            tracing::debug!(resource = %resource, "known missing, skipping download");
            return Ok(None);
        }

        let (tx, rx) = outcome_channel();
        let guard = match self.pending.claim(resource, rx) {
            Claim::Registered(guard) => guard,
            Claim::Busy(prior) => {
                tracing::debug!(resource = %resource, "joining pending download");
                return await_outcome(prior, timeout, resource, "waiting for a pending download").await?;
            }
        };

        let mut job = transport.create_download_job(transfer)?;
        let handle = submit_guarded(&self.pool, guard, tx, async move { job.run().await });

        let joined = tokio::time::timeout(timeout, handle).await;
        let fetched = join_result(joined, timeout, resource, "downloading")?;
        if fetched.is_none() {
            self.nfc.add_missing(resource);
        }
        Ok(fetched)
    }
}
