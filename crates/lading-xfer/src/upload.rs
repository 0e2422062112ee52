use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use lading_core::{NotFoundCache, Resource, Result, TransferError, WorkerPool};
use lading_transport::Transport;

use crate::pending::{PendingMap, claim_in_turn, join_result, outcome_channel, submit_guarded};

/// Serializes uploads per resource and bounds every wait.
///
/// A caller that finds an upload of the same resource in flight waits until
/// no other upload holds the resource, then always runs its own job. At most
/// one publish job per resource runs at a time; callers that queued behind
/// the same job go in whichever order they claim the freed resource.
///
/// The resource stays held until the job ends, also when its caller has
/// given up waiting on it.
pub struct UploadCoordinator {
    pool:    WorkerPool,
    nfc:     Arc<dyn NotFoundCache>,
    pending: PendingMap<bool>,
}

impl UploadCoordinator {
    pub fn new(pool: WorkerPool, nfc: Arc<dyn NotFoundCache>) -> Self {
        Self {
            pool,
            nfc,
            pending: PendingMap::default(),
        }
    }

    /// Uploads currently registered.
    pub fn pending(&self) -> usize { self.pending.len() }

    pub async fn upload(
        &self,
        resource: &Resource,
        body: Bytes,
        content_type: Option<String>,
        timeout: Duration,
        transport: &dyn Transport,
    ) -> Result<bool> {
        if !resource.allows_publishing() {
            return Err(TransferError::Disallowed {
                resource: resource.to_string(),
            });
        }

        let mut job = transport.create_publish_job(resource, body, content_type)?;
        let (tx, rx) = outcome_channel();
        let guard = claim_in_turn(&self.pending, resource, &rx, timeout, "waiting for a prior upload").await?;

        tracing::info!(resource = %resource, "starting upload");
        let handle = submit_guarded(&self.pool, guard, tx, async move { job.run().await });

        let joined = tokio::time::timeout(timeout, handle).await;
        let published = join_result(joined, timeout, resource, "publishing")?;
        if published {
            self.nfc.clear_missing(resource);
        }
        Ok(published)
    }
}
