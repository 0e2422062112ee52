use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lading_core::{Resource, Result, TransferError, WorkerPool};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Outcome slot of one job; `None` until the job finishes.
pub(crate) type OutcomeReceiver<T> = watch::Receiver<Option<Result<T>>>;
pub(crate) type OutcomeSender<T> = watch::Sender<Option<Result<T>>>;

struct Pending<T> {
    id: u64,
    rx: OutcomeReceiver<T>,
}

/// In-flight jobs keyed by resource; at most one entry per resource.
pub(crate) struct PendingMap<T> {
    entries: Arc<DashMap<Resource, Pending<T>>>,
    next_id: AtomicU64,
}

pub(crate) enum Claim<T> {
    /// The caller's entry is registered.
    Registered(PendingGuard<T>),
    /// Another job holds the resource.
    Busy(OutcomeReceiver<T>),
}

/// Removes its own entry, and only its own, when dropped.
///
/// Owned, so it can travel into the job and release the resource the moment
/// the job ends rather than when its caller stops waiting.
pub(crate) struct PendingGuard<T> {
    entries:  Arc<DashMap<Resource, Pending<T>>>,
    resource: Resource,
    id:       u64,
}

impl<T> Drop for PendingGuard<T> {
    fn drop(&mut self) {
        let removed = self.entries.remove_if(&self.resource, |_, p| p.id == self.id);
        if removed.is_some() {
            tracing::trace!(resource = %self.resource, "pending entry removed");
        }
    }
}

impl<T> Default for PendingMap<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> PendingMap<T> {
    pub fn len(&self) -> usize { self.entries.len() }

    /// Register `rx` unless another job already holds `resource`.
    pub fn claim(&self, resource: &Resource, rx: OutcomeReceiver<T>) -> Claim<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.entries.entry(resource.clone()) {
            Entry::Occupied(busy) => Claim::Busy(busy.get().rx.clone()),
            Entry::Vacant(slot) => {
                slot.insert(Pending { id, rx });
                Claim::Registered(PendingGuard {
                    entries: Arc::clone(&self.entries),
                    resource: resource.clone(),
                    id,
                })
            }
        }
    }
}

/// Claim `resource`, waiting out every job that holds it first.
///
/// Each wait is bounded by what is left of `timeout`. The outcome of a job
/// waited on is only logged.
pub(crate) async fn claim_in_turn<T: Clone>(
    map: &PendingMap<T>,
    resource: &Resource,
    rx: &OutcomeReceiver<T>,
    timeout: Duration,
    operation: &'static str,
) -> Result<PendingGuard<T>> {
    let deadline = Instant::now() + timeout;
    loop {
        match map.claim(resource, rx.clone()) {
            Claim::Registered(guard) => return Ok(guard),
            Claim::Busy(prior) => {
                tracing::debug!(resource = %resource, operation, "joining pending job");
                let remaining = deadline.saturating_duration_since(Instant::now());
                match await_outcome(prior, remaining, resource, operation).await? {
                    Ok(_) => tracing::debug!(resource = %resource, "prior job finished"),
                    Err(e) => tracing::debug!(resource = %resource, error = %e, "prior job failed"),
                }
            }
        }
    }
}

/// Spawn `job` on the pool holding `guard`; the entry is released before the
/// outcome is published, so woken waiters find the resource free.
pub(crate) fn submit_guarded<T, F>(
    pool: &WorkerPool,
    guard: PendingGuard<T>,
    tx: OutcomeSender<T>,
    job: F,
) -> JoinHandle<Result<T>>
where
    T: Clone + Send + Sync + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    pool.submit(async move {
        let outcome = job.await;
        drop(guard);
        tx.send_replace(Some(outcome.clone()));
        outcome
    })
}

/// Wait up to `timeout` for a job's outcome.
///
/// The outer `Result` reports the wait itself; the inner one is the job's.
pub(crate) async fn await_outcome<T: Clone>(
    mut rx: OutcomeReceiver<T>,
    timeout: Duration,
    resource: &Resource,
    operation: &'static str,
) -> Result<Result<T>> {
    let waited = tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await;
    match waited {
        Err(_) => Err(TransferError::Timeout {
            resource: resource.to_string(),
            operation,
            timeout,
        }),
        Ok(Err(_)) => Err(TransferError::Interrupted {
            resource: resource.to_string(),
            operation,
            reason: "job ended without an outcome".to_string(),
        }),
        Ok(Ok(outcome)) => Ok((*outcome).clone().unwrap_or_else(|| {
            Err(TransferError::Interrupted {
                resource: resource.to_string(),
                operation,
                reason: "job ended without an outcome".to_string(),
            })
        })),
    }
}

/// Map a finished (or abandoned) job task onto the caller's result.
pub(crate) fn join_result<T>(
    joined: std::result::Result<std::result::Result<Result<T>, tokio::task::JoinError>, tokio::time::error::Elapsed>,
    timeout: Duration,
    resource: &Resource,
    operation: &'static str,
) -> Result<T> {
    match joined {
        Err(_) => Err(TransferError::Timeout {
            resource: resource.to_string(),
            operation,
            timeout,
        }),
        Ok(Err(e)) if e.is_panic() => Err(TransferError::upstream(
            resource.to_string(),
            format!("job panicked while {operation}"),
        )),
        Ok(Err(e)) => Err(TransferError::Interrupted {
            resource: resource.to_string(),
            operation,
            reason: e.to_string(),
        }),
        Ok(Ok(outcome)) => outcome,
    }
}

pub(crate) fn outcome_channel<T>() -> (OutcomeSender<T>, OutcomeReceiver<T>) { watch::channel(None) }

#[cfg(test)]
mod tests {
    use super::*;
    use lading_core::{ErrorKind, Location};

    fn resource() -> Resource { Resource::new(Arc::new(Location::new("http://foo.com").unwrap()), "a.jar") }

    #[test]
    fn test_claim_then_busy() {
        let map = PendingMap::<bool>::default();
        let res = resource();
        let (_tx, rx) = outcome_channel();

        let first = map.claim(&res, rx.clone());
        assert!(matches!(first, Claim::Registered(_)));
        assert!(matches!(map.claim(&res, rx), Claim::Busy(_)));
        assert_eq!(map.len(), 1);

        drop(first);
        assert_eq!(map.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_claim_in_turn_waits_for_holder() {
        let pool = WorkerPool::try_current(2).unwrap();
        let map = PendingMap::<bool>::default();
        let res = resource();

        let (tx, rx) = outcome_channel();
        let Claim::Registered(guard) = map.claim(&res, rx) else {
            panic!("resource should be free");
        };
        let holder = submit_guarded(&pool, guard, tx, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(true)
        });

        let (_tx, rx) = outcome_channel();
        let next = claim_in_turn(&map, &res, &rx, Duration::from_secs(1), "testing").await.unwrap();
        assert_eq!(map.len(), 1);
        assert!(holder.await.unwrap().unwrap());

        drop(next);
        assert_eq!(map.len(), 0);
    }

    #[tokio::test]
    async fn test_claim_in_turn_times_out() {
        let map = PendingMap::<bool>::default();
        let res = resource();
        let (_held_tx, held_rx) = outcome_channel();
        let _held = map.claim(&res, held_rx);

        let (_tx, rx) = outcome_channel();
        let err = claim_in_turn(&map, &res, &rx, Duration::from_millis(20), "testing")
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(map.len(), 1);
    }

    #[tokio::test]
    async fn test_await_outcome_variants() {
        let res = resource();

        let (tx, rx) = outcome_channel::<bool>();
        tx.send_replace(Some(Ok(true)));
        drop(tx);
        assert!(await_outcome(rx, Duration::from_secs(1), &res, "testing").await.unwrap().unwrap());

        let (tx, rx) = outcome_channel::<bool>();
        drop(tx);
        let err = await_outcome(rx, Duration::from_secs(1), &res, "testing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);

        let (_tx, rx) = outcome_channel::<bool>();
        let err = await_outcome(rx, Duration::from_millis(20), &res, "testing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
