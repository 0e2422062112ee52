use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lading_cache::{FileCacheProvider, Transfer};
use lading_core::{
    ErrorKind, Location, MemoryNotFoundCache, NotFoundCache, Resource, Result, TransferError, WorkerPool,
};
use lading_transport::{DownloadJob, ExistsJob, PublishJob, Transport};
use lading_xfer::{DownloadCoordinator, UploadCoordinator};
use tempfile::tempdir;

#[derive(Default)]
struct Counters {
    started: AtomicUsize,
    running: AtomicUsize,
    peak:    AtomicUsize,
}

impl Counters {
    fn enter(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) { self.running.fetch_sub(1, Ordering::SeqCst); }

    fn started(&self) -> usize { self.started.load(Ordering::SeqCst) }

    fn peak(&self) -> usize { self.peak.load(Ordering::SeqCst) }
}

/// Transport whose jobs sleep for `delay` and then succeed, fail or miss.
struct MockTransport {
    counters: Arc<Counters>,
    delay:    Duration,
    fail:     bool,
    missing:  bool,
}

impl MockTransport {
    fn new(delay: Duration) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            delay,
            fail: false,
            missing: false,
        }
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn missing(mut self) -> Self {
        self.missing = true;
        self
    }
}

struct MockJob {
    counters: Arc<Counters>,
    delay:    Duration,
    target:   String,
    fail:     bool,
    error:    Option<TransferError>,
}

impl MockJob {
    async fn work(&mut self) -> bool {
        self.counters.enter();
        tokio::time::sleep(self.delay).await;
        self.counters.leave();
        if self.fail {
            self.error = Some(TransferError::upstream(&self.target, "HTTP/1.1 500 Internal Server Error"));
            return false;
        }
        true
    }
}

#[async_trait]
impl PublishJob for MockJob {
    async fn call(&mut self) -> bool { self.work().await }

    fn error(&self) -> Option<&TransferError> { self.error.as_ref() }
}

struct MockDownload {
    job:      MockJob,
    transfer: Transfer,
    missing:  bool,
}

#[async_trait]
impl DownloadJob for MockDownload {
    async fn call(&mut self) -> Option<Transfer> {
        if !self.job.work().await || self.missing {
            return None;
        }
        Some(self.transfer.clone())
    }

    fn error(&self) -> Option<&TransferError> { self.job.error.as_ref() }
}

#[async_trait]
impl ExistsJob for MockJob {
    async fn call(&mut self) -> bool { self.work().await }

    fn error(&self) -> Option<&TransferError> { self.error.as_ref() }
}

impl Transport for MockTransport {
    fn handles(&self, _location: &Location) -> bool { true }

    fn create_publish_job(
        &self,
        resource: &Resource,
        _body: Bytes,
        _content_type: Option<String>,
    ) -> Result<Box<dyn PublishJob>> {
        Ok(Box::new(self.job(resource)))
    }

    fn create_download_job(&self, transfer: &Transfer) -> Result<Box<dyn DownloadJob>> {
        Ok(Box::new(MockDownload {
            job:      self.job(transfer.resource()),
            transfer: transfer.clone(),
            missing:  self.missing,
        }))
    }

    fn create_exists_job(&self, resource: &Resource) -> Result<Box<dyn ExistsJob>> { Ok(Box::new(self.job(resource))) }
}

impl MockTransport {
    fn job(&self, resource: &Resource) -> MockJob {
        MockJob {
            counters: Arc::clone(&self.counters),
            delay:    self.delay,
            target:   resource.to_string(),
            fail:     self.fail,
            error:    None,
        }
    }
}

fn publishable(path: &str) -> Resource {
    let location = Location::builder("http://foo.com/repo").allow_publishing(true).build().unwrap();
    Resource::new(Arc::new(location), path)
}

fn pool() -> WorkerPool { WorkerPool::try_current(4).unwrap() }

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_run_one_after_another() {
    let nfc = Arc::new(MemoryNotFoundCache::new());
    let coordinator = Arc::new(UploadCoordinator::new(pool(), nfc));
    let transport = Arc::new(MockTransport::new(Duration::from_millis(150)));
    let resource = publishable("org/foo/foo-1.0.jar");

    let uploads: Vec<_> = (0..2)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let transport = Arc::clone(&transport);
            let resource = resource.clone();
            tokio::spawn(async move {
                coordinator
                    .upload(&resource, Bytes::from_static(b"jar"), None, Duration::from_secs(5), &*transport)
                    .await
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(coordinator.pending() <= 1);

    for upload in uploads {
        assert!(upload.await.unwrap().unwrap());
    }

    // the joiner still runs its own job after the first one lands
    assert_eq!(transport.counters.started(), 2);
    assert_eq!(transport.counters.peak(), 1);
    assert_eq!(coordinator.pending(), 0);
}

#[tokio::test]
async fn disallowed_upload_issues_no_job() {
    let coordinator = UploadCoordinator::new(pool(), Arc::new(MemoryNotFoundCache::new()));
    let transport = MockTransport::new(Duration::ZERO);
    let resource = Resource::new(Arc::new(Location::new("http://foo.com/repo").unwrap()), "a.jar");

    let err = coordinator
        .upload(&resource, Bytes::new(), None, Duration::from_secs(1), &transport)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Disallowed);
    assert_eq!(transport.counters.started(), 0);
    assert_eq!(coordinator.pending(), 0);
}

#[tokio::test]
async fn successful_upload_clears_missing_mark() {
    let nfc = Arc::new(MemoryNotFoundCache::new());
    let coordinator = UploadCoordinator::new(pool(), Arc::clone(&nfc) as Arc<dyn NotFoundCache>);
    let resource = publishable("a.pom");
    nfc.add_missing(&resource);

    let published = coordinator
        .upload(&resource, Bytes::from_static(b"<pom/>"), None, Duration::from_secs(1), &MockTransport::new(Duration::ZERO))
        .await
        .unwrap();

    assert!(published);
    assert!(!nfc.is_missing(&resource));
}

#[tokio::test]
async fn failed_upload_keeps_missing_mark() {
    let nfc = Arc::new(MemoryNotFoundCache::new());
    let coordinator = UploadCoordinator::new(pool(), Arc::clone(&nfc) as Arc<dyn NotFoundCache>);
    let resource = publishable("a.pom");
    nfc.add_missing(&resource);

    let err = coordinator
        .upload(&resource, Bytes::new(), None, Duration::from_secs(1), &MockTransport::new(Duration::ZERO).failing())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
    assert!(nfc.is_missing(&resource));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_upload_times_out_and_releases_entry() {
    let coordinator = UploadCoordinator::new(pool(), Arc::new(MemoryNotFoundCache::new()));
    let transport = MockTransport::new(Duration::from_millis(500));

    let err = coordinator
        .upload(&publishable("slow.jar"), Bytes::new(), None, Duration::from_millis(50), &transport)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);

    // the abandoned job keeps the resource until it ends
    assert_eq!(coordinator.pending(), 1);
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(coordinator.pending(), 0);
    assert_eq!(transport.counters.started(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_colliding_uploads_never_overlap() {
    let coordinator = Arc::new(UploadCoordinator::new(pool(), Arc::new(MemoryNotFoundCache::new())));
    let transport = Arc::new(MockTransport::new(Duration::from_millis(100)));
    let resource = publishable("org/foo/maven-metadata.xml");

    let mut uploads = Vec::new();
    for _ in 0..4 {
        let coordinator = Arc::clone(&coordinator);
        let transport = Arc::clone(&transport);
        let resource = resource.clone();
        uploads.push(tokio::spawn(async move {
            coordinator
                .upload(&resource, Bytes::from_static(b"<metadata/>"), None, Duration::from_secs(5), &*transport)
                .await
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    for upload in uploads {
        assert!(upload.await.unwrap().unwrap());
    }
    assert_eq!(transport.counters.started(), 4);
    assert_eq!(transport.counters.peak(), 1);
    assert_eq!(coordinator.pending(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn joiner_times_out_without_running_its_job() {
    let coordinator = Arc::new(UploadCoordinator::new(pool(), Arc::new(MemoryNotFoundCache::new())));
    let transport = Arc::new(MockTransport::new(Duration::from_millis(400)));
    let resource = publishable("busy.jar");

    let first = {
        let coordinator = Arc::clone(&coordinator);
        let transport = Arc::clone(&transport);
        let resource = resource.clone();
        tokio::spawn(async move {
            coordinator
                .upload(&resource, Bytes::new(), None, Duration::from_secs(5), &*transport)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = coordinator
        .upload(&resource, Bytes::new(), None, Duration::from_millis(50), &*transport)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(transport.counters.started(), 1);

    assert!(first.await.unwrap().unwrap());
    assert_eq!(transport.counters.started(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_downloads_share_one_job() {
    let dir = tempdir().unwrap();
    let coordinator = Arc::new(DownloadCoordinator::new(pool(), Arc::new(MemoryNotFoundCache::new())));
    let transport = Arc::new(MockTransport::new(Duration::from_millis(150)));
    let transfer = Transfer::new(publishable("a.jar"), Arc::new(FileCacheProvider::new(dir.path())));

    let downloads: Vec<_> = (0..3)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let transport = Arc::clone(&transport);
            let transfer = transfer.clone();
            tokio::spawn(async move { coordinator.download(&transfer, Duration::from_secs(5), &*transport).await })
        })
        .collect();

    for download in downloads {
        let fetched = download.await.unwrap().unwrap().unwrap();
        assert_eq!(fetched.resource(), transfer.resource());
    }
    assert_eq!(transport.counters.started(), 1);
    assert_eq!(coordinator.pending(), 0);
}

#[tokio::test]
async fn missing_download_is_remembered() {
    let dir = tempdir().unwrap();
    let nfc = Arc::new(MemoryNotFoundCache::new());
    let coordinator = DownloadCoordinator::new(pool(), Arc::clone(&nfc) as Arc<dyn NotFoundCache>);
    let transport = MockTransport::new(Duration::ZERO).missing();
    let transfer = Transfer::new(publishable("gone.jar"), Arc::new(FileCacheProvider::new(dir.path())));

    assert!(coordinator.download(&transfer, Duration::from_secs(1), &transport).await.unwrap().is_none());
    assert!(nfc.is_missing(transfer.resource()));

    assert!(coordinator.download(&transfer, Duration::from_secs(1), &transport).await.unwrap().is_none());
    assert_eq!(transport.counters.started(), 1);
}

#[tokio::test]
async fn failed_download_is_not_remembered() {
    let dir = tempdir().unwrap();
    let nfc = Arc::new(MemoryNotFoundCache::new());
    let coordinator = DownloadCoordinator::new(pool(), Arc::clone(&nfc) as Arc<dyn NotFoundCache>);
    let transfer = Transfer::new(publishable("bad.jar"), Arc::new(FileCacheProvider::new(dir.path())));

    let err = coordinator
        .download(&transfer, Duration::from_secs(1), &MockTransport::new(Duration::ZERO).failing())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
    assert!(!nfc.is_missing(transfer.resource()));
}
