use async_trait::async_trait;
use bytes::Bytes;
use lading_cache::Transfer;
use lading_core::{Location, Resource, Result, TransferError};

/// One upload of a fixed-length body.
///
/// `call` reports success as a plain boolean; the failure behind a `false` is
/// kept separately and read through [`error`](PublishJob::error).
#[async_trait]
pub trait PublishJob: Send {
    async fn call(&mut self) -> bool;

    fn error(&self) -> Option<&TransferError>;

    /// `call`, folded into a `Result`.
    async fn run(&mut self) -> Result<bool> {
        let published = self.call().await;
        match self.error() {
            Some(e) => Err(e.clone()),
            None => Ok(published),
        }
    }
}

/// One fetch of remote content into a cache transfer.
#[async_trait]
pub trait DownloadJob: Send {
    /// The populated transfer, or `None` when the remote has no such resource.
    async fn call(&mut self) -> Option<Transfer>;

    fn error(&self) -> Option<&TransferError>;

    async fn run(&mut self) -> Result<Option<Transfer>> {
        let transfer = self.call().await;
        match self.error() {
            Some(e) => Err(e.clone()),
            None => Ok(transfer),
        }
    }
}

/// Remote existence check.
#[async_trait]
pub trait ExistsJob: Send {
    async fn call(&mut self) -> bool;

    fn error(&self) -> Option<&TransferError>;

    async fn run(&mut self) -> Result<bool> {
        let exists = self.call().await;
        match self.error() {
            Some(e) => Err(e.clone()),
            None => Ok(exists),
        }
    }
}

/// Factory of network jobs for the locations it handles.
pub trait Transport: Send + Sync {
    fn handles(&self, location: &Location) -> bool;

    fn create_publish_job(
        &self,
        resource: &Resource,
        body: Bytes,
        content_type: Option<String>,
    ) -> Result<Box<dyn PublishJob>>;

    fn create_download_job(&self, transfer: &Transfer) -> Result<Box<dyn DownloadJob>>;

    fn create_exists_job(&self, resource: &Resource) -> Result<Box<dyn ExistsJob>>;
}
