use std::io::Write;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use lading_cache::{CacheError, CacheResult, ChecksummingWriter, EntryWrite, Transfer};
use lading_core::{Result, TransferError};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use url::Url;

use crate::response::{interpret_response, status_line};
use crate::{DownloadJob, ExchangeMetadata, HttpTransport};

/// Chunks in flight between the network and the blocking cache writer.
const CHUNK_BUFFER: usize = 16;

enum Chunk {
    Data(Bytes),
    End,
}

/// HTTP GET of a resource into its cache transfer.
///
/// The body streams through a [`ChecksummingWriter`] on a blocking thread and
/// is committed only once the whole body arrived. The response headers are
/// stored next to the entry as [`ExchangeMetadata`].
pub struct HttpDownload {
    transport: HttpTransport,
    transfer:  Transfer,
    url:       Url,
    error:     Option<TransferError>,
}

impl HttpDownload {
    pub fn new(transport: HttpTransport, transfer: Transfer) -> Result<Self> {
        let url = transfer.resource().url()?;
        Ok(Self {
            transport,
            transfer,
            url,
            error: None,
        })
    }

    pub fn url(&self) -> &Url { &self.url }

    async fn execute_get(&self) -> Result<Option<Transfer>> {
        tracing::debug!(resource = %self.transfer, url = %self.url, "downloading");

        let exchange = self
            .transport
            .execute(self.transfer.resource().location(), &self.url, |client, url| client.get(url))
            .await?;

        let status = exchange.response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            tracing::debug!(url = %self.url, status = %status, "remote resource missing");
            return Ok(None);
        }
        if !status.is_success() {
            tracing::warn!(status = %status_line(&exchange.response), url = %self.url, "download rejected");
            return Err(interpret_response(&self.url, exchange.response).await);
        }

        let metadata = ExchangeMetadata::from_response(&exchange.response);
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let (factories, config) = self.transport.checksums();
        let (factories, config) = (factories.to_vec(), config.clone());
        let transfer = self.transfer.clone();

        let writer = tokio::task::spawn_blocking(move || -> CacheResult<bool> {
            let mut writer = ChecksummingWriter::open(&transfer, &factories, &config)?;
            if !drain(rx, &mut writer, &transfer)? {
                return Ok(false);
            }
            Box::new(writer).commit()?;

            let json = metadata
                .to_json()
                .map_err(|e| CacheError::io(transfer.metadata().path(), std::io::Error::other(e)))?;
            transfer.metadata().write_all(&json)?;
            Ok(true)
        });

        let streamed = self.stream_body(exchange.response, &tx).await;
        if streamed.is_ok() {
            // a closed channel means the writer already failed; its error wins
            let _ = tx.send(Chunk::End).await;
        }
        drop(tx);

        let written = writer.await.map_err(|e| TransferError::Interrupted {
            resource:  self.transfer.to_string(),
            operation: "writing download to cache",
            reason:    e.to_string(),
        })?;
        streamed?;

        match written {
            Ok(true) => Ok(Some(self.transfer.clone())),
            Ok(false) => Err(TransferError::upstream(self.url.as_str(), "response body ended early")),
            Err(e) => Err(e.into()),
        }
    }

    async fn stream_body(&self, response: reqwest::Response, tx: &mpsc::Sender<Chunk>) -> Result<()> {
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| TransferError::upstream_with_source(self.url.as_str(), e))?;
            if tx.send(Chunk::Data(chunk)).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Write received chunks; `false` when the sender went away before `End`.
fn drain(mut rx: mpsc::Receiver<Chunk>, writer: &mut ChecksummingWriter, transfer: &Transfer) -> CacheResult<bool> {
    while let Some(chunk) = rx.blocking_recv() {
        match chunk {
            Chunk::Data(bytes) => writer
                .write_all(&bytes)
                .map_err(|e| CacheError::io(transfer.path(), e))?,
            Chunk::End => return Ok(true),
        }
    }
    Ok(false)
}

#[async_trait]
impl DownloadJob for HttpDownload {
    async fn call(&mut self) -> Option<Transfer> {
        self.error = None;
        match self.execute_get().await {
            Ok(transfer) => transfer,
            Err(e) => {
                self.error = Some(e);
                None
            }
        }
    }

    fn error(&self) -> Option<&TransferError> { self.error.as_ref() }
}
