use async_trait::async_trait;
use bytes::Bytes;
use lading_core::{Resource, Result, TransferError};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::response::{interpret_response, status_line};
use crate::{HttpTransport, PublishJob, detect_content_type};

/// HTTP PUT of a fixed-length body.
pub struct HttpPublish {
    transport:    HttpTransport,
    resource:     Resource,
    url:          Url,
    body:         Bytes,
    content_type: String,
    error:        Option<TransferError>,
}

impl HttpPublish {
    /// Without an explicit content type one is detected from the path.
    pub fn new(
        transport: HttpTransport,
        resource: Resource,
        body: Bytes,
        content_type: Option<String>,
    ) -> Result<Self> {
        let url = resource.url()?;
        let content_type = content_type.unwrap_or_else(|| detect_content_type(resource.path()).to_string());
        Ok(Self {
            transport,
            resource,
            url,
            body,
            content_type,
            error: None,
        })
    }

    pub fn url(&self) -> &Url { &self.url }

    pub fn content_type(&self) -> &str { &self.content_type }

    async fn execute_put(&self) -> Result<()> {
        tracing::info!(resource = %self.resource, url = %self.url, length = self.body.len(), "publishing");

        let body = self.body.clone();
        let content_type = self.content_type.clone();
        let exchange = self
            .transport
            .execute(self.resource.location(), &self.url, |client, url| {
                client.put(url).header(CONTENT_TYPE, content_type).body(body)
            })
            .await?;

        let status = exchange.response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(());
        }

        tracing::warn!(status = %status_line(&exchange.response), url = %self.url, "publish rejected");
        Err(interpret_response(&self.url, exchange.response).await)
    }
}

#[async_trait]
impl PublishJob for HttpPublish {
    async fn call(&mut self) -> bool {
        self.error = None;
        match self.execute_put().await {
            Ok(()) => true,
            Err(e) => {
                self.error = Some(e);
                false
            }
        }
    }

    fn error(&self) -> Option<&TransferError> { self.error.as_ref() }
}
