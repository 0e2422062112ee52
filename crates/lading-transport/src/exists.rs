use async_trait::async_trait;
use lading_core::{Resource, Result, TransferError};
use reqwest::StatusCode;
use url::Url;

use crate::response::interpret_response;
use crate::{ExistsJob, HttpTransport};

/// HTTP HEAD check for a resource.
pub struct HttpExistence {
    transport: HttpTransport,
    resource:  Resource,
    url:       Url,
    error:     Option<TransferError>,
}

impl HttpExistence {
    pub fn new(transport: HttpTransport, resource: Resource) -> Result<Self> {
        let url = resource.url()?;
        Ok(Self {
            transport,
            resource,
            url,
            error: None,
        })
    }

    async fn execute_head(&self) -> Result<bool> {
        let exchange = self
            .transport
            .execute(self.resource.location(), &self.url, |client, url| client.head(url))
            .await?;

        let status = exchange.response.status();
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(false),
            _ => Err(interpret_response(&self.url, exchange.response).await),
        }
    }
}

#[async_trait]
impl ExistsJob for HttpExistence {
    async fn call(&mut self) -> bool {
        self.error = None;
        match self.execute_head().await {
            Ok(exists) => exists,
            Err(e) => {
                self.error = Some(e);
                false
            }
        }
    }

    fn error(&self) -> Option<&TransferError> { self.error.as_ref() }
}
