//! Network side of Lading.
//!
//! A [`Transport`] creates jobs for the locations it handles. The HTTP
//! implementation runs every request through [`HttpTransport::execute`], which
//! bounds in-flight requests, picks the location's client (with its TLS and
//! proxy material) and binds the location's credentials to that one request.
//!
//! - [`HttpPublish`] - PUT; 200/201 is success
//! - [`HttpDownload`] - GET into a cache transfer through the checksum pipeline
//! - [`HttpExistence`] - HEAD

mod config;
mod content_type;
mod download;
mod exists;
mod http;
mod job;
mod metadata;
mod publish;
mod response;
mod tls;

pub use config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, HttpConfig};
pub use content_type::detect_content_type;
pub use download::HttpDownload;
pub use exists::HttpExistence;
pub use http::{Exchange, HttpTransport};
pub use job::{DownloadJob, ExistsJob, PublishJob, Transport};
pub use metadata::ExchangeMetadata;
pub use publish::HttpPublish;
pub use response::{interpret_response, status_line};
