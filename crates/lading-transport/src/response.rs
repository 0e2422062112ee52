use lading_core::TransferError;
use reqwest::Response;
use url::Url;

const BODY_EXCERPT: usize = 256;

/// "HTTP/1.1 404 Not Found"
pub fn status_line(response: &Response) -> String { format!("{:?} {}", response.version(), response.status()) }

/// Turn an unexpected response into an upstream failure carrying its status.
///
/// The start of the body is kept in the reason; servers often explain
/// rejected uploads there.
pub async fn interpret_response(url: &Url, response: Response) -> TransferError {
    let line = status_line(&response);
    let status = response.status().as_u16();

    let excerpt = match response.text().await {
        Ok(body) => body.trim().chars().take(BODY_EXCERPT).collect::<String>(),
        Err(_) => String::new(),
    };

    let reason = if excerpt.is_empty() {
        format!("HTTP request failed: {line}")
    } else {
        format!("HTTP request failed: {line}: {excerpt}")
    };

    TransferError::Upstream {
        target: url.to_string(),
        reason,
        status: Some(status),
        source: None,
    }
}
