use std::time::Duration;

pub const DEFAULT_MAX_CONNECTIONS: usize = 20;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// In-flight requests across all locations; also the idle pool size per host.
    pub max_connections: usize,
    /// Pooled connections idle longer than this are closed.
    pub idle_timeout:    Duration,
    pub connect_timeout: Duration,
    pub user_agent:      String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout:    DEFAULT_IDLE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent:      format!("lading/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
