use crate::common::error::Result;
use async_trait::async_trait;
use std::time::Duration;

// Ingest-side ports
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Issue a GET. Transport failures are errors; non-2xx responses are
    /// returned as-is for the caller to judge.
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept: Option<String>,
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
