use crate::app::ports::{HttpClientPort, HttpGetResult, RequestOptions};
use crate::common::error::Result;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new() -> Result<Self> {
        // reqwest handles gzip/deflate decompression with the matching features enabled
        let client = reqwest::Client::builder().gzip(true).deflate(true).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpGetResult> {
        tracing::debug!("HTTP GET request to: {}", url);
        let mut request = self
            .client
            .get(url)
            .timeout(options.timeout)
            .header(USER_AGENT, options.user_agent.as_str());
        if let Some(accept) = &options.accept {
            request = request.header(ACCEPT, accept.as_str());
        }

        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?.to_vec();
        tracing::debug!("HTTP response: status={}, size={} bytes", status, bytes.len());

        Ok(HttpGetResult { status, bytes })
    }
}
