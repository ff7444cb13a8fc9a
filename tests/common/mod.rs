#![allow(dead_code)]

use async_trait::async_trait;
use mr_open_data::app::ports::{HttpClientPort, HttpGetResult, RequestOptions};
use mr_open_data::common::config::Config;
use mr_open_data::common::error::{Result, ScraperError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

pub const BUDGET_URL: &str = "https://budget.test/level1/";
pub const FOOTBALL_URL: &str = "https://football.test/calendar-results.shtml";
pub const INPC_URL: &str = "https://stats.test/Note-INPC.pdf";

/// Serves canned responses by URL; unknown URLs are transport errors.
#[derive(Default)]
pub struct CannedHttp {
    responses: HashMap<String, HttpGetResult>,
    calls: Mutex<Vec<String>>,
}

impl CannedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(
            url.to_string(),
            HttpGetResult {
                status,
                bytes: body.into(),
            },
        );
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl HttpClientPort for CannedHttp {
    async fn get(&self, url: &str, _options: &RequestOptions) -> Result<HttpGetResult> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| ScraperError::Api {
                message: format!("connection refused: {}", url),
            })
    }
}

/// Config pointing at the test URLs with no retry delay
pub fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.output_dir = output_dir.to_path_buf();
    config.budget.url = BUDGET_URL.to_string();
    config.budget.retry_delay_seconds = 0;
    config.football.url = FOOTBALL_URL.to_string();
    config.inpc.url = INPC_URL.to_string();
    config.http_timeout_seconds = Some(Duration::from_secs(1).as_secs());
    config
}

pub fn football_page() -> String {
    r#"<!DOCTYPE html>
<html><head><title>Mauritanian League 2025-2026</title></head>
<body><div class="results"><p>10/01/2026<br>Kaédi 1 0 Nouakchott King's<br>Kaédi 1 0 Nouakchott King's<br>Nouadhibou Zouérate</p></div></body></html>"#
        .to_string()
}

pub fn budget_payload() -> String {
    serde_json::json!({
        "items": [
            {"noTitle": 1, "title": "Présidence", "total": "1500.255", "used": 700, "available": 800.255, "percent": 46.66},
            {"noTitle": 2, "title": "وزارة المالية", "total": 900, "used": "-", "available": 900, "percent": 0}
        ]
    })
    .to_string()
}

/// Large enough to pass the download size floor; its content is never parsed
pub fn fake_pdf() -> Vec<u8> {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(120_000, b' ');
    bytes
}
