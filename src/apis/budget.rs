use crate::app::ports::{HttpClientPort, RequestOptions};
use crate::common::coerce::{number_from_json, round2, text_from_json, format_number};
use crate::common::config::Config;
use crate::common::constants::{BUDGET_OUTPUT_FILE, BUDGET_SOURCE};
use crate::common::error::{Result, ScraperError};
use crate::common::types::{scrape_timestamp, DataSource, TabularOutput};
use crate::observability::{metrics, Reporter};
use crate::storage::{write_csv, Encoding};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Top-level key every accepted payload must carry.
const ITEMS_KEY: &str = "items";

/// Known item fields, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetField {
    MinistryId,
    MinistryLabel,
    InitialAmount,
    SpentAmount,
    AvailableAmount,
    ExecutionRate,
}

impl BudgetField {
    pub const ALL: [BudgetField; 6] = [
        BudgetField::MinistryId,
        BudgetField::MinistryLabel,
        BudgetField::InitialAmount,
        BudgetField::SpentAmount,
        BudgetField::AvailableAmount,
        BudgetField::ExecutionRate,
    ];

    /// Key of the field in the source payload
    pub fn source_key(self) -> &'static str {
        match self {
            BudgetField::MinistryId => "noTitle",
            BudgetField::MinistryLabel => "title",
            BudgetField::InitialAmount => "total",
            BudgetField::SpentAmount => "used",
            BudgetField::AvailableAmount => "available",
            BudgetField::ExecutionRate => "percent",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            BudgetField::MinistryId => "ministry_id",
            BudgetField::MinistryLabel => "ministry_label",
            BudgetField::InitialAmount => "initial_amount",
            BudgetField::SpentAmount => "spent_amount",
            BudgetField::AvailableAmount => "available_amount",
            BudgetField::ExecutionRate => "execution_rate",
        }
    }
}

/// One ministry budget line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BudgetRecord {
    pub ministry_id: Option<String>,
    pub ministry_label: Option<String>,
    pub initial_amount: Option<f64>,
    pub spent_amount: Option<f64>,
    pub available_amount: Option<f64>,
    pub execution_rate: Option<f64>,
    pub scraped_at: String,
    pub source_url: String,
}

impl BudgetRecord {
    fn cell(&self, field: BudgetField) -> String {
        match field {
            BudgetField::MinistryId => self.ministry_id.clone().unwrap_or_default(),
            BudgetField::MinistryLabel => self.ministry_label.clone().unwrap_or_default(),
            BudgetField::InitialAmount => format_number(self.initial_amount),
            BudgetField::SpentAmount => format_number(self.spent_amount),
            BudgetField::AvailableAmount => format_number(self.available_amount),
            BudgetField::ExecutionRate => format_number(self.execution_rate),
        }
    }
}

/// Normalized batch. `columns` lists the known fields present in the
/// payload; absent fields are left out of the output entirely.
#[derive(Debug, Clone, Default)]
pub struct BudgetTable {
    pub columns: Vec<BudgetField>,
    pub records: Vec<BudgetRecord>,
}

impl BudgetTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TabularOutput for BudgetTable {
    fn header(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.column().to_string())
            .chain(["scraped_at".to_string(), "source_url".to_string()])
            .collect()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|r| {
                self.columns
                    .iter()
                    .map(|c| r.cell(*c))
                    .chain([r.scraped_at.clone(), r.source_url.clone()])
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct BudgetSettings {
    pub url: String,
    pub request: RequestOptions,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl BudgetSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.budget.url.clone(),
            request: RequestOptions {
                timeout: config.budget_timeout(),
                user_agent: config.user_agent.clone(),
                accept: None,
            },
            max_retries: config.budget.max_retries,
            retry_delay: Duration::from_secs(config.budget.retry_delay_seconds),
        }
    }
}

/// Budget execution figures from the treasury JSON endpoint.
pub struct BudgetExtractor {
    http: Arc<dyn HttpClientPort>,
    reporter: Arc<dyn Reporter>,
    settings: BudgetSettings,
}

impl BudgetExtractor {
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        reporter: Arc<dyn Reporter>,
        settings: BudgetSettings,
    ) -> Self {
        Self {
            http,
            reporter,
            settings,
        }
    }

    async fn fetch_once(&self) -> Result<Value> {
        metrics::sources::request_attempt(BUDGET_SOURCE);
        let resp = self.http.get(&self.settings.url, &self.settings.request).await?;
        if !resp.is_success() {
            return Err(ScraperError::Api {
                message: format!("HTTP status {}", resp.status),
            });
        }
        metrics::sources::payload_bytes(BUDGET_SOURCE, resp.bytes.len());
        Ok(serde_json::from_slice(&resp.bytes)?)
    }

    /// Fetch the payload, retrying transport errors, non-2xx statuses and
    /// undecodable bodies. At least one attempt is always made. A decoded
    /// payload without `items` is rejected without further attempts.
    #[instrument(skip(self), fields(url = %self.settings.url))]
    pub async fn fetch(&self) -> Option<Value> {
        let attempts = self.settings.max_retries.max(1);
        for attempt in 1..=attempts {
            self.reporter.info(
                BUDGET_SOURCE,
                &format!(
                    "Attempt {}/{} to fetch JSON from {}",
                    attempt, attempts, self.settings.url
                ),
            );
            match self.fetch_once().await {
                Ok(data) => {
                    if data.get(ITEMS_KEY).is_none() {
                        self.reporter
                            .error(BUDGET_SOURCE, "Key 'items' missing from JSON payload");
                        return None;
                    }
                    return Some(data);
                }
                Err(e) => {
                    metrics::sources::request_error(BUDGET_SOURCE);
                    self.reporter
                        .warn(BUDGET_SOURCE, &format!("Attempt {} failed: {}", attempt, e));
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }
        None
    }

    /// Map payload items to canonical records stamped with `scraped_at`.
    pub fn normalize(&self, raw: &Value, scraped_at: &str) -> BudgetTable {
        let items = match raw.get(ITEMS_KEY).and_then(Value::as_array) {
            Some(items) if !items.is_empty() => items,
            _ => {
                self.reporter.error(BUDGET_SOURCE, "No items found in JSON payload");
                return BudgetTable::default();
            }
        };

        let objects: Vec<&serde_json::Map<String, Value>> =
            items.iter().filter_map(Value::as_object).collect();
        if objects.len() < items.len() {
            self.reporter.warn(
                BUDGET_SOURCE,
                &format!("Skipped {} non-object items", items.len() - objects.len()),
            );
        }

        let columns: Vec<BudgetField> = BudgetField::ALL
            .into_iter()
            .filter(|f| objects.iter().any(|o| o.contains_key(f.source_key())))
            .collect();

        let numeric = |item: &serde_json::Map<String, Value>, field: BudgetField| {
            item.get(field.source_key())
                .and_then(number_from_json)
                .and_then(round2)
        };

        let records = objects
            .iter()
            .map(|&item| BudgetRecord {
                ministry_id: item
                    .get(BudgetField::MinistryId.source_key())
                    .and_then(text_from_json),
                ministry_label: item
                    .get(BudgetField::MinistryLabel.source_key())
                    .and_then(text_from_json),
                initial_amount: numeric(item, BudgetField::InitialAmount),
                spent_amount: numeric(item, BudgetField::SpentAmount),
                available_amount: numeric(item, BudgetField::AvailableAmount),
                execution_rate: numeric(item, BudgetField::ExecutionRate),
                scraped_at: scraped_at.to_string(),
                source_url: self.settings.url.clone(),
            })
            .collect();

        BudgetTable { columns, records }
    }

    /// Write the table as BOM-prefixed CSV
    pub fn persist(&self, table: &BudgetTable, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(BUDGET_OUTPUT_FILE);
        write_csv(&path, table, Encoding::Utf8Bom)?;
        Ok(path)
    }
}

#[async_trait::async_trait]
impl DataSource for BudgetExtractor {
    fn source_name(&self) -> &'static str {
        BUDGET_SOURCE
    }

    fn output_file(&self) -> &'static str {
        BUDGET_OUTPUT_FILE
    }

    async fn run(&self, output_dir: &Path) -> Result<()> {
        let Some(raw) = self.fetch().await else {
            self.reporter
                .error(BUDGET_SOURCE, "Failed to retrieve budget JSON");
            return Ok(());
        };

        let table = self.normalize(&raw, &scrape_timestamp());
        if table.is_empty() {
            self.reporter
                .error(BUDGET_SOURCE, "Budget table is empty after normalization");
            return Ok(());
        }

        match self.persist(&table, output_dir) {
            Ok(path) => self.reporter.info(
                BUDGET_SOURCE,
                &format!("Saved {} ({} rows)", path.display(), table.len()),
            ),
            Err(e) => self
                .reporter
                .error(BUDGET_SOURCE, &format!("Failed to write budget CSV: {}", e)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::observability::MemoryReporter;
    use serde_json::json;
    use std::sync::Mutex;
    use tracing::Level;

    /// Replays canned responses in order; `None` simulates a transport error.
    struct ScriptedHttp {
        responses: Mutex<Vec<Option<HttpGetResult>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedHttp {
        fn new(mut responses: Vec<Option<HttpGetResult>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl HttpClientPort for ScriptedHttp {
        async fn get(&self, _url: &str, _options: &RequestOptions) -> Result<HttpGetResult> {
            *self.calls.lock().unwrap() += 1;
            match self.responses.lock().unwrap().pop().flatten() {
                Some(resp) => Ok(resp),
                None => Err(ScraperError::Api {
                    message: "connection reset".into(),
                }),
            }
        }
    }

    fn ok_json(value: Value) -> Option<HttpGetResult> {
        Some(HttpGetResult {
            status: 200,
            bytes: serde_json::to_vec(&value).unwrap(),
        })
    }

    fn status(code: u16) -> Option<HttpGetResult> {
        Some(HttpGetResult {
            status: code,
            bytes: b"oops".to_vec(),
        })
    }

    fn settings() -> BudgetSettings {
        BudgetSettings {
            url: "https://budget.test/level1/".into(),
            request: RequestOptions {
                timeout: Duration::from_secs(1),
                user_agent: "test".into(),
                accept: None,
            },
            max_retries: 3,
            retry_delay: Duration::ZERO,
        }
    }

    fn extractor(http: Arc<ScriptedHttp>, reporter: Arc<MemoryReporter>) -> BudgetExtractor {
        BudgetExtractor::new(http, reporter, settings())
    }

    #[tokio::test]
    async fn test_fetch_retries_then_succeeds() {
        let http = Arc::new(ScriptedHttp::new(vec![
            None,
            status(503),
            ok_json(json!({"items": []})),
        ]));
        let reporter = Arc::new(MemoryReporter::new());
        let result = extractor(http.clone(), reporter.clone()).fetch().await;

        assert!(result.is_some());
        assert_eq!(http.calls(), 3);
        assert!(reporter.contains(Level::WARN, "Attempt 2 failed"));
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_retries() {
        let http = Arc::new(ScriptedHttp::new(vec![status(500), status(500), status(500), status(500)]));
        let reporter = Arc::new(MemoryReporter::new());
        let result = extractor(http.clone(), reporter).fetch().await;

        assert!(result.is_none());
        assert_eq!(http.calls(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_still_makes_one_attempt() {
        let http = Arc::new(ScriptedHttp::new(vec![ok_json(json!({"items": []}))]));
        let reporter = Arc::new(MemoryReporter::new());
        let settings = BudgetSettings {
            max_retries: 0,
            ..settings()
        };
        let result = BudgetExtractor::new(http.clone(), reporter.clone(), settings)
            .fetch()
            .await;

        assert!(result.is_some());
        assert_eq!(http.calls(), 1);
        assert!(reporter.contains(Level::INFO, "Attempt 1/1"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_payload_without_items() {
        let http = Arc::new(ScriptedHttp::new(vec![ok_json(json!({"data": []}))]));
        let reporter = Arc::new(MemoryReporter::new());
        let result = extractor(http.clone(), reporter.clone()).fetch().await;

        assert!(result.is_none());
        assert_eq!(http.calls(), 1);
        assert!(reporter.contains(Level::ERROR, "'items'"));
    }

    #[test]
    fn test_normalize_maps_and_coerces() {
        let http = Arc::new(ScriptedHttp::new(vec![]));
        let reporter = Arc::new(MemoryReporter::new());
        let raw = json!({
            "items": [
                {"noTitle": 12, "title": "وزارة الصحة", "total": "1000.456", "used": 250.5,
                 "available": "n/a", "percent": 25.049, "extra": true},
                {"noTitle": "13", "title": "Ministère de l'Éducation", "total": 10, "used": null,
                 "available": 10, "percent": "0"}
            ]
        });

        let table = extractor(http, reporter).normalize(&raw, "2026-01-10 08:00:00");
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns, BudgetField::ALL.to_vec());

        let first = &table.records[0];
        assert_eq!(first.ministry_id.as_deref(), Some("12"));
        assert_eq!(first.initial_amount, Some(1000.46));
        assert_eq!(first.spent_amount, Some(250.5));
        assert_eq!(first.available_amount, None);
        assert_eq!(first.execution_rate, Some(25.05));
        assert_eq!(first.source_url, "https://budget.test/level1/");

        let second = &table.records[1];
        assert_eq!(second.spent_amount, None);
        assert_eq!(second.execution_rate, Some(0.0));
        assert_eq!(second.scraped_at, first.scraped_at);
    }

    #[test]
    fn test_normalize_drops_amounts_that_overflow_rounding() {
        let http = Arc::new(ScriptedHttp::new(vec![]));
        let reporter = Arc::new(MemoryReporter::new());
        let raw = json!({"items": [{"title": "Dette", "total": 1.0e307, "used": 1}]});

        let table = extractor(http, reporter).normalize(&raw, "ts");
        assert_eq!(table.records[0].initial_amount, None);
        assert_eq!(table.rows()[0][1], "");
    }

    #[test]
    fn test_normalize_projects_only_present_fields() {
        let http = Arc::new(ScriptedHttp::new(vec![]));
        let reporter = Arc::new(MemoryReporter::new());
        let raw = json!({"items": [{"title": "Défense", "used": 3}]});

        let table = extractor(http, reporter).normalize(&raw, "ts");
        assert_eq!(
            table.header(),
            vec!["ministry_label", "spent_amount", "scraped_at", "source_url"]
        );
        assert_eq!(table.rows()[0], vec!["Défense", "3", "ts", "https://budget.test/level1/"]);
    }

    #[test]
    fn test_normalize_empty_items() {
        let http = Arc::new(ScriptedHttp::new(vec![]));
        let reporter = Arc::new(MemoryReporter::new());
        let table = extractor(http, reporter.clone()).normalize(&json!({"items": []}), "ts");

        assert!(table.is_empty());
        assert!(reporter.contains(Level::ERROR, "No items"));
    }

    #[tokio::test]
    async fn test_run_with_empty_items_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(ScriptedHttp::new(vec![ok_json(json!({"items": []}))]));
        let reporter = Arc::new(MemoryReporter::new());

        extractor(http, reporter).run(dir.path()).await.unwrap();
        assert!(!dir.path().join(BUDGET_OUTPUT_FILE).exists());
    }

    #[tokio::test]
    async fn test_run_writes_bom_csv() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(ScriptedHttp::new(vec![ok_json(json!({
            "items": [{"noTitle": 1, "title": "Pêches", "total": 5, "used": 2, "available": 3, "percent": 40}]
        }))]));
        let reporter = Arc::new(MemoryReporter::new());

        extractor(http, reporter.clone()).run(dir.path()).await.unwrap();

        let bytes = std::fs::read(dir.path().join(BUDGET_OUTPUT_FILE)).unwrap();
        assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert!(text.starts_with("ministry_id,ministry_label,initial_amount,spent_amount,available_amount,execution_rate,scraped_at,source_url\n"));
        assert!(text.contains("1,Pêches,5,2,3,40,"));
        assert!(reporter.contains(Level::INFO, "(1 rows)"));
    }
}
