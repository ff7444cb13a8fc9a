use crate::app::ports::{HttpClientPort, RequestOptions};
use crate::common::coerce::{format_number, parse_locale_number};
use crate::common::config::Config;
use crate::common::constants::{INPC_OUTPUT_FILE, INPC_SOURCE};
use crate::common::error::{Result, ScraperError};
use crate::common::types::{scrape_timestamp, DataSource, TabularOutput};
use crate::observability::{metrics, Reporter};
use crate::storage::{write_csv, Encoding};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Column gap in the PDF text layer: a tab or two or more spaces.
static CELL_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t|\s{2,}").unwrap());

const DEFAULT_PDF_NAME: &str = "inpc.pdf";

/// Cells of one extracted table, row-major, every row the same width.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTable {
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Finds every table in a PDF document.
pub trait TableExtractor: Send + Sync {
    fn extract_tables(&self, pdf: &Path) -> Result<Vec<RawTable>>;
}

/// Picks the target table out of everything the extractor found.
pub trait TableLocator: Send + Sync {
    fn locate(&self, tables: Vec<RawTable>) -> Result<RawTable>;
}

/// Selects a table purely by position in document order.
#[derive(Debug, Clone, Copy)]
pub struct NthTableLocator {
    pub index: usize,
}

impl Default for NthTableLocator {
    /// The price-index note publishes the indices as its second table
    fn default() -> Self {
        Self { index: 1 }
    }
}

impl TableLocator for NthTableLocator {
    fn locate(&self, tables: Vec<RawTable>) -> Result<RawTable> {
        let found = tables.len();
        tables
            .into_iter()
            .nth(self.index)
            .ok_or_else(|| ScraperError::Structure {
                message: format!(
                    "table {} not found in PDF ({} tables detected)",
                    self.index + 1,
                    found
                ),
            })
    }
}

/// Stream-mode detection over the PDF text layer: no ruling lines, just
/// whitespace. Consecutive lines that split into at least `min_columns`
/// cells form one table; a table needs at least `min_rows` such lines.
#[derive(Debug, Clone, Copy)]
pub struct StreamTableExtractor {
    pub min_columns: usize,
    pub min_rows: usize,
}

impl Default for StreamTableExtractor {
    fn default() -> Self {
        Self {
            min_columns: 2,
            min_rows: 2,
        }
    }
}

impl StreamTableExtractor {
    pub fn tables_from_text(&self, text: &str) -> Vec<RawTable> {
        let mut tables = Vec::new();
        let mut current: Vec<Vec<String>> = Vec::new();

        for line in text.lines() {
            let cells: Vec<String> = CELL_GAP
                .split(line.trim())
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();

            if cells.len() >= self.min_columns {
                current.push(cells);
            } else {
                self.flush(&mut current, &mut tables);
            }
        }
        self.flush(&mut current, &mut tables);

        tables
    }

    fn flush(&self, current: &mut Vec<Vec<String>>, tables: &mut Vec<RawTable>) {
        let rows = std::mem::take(current);
        if rows.len() < self.min_rows {
            return;
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, String::new());
                r
            })
            .collect();
        tables.push(RawTable::new(rows));
    }
}

impl TableExtractor for StreamTableExtractor {
    fn extract_tables(&self, pdf: &Path) -> Result<Vec<RawTable>> {
        let bytes = fs::read(pdf)?;
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ScraperError::Pdf(format!("{:?}", e)))?;
        Ok(self.tables_from_text(&text))
    }
}

/// One data row of the price-index table.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceIndexRow {
    pub label: String,
    /// One value per column after the label column
    pub values: Vec<Option<f64>>,
    pub scraped_at: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceIndexTable {
    /// Normalized header names, label column first
    pub columns: Vec<String>,
    pub rows: Vec<PriceIndexRow>,
}

impl PriceIndexTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of a named numeric column
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        if idx == 0 {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|r| r.values.get(idx - 1).copied().flatten())
                .collect(),
        )
    }
}

impl TabularOutput for PriceIndexTable {
    fn header(&self) -> Vec<String> {
        let mut header = self.columns.clone();
        header.push("scraped_at".to_string());
        header
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| {
                std::iter::once(r.label.clone())
                    .chain(r.values.iter().map(|v| format_number(*v)))
                    .chain(std::iter::once(r.scraped_at.clone()))
                    .collect()
            })
            .collect()
    }
}

fn normalize_header(cell: &str, position: usize) -> String {
    let name = cell.trim().to_lowercase().replace(' ', "_");
    if name.is_empty() {
        format!("column_{}", position + 1)
    } else {
        name
    }
}

/// Promote the first row to headers and coerce every column but the first.
pub fn clean_table(grid: &RawTable, scraped_at: &str) -> Result<PriceIndexTable> {
    let Some((header, data)) = grid.rows.split_first() else {
        return Err(ScraperError::Structure {
            message: "extracted table has no header row".into(),
        });
    };

    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, c)| normalize_header(c, i))
        .collect();
    let numeric_columns = columns.len().saturating_sub(1);

    let rows = data
        .iter()
        .map(|row| PriceIndexRow {
            label: row.first().cloned().unwrap_or_default(),
            values: (1..=numeric_columns)
                .map(|i| row.get(i).and_then(|c| parse_locale_number(c)))
                .collect(),
            scraped_at: scraped_at.to_string(),
        })
        .collect();

    Ok(PriceIndexTable { columns, rows })
}

fn pdf_file_name(url: &str) -> String {
    let last = url
        .split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .unwrap_or_default();
    if last.to_lowercase().ends_with(".pdf") {
        last.to_string()
    } else {
        DEFAULT_PDF_NAME.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct InpcSettings {
    pub url: String,
    pub request: RequestOptions,
    pub min_pdf_bytes: u64,
}

impl InpcSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.inpc.url.clone(),
            request: RequestOptions {
                timeout: config.inpc_timeout(),
                user_agent: config.user_agent.clone(),
                accept: Some("application/pdf".to_string()),
            },
            min_pdf_bytes: config.inpc.min_pdf_bytes,
        }
    }
}

/// Consumer price index table from the statistics office's monthly PDF note.
pub struct InpcExtractor {
    http: Arc<dyn HttpClientPort>,
    reporter: Arc<dyn Reporter>,
    settings: InpcSettings,
    tables: Arc<dyn TableExtractor>,
    locator: Box<dyn TableLocator>,
}

impl InpcExtractor {
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        reporter: Arc<dyn Reporter>,
        settings: InpcSettings,
    ) -> Self {
        Self::with_strategies(
            http,
            reporter,
            settings,
            Arc::new(StreamTableExtractor::default()),
            Box::new(NthTableLocator::default()),
        )
    }

    pub fn with_strategies(
        http: Arc<dyn HttpClientPort>,
        reporter: Arc<dyn Reporter>,
        settings: InpcSettings,
        tables: Arc<dyn TableExtractor>,
        locator: Box<dyn TableLocator>,
    ) -> Self {
        Self {
            http,
            reporter,
            settings,
            tables,
            locator,
        }
    }

    /// Download the PDF into `output_dir`, rejecting undersized files.
    #[instrument(skip(self, output_dir), fields(url = %self.settings.url))]
    pub async fn download(&self, output_dir: &Path) -> Result<PathBuf> {
        self.reporter
            .info(INPC_SOURCE, &format!("Downloading PDF: {}", self.settings.url));
        metrics::sources::request_attempt(INPC_SOURCE);
        let resp = self.http.get(&self.settings.url, &self.settings.request).await?;
        if !resp.is_success() {
            metrics::sources::request_error(INPC_SOURCE);
            return Err(ScraperError::Api {
                message: format!("PDF download returned HTTP status {}", resp.status),
            });
        }
        metrics::sources::payload_bytes(INPC_SOURCE, resp.bytes.len());

        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(pdf_file_name(&self.settings.url));
        fs::write(&path, &resp.bytes)?;

        let size = fs::metadata(&path)?.len();
        if size < self.settings.min_pdf_bytes {
            return Err(ScraperError::Structure {
                message: format!(
                    "PDF too small or invalid: {} bytes (minimum {})",
                    size, self.settings.min_pdf_bytes
                ),
            });
        }

        let digest = hex::encode(Sha256::digest(&resp.bytes));
        debug!(sha256 = %digest, bytes = size, "PDF saved to {}", path.display());
        Ok(path)
    }

    /// Extract every table from the document and select the target one.
    pub async fn extract_table(&self, pdf: &Path) -> Result<RawTable> {
        self.reporter
            .info(INPC_SOURCE, &format!("Extracting table from {}", pdf.display()));
        let extractor = Arc::clone(&self.tables);
        let path = pdf.to_path_buf();
        // PDF parsing is CPU-bound and may panic on malformed input
        let tables = tokio::task::spawn_blocking(move || extractor.extract_tables(&path))
            .await
            .map_err(|e| ScraperError::Pdf(format!("table extraction aborted: {}", e)))??;
        debug!("Detected {} tables", tables.len());
        self.locator.locate(tables)
    }

    pub fn clean(&self, grid: &RawTable, scraped_at: &str) -> Result<PriceIndexTable> {
        self.reporter.info(INPC_SOURCE, "Cleaning table");
        clean_table(grid, scraped_at)
    }

    pub fn persist(&self, table: &PriceIndexTable, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(INPC_OUTPUT_FILE);
        write_csv(&path, table, Encoding::Utf8)?;
        Ok(path)
    }

    async fn extract(&self, output_dir: &Path) -> Result<PathBuf> {
        let pdf = self.download(output_dir).await?;
        let grid = self.extract_table(&pdf).await?;
        let table = self.clean(&grid, &scrape_timestamp())?;
        let path = self.persist(&table, output_dir)?;
        self.reporter.info(
            INPC_SOURCE,
            &format!("{} written ({} rows)", INPC_OUTPUT_FILE, table.len()),
        );
        Ok(path)
    }
}

#[async_trait::async_trait]
impl DataSource for InpcExtractor {
    fn source_name(&self) -> &'static str {
        INPC_SOURCE
    }

    fn output_file(&self) -> &'static str {
        INPC_OUTPUT_FILE
    }

    async fn run(&self, output_dir: &Path) -> Result<()> {
        if let Err(e) = self.extract(output_dir).await {
            self.reporter
                .error(INPC_SOURCE, &format!("INPC PDF error: {}", e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_clean_promotes_header_and_coerces() {
        let raw = grid(&[
            &["Fonctions", "Pondération", "Nov 2025", "Déc 2025"],
            &["Alimentation", "1 234,56", "112,4", "113,0"],
            &["Logement", "980", "n.d.", "101,25"],
        ]);

        let table = clean_table(&raw, "2026-01-05 10:00:00").unwrap();
        assert_eq!(
            table.columns,
            vec!["fonctions", "pondération", "nov_2025", "déc_2025"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].label, "Alimentation");
        assert_eq!(table.rows[0].values, vec![Some(1234.56), Some(112.4), Some(113.0)]);
        assert_eq!(table.rows[1].values, vec![Some(980.0), None, Some(101.25)]);
        assert_eq!(table.column("nov_2025").unwrap(), vec![Some(112.4), None]);
        assert!(table.rows.iter().all(|r| r.scraped_at == "2026-01-05 10:00:00"));
    }

    #[test]
    fn test_clean_label_column_is_not_coerced() {
        let raw = grid(&[&["Code", "Indice"], &["01", "100,5"]]);
        let table = clean_table(&raw, "ts").unwrap();
        assert_eq!(table.rows[0].label, "01");
    }

    #[test]
    fn test_clean_is_idempotent_on_its_own_output() {
        let raw = grid(&[
            &["Groupe", "Indice", "Variation"],
            &["Ensemble", "1 234,56", "-0,3"],
            &["Transport", "99,9", "x"],
        ]);
        let first = clean_table(&raw, "ts").unwrap();

        // feed the cleaned values back as cells, minus the timestamp column
        let mut rows = vec![first.columns.clone()];
        for row in first.rows() {
            rows.push(row[..row.len() - 1].to_vec());
        }
        let second = clean_table(&RawTable::new(rows), "ts").unwrap();

        assert_eq!(second.columns, first.columns);
        assert_eq!(second.rows, first.rows);
    }

    #[test]
    fn test_clean_empty_grid_is_structural_error() {
        let err = clean_table(&RawTable::default(), "ts").unwrap_err();
        assert!(matches!(err, ScraperError::Structure { .. }));
    }

    #[test]
    fn test_blank_header_cells_get_positional_names() {
        let raw = grid(&[&["", "Indice"], &["Ensemble", "100"]]);
        let table = clean_table(&raw, "ts").unwrap();
        assert_eq!(table.columns, vec!["column_1", "indice"]);
    }

    #[test]
    fn test_locator_requires_second_table() {
        let locator = NthTableLocator::default();
        let one = vec![grid(&[&["a", "b"]])];
        assert!(matches!(
            locator.locate(one).unwrap_err(),
            ScraperError::Structure { .. }
        ));

        let two = vec![grid(&[&["a", "b"]]), grid(&[&["c", "d"]])];
        assert_eq!(locator.locate(two).unwrap(), grid(&[&["c", "d"]]));
    }

    #[test]
    fn test_stream_tables_from_text() {
        let text = "Note mensuelle INPC\n\
                    Tableau 1\n\
                    Mois      Indice\n\
                    Nov       112,4\n\
                    \n\
                    Tableau 2 : indices par fonction\n\
                    Fonctions        Pondération    Déc 2025\n\
                    Alimentation     1 234,56       113,0\n\
                    Santé            45,1\n\
                    Source : ANSADE\n";

        let tables = StreamTableExtractor::default().tables_from_text(text);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows[0], vec!["Mois", "Indice"]);

        let second = &tables[1];
        assert_eq!(second.width(), 3);
        assert_eq!(second.rows[1], vec!["Alimentation", "1 234,56", "113,0"]);
        assert_eq!(second.rows[2], vec!["Santé", "45,1", ""]);
    }

    #[test]
    fn test_pdf_file_name() {
        assert_eq!(
            pdf_file_name("https://ansade.mr/uploads/Note-INPC.pdf?x=1"),
            "Note-INPC.pdf"
        );
        assert_eq!(pdf_file_name("https://ansade.mr/inpc/latest"), "inpc.pdf");
    }
}
