use crate::common::constants::SCRAPED_AT_FORMAT;
use crate::common::error::Result;
use std::path::Path;

/// Core trait that every public-data source must implement.
///
/// A source owns its whole Fetch → Parse/Normalize → Persist cycle. Expected
/// failures (network errors, malformed payloads) are logged by the source
/// itself and leave no output file behind; `run` only returns `Err` for
/// failures the source could not account for.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Unique identifier for this source, used as the report key
    fn source_name(&self) -> &'static str;

    /// File name, relative to the output directory, this source produces
    fn output_file(&self) -> &'static str;

    /// Run the full extraction and write the output file on success
    async fn run(&self, output_dir: &Path) -> Result<()>;
}

/// A record set that can be written as delimited text.
pub trait TabularOutput {
    fn header(&self) -> Vec<String>;

    /// Rows rendered as cells, missing values as empty strings
    fn rows(&self) -> Vec<Vec<String>>;
}

/// Retrieval timestamp shared by every row of one batch.
pub fn scrape_timestamp() -> String {
    chrono::Local::now().format(SCRAPED_AT_FORMAT).to_string()
}
