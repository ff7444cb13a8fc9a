use crate::apis::create_source;
use crate::app::ports::HttpClientPort;
use crate::common::config::Config;
use crate::common::constants::REPORT_FILE;
use crate::common::error::Result;
use crate::common::types::{scrape_timestamp, DataSource};
use crate::observability::{metrics, Reporter};
use crate::storage::inspect_csv;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, warn, Instrument};

/// Final outcome of one source in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAIL")]
    Fail,
}

/// Lifecycle of a source within one run: `Pending → Running → Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Pending,
    Running,
    Done(RunStatus),
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceState::Pending => write!(f, "PENDING"),
            SourceState::Running => write!(f, "RUNNING"),
            SourceState::Done(RunStatus::Ok) => write!(f, "OK"),
            SourceState::Done(RunStatus::Fail) => write!(f, "FAIL"),
        }
    }
}

/// Report entry for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub status: RunStatus,
    pub rows: usize,
    pub missing_values: Option<u64>,
    pub scraped_at: String,
}

impl SourceReport {
    fn ok(rows: usize, missing_values: u64) -> Self {
        Self {
            status: RunStatus::Ok,
            rows,
            missing_values: Some(missing_values),
            scraped_at: scrape_timestamp(),
        }
    }

    fn fail() -> Self {
        Self {
            status: RunStatus::Fail,
            rows: 0,
            missing_values: None,
            scraped_at: scrape_timestamp(),
        }
    }
}

/// Aggregate report of one run, keyed by source name in run order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    entries: Vec<(String, SourceReport)>,
}

impl RunReport {
    pub fn get(&self, source: &str) -> Option<&SourceReport> {
        self.entries
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceReport)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    fn insert(&mut self, source: &str, report: SourceReport) {
        self.entries.retain(|(name, _)| name != source);
        self.entries.push((source.to_string(), report));
    }

    /// Write as 4-space indented JSON
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        fs::write(path, buf)?;
        Ok(())
    }
}

impl Serialize for RunReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, report) in &self.entries {
            map.serialize_entry(name, report)?;
        }
        map.end()
    }
}

/// Modification time and size of an output file, used to tell a file
/// written during this run from one left over by an earlier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

/// Runs every configured source in turn and reports on their output files.
pub struct Pipeline {
    output_dir: PathBuf,
    sources: Vec<Box<dyn DataSource>>,
}

impl Pipeline {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: Box<dyn DataSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Build a pipeline from source names; unknown names are skipped.
    pub fn from_config(
        config: &Config,
        source_names: &[String],
        http: Arc<dyn HttpClientPort>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let mut pipeline = Self::new(config.output_dir.clone());
        for name in source_names {
            match create_source(name, config, http.clone(), reporter.clone()) {
                Some(source) => pipeline = pipeline.with_source(source),
                None => warn!("Unknown source specified: {}", name),
            }
        }
        pipeline
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE)
    }

    /// Run all sources sequentially, then write the report. A failing
    /// source is recorded as FAIL and never stops the others.
    pub async fn run(&self) -> Result<RunReport> {
        fs::create_dir_all(&self.output_dir)?;

        let mut states: Vec<SourceState> = vec![SourceState::Pending; self.sources.len()];
        let mut report = RunReport::default();

        for (i, source) in self.sources.iter().enumerate() {
            let name = source.source_name();
            let span = tracing::info_span!("source", name = %name);

            states[i] = SourceState::Running;
            debug!(source = %name, state = %states[i], "state change");

            let entry = self.run_source(source.as_ref()).instrument(span).await;

            states[i] = SourceState::Done(entry.status);
            debug!(source = %name, state = %states[i], "state change");
            report.insert(name, entry);
        }

        let report_path = self.report_path();
        report.write_to(&report_path)?;
        info!("{} written: {}", REPORT_FILE, report_path.display());

        Ok(report)
    }

    async fn run_source(&self, source: &dyn DataSource) -> SourceReport {
        let name = source.source_name();
        info!("Starting collection for {}", name);
        let started = Instant::now();
        let output = self.output_dir.join(source.output_file());
        let before = FileStamp::of(&output);

        let entry = match source.run(&self.output_dir).await {
            Ok(()) => self.inspect_output(source, &output, before),
            Err(e) => {
                error!("Collection failed for {}: {}", name, e);
                SourceReport::fail()
            }
        };

        metrics::pipeline::source_duration(name.to_string(), started.elapsed().as_secs_f64());
        metrics::pipeline::source_run(
            name.to_string(),
            match entry.status {
                RunStatus::Ok => "ok",
                RunStatus::Fail => "fail",
            },
        );
        if entry.status == RunStatus::Ok {
            metrics::pipeline::source_rows(name.to_string(), entry.rows);
        }
        entry
    }

    fn inspect_output(
        &self,
        source: &dyn DataSource,
        path: &Path,
        before: Option<FileStamp>,
    ) -> SourceReport {
        let Some(after) = FileStamp::of(path) else {
            warn!("No output file for {} at {}", source.source_name(), path.display());
            return SourceReport::fail();
        };
        if before == Some(after) {
            warn!(
                "{} left {} untouched; ignoring output from an earlier run",
                source.source_name(),
                path.display()
            );
            return SourceReport::fail();
        }

        match inspect_csv(path) {
            Ok(stats) => {
                info!(
                    "{}: {} rows, {} missing values",
                    source.source_name(),
                    stats.rows,
                    stats.missing_values
                );
                SourceReport::ok(stats.rows, stats.missing_values)
            }
            Err(e) => {
                error!("Could not read back {}: {}", path.display(), e);
                SourceReport::fail()
            }
        }
    }
}
