use std::sync::Mutex;
use tracing::Level;

/// Sink for the log lines an extractor emits while it runs.
///
/// Extractors receive a reporter instead of logging to the global
/// subscriber directly, so their observable output can be captured.
pub trait Reporter: Send + Sync {
    fn report(&self, level: Level, source: &str, message: &str);

    fn info(&self, source: &str, message: &str) {
        self.report(Level::INFO, source, message);
    }

    fn warn(&self, source: &str, message: &str) {
        self.report(Level::WARN, source, message);
    }

    fn error(&self, source: &str, message: &str) {
        self.report(Level::ERROR, source, message);
    }
}

/// Forwards every line to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, level: Level, source: &str, message: &str) {
        match level {
            Level::ERROR => tracing::error!(source = %source, "{}", message),
            Level::WARN => tracing::warn!(source = %source, "{}", message),
            Level::INFO => tracing::info!(source = %source, "{}", message),
            Level::DEBUG => tracing::debug!(source = %source, "{}", message),
            _ => tracing::trace!(source = %source, "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub level: Level,
    pub source: String,
    pub message: String,
}

/// Keeps every line in memory; used by tests.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    lines: Mutex<Vec<ReportLine>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<ReportLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// True if some line at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|l| l.level == level && l.message.contains(needle))
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, level: Level, source: &str, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(ReportLine {
                level,
                source: source.to_string(),
                message: message.to_string(),
            });
        }
    }
}
