//! Metric recording helpers, organized by concern.
//!
//! These go through the `metrics` facade; without an installed recorder
//! they are no-ops.

pub mod sources {
    /// Record one HTTP attempt against a source
    pub fn request_attempt(source: &'static str) {
        ::metrics::counter!("scrape_source_requests_total", "source" => source).increment(1);
    }

    /// Record a failed HTTP attempt
    pub fn request_error(source: &'static str) {
        ::metrics::counter!("scrape_source_request_errors_total", "source" => source).increment(1);
    }

    /// Record payload size
    pub fn payload_bytes(source: &'static str, bytes: usize) {
        ::metrics::histogram!("scrape_source_payload_bytes", "source" => source).record(bytes as f64);
    }
}

pub mod pipeline {
    /// Record the outcome of one orchestrated source run
    pub fn source_run(source: String, status: &'static str) {
        ::metrics::counter!("scrape_source_runs_total", "source" => source, "status" => status)
            .increment(1);
    }

    /// Record the row count read back from a source's output file
    pub fn source_rows(source: String, rows: usize) {
        ::metrics::gauge!("scrape_source_rows", "source" => source).set(rows as f64);
    }

    pub fn source_duration(source: String, secs: f64) {
        ::metrics::histogram!("scrape_source_duration_seconds", "source" => source).record(secs);
    }
}
