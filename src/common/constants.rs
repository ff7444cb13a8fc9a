/// Source name constants to ensure consistency across the codebase.
/// These names key the run report and select sources on the command line.
pub const BUDGET_SOURCE: &str = "budget";
pub const FOOTBALL_SOURCE: &str = "football";
pub const INPC_SOURCE: &str = "inpc";

// Conventional output files, one per source
pub const BUDGET_OUTPUT_FILE: &str = "budget_execution.csv";
pub const FOOTBALL_OUTPUT_FILE: &str = "football_results.csv";
pub const INPC_OUTPUT_FILE: &str = "inpc_table2.csv";
pub const REPORT_FILE: &str = "kpi.json";

// Default remote resources
pub const DEFAULT_BUDGET_URL: &str = "https://services.tresor.mr/secure/public/budget/level1/";
pub const DEFAULT_FOOTBALL_URL: &str =
    "https://www.tntsports.co.uk/football/mauritanian-league/2025-2026/calendar-results.shtml";
pub const DEFAULT_INPC_PDF_URL: &str =
    "https://ansade.mr/wp-content/uploads/2026/01/Note-INPC-decembre-2025_FR_VF.pdf";

pub const DEFAULT_OUTPUT_DIR: &str = "./data";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/144.0.0.0 Safari/537.36";

pub const DEFAULT_BUDGET_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_FOOTBALL_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_INPC_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_BUDGET_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BUDGET_RETRY_DELAY_SECS: u64 = 2;

/// Anything smaller is a truncated download or an HTML error page.
pub const DEFAULT_INPC_MIN_PDF_BYTES: u64 = 100_000;

/// Timestamp layout stamped into every output row and the run report.
pub const SCRAPED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default run order of the orchestrator.
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![FOOTBALL_SOURCE, INPC_SOURCE, BUDGET_SOURCE]
}
