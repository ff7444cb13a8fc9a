// Observability: logging, injected reporters and metrics

pub mod logging;
pub mod metrics;
pub mod reporter;

pub use logging::init_logging;
pub use reporter::{MemoryReporter, Reporter, TracingReporter};
