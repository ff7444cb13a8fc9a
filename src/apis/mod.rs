pub mod budget;
pub mod football;
pub mod inpc;

use crate::app::ports::HttpClientPort;
use crate::common::config::Config;
use crate::common::constants::{BUDGET_SOURCE, FOOTBALL_SOURCE, INPC_SOURCE};
use crate::common::types::DataSource;
use crate::observability::Reporter;
use std::sync::Arc;

pub use budget::{BudgetExtractor, BudgetSettings};
pub use football::{FootballExtractor, FootballSettings};
pub use inpc::{InpcExtractor, InpcSettings};

/// Factory function to create a source by name
pub fn create_source(
    name: &str,
    config: &Config,
    http: Arc<dyn HttpClientPort>,
    reporter: Arc<dyn Reporter>,
) -> Option<Box<dyn DataSource>> {
    match name {
        BUDGET_SOURCE => Some(Box::new(BudgetExtractor::new(
            http,
            reporter,
            BudgetSettings::from_config(config),
        ))),
        FOOTBALL_SOURCE => Some(Box::new(FootballExtractor::new(
            http,
            reporter,
            FootballSettings::from_config(config),
        ))),
        INPC_SOURCE => Some(Box::new(InpcExtractor::new(
            http,
            reporter,
            InpcSettings::from_config(config),
        ))),
        _ => None,
    }
}
