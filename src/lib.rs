//! Earned and planned value reporting for construction projects.
//!
//! Projects, their BOQ activities, and dated KPI quantity entries are loaded
//! into a typed [`Dataset`]; [`build_report`] buckets the priced entries into
//! calendar periods per project and rolls them up into the Monthly Work
//! Revenue figures.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod division;
pub mod error;
pub mod loader;
pub mod matching;
pub mod output;
pub mod periods;
pub mod reports;
pub mod rollup;
pub mod types;
pub mod util;
pub mod valuation;

pub use aggregate::build_report;
pub use cache::ReportCache;
pub use config::{Granularity, ReportConfig};
pub use error::{ReportError, ReportResult};
pub use types::{AggregationResult, Dataset, Report, Rollup};
