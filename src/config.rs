//! Report configuration: date window, bucket size, division filter, and
//! display switches. Loaded from JSON and overridden from the command line.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ReportError, ReportResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl FromStr for Granularity {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            "quarterly" => Ok(Granularity::Quarterly),
            "yearly" => Ok(Granularity::Yearly),
            other => Err(ReportError::Config(format!("unknown period type '{}'", other))),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
            Granularity::Quarterly => "quarterly",
            Granularity::Yearly => "yearly",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportConfig {
    pub date_range: DateRange,
    pub period_type: Granularity,
    pub selected_divisions: Vec<String>,
    pub show_virtual_material_values: bool,
    pub view_planned_value: bool,
    pub outer_range_start: Option<NaiveDate>,
    /// Last countable day. `None` means the caller supplies the current date.
    pub today: Option<NaiveDate>,
}

impl ReportConfig {
    pub fn validate(&self) -> ReportResult<()> {
        if let (Some(start), Some(end)) = (self.date_range.start, self.date_range.end) {
            if start > end {
                return Err(ReportError::Config(format!(
                    "report start {} is after report end {}",
                    start, end
                )));
            }
        }
        if let (Some(outer), Some(start)) = (self.outer_range_start, self.date_range.start) {
            if outer > start {
                return Err(ReportError::Config(format!(
                    "outer range start {} is after report start {}",
                    outer, start
                )));
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> ReportResult<ReportConfig> {
    let text = std::fs::read_to_string(path)?;
    let config: ReportConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
}
