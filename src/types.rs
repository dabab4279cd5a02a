use chrono::NaiveDate;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

use crate::periods::Period;
use crate::util::normalize_code;

/// Accepts a string, number, boolean, or null and carries it as optional text.
///
/// Rows come either from CSV (everything is text) or from JSON exports of the
/// hosted database (numbers and booleans are typed), so raw fields are kept as
/// text and parsed in one place by the loader.
pub fn de_lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientVisitor;

    impl<'de> Visitor<'de> for LenientVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string, number, boolean, or null")
        }
        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(Some(v))
        }
        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<Self::Value, D2::Error> {
            d.deserialize_any(LenientVisitor)
        }
    }

    deserializer.deserialize_any(LenientVisitor)
}

#[derive(Debug, Default, Deserialize)]
pub struct RawProjectRow {
    #[serde(default, deserialize_with = "de_lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub project_code: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub project_sub_code: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub project_full_code: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub project_name: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub contract_amount: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub virtual_material_value: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub virtual_material_unit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawActivityRow {
    #[serde(default, deserialize_with = "de_lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub project_id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub project_code: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub project_full_code: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub activity_name: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub activity_division: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub zone_ref: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub zone_number: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub total_value: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub total_units: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub planned_units: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub rate: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub use_virtual_material: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawKpiRow {
    #[serde(default, deserialize_with = "de_lenient")]
    pub input_type: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub quantity: Option<String>,
    #[serde(rename = "Value", default, deserialize_with = "de_lenient")]
    pub value_upper: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub kpi_value: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub actual_value: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub planned_value: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub activity_name: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub project_code: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub project_full_code: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub zone: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub actual_date: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub day: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub target_date: Option<String>,
    #[serde(default, deserialize_with = "de_lenient")]
    pub activity_date: Option<String>,
}

/// Match and dedup identity of a project: uppercase full code plus trimmed name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectKey {
    pub full_code: String,
    pub name: String,
}

impl ProjectKey {
    pub fn new(full_code: &str, name: &str) -> Self {
        ProjectKey {
            full_code: normalize_code(full_code),
            name: name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: Option<String>,
    pub code: String,
    pub sub_code: Option<String>,
    pub full_code: String,
    pub name: String,
    pub contract_amount: f64,
    pub currency: String,
    /// Surcharge percentage on a 0-100 scale.
    pub virtual_material_pct: f64,
}

impl Project {
    pub fn key(&self) -> ProjectKey {
        ProjectKey::new(&self.full_code, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoqActivity {
    pub id: Option<String>,
    pub project_id: Option<String>,
    pub project_code: String,
    pub project_full_code: Option<String>,
    pub name: String,
    pub division: Option<String>,
    pub zone: Option<String>,
    pub total_value: f64,
    pub total_units: f64,
    pub rate: f64,
    pub use_virtual_material: bool,
}

impl BoqActivity {
    /// The explicit full code, or the short code for legacy rows without one.
    pub fn full_code(&self) -> &str {
        self.project_full_code
            .as_deref()
            .unwrap_or(self.project_code.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InputType {
    Actual,
    Planned,
}

impl InputType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "actual" => Some(InputType::Actual),
            "planned" => Some(InputType::Planned),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InputType::Actual => "Actual",
            InputType::Planned => "Planned",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiEntry {
    pub input_type: InputType,
    pub quantity: f64,
    /// First positive value among the entry's explicit value columns.
    pub explicit_value: Option<f64>,
    /// `actual_value` for Actual entries, `planned_value` for Planned ones.
    pub fallback_value: Option<f64>,
    pub activity_name: String,
    pub project_code: Option<String>,
    pub project_full_code: Option<String>,
    pub zone: Option<String>,
    /// Resolved by the type-specific date precedence; `None` excludes the entry.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub projects: Vec<Project>,
    pub activities: Vec<BoqActivity>,
    pub kpis: Vec<KpiEntry>,
    /// Bumped on every load; part of the cache key.
    pub revision: u64,
}

/// Per-project period vectors, aligned by index with the report's periods.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub earned: Vec<f64>,
    pub planned: Vec<f64>,
    pub virtual_material: Vec<f64>,
    pub planned_virtual_material: Vec<f64>,
    pub outer_range_value: f64,
    pub outer_range_planned_value: f64,
    pub outer_range_virtual_material_amount: f64,
    pub outer_range_planned_virtual_material_amount: f64,
}

impl AggregationResult {
    pub fn zeroed(periods: usize) -> Self {
        AggregationResult {
            earned: vec![0.0; periods],
            planned: vec![0.0; periods],
            virtual_material: vec![0.0; periods],
            planned_virtual_material: vec![0.0; periods],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTotals {
    pub earned: f64,
    pub planned: f64,
    pub virtual_material: f64,
    pub planned_virtual_material: f64,
    pub grand_total_earned: f64,
    pub grand_total_planned: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAggregation {
    pub key: ProjectKey,
    pub contract_amount: f64,
    pub currency: String,
    pub result: AggregationResult,
    pub totals: ProjectTotals,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollup {
    pub total_contract_value: f64,
    pub total_earned_value: f64,
    pub total_planned_value: f64,
    pub period_earned_value_totals: Vec<f64>,
    pub period_planned_value_totals: Vec<f64>,
    pub total_virtual_material_amount: f64,
    pub total_planned_virtual_material_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub periods: Vec<Period>,
    pub projects: Vec<ProjectAggregation>,
    pub rollup: Rollup,
}

/// A rendered table whose period columns depend on the report configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SummaryRow {
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}
