// Reading the three input files into a typed `Dataset`.
//
// Files may be CSV or JSON arrays. Every field arrives as text, gets cleaned
// once here (codes, numbers, dates, percentages), and rows that cannot be used
// are counted in a `LoadReport` instead of failing the whole load.
use crate::error::{ReportError, ReportResult};
use crate::types::{
    BoqActivity, Dataset, InputType, KpiEntry, Project, RawActivityRow, RawKpiRow, RawProjectRow,
};
use crate::util::{
    non_empty, number_or_zero, parse_bool_safe, parse_date_safe, parse_f64_safe, positive,
};
use crate::valuation::{normalize_percentage, PercentUnit};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct LoadPaths {
    pub projects: PathBuf,
    pub activities: PathBuf,
    pub kpis: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub projects_read: usize,
    pub activities_read: usize,
    pub kpis_read: usize,
    pub skipped_rows: usize,
    pub duplicate_projects: usize,
    pub undated_kpis: usize,
}

/// Read every row of a CSV or JSON-array file into `T`.
///
/// CSV cells are handed over as exact text (no numeric inference, so codes
/// like `007` keep their zeros). Rows that fail to deserialize are counted
/// and skipped.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> ReportResult<(Vec<T>, usize)> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let mut errors = 0usize;
    let values: Vec<Value> = if is_json {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)?
    } else {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::Headers)
            .from_path(path)?;
        let mut out = Vec::new();
        for (i, result) in rdr.deserialize::<HashMap<String, String>>().enumerate() {
            let row = match result {
                Ok(row) => row,
                // A failing reader cannot resume; a bad record can be skipped.
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    debug!(path = %path.display(), row = i + 1, error = %e, "malformed record");
                    errors += 1;
                    continue;
                }
            };
            let obj: Map<String, Value> = row.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
            out.push(Value::Object(obj));
        }
        out
    };

    let mut rows = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<T>(value) {
            Ok(r) => rows.push(r),
            Err(e) => {
                debug!(path = %path.display(), row = i + 1, error = %e, "unreadable row");
                errors += 1;
            }
        }
    }
    Ok((rows, errors))
}

pub fn clean_project(row: RawProjectRow) -> Option<Project> {
    let code = non_empty(row.project_code.as_deref());
    let sub_code = non_empty(row.project_sub_code.as_deref());
    let full_code = non_empty(row.project_full_code.as_deref()).or_else(|| {
        code.as_ref().map(|c| match &sub_code {
            Some(s) => format!("{}-{}", c, s),
            None => c.clone(),
        })
    })?;
    let code = code.unwrap_or_else(|| full_code.clone());
    let unit = row.virtual_material_unit.as_deref().and_then(PercentUnit::parse);

    Some(Project {
        id: non_empty(row.id.as_deref()),
        code,
        sub_code,
        name: non_empty(row.project_name.as_deref()).unwrap_or_default(),
        contract_amount: number_or_zero(row.contract_amount.as_deref()),
        currency: non_empty(row.currency.as_deref()).unwrap_or_else(|| "USD".to_string()),
        virtual_material_pct: normalize_percentage(row.virtual_material_value.as_deref(), unit),
        full_code,
    })
}

pub fn clean_activity(row: RawActivityRow) -> Option<BoqActivity> {
    let name = non_empty(row.activity_name.as_deref())?;
    let full = non_empty(row.project_full_code.as_deref());
    let project_code = non_empty(row.project_code.as_deref()).or_else(|| full.clone())?;
    let total_units = positive(parse_f64_safe(row.total_units.as_deref()))
        .unwrap_or_else(|| number_or_zero(row.planned_units.as_deref()));

    Some(BoqActivity {
        id: non_empty(row.id.as_deref()),
        project_id: non_empty(row.project_id.as_deref()),
        project_code,
        project_full_code: full,
        name,
        division: non_empty(row.activity_division.as_deref()),
        zone: non_empty(row.zone_ref.as_deref()).or_else(|| non_empty(row.zone_number.as_deref())),
        total_value: number_or_zero(row.total_value.as_deref()),
        total_units,
        rate: number_or_zero(row.rate.as_deref()),
        use_virtual_material: parse_bool_safe(row.use_virtual_material.as_deref()),
    })
}

/// The date an entry counts on: the first populated field in type order.
///
/// A populated but malformed field yields `None` rather than falling through,
/// so a bad date excludes the entry instead of silently moving it.
pub fn resolve_entry_date(row: &RawKpiRow, input_type: InputType) -> Option<NaiveDate> {
    let fields = match input_type {
        InputType::Actual => vec![&row.actual_date, &row.day, &row.activity_date],
        InputType::Planned => vec![&row.target_date, &row.activity_date],
    };
    let first = fields.iter().find_map(|f| non_empty(f.as_deref()))?;
    parse_date_safe(Some(&first))
}

pub fn clean_kpi(row: RawKpiRow) -> Option<KpiEntry> {
    let input_type = row.input_type.as_deref().and_then(InputType::parse)?;
    let activity_name = non_empty(row.activity_name.as_deref())?;
    let explicit_value = [&row.value_upper, &row.value, &row.kpi_value]
        .into_iter()
        .find_map(|v| positive(parse_f64_safe(v.as_deref())));
    let fallback_value = match input_type {
        InputType::Actual => parse_f64_safe(row.actual_value.as_deref()),
        InputType::Planned => parse_f64_safe(row.planned_value.as_deref()),
    };

    Some(KpiEntry {
        input_type,
        quantity: number_or_zero(row.quantity.as_deref()),
        explicit_value,
        fallback_value,
        date: resolve_entry_date(&row, input_type),
        activity_name,
        project_code: non_empty(row.project_code.as_deref()),
        project_full_code: non_empty(row.project_full_code.as_deref()),
        zone: non_empty(row.zone.as_deref()),
    })
}

pub fn load_dataset(paths: &LoadPaths, revision: u64) -> ReportResult<(Dataset, LoadReport)> {
    let mut report = LoadReport::default();

    let (raw_projects, errs) = read_rows::<RawProjectRow>(&paths.projects)?;
    report.skipped_rows += errs;
    let mut seen = HashSet::new();
    let mut projects = Vec::new();
    for raw in raw_projects {
        report.projects_read += 1;
        let Some(p) = clean_project(raw) else {
            report.skipped_rows += 1;
            continue;
        };
        if !seen.insert(p.key()) {
            report.duplicate_projects += 1;
            continue;
        }
        projects.push(p);
    }
    if projects.is_empty() {
        return Err(ReportError::NoData(format!(
            "no usable projects in {}",
            paths.projects.display()
        )));
    }

    let (raw_activities, errs) = read_rows::<RawActivityRow>(&paths.activities)?;
    report.skipped_rows += errs;
    let mut activities = Vec::new();
    for raw in raw_activities {
        report.activities_read += 1;
        match clean_activity(raw) {
            Some(a) => activities.push(a),
            None => report.skipped_rows += 1,
        }
    }

    let (raw_kpis, errs) = read_rows::<RawKpiRow>(&paths.kpis)?;
    report.skipped_rows += errs;
    let mut kpis = Vec::new();
    for raw in raw_kpis {
        report.kpis_read += 1;
        match clean_kpi(raw) {
            Some(k) => {
                if k.date.is_none() {
                    report.undated_kpis += 1;
                }
                kpis.push(k);
            }
            None => report.skipped_rows += 1,
        }
    }

    if report.skipped_rows > 0 || report.duplicate_projects > 0 {
        warn!(
            skipped = report.skipped_rows,
            duplicates = report.duplicate_projects,
            "some rows were not loaded"
        );
    }
    info!(
        projects = projects.len(),
        activities = activities.len(),
        kpis = kpis.len(),
        undated = report.undated_kpis,
        "dataset loaded"
    );

    let dataset = Dataset {
        projects,
        activities,
        kpis,
        revision,
    };
    Ok((dataset, report))
}
