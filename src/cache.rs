//! Memoized reports keyed by every input that shapes them.

use chrono::{Datelike, NaiveDate};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::aggregate::build_report;
use crate::config::{Granularity, ReportConfig};
use crate::division::DivisionFilter;
use crate::types::{BoqActivity, Dataset, KpiEntry, Project, Report};

/// Length-prefixed field encoding over SHA-256, so adjacent fields can never
/// run together into the same byte stream.
struct Fingerprint(Sha256);

impl Fingerprint {
    fn text(&mut self, s: &str) {
        self.0.update((s.len() as u64).to_le_bytes());
        self.0.update(s.as_bytes());
    }

    fn opt_text(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.0.update([1u8]);
                self.text(s);
            }
            None => self.0.update([0u8]),
        }
    }

    fn num(&mut self, n: f64) {
        self.0.update(n.to_bits().to_le_bytes());
    }

    fn opt_num(&mut self, n: Option<f64>) {
        self.flag(n.is_some());
        if let Some(n) = n {
            self.num(n);
        }
    }

    fn flag(&mut self, b: bool) {
        self.0.update([b as u8]);
    }

    fn date(&mut self, d: Option<NaiveDate>) {
        match d {
            Some(d) => {
                self.0.update([1u8]);
                self.0.update(d.num_days_from_ce().to_le_bytes());
            }
            None => self.0.update([0u8]),
        }
    }

    fn project(&mut self, p: &Project) {
        self.opt_text(p.id.as_deref());
        self.text(&p.code);
        self.opt_text(p.sub_code.as_deref());
        self.text(&p.full_code);
        self.text(&p.name);
        self.num(p.contract_amount);
        self.text(&p.currency);
        self.num(p.virtual_material_pct);
    }

    fn activity(&mut self, a: &BoqActivity) {
        self.opt_text(a.id.as_deref());
        self.opt_text(a.project_id.as_deref());
        self.text(&a.project_code);
        self.opt_text(a.project_full_code.as_deref());
        self.text(&a.name);
        self.opt_text(a.division.as_deref());
        self.opt_text(a.zone.as_deref());
        self.num(a.total_value);
        self.num(a.total_units);
        self.num(a.rate);
        self.flag(a.use_virtual_material);
    }

    fn kpi(&mut self, k: &KpiEntry) {
        self.text(k.input_type.as_str());
        self.num(k.quantity);
        self.opt_num(k.explicit_value);
        self.opt_num(k.fallback_value);
        self.text(&k.activity_name);
        self.opt_text(k.project_code.as_deref());
        self.opt_text(k.project_full_code.as_deref());
        self.opt_text(k.zone.as_deref());
        self.date(k.date);
    }
}

/// SHA-256 hex digest over every project, activity and KPI entry in order.
pub fn dataset_fingerprint(dataset: &Dataset) -> String {
    let mut fp = Fingerprint(Sha256::new());
    fp.0.update((dataset.projects.len() as u64).to_le_bytes());
    for p in &dataset.projects {
        fp.project(p);
    }
    fp.0.update((dataset.activities.len() as u64).to_le_bytes());
    for a in &dataset.activities {
        fp.activity(a);
    }
    fp.0.update((dataset.kpis.len() as u64).to_le_bytes());
    for k in &dataset.kpis {
        fp.kpi(k);
    }
    format!("{:x}", fp.0.finalize())
}

/// Everything a report depends on. The dataset enters by revision and by a
/// content digest, so a hand-built dataset reusing a revision still misses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub dataset_revision: u64,
    pub dataset_fingerprint: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub granularity: Granularity,
    pub divisions: Vec<String>,
    pub show_virtual_material: bool,
    pub view_planned: bool,
    pub outer_range_start: Option<NaiveDate>,
    pub today: NaiveDate,
}

impl ReportKey {
    pub fn new(dataset: &Dataset, config: &ReportConfig, today: NaiveDate) -> Self {
        ReportKey {
            dataset_revision: dataset.revision,
            dataset_fingerprint: dataset_fingerprint(dataset),
            start: config.date_range.start,
            end: config.date_range.end,
            granularity: config.period_type,
            divisions: DivisionFilter::new(&config.selected_divisions).names(),
            show_virtual_material: config.show_virtual_material_values,
            view_planned: config.view_planned_value,
            outer_range_start: config.outer_range_start,
            today: config.today.unwrap_or(today),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReportCache {
    entries: HashMap<ReportKey, Arc<Report>>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_build(
        &mut self,
        dataset: &Dataset,
        config: &ReportConfig,
        today: NaiveDate,
    ) -> Arc<Report> {
        let key = ReportKey::new(dataset, config, today);
        if let Some(hit) = self.entries.get(&key) {
            debug!(revision = key.dataset_revision, "report cache hit");
            return Arc::clone(hit);
        }
        debug!(revision = key.dataset_revision, "report cache miss");
        let report = Arc::new(build_report(dataset, config, today));
        self.entries.insert(key, Arc::clone(&report));
        report
    }

    /// Drop everything, e.g. after a new dataset is loaded.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }
}
