//! Period aggregation of earned and planned value.
//!
//! For each project the KPI entries are dated, placed into a report period or
//! the outer range, resolved to an activity, priced, and summed. The whole
//! computation is a pure function of the dataset, the configuration, and the
//! effective "today".

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::ReportConfig;
use crate::division::DivisionFilter;
use crate::matching::{activity_belongs_to, resolve_activity};
use crate::periods::{generate_periods, Period};
use crate::rollup::{build_rollup, project_totals};
use crate::types::{
    AggregationResult, BoqActivity, Dataset, InputType, KpiEntry, Project, ProjectAggregation,
    Report,
};
use crate::util::normalize_code;
use crate::valuation::value_entry;

/// A project with the activities and KPI entries routed to it.
#[derive(Debug)]
pub struct ProjectSlice<'a> {
    pub project: &'a Project,
    pub activities: Vec<&'a BoqActivity>,
    pub kpis: Vec<&'a KpiEntry>,
}

/// Project -> activities and project -> KPI entries, built once per dataset.
#[derive(Debug)]
pub struct DatasetIndex<'a> {
    pub slices: Vec<ProjectSlice<'a>>,
    pub unrouted_kpis: usize,
}

impl<'a> DatasetIndex<'a> {
    pub fn build(dataset: &'a Dataset) -> Self {
        let projects = &dataset.projects;
        let mut slices: Vec<ProjectSlice<'a>> = projects
            .iter()
            .map(|project| ProjectSlice {
                project,
                activities: Vec::new(),
                kpis: Vec::new(),
            })
            .collect();

        for activity in &dataset.activities {
            if let Some(i) = activity_owner(activity, projects) {
                slices[i].activities.push(activity);
            }
        }

        let mut by_full_code: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_code: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, p) in projects.iter().enumerate() {
            by_full_code.entry(normalize_code(&p.full_code)).or_default().push(i);
            by_code.entry(normalize_code(&p.code)).or_default().push(i);
        }

        let mut unrouted_kpis = 0usize;
        for kpi in &dataset.kpis {
            let routed = route_kpi(kpi, projects, &by_full_code, &by_code, &slices);
            match routed {
                Some(i) => slices[i].kpis.push(kpi),
                None => unrouted_kpis += 1,
            }
        }

        DatasetIndex {
            slices,
            unrouted_kpis,
        }
    }
}

/// The single project an activity is attached to.
///
/// Projects can share a full code under different names. Among those, the one
/// whose id the activity names wins, then the first in load order.
fn activity_owner(activity: &BoqActivity, projects: &[Project]) -> Option<usize> {
    let owners: Vec<usize> = projects
        .iter()
        .enumerate()
        .filter(|(_, p)| activity_belongs_to(p, activity))
        .map(|(i, _)| i)
        .collect();
    let by_id = activity.project_id.as_deref().and_then(|pid| {
        owners
            .iter()
            .copied()
            .find(|i| projects[*i].id.as_deref().map(str::trim) == Some(pid.trim()))
    });
    by_id.or_else(|| owners.first().copied())
}

/// First candidate project that owns an activity the entry resolves to.
fn first_resolving(
    kpi: &KpiEntry,
    candidates: &[usize],
    slices: &[ProjectSlice<'_>],
) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .find(|i| resolve_activity(kpi, &slices[*i].activities).is_some())
}

/// Each KPI entry goes to at most one project so it can never be counted twice.
///
/// When a code names several projects, the entry follows its activity: the
/// first of them that owns a resolving activity takes it.
fn route_kpi(
    kpi: &KpiEntry,
    projects: &[Project],
    by_full_code: &HashMap<String, Vec<usize>>,
    by_code: &HashMap<String, Vec<usize>>,
    slices: &[ProjectSlice<'_>],
) -> Option<usize> {
    if let Some(full) = kpi.project_full_code.as_deref() {
        if let Some(candidates) = by_full_code.get(&normalize_code(full)) {
            return first_resolving(kpi, candidates, slices).or_else(|| candidates.first().copied());
        }
    }
    if let Some(code) = kpi.project_code.as_deref() {
        let code = normalize_code(code);
        let candidates = by_code.get(&code)?;
        return first_resolving(kpi, candidates, slices)
            .or_else(|| {
                candidates
                    .iter()
                    .copied()
                    .find(|i| normalize_code(&projects[*i].full_code) == code)
            })
            .or_else(|| candidates.first().copied());
    }
    if kpi.project_full_code.is_some() {
        return None;
    }
    // No project signal at all: the first project that owns a matching activity.
    slices
        .iter()
        .position(|s| resolve_activity(kpi, &s.activities).is_some())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Period(usize),
    Outer,
}

/// Where dated entries land: a report period, the outer range, or nowhere.
#[derive(Debug, Clone)]
pub struct Window<'p> {
    periods: &'p [Period],
    outer_start: Option<NaiveDate>,
    outer_end_exclusive: Option<NaiveDate>,
    today: NaiveDate,
}

impl<'p> Window<'p> {
    pub fn new(
        periods: &'p [Period],
        report_start: Option<NaiveDate>,
        outer_start: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        let first = periods.first().map(|p| p.start);
        let outer_end_exclusive = match (report_start, first) {
            (Some(s), Some(f)) => Some(s.min(f)),
            (s, f) => s.or(f),
        };
        Window {
            periods,
            outer_start,
            outer_end_exclusive,
            today,
        }
    }

    fn locate(&self, date: NaiveDate) -> Option<Slot> {
        if date > self.today {
            return None;
        }
        if let (Some(first), Some(last)) = (self.periods.first(), self.periods.last()) {
            if first.start <= date && date <= last.end {
                let idx = self.periods.partition_point(|p| p.end < date);
                return self
                    .periods
                    .get(idx)
                    .filter(|p| p.contains(date))
                    .map(|_| Slot::Period(idx));
            }
        }
        let end = self.outer_end_exclusive?;
        let after_start = self.outer_start.map_or(true, |s| date >= s);
        if date < end && after_start {
            Some(Slot::Outer)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchStats {
    pub matched: usize,
    pub unmatched: usize,
    pub undated: usize,
    pub out_of_range: usize,
    pub skipped_planned: usize,
}

/// Value one project's KPI entries into the window's periods and outer range.
pub fn aggregate_project(
    slice: &ProjectSlice<'_>,
    filter: &DivisionFilter,
    window: &Window<'_>,
    include_planned: bool,
) -> (AggregationResult, MatchStats) {
    let activities = filter.apply(&slice.activities);
    let mut result = AggregationResult::zeroed(window.periods.len());
    let mut stats = MatchStats::default();

    for kpi in &slice.kpis {
        if kpi.input_type == InputType::Planned && !include_planned {
            stats.skipped_planned += 1;
            continue;
        }
        let Some(date) = kpi.date else {
            stats.undated += 1;
            continue;
        };
        let Some(slot) = window.locate(date) else {
            stats.out_of_range += 1;
            continue;
        };
        let Some((activity, _strategy)) = resolve_activity(kpi, &activities) else {
            stats.unmatched += 1;
            continue;
        };
        stats.matched += 1;

        let valuation = value_entry(slice.project, kpi, activity);
        match (kpi.input_type, slot) {
            (InputType::Actual, Slot::Period(i)) => {
                result.earned[i] += valuation.base;
                result.virtual_material[i] += valuation.surcharge;
            }
            (InputType::Planned, Slot::Period(i)) => {
                result.planned[i] += valuation.base;
                result.planned_virtual_material[i] += valuation.surcharge;
            }
            (InputType::Actual, Slot::Outer) => {
                result.outer_range_value += valuation.base;
                result.outer_range_virtual_material_amount += valuation.surcharge;
            }
            (InputType::Planned, Slot::Outer) => {
                result.outer_range_planned_value += valuation.base;
                result.outer_range_planned_virtual_material_amount += valuation.surcharge;
            }
        }
    }
    (result, stats)
}

/// Build the full report. `today` is used unless the configuration pins one.
pub fn build_report(dataset: &Dataset, config: &ReportConfig, today: NaiveDate) -> Report {
    let today = config.today.unwrap_or(today);
    let periods = generate_periods(
        config.date_range.start,
        config.date_range.end,
        config.period_type,
    );
    let filter = DivisionFilter::new(&config.selected_divisions);
    let index = DatasetIndex::build(dataset);
    let window = Window::new(
        &periods,
        config.date_range.start,
        config.outer_range_start,
        today,
    );
    let include_vm = config.show_virtual_material_values;

    let mut totals = MatchStats::default();
    let projects: Vec<ProjectAggregation> = index
        .slices
        .iter()
        .map(|slice| {
            let (result, stats) =
                aggregate_project(slice, &filter, &window, config.view_planned_value);
            debug!(
                project = %slice.project.full_code,
                activities = slice.activities.len(),
                kpis = slice.kpis.len(),
                matched = stats.matched,
                unmatched = stats.unmatched,
                undated = stats.undated,
                out_of_range = stats.out_of_range,
                "aggregated project"
            );
            totals.matched += stats.matched;
            totals.unmatched += stats.unmatched;
            totals.undated += stats.undated;
            totals.out_of_range += stats.out_of_range;
            ProjectAggregation {
                key: slice.project.key(),
                contract_amount: slice.project.contract_amount,
                currency: slice.project.currency.clone(),
                totals: project_totals(&result, include_vm),
                result,
            }
        })
        .collect();

    info!(
        projects = projects.len(),
        periods = periods.len(),
        matched = totals.matched,
        unmatched = totals.unmatched,
        undated = totals.undated,
        unrouted = index.unrouted_kpis,
        "report aggregated"
    );

    let rollup = build_rollup(&projects, periods.len(), include_vm);
    Report {
        periods,
        projects,
        rollup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Granularity;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn project(code: &str, sub: Option<&str>) -> Project {
        let full = match sub {
            Some(s) => format!("{}-{}", code, s),
            None => code.to_string(),
        };
        Project {
            id: None,
            code: code.into(),
            sub_code: sub.map(String::from),
            full_code: full.clone(),
            name: format!("Project {}", full),
            contract_amount: 1000.0,
            currency: "USD".into(),
            virtual_material_pct: 0.0,
        }
    }

    fn activity(full: &str, name: &str) -> BoqActivity {
        BoqActivity {
            id: None,
            project_id: None,
            project_code: full.split('-').next().unwrap_or(full).into(),
            project_full_code: Some(full.into()),
            name: name.into(),
            division: None,
            zone: None,
            total_value: 1000.0,
            total_units: 10.0,
            rate: 0.0,
            use_virtual_material: false,
        }
    }

    fn kpi(code: Option<&str>, full: Option<&str>, name: &str, date: NaiveDate) -> KpiEntry {
        KpiEntry {
            input_type: InputType::Actual,
            quantity: 1.0,
            explicit_value: None,
            fallback_value: None,
            activity_name: name.into(),
            project_code: code.map(String::from),
            project_full_code: full.map(String::from),
            zone: None,
            date: Some(date),
        }
    }

    #[test]
    fn short_code_entries_route_to_a_single_project() {
        let dataset = Dataset {
            projects: vec![project("P1", Some("A")), project("P1", Some("B"))],
            activities: vec![activity("P1-A", "Paint"), activity("P1-B", "Paint")],
            kpis: vec![kpi(Some("P1"), None, "Paint", d(2024, 1, 5))],
            revision: 1,
        };
        let index = DatasetIndex::build(&dataset);
        assert_eq!(index.slices[0].kpis.len(), 1);
        assert_eq!(index.slices[1].kpis.len(), 0);
        assert_eq!(index.slices[0].activities.len(), 1);
    }

    #[test]
    fn short_code_entries_follow_their_activity_across_sub_projects() {
        let mut tiling = kpi(Some("P1"), None, "Tiling", d(2024, 1, 5));
        tiling.quantity = 2.0;
        let mut tiles = activity("P1-B", "Tiling");
        tiles.total_value = 0.0;
        tiles.rate = 100.0;
        let dataset = Dataset {
            projects: vec![project("P1", Some("A")), project("P1", Some("B"))],
            activities: vec![activity("P1-A", "Paint"), tiles],
            kpis: vec![tiling],
            revision: 1,
        };
        let index = DatasetIndex::build(&dataset);
        assert_eq!(index.slices[0].kpis.len(), 0);
        assert_eq!(index.slices[1].kpis.len(), 1);

        let mut config = ReportConfig::default();
        config.date_range.start = Some(d(2024, 1, 1));
        config.date_range.end = Some(d(2024, 1, 31));
        let report = build_report(&dataset, &config, d(2024, 6, 1));
        assert_eq!(report.projects[0].result.earned, vec![0.0]);
        assert_eq!(report.projects[1].result.earned, vec![200.0]);
        assert_eq!(report.rollup.total_earned_value, 200.0);
    }

    #[test]
    fn unmatched_short_code_entries_prefer_the_bare_code_project() {
        let dataset = Dataset {
            projects: vec![project("P1", Some("A")), project("P1", None)],
            activities: vec![activity("P1-A", "Paint")],
            kpis: vec![kpi(Some("P1"), None, "Grout", d(2024, 1, 5))],
            revision: 1,
        };
        let index = DatasetIndex::build(&dataset);
        assert_eq!(index.slices[1].kpis.len(), 1);
        assert_eq!(index.unrouted_kpis, 0);
    }

    #[test]
    fn shared_full_code_keeps_activities_and_entries_together() {
        let mut first = project("P1", None);
        first.id = Some("1".into());
        first.name = "North Wing".into();
        let mut second = project("P1", None);
        second.id = Some("2".into());
        second.name = "South Wing".into();

        let mut paint = activity("P1", "Paint");
        paint.project_id = Some("2".into());
        let dataset = Dataset {
            projects: vec![first, second],
            activities: vec![paint, activity("P1", "Tiling")],
            kpis: vec![
                kpi(None, Some("P1"), "Paint", d(2024, 1, 5)),
                kpi(None, Some("P1"), "Tiling", d(2024, 1, 5)),
            ],
            revision: 1,
        };
        let index = DatasetIndex::build(&dataset);
        let names = |i: usize| {
            index.slices[i]
                .activities
                .iter()
                .map(|a| a.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(0), vec!["Tiling"]);
        assert_eq!(names(1), vec!["Paint"]);
        assert_eq!(index.slices[0].kpis[0].activity_name, "Tiling");
        assert_eq!(index.slices[1].kpis[0].activity_name, "Paint");

        let mut config = ReportConfig::default();
        config.date_range.start = Some(d(2024, 1, 1));
        config.date_range.end = Some(d(2024, 1, 31));
        let report = build_report(&dataset, &config, d(2024, 6, 1));
        assert_eq!(report.projects[0].result.earned, vec![100.0]);
        assert_eq!(report.projects[1].result.earned, vec![100.0]);
    }

    #[test]
    fn codeless_entries_route_by_activity_name() {
        let dataset = Dataset {
            projects: vec![project("P1", None), project("P2", None)],
            activities: vec![activity("P1", "Paint"), activity("P2", "Tiling")],
            kpis: vec![
                kpi(None, None, "tiling", d(2024, 1, 5)),
                kpi(None, Some("P9"), "Paint", d(2024, 1, 5)),
            ],
            revision: 1,
        };
        let index = DatasetIndex::build(&dataset);
        assert_eq!(index.slices[1].kpis.len(), 1);
        assert_eq!(index.unrouted_kpis, 1);
    }

    #[test]
    fn window_places_dates_in_periods_outer_range_or_nowhere() {
        let periods = generate_periods(Some(d(2024, 3, 1)), Some(d(2024, 4, 30)), Granularity::Monthly);
        let window = Window::new(&periods, Some(d(2024, 3, 1)), Some(d(2024, 1, 1)), d(2024, 4, 10));
        assert_eq!(window.locate(d(2024, 3, 31)), Some(Slot::Period(0)));
        assert_eq!(window.locate(d(2024, 4, 10)), Some(Slot::Period(1)));
        assert_eq!(window.locate(d(2024, 4, 11)), None);
        assert_eq!(window.locate(d(2024, 2, 29)), Some(Slot::Outer));
        assert_eq!(window.locate(d(2023, 12, 31)), None);
    }

    #[test]
    fn outer_range_ends_before_the_first_aligned_bucket() {
        // Weekly buckets start on Monday 2024-03-04 even though the report starts on the 6th.
        let periods = generate_periods(Some(d(2024, 3, 6)), Some(d(2024, 3, 20)), Granularity::Weekly);
        let window = Window::new(&periods, Some(d(2024, 3, 6)), None, d(2024, 12, 31));
        assert_eq!(window.locate(d(2024, 3, 4)), Some(Slot::Period(0)));
        assert_eq!(window.locate(d(2024, 3, 3)), Some(Slot::Outer));
        assert_eq!(window.locate(d(2020, 1, 1)), Some(Slot::Outer));
    }

    #[test]
    fn planned_entries_skipped_unless_requested() {
        let mut planned = kpi(Some("P1"), Some("P1"), "Paint", d(2024, 1, 5));
        planned.input_type = InputType::Planned;
        let dataset = Dataset {
            projects: vec![project("P1", None)],
            activities: vec![activity("P1", "Paint")],
            kpis: vec![planned],
            revision: 1,
        };
        let mut config = ReportConfig::default();
        config.date_range.start = Some(d(2024, 1, 1));
        config.date_range.end = Some(d(2024, 1, 31));

        let hidden = build_report(&dataset, &config, d(2024, 6, 1));
        assert_eq!(hidden.projects[0].result.planned, vec![0.0]);

        config.view_planned_value = true;
        let shown = build_report(&dataset, &config, d(2024, 6, 1));
        assert_eq!(shown.projects[0].result.planned, vec![100.0]);
        assert_eq!(shown.rollup.total_planned_value, 100.0);
    }
}
