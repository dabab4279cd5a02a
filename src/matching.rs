//! Resolving which BOQ activity a KPI entry's quantity is priced against.
//!
//! Several activities in one project can share a name across zones, and
//! imported KPI rows are often missing their full project code or zone. The
//! resolver therefore tries an ordered list of strategies, most specific
//! first, and accepts the first one that finds a candidate. An entry that no
//! strategy matches is left unpriced.

use crate::types::{BoqActivity, KpiEntry, Project};
use crate::util::{normalize_code, normalize_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStrategy {
    NameFullCodeZone,
    NameFullCode,
    NameCodeZone,
    NameCode,
    /// Only for entries that carry no project code at all.
    NameOnly,
    /// Only for entries that carry no project code at all.
    NameContains,
}

pub const STRATEGIES: [MatchStrategy; 6] = [
    MatchStrategy::NameFullCodeZone,
    MatchStrategy::NameFullCode,
    MatchStrategy::NameCodeZone,
    MatchStrategy::NameCode,
    MatchStrategy::NameOnly,
    MatchStrategy::NameContains,
];

/// Normalized view of the KPI fields used for matching, computed once per entry.
struct Lookup {
    name: String,
    full_code: Option<String>,
    code: Option<String>,
    zone: Option<String>,
}

impl Lookup {
    fn new(kpi: &KpiEntry) -> Self {
        Lookup {
            name: normalize_text(&kpi.activity_name),
            full_code: kpi.project_full_code.as_deref().map(normalize_code),
            code: kpi.project_code.as_deref().map(normalize_code),
            zone: kpi.zone.clone(),
        }
    }

    fn has_code(&self) -> bool {
        self.full_code.is_some() || self.code.is_some()
    }

    fn prefixes(&self) -> Vec<&str> {
        [self.full_code.as_deref(), self.code.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }
}

impl MatchStrategy {
    fn matches(self, wanted: &Lookup, activity: &BoqActivity) -> bool {
        let activity_name = normalize_text(&activity.name);
        let same_full_code = || {
            wanted
                .full_code
                .as_deref()
                .is_some_and(|c| c == normalize_code(activity.full_code()))
        };
        let same_code = || {
            wanted
                .code
                .as_deref()
                .is_some_and(|c| c == normalize_code(&activity.project_code))
        };
        let same_zone = || {
            let mut prefixes = wanted.prefixes();
            if let Some(full) = activity.project_full_code.as_deref() {
                prefixes.push(full);
            }
            prefixes.push(&activity.project_code);
            match (wanted.zone.as_deref(), activity.zone.as_deref()) {
                (Some(kz), Some(az)) => zones_match(kz, az, &prefixes),
                _ => false,
            }
        };

        match self {
            MatchStrategy::NameFullCodeZone => {
                activity_name == wanted.name && same_full_code() && same_zone()
            }
            MatchStrategy::NameFullCode => activity_name == wanted.name && same_full_code(),
            MatchStrategy::NameCodeZone => activity_name == wanted.name && same_code() && same_zone(),
            MatchStrategy::NameCode => activity_name == wanted.name && same_code(),
            MatchStrategy::NameOnly => !wanted.has_code() && activity_name == wanted.name,
            MatchStrategy::NameContains => {
                !wanted.has_code()
                    && !activity_name.is_empty()
                    && (activity_name.contains(&wanted.name) || wanted.name.contains(&activity_name))
            }
        }
    }
}

/// Remove a redundant leading project code (`"P1 - "`, `"P1 "`, `"P1-"`)
/// from a zone label. Comparison is case-insensitive; the result is uppercase.
pub fn strip_zone_prefix(zone: &str, project_codes: &[&str]) -> String {
    let upper = normalize_code(zone);
    for code in project_codes {
        let code = normalize_code(code);
        if code.is_empty() {
            continue;
        }
        for prefix in [format!("{} - ", code), format!("{} ", code), format!("{}-", code)] {
            if let Some(rest) = upper.strip_prefix(&prefix) {
                return rest.trim().to_string();
            }
        }
    }
    upper
}

/// Zones match when, after prefix stripping, they are equal or one contains the other.
pub fn zones_match(kpi_zone: &str, activity_zone: &str, project_codes: &[&str]) -> bool {
    let k = strip_zone_prefix(kpi_zone, project_codes);
    let a = strip_zone_prefix(activity_zone, project_codes);
    if k.is_empty() || a.is_empty() {
        return false;
    }
    k == a || k.contains(&a) || a.contains(&k)
}

/// Find the activity a KPI entry is priced against, with the strategy that found it.
pub fn resolve_activity<'a>(
    kpi: &KpiEntry,
    candidates: &[&'a BoqActivity],
) -> Option<(&'a BoqActivity, MatchStrategy)> {
    let wanted = Lookup::new(kpi);
    if wanted.name.is_empty() {
        return None;
    }
    STRATEGIES.iter().find_map(|strategy| {
        candidates
            .iter()
            .find(|a| strategy.matches(&wanted, a))
            .map(|a| (*a, *strategy))
    })
}

/// Whether a BOQ activity is part of the project's contract.
///
/// The full code decides when the activity has one; otherwise the database id
/// and then the short code are consulted.
pub fn activity_belongs_to(project: &Project, activity: &BoqActivity) -> bool {
    if let Some(full) = activity.project_full_code.as_deref() {
        return normalize_code(full) == normalize_code(&project.full_code);
    }
    if let (Some(pid), Some(id)) = (activity.project_id.as_deref(), project.id.as_deref()) {
        return pid.trim() == id.trim();
    }
    normalize_code(&activity.project_code) == normalize_code(&project.full_code)
}
