//! Pricing a single KPI entry: unit rate, monetary amount, and the
//! virtual-material surcharge on top of it.

use crate::types::{BoqActivity, KpiEntry, Project};
use crate::util::{parse_f64_safe, positive};

/// Unit rate for a matched activity.
///
/// The contracted total value over total units wins when both are positive;
/// the explicit rate column is the fallback.
pub fn resolve_rate(activity: &BoqActivity) -> f64 {
    if activity.total_units > 0.0 && activity.total_value > 0.0 {
        let derived = activity.total_value / activity.total_units;
        if derived.is_finite() {
            return derived;
        }
    }
    if activity.rate.is_finite() {
        activity.rate
    } else {
        0.0
    }
}

/// Monetary amount of one KPI entry.
///
/// Order: quantity x rate, then the entry's explicit value, then its
/// type-specific fallback value. An entry with no matched activity is worth 0
/// whatever value columns it carries.
pub fn compute_value(kpi: &KpiEntry, activity: Option<&BoqActivity>, rate: f64) -> f64 {
    if activity.is_none() {
        return 0.0;
    }
    if rate > 0.0 && kpi.quantity > 0.0 {
        let priced = kpi.quantity * rate;
        if priced.is_finite() && priced > 0.0 {
            return priced;
        }
    }
    positive(kpi.explicit_value)
        .or_else(|| positive(kpi.fallback_value))
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// How a stored virtual-material figure should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentUnit {
    Percent,
    Fraction,
}

impl PercentUnit {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percent" | "pct" | "%" => Some(PercentUnit::Percent),
            "fraction" | "ratio" => Some(PercentUnit::Fraction),
            _ => None,
        }
    }
}

/// Normalize a stored virtual-material figure to a 0-100 percentage.
///
/// `%` signs, commas and whitespace are stripped first. An explicit unit fixes
/// the interpretation; without one, values in `(0, 1]` are read as fractions
/// and anything else as a percent, so `"0.5%"` is 50.
pub fn normalize_percentage(raw: Option<&str>, unit: Option<PercentUnit>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '%' && *c != ',' && !c.is_whitespace())
        .collect();
    let Some(value) = parse_f64_safe(Some(&cleaned)) else {
        return 0.0;
    };
    match unit {
        Some(PercentUnit::Percent) => value,
        Some(PercentUnit::Fraction) => value * 100.0,
        None if value > 0.0 && value <= 1.0 => value * 100.0,
        None => value,
    }
}

/// Surcharge for activities that pass material cost through.
pub fn virtual_material_surcharge(percentage: f64, activity: &BoqActivity, base: f64) -> f64 {
    if percentage <= 0.0 || !activity.use_virtual_material || base <= 0.0 {
        return 0.0;
    }
    base * (percentage / 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Valuation {
    pub base: f64,
    pub surcharge: f64,
}

/// Rate, value, and surcharge for an entry already resolved to `activity`.
pub fn value_entry(project: &Project, kpi: &KpiEntry, activity: &BoqActivity) -> Valuation {
    let rate = resolve_rate(activity);
    let base = compute_value(kpi, Some(activity), rate);
    Valuation {
        base,
        surcharge: virtual_material_surcharge(project.virtual_material_pct, activity, base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputType;

    fn activity(total_value: f64, total_units: f64, rate: f64, vm: bool) -> BoqActivity {
        BoqActivity {
            id: None,
            project_id: None,
            project_code: "P1".into(),
            project_full_code: Some("P1".into()),
            name: "A1".into(),
            division: None,
            zone: None,
            total_value,
            total_units,
            rate,
            use_virtual_material: vm,
        }
    }

    fn entry(quantity: f64, explicit: Option<f64>, fallback: Option<f64>) -> KpiEntry {
        KpiEntry {
            input_type: InputType::Actual,
            quantity,
            explicit_value: explicit,
            fallback_value: fallback,
            activity_name: "A1".into(),
            project_code: Some("P1".into()),
            project_full_code: None,
            zone: None,
            date: None,
        }
    }

    #[test]
    fn derived_rate_beats_explicit_rate() {
        assert_eq!(resolve_rate(&activity(50_000.0, 500.0, 80.0, false)), 100.0);
        assert_eq!(resolve_rate(&activity(0.0, 500.0, 80.0, false)), 80.0);
        assert_eq!(resolve_rate(&activity(50_000.0, 0.0, 0.0, false)), 0.0);
    }

    #[test]
    fn quantity_times_rate_comes_first() {
        let a = activity(50_000.0, 500.0, 0.0, false);
        assert_eq!(compute_value(&entry(10.0, Some(999.0), None), Some(&a), 100.0), 1000.0);
    }

    #[test]
    fn explicit_value_used_when_quantity_is_zero() {
        let a = activity(50_000.0, 500.0, 0.0, false);
        assert_eq!(compute_value(&entry(0.0, Some(500.0), Some(70.0)), Some(&a), 100.0), 500.0);
        assert_eq!(compute_value(&entry(0.0, None, Some(70.0)), Some(&a), 100.0), 70.0);
        assert_eq!(compute_value(&entry(0.0, None, None), Some(&a), 100.0), 0.0);
    }

    #[test]
    fn unmatched_entries_are_worth_nothing() {
        assert_eq!(compute_value(&entry(10.0, Some(500.0), Some(70.0)), None, 100.0), 0.0);
    }

    #[test]
    fn percentage_normalization() {
        assert_eq!(normalize_percentage(Some("10%"), None), 10.0);
        assert_eq!(normalize_percentage(Some("0.1"), None), 10.0);
        assert_eq!(normalize_percentage(Some(" 12.5 "), None), 12.5);
        assert_eq!(normalize_percentage(Some("1"), None), 100.0);
        assert_eq!(normalize_percentage(Some("1"), Some(PercentUnit::Percent)), 1.0);
        assert_eq!(normalize_percentage(Some("0.5%"), None), 50.0);
        assert_eq!(normalize_percentage(Some("0.5%"), Some(PercentUnit::Percent)), 0.5);
        assert_eq!(normalize_percentage(Some("15"), Some(PercentUnit::Fraction)), 1500.0);
        assert_eq!(normalize_percentage(Some("abc"), None), 0.0);
        assert_eq!(normalize_percentage(None, None), 0.0);
    }

    #[test]
    fn surcharge_needs_flag_and_percentage() {
        assert_eq!(virtual_material_surcharge(10.0, &activity(0.0, 0.0, 0.0, true), 1000.0), 100.0);
        assert_eq!(virtual_material_surcharge(10.0, &activity(0.0, 0.0, 0.0, false), 1000.0), 0.0);
        assert_eq!(virtual_material_surcharge(0.0, &activity(0.0, 0.0, 0.0, true), 1000.0), 0.0);
    }
}
