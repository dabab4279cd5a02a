//! Grand totals per project and across projects.
//!
//! Every total here is read from the per-project period vectors produced by
//! the aggregator; nothing is recomputed from KPI data, so table rows and
//! summary figures cannot drift apart.

use crate::types::{AggregationResult, ProjectAggregation, ProjectTotals, Rollup};

pub fn project_totals(result: &AggregationResult, include_virtual_material: bool) -> ProjectTotals {
    let earned: f64 = result.earned.iter().sum();
    let planned: f64 = result.planned.iter().sum();
    let virtual_material: f64 = result.virtual_material.iter().sum();
    let planned_virtual_material: f64 = result.planned_virtual_material.iter().sum();

    let mut grand_total_earned = earned + result.outer_range_value;
    let mut grand_total_planned = planned + result.outer_range_planned_value;
    if include_virtual_material {
        grand_total_earned += virtual_material + result.outer_range_virtual_material_amount;
        grand_total_planned +=
            planned_virtual_material + result.outer_range_planned_virtual_material_amount;
    }

    ProjectTotals {
        earned,
        planned,
        virtual_material,
        planned_virtual_material,
        grand_total_earned,
        grand_total_planned,
    }
}

pub fn build_rollup(
    projects: &[ProjectAggregation],
    period_count: usize,
    include_virtual_material: bool,
) -> Rollup {
    let mut rollup = Rollup {
        period_earned_value_totals: vec![0.0; period_count],
        period_planned_value_totals: vec![0.0; period_count],
        ..Default::default()
    };

    for p in projects {
        rollup.total_contract_value += p.contract_amount;
        rollup.total_earned_value += p.totals.grand_total_earned;
        rollup.total_planned_value += p.totals.grand_total_planned;
        rollup.total_virtual_material_amount +=
            p.totals.virtual_material + p.result.outer_range_virtual_material_amount;
        rollup.total_planned_virtual_material_amount += p.totals.planned_virtual_material
            + p.result.outer_range_planned_virtual_material_amount;

        for i in 0..period_count {
            let mut earned = p.result.earned.get(i).copied().unwrap_or(0.0);
            let mut planned = p.result.planned.get(i).copied().unwrap_or(0.0);
            if include_virtual_material {
                earned += p.result.virtual_material.get(i).copied().unwrap_or(0.0);
                planned += p.result.planned_virtual_material.get(i).copied().unwrap_or(0.0);
            }
            rollup.period_earned_value_totals[i] += earned;
            rollup.period_planned_value_totals[i] += planned;
        }
    }
    rollup
}

/// Running total over period values, for cumulative columns and charts.
pub fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProjectKey;

    fn aggregation(name: &str, contract: f64, result: AggregationResult, vm: bool) -> ProjectAggregation {
        let totals = project_totals(&result, vm);
        ProjectAggregation {
            key: ProjectKey::new(name, name),
            contract_amount: contract,
            currency: "USD".into(),
            result,
            totals,
        }
    }

    fn sample() -> AggregationResult {
        AggregationResult {
            earned: vec![1000.0, 250.5],
            planned: vec![900.0, 300.0],
            virtual_material: vec![100.0, 25.05],
            planned_virtual_material: vec![90.0, 30.0],
            outer_range_value: 40.0,
            outer_range_planned_value: 60.0,
            outer_range_virtual_material_amount: 4.0,
            outer_range_planned_virtual_material_amount: 6.0,
        }
    }

    #[test]
    fn grand_total_includes_virtual_material_only_when_enabled() {
        let r = sample();
        let plain = project_totals(&r, false);
        assert_eq!(plain.grand_total_earned, (1000.0 + 250.5) + 40.0);
        let with_vm = project_totals(&r, true);
        assert_eq!(
            with_vm.grand_total_earned,
            (1000.0 + 250.5) + 40.0 + ((100.0 + 25.05) + 4.0)
        );
        assert_eq!(with_vm.grand_total_planned, 1200.0 + 60.0 + (120.0 + 6.0));
    }

    #[test]
    fn cross_project_totals_sum_project_grand_totals() {
        let a = aggregation("P1", 100_000.0, sample(), true);
        let b = aggregation("P2", 50_000.0, AggregationResult::zeroed(2), true);
        let rollup = build_rollup(&[a.clone(), b.clone()], 2, true);
        assert_eq!(rollup.total_contract_value, 150_000.0);
        assert_eq!(
            rollup.total_earned_value,
            a.totals.grand_total_earned + b.totals.grand_total_earned
        );
        assert_eq!(rollup.period_earned_value_totals, vec![1100.0, 250.5 + 25.05]);
        assert_eq!(rollup.total_virtual_material_amount, (100.0 + 25.05) + 4.0);
    }

    #[test]
    fn cumulative_is_a_prefix_sum() {
        assert_eq!(cumulative(&[1.0, 2.0, 3.5]), vec![1.0, 3.0, 6.5]);
        assert!(cumulative(&[]).is_empty());
    }
}
