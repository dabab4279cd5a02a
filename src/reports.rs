// Report tables built from an aggregated `Report`.
//
// The revenue table has one column per period, so it is kept as rows of
// pre-formatted strings rather than a fixed `Tabled` struct. The summary is a
// short list of metric/value rows for the console and CSV export.
use crate::config::ReportConfig;
use crate::rollup::cumulative;
use crate::types::{ProjectAggregation, Report, ReportTable, Rollup, SummaryRow};
use crate::util::format_number;

fn stream_cells<'a>(
    values: &'a [f64],
    vm: &'a [f64],
    include_vm: bool,
) -> impl Iterator<Item = f64> + 'a {
    values.iter().enumerate().map(move |(i, v)| {
        if include_vm {
            v + vm.get(i).copied().unwrap_or(0.0)
        } else {
            *v
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Earned,
    Planned,
}

impl Stream {
    fn label(self) -> &'static str {
        match self {
            Stream::Earned => "Earned",
            Stream::Planned => "Planned",
        }
    }
}

fn project_row(p: &ProjectAggregation, stream: Stream, include_vm: bool) -> Vec<String> {
    let r = &p.result;
    let (values, vm, outer, outer_vm, grand) = match stream {
        Stream::Planned => (
            &r.planned,
            &r.planned_virtual_material,
            r.outer_range_planned_value,
            r.outer_range_planned_virtual_material_amount,
            p.totals.grand_total_planned,
        ),
        Stream::Earned => (
            &r.earned,
            &r.virtual_material,
            r.outer_range_value,
            r.outer_range_virtual_material_amount,
            p.totals.grand_total_earned,
        ),
    };
    let outer = if include_vm { outer + outer_vm } else { outer };

    let mut row = vec![
        p.key.full_code.clone(),
        p.key.name.clone(),
        stream.label().to_string(),
        format_number(p.contract_amount, 2),
        format_number(outer, 2),
    ];
    row.extend(stream_cells(values, vm, include_vm).map(|v| format_number(v, 2)));
    row.push(format_number(grand, 2));
    row
}

/// Monthly Work Revenue table: one row per project and stream, one column
/// per period, followed by total and cumulative rows.
pub fn build_revenue_table(report: &Report, config: &ReportConfig) -> ReportTable {
    let include_vm = config.show_virtual_material_values;
    let mut headers: Vec<String> = [
        "Project Code",
        "Project Name",
        "Stream",
        "Contract Amount",
        "Outer Range",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    headers.extend(report.periods.iter().map(|p| p.label.clone()));
    headers.push("Grand Total".to_string());

    let mut rows = Vec::new();
    for p in &report.projects {
        rows.push(project_row(p, Stream::Earned, include_vm));
        if config.view_planned_value {
            rows.push(project_row(p, Stream::Planned, include_vm));
        }
    }

    let rollup = &report.rollup;
    let outer_total: f64 = report
        .projects
        .iter()
        .map(|p| {
            let r = &p.result;
            if include_vm {
                r.outer_range_value + r.outer_range_virtual_material_amount
            } else {
                r.outer_range_value
            }
        })
        .sum();

    let mut total = vec![
        "TOTAL".to_string(),
        String::new(),
        "Earned".to_string(),
        format_number(rollup.total_contract_value, 2),
        format_number(outer_total, 2),
    ];
    total.extend(rollup.period_earned_value_totals.iter().map(|v| format_number(*v, 2)));
    total.push(format_number(rollup.total_earned_value, 2));
    rows.push(total);

    let mut running = vec![
        "CUMULATIVE".to_string(),
        String::new(),
        "Earned".to_string(),
        String::new(),
        format_number(outer_total, 2),
    ];
    running.extend(
        cumulative(&rollup.period_earned_value_totals)
            .into_iter()
            .map(|v| format_number(v + outer_total, 2)),
    );
    running.push(String::new());
    rows.push(running);

    ReportTable { headers, rows }
}

pub fn build_summary_rows(rollup: &Rollup, config: &ReportConfig) -> Vec<SummaryRow> {
    let mut rows = vec![
        SummaryRow {
            metric: "Total Contract Value".to_string(),
            value: format_number(rollup.total_contract_value, 2),
        },
        SummaryRow {
            metric: "Total Earned Value".to_string(),
            value: format_number(rollup.total_earned_value, 2),
        },
    ];
    if config.view_planned_value {
        rows.push(SummaryRow {
            metric: "Total Planned Value".to_string(),
            value: format_number(rollup.total_planned_value, 2),
        });
    }
    if config.show_virtual_material_values {
        rows.push(SummaryRow {
            metric: "Virtual Material Amount".to_string(),
            value: format_number(rollup.total_virtual_material_amount, 2),
        });
        if config.view_planned_value {
            rows.push(SummaryRow {
                metric: "Planned Virtual Material Amount".to_string(),
                value: format_number(rollup.total_planned_virtual_material_amount, 2),
            });
        }
    }
    rows
}
