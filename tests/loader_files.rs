use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::tempdir;
use work_revenue_report::loader::{load_dataset, LoadPaths};
use work_revenue_report::{build_report, Granularity, ReportConfig, ReportError};

const PROJECTS_CSV: &str = "\
id,project_code,project_sub_code,project_name,contract_amount,currency,virtual_material_value
1,P1,,Harbor Tower,\"100,000\",USD,10%
2,P2,B,Ring Road,\"250,000.50\",USD,0.05
3,P1,,Harbor Tower,999,USD,0
";

const ACTIVITIES_CSV: &str = "\
id,project_id,project_code,project_full_code,activity_name,activity_division,zone_ref,total_value,total_units,rate,use_virtual_material
10,1,P1,,A1,Civil,P1 - Zone 007,\"50,000\",500,,true
11,2,P2,P2-B,Asphalt,Roads,,0,0,25,false
";

const KPIS_CSV: &str = "\
input_type,quantity,Value,activity_name,project_code,project_full_code,zone,actual_date,target_date
Actual,10,,A1,P1,,Zone 007,2024-03-06,
actual,0,500,A1,P1,,,2024-03-07,
Planned,4,,Asphalt,P2,P2-B,,,2024-03-20
Actual,5,,A1,P1,,,,
Forecast,1,,A1,P1,,,2024-03-06,
";

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write fixture");
    path
}

#[test]
fn csv_files_load_into_a_normalized_dataset() {
    let dir = tempdir().expect("tmp");
    let paths = LoadPaths {
        projects: write(dir.path(), "projects.csv", PROJECTS_CSV),
        activities: write(dir.path(), "activities.csv", ACTIVITIES_CSV),
        kpis: write(dir.path(), "kpis.csv", KPIS_CSV),
    };
    let (dataset, report) = load_dataset(&paths, 7).expect("load");

    assert_eq!(dataset.revision, 7);
    assert_eq!(dataset.projects.len(), 2);
    assert_eq!(report.duplicate_projects, 1);
    assert_eq!(dataset.projects[1].full_code, "P2-B");
    assert_eq!(dataset.projects[1].contract_amount, 250_000.5);
    assert_eq!(dataset.projects[1].virtual_material_pct, 5.0);
    assert_eq!(dataset.activities[0].zone.as_deref(), Some("P1 - Zone 007"));
    assert_eq!(dataset.kpis.len(), 4);
    assert_eq!(report.skipped_rows, 1);
    assert_eq!(report.undated_kpis, 1);

    let mut config = ReportConfig {
        period_type: Granularity::Monthly,
        show_virtual_material_values: true,
        view_planned_value: true,
        today: NaiveDate::from_ymd_opt(2024, 12, 31),
        ..Default::default()
    };
    config.date_range.start = NaiveDate::from_ymd_opt(2024, 3, 1);
    config.date_range.end = NaiveDate::from_ymd_opt(2024, 3, 31);

    let out = build_report(&dataset, &config, NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
    let p1 = &out.projects[0];
    assert_eq!(p1.result.earned, vec![1500.0]);
    assert_eq!(p1.result.virtual_material, vec![150.0]);
    let p2 = &out.projects[1];
    assert_eq!(p2.result.planned, vec![100.0]);
    assert_eq!(out.rollup.total_contract_value, 350_000.5);
}

#[test]
fn malformed_csv_record_is_skipped_not_fatal() {
    let dir = tempdir().expect("tmp");
    let mut kpis = Vec::new();
    kpis.extend_from_slice(b"input_type,quantity,Value,activity_name,project_code,project_full_code,zone,actual_date,target_date\n");
    kpis.extend_from_slice(b"Actual,10,,A1,P1,,,2024-03-06,\n");
    kpis.extend_from_slice(b"Actual,3,,A\xff\xfe,P1,,,2024-03-07,\n");
    kpis.extend_from_slice(b"Actual,2,,A1,P1,,,2024-03-08,\n");
    let kpi_path = dir.path().join("kpis.csv");
    fs::write(&kpi_path, &kpis).expect("write fixture");

    let paths = LoadPaths {
        projects: write(dir.path(), "projects.csv", PROJECTS_CSV),
        activities: write(dir.path(), "activities.csv", ACTIVITIES_CSV),
        kpis: kpi_path,
    };
    let (dataset, report) = load_dataset(&paths, 1).expect("load survives a bad record");

    assert_eq!(dataset.kpis.len(), 2);
    assert_eq!(report.skipped_rows, 1);
    assert_eq!(dataset.kpis[1].quantity, 2.0);
}

#[test]
fn json_rows_accept_typed_values() {
    let dir = tempdir().expect("tmp");
    let projects = r#"[
        {"id": 1, "project_code": "P1", "project_name": "Harbor Tower",
         "contract_amount": 100000, "virtual_material_value": 0.1}
    ]"#;
    let activities = r#"[
        {"project_id": 1, "project_code": "P1", "activity_name": "A1",
         "total_value": 50000, "total_units": 500, "use_virtual_material": true}
    ]"#;
    let kpis = r#"[
        {"input_type": "Actual", "quantity": 2, "activity_name": "A1",
         "project_code": "P1", "day": "2024-03-06T08:00:00Z", "value": null}
    ]"#;
    let paths = LoadPaths {
        projects: write(dir.path(), "projects.json", projects),
        activities: write(dir.path(), "activities.json", activities),
        kpis: write(dir.path(), "kpis.json", kpis),
    };
    let (dataset, _) = load_dataset(&paths, 1).expect("load");

    assert_eq!(dataset.projects[0].virtual_material_pct, 10.0);
    assert_eq!(dataset.projects[0].id.as_deref(), Some("1"));
    assert!(dataset.activities[0].use_virtual_material);
    assert_eq!(dataset.kpis[0].date, NaiveDate::from_ymd_opt(2024, 3, 6));
    assert_eq!(dataset.kpis[0].quantity, 2.0);
}

#[test]
fn empty_project_file_is_an_error() {
    let dir = tempdir().expect("tmp");
    let paths = LoadPaths {
        projects: write(dir.path(), "projects.csv", "project_code,project_name\n"),
        activities: write(dir.path(), "activities.csv", ACTIVITIES_CSV),
        kpis: write(dir.path(), "kpis.csv", KPIS_CSV),
    };
    assert!(matches!(load_dataset(&paths, 1), Err(ReportError::NoData(_))));
}

#[test]
fn missing_file_is_reported() {
    let dir = tempdir().expect("tmp");
    let paths = LoadPaths {
        projects: dir.path().join("absent.csv"),
        activities: dir.path().join("absent.csv"),
        kpis: dir.path().join("absent.csv"),
    };
    assert!(load_dataset(&paths, 1).is_err());
}
