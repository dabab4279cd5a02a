// Entry point and high-level CLI flow.
//
// - Option [1] loads the project, BOQ activity, and KPI files, printing
//   diagnostics.
// - Option [2] builds the Monthly Work Revenue report, exports it, and prints
//   a preview.
// - After generating a report, the user can go back to the menu or exit.
// `--batch` runs load and generate once without prompting.
use chrono::{Local, NaiveDate};
use clap::Parser;
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Mutex, MutexGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use work_revenue_report::config::load_config;
use work_revenue_report::loader::{self, LoadPaths};
use work_revenue_report::{output, reports, util};
use work_revenue_report::{Dataset, Granularity, ReportCache, ReportConfig, ReportResult};

#[derive(Parser, Debug)]
#[command(name = "work-revenue-report")]
#[command(about = "Monthly Work Revenue report over project KPI data")]
struct Cli {
    #[arg(long, default_value = "projects.csv")]
    projects: PathBuf,
    #[arg(long, default_value = "boq_activities.csv")]
    activities: PathBuf,
    #[arg(long, default_value = "kpi_entries.csv")]
    kpis: PathBuf,
    /// JSON report configuration; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
    /// daily, weekly, monthly, quarterly, or yearly
    #[arg(long)]
    period: Option<Granularity>,
    #[arg(long = "division")]
    divisions: Vec<String>,
    #[arg(long, default_value_t = false)]
    virtual_material: bool,
    #[arg(long, default_value_t = false)]
    planned: bool,
    #[arg(long)]
    outer_start: Option<NaiveDate>,
    #[arg(long)]
    today: Option<NaiveDate>,
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    #[arg(long, default_value_t = false)]
    batch: bool,
}

// Loaded data and memoized reports, so the files are read once but reports
// can be generated many times in a single run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        data: None,
        cache: ReportCache::new(),
        revision: 0,
    })
});

struct AppState {
    data: Option<Dataset>,
    cache: ReportCache,
    revision: u64,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        if io::stdin().read_line(&mut buf).unwrap_or(0) == 0 {
            return false;
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn build_config(cli: &Cli) -> ReportResult<ReportConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ReportConfig::default(),
    };
    if cli.start.is_some() {
        config.date_range.start = cli.start;
    }
    if cli.end.is_some() {
        config.date_range.end = cli.end;
    }
    if let Some(period) = cli.period {
        config.period_type = period;
    }
    if !cli.divisions.is_empty() {
        config.selected_divisions = cli.divisions.clone();
    }
    config.show_virtual_material_values |= cli.virtual_material;
    config.view_planned_value |= cli.planned;
    if cli.outer_start.is_some() {
        config.outer_range_start = cli.outer_start;
    }
    if cli.today.is_some() {
        config.today = cli.today;
    }
    config.validate()?;
    Ok(config)
}

/// Handle option [1]: load and normalize the three input files.
fn handle_load(cli: &Cli) -> bool {
    let paths = LoadPaths {
        projects: cli.projects.clone(),
        activities: cli.activities.clone(),
        kpis: cli.kpis.clone(),
    };
    let revision = state().revision + 1;
    match loader::load_dataset(&paths, revision) {
        Ok((data, load_report)) => {
            println!(
                "Processing dataset... ({} projects, {} activities, {} KPI entries)",
                util::format_int(data.projects.len() as i64),
                util::format_int(data.activities.len() as i64),
                util::format_int(data.kpis.len() as i64)
            );
            println!(
                "Note: {} rows skipped, {} duplicate projects ignored.",
                util::format_int(load_report.skipped_rows as i64),
                util::format_int(load_report.duplicate_projects as i64)
            );
            if load_report.undated_kpis > 0 {
                println!(
                    "Info: {} KPI entries have no usable date and will not be counted.",
                    util::format_int(load_report.undated_kpis as i64)
                );
            }
            println!();
            let mut st = state();
            st.revision = revision;
            st.data = Some(data);
            st.cache.invalidate();
            true
        }
        Err(e) => {
            tracing::error!("Failed to load data: {}", e);
            eprintln!("Failed to load data: {}\n", e);
            false
        }
    }
}

/// Handle option [2]: build the report, export it, and print previews.
fn handle_generate(config: &ReportConfig, out_dir: &std::path::Path) -> ReportResult<()> {
    let today = Local::now().date_naive();
    let report = {
        let mut st = state();
        let AppState { data, cache, .. } = &mut *st;
        let Some(data) = data.as_ref() else {
            println!("Error: No data loaded. Please load the data first (option 1).\n");
            return Ok(());
        };
        cache.get_or_build(data, config, today)
    };

    println!("Generating report...");
    std::fs::create_dir_all(out_dir)?;

    let table = reports::build_revenue_table(&report, config);
    let table_file = out_dir.join("monthly_work_revenue.csv");
    output::write_table_csv(&table_file, &table)?;
    println!("Monthly Work Revenue ({} periods, {})\n", report.periods.len(), config.period_type);
    output::preview_table(&table, 5);
    println!("(Full table exported to {})\n", table_file.display());

    let summary = reports::build_summary_rows(&report.rollup, config);
    let summary_file = out_dir.join("work_revenue_summary.csv");
    output::write_csv(&summary_file, &summary)?;
    println!("Summary:\n");
    output::preview_table_rows(&summary, summary.len());

    let json_file = out_dir.join("work_revenue_report.json");
    output::write_json(&json_file, &*report)?;
    println!("(Full aggregation exported to {})\n", json_file.display());
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.batch {
        if !handle_load(&cli) {
            return ExitCode::FAILURE;
        }
        return match handle_generate(&config, &cli.out_dir) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Report error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    loop {
        println!("Monthly Work Revenue:");
        println!("[1] Load data");
        println!("[2] Generate report\n");
        match read_choice().as_str() {
            "1" => {
                handle_load(&cli);
            }
            "2" => {
                println!();
                if let Err(e) = handle_generate(&config, &cli.out_dir) {
                    eprintln!("Report error: {}\n", e);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "" => break,
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
            }
        }
    }
    ExitCode::SUCCESS
}
