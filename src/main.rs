// Entry point and page flow.
//
// The derived tables are computed on first use and shared by both pages:
// - [1] Overview: KPIs, month-of-year trends, top causes, sub-regions.
// - [2] Weather relation: daily and monthly joins, correlations, and the
//   daily trend of incident count against one weather measure.
// Every page also exports the tables it shows to `--out-dir`.
use clap::Parser;
use fire_weather::config::{Page, Settings};
use fire_weather::output::{preview_table, write_csv, write_json};
use fire_weather::reports::{self, OverviewFilter};
use fire_weather::util::{format_int, format_number};
use fire_weather::{PipelineCache, PipelineOutput, Result};
use std::io::{self, Write};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn setup_logging(log_level: &str) {
    let normalised = match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

/// Read a single line of input after printing the common prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Returns `true` if the user chose `Y`, `false` for `N` or end of input.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Page Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        match io::stdin().read_line(&mut buf) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn export<T: serde::Serialize>(out_dir: &Path, name: &str, rows: &[T]) {
    let path = out_dir.join(name);
    if let Err(e) = write_csv(&path, rows) {
        eprintln!("Write error: {}", e);
    }
}

fn show_overview(output: &PipelineOutput, settings: &Settings) -> Result<()> {
    let filter = match (settings.year, OverviewFilter::latest(&output.incidents)) {
        (Some(year), _) => OverviewFilter {
            year,
            sub_region: settings.sub_region.clone(),
        },
        (None, Some(latest)) => OverviewFilter {
            sub_region: settings.sub_region.clone(),
            ..latest
        },
        (None, None) => {
            println!("No incidents recorded for {}.\n", settings.region);
            return Ok(());
        }
    };
    let selected = filter.apply(&output.incidents);
    let kpis = reports::kpis(&selected);

    println!("{} Fire Incident Overview", settings.region);
    println!(
        "(Year {}, {})\n",
        filter.year,
        filter.sub_region.as_deref().unwrap_or("all sub-regions")
    );
    let years: Vec<String> = reports::years(&output.incidents)
        .iter()
        .map(|y| y.to_string())
        .collect();
    println!("Available years: {}", years.join(", "));
    println!(
        "Available sub-regions: {}\n",
        reports::sub_region_options(&output.incidents).join(", ")
    );

    println!("Incidents:        {}", format_int(kpis.incident_count as u64));
    println!("Casualties:       {}", format_int(kpis.casualties));
    println!(
        "Property damage:  {} x 100M\n",
        format_number(kpis.property_damage_100m, 2)
    );

    let trend = reports::monthly_incident_trend(&selected);
    let deaths = reports::monthly_death_trend(&selected);
    let causes = reports::top_causes(&selected, 10);
    let sub_regions = reports::sub_regions_for_year(&output.incidents, filter.year);

    preview_table("Monthly Incident Trend", Some("months 1-12"), &trend, 12);
    preview_table("Monthly Death Trend", Some("months 1-12"), &deaths, 12);
    preview_table("Top 10 Causes", None, &causes, 10);
    preview_table(
        &format!("{} Incidents by Sub-region", filter.year),
        None,
        &sub_regions,
        sub_regions.len(),
    );

    let out_dir = settings.out_dir.as_path();
    export(out_dir, "monthly_incidents.csv", &output.monthly_incidents);
    export(out_dir, "daily_incidents.csv", &output.daily_incidents);
    export(out_dir, "cause_ranking.csv", &output.causes);
    export(out_dir, "sub_region_ranking.csv", &output.sub_regions);
    write_json(
        &out_dir.join("summary.json"),
        &reports::summary_stats(output, Some(kpis)),
    )?;
    println!("(Full tables exported to {})\n", out_dir.display());
    Ok(())
}

fn show_weather(output: &PipelineOutput, settings: &Settings) -> Result<()> {
    println!("Weather Conditions and Fire Incidents\n");
    preview_table(
        "Daily Weather vs Incident Count",
        Some("days with both incidents and weather"),
        &output.daily_merged,
        10,
    );
    preview_table(
        "Monthly Weather and Incident Count",
        None,
        &output.monthly_merged,
        output.monthly_merged.len(),
    );
    preview_table(
        "Correlation (monthly)",
        None,
        &reports::correlation_matrix(&output.monthly_merged),
        4,
    );

    let variable = settings.variable;
    let daily = reports::daily_variable(&output.daily_merged, variable);
    preview_table(
        &format!("Daily {} vs Incident Count", variable.label()),
        Some("days with both incidents and weather"),
        &daily,
        10,
    );
    match reports::linear_trend(&output.daily_merged, variable) {
        Some((slope, intercept)) => println!(
            "Trend: IncidentCount = {} x {} {} {}\n",
            format_number(slope, 4),
            variable.label(),
            if intercept < 0.0 { "-" } else { "+" },
            format_number(intercept.abs(), 4)
        ),
        None => println!("Trend: not enough varying days for a line.\n"),
    }

    let out_dir = settings.out_dir.as_path();
    export(out_dir, "monthly_weather.csv", &output.monthly_weather);
    export(out_dir, "daily_weather.csv", &output.daily_weather);
    export(out_dir, "monthly_merged.csv", &output.monthly_merged);
    export(out_dir, "daily_merged.csv", &output.daily_merged);
    export(out_dir, "daily_variable.csv", &daily);
    write_json(
        &out_dir.join("summary.json"),
        &reports::summary_stats(output, None),
    )?;
    println!("(Full tables exported to {})\n", out_dir.display());
    Ok(())
}

fn show_page(cache: &PipelineCache, settings: &Settings, page: Page) {
    let output = match cache.get() {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Failed to load data: {}\n", e);
            return;
        }
    };
    if output.is_degraded() {
        println!("Warning: some input could only be decoded lossily; text values may be corrupted.\n");
    }
    let result = match page {
        Page::Overview => show_overview(&output, settings),
        Page::Weather => show_weather(&output, settings),
    };
    if let Err(e) = result {
        eprintln!("Write error: {}\n", e);
    }
}

fn main() {
    let settings = Settings::parse();
    setup_logging(&settings.log_level);
    tracing::info!("fire_weather v{} starting", env!("CARGO_PKG_VERSION"));

    let cache = PipelineCache::new(settings.pipeline_config());

    if let Some(page) = settings.page {
        show_page(&cache, &settings, page);
        return;
    }

    loop {
        println!("Select Page:");
        println!("[1] Overview Dashboard");
        println!("[2] Weather-Incident Relation\n");
        let page = match read_choice().as_str() {
            "1" => Page::Overview,
            "2" => Page::Weather,
            "" => break,
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
                continue;
            }
        };
        println!();
        show_page(&cache, &settings, page);
        if !prompt_back_to_menu() {
            println!("Exiting the program.");
            break;
        }
    }
}
