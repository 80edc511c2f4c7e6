use std::fs;
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Datelike;
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use runlog::patch::{patch_file, DEFAULT_SPEED_KMH};
use runlog::stats::{
    render_annual, render_monthly, Dataset, MonthlyReport, ReportFilter, MONTH_INITIALS,
};
use runlog::ActivityRecord;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Activity log inspection and reporting CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize one or more GPX/TCX activity files
    Inspect(InspectArgs),
    /// Render annual/monthly reports from a Strava activities.csv export
    Report(ReportArgs),
    /// Rebuild TCX distances at a constant synthetic pace
    Patch(PatchArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// GPX/TCX files to summarize
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output report path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct ReportArgs {
    /// Path to the activities.csv of a Strava bulk export
    #[arg(value_hint = ValueHint::FilePath)]
    csv: PathBuf,

    /// Years to analyze (comma separated); defaults to every year in the export
    #[arg(long)]
    years: Option<String>,

    /// Keep a single activity type (Run, Ride, ...)
    #[arg(long)]
    sport: Option<String>,

    /// Minimum distance in meters for an activity to count
    #[arg(long, default_value_t = 0.0)]
    threshold: f64,

    /// Output directory for report files and charts
    #[arg(short, long, default_value = "./res", value_hint = ValueHint::DirPath)]
    output_dir: PathBuf,

    /// Disable monthly bar charts
    #[arg(long, action = ArgAction::SetTrue)]
    no_charts: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct PatchArgs {
    /// TCX file whose distances should be rebuilt
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output path (defaults to clean.tcx next to the input)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Constant speed in km/h used to synthesize distances
    #[arg(long, default_value_t = DEFAULT_SPEED_KMH)]
    speed: f64,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Command::Inspect(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
        Command::Report(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
        Command::Patch(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Inspect(args) => handle_inspect(args),
        Command::Report(args) => handle_report(args),
        Command::Patch(args) => handle_patch(args),
    }
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    if args.inputs.is_empty() {
        return Err(anyhow!("no input files supplied"));
    }

    let mut report = String::new();
    for path in &args.inputs {
        let record = ActivityRecord::from_path(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        report.push_str(&format!("FILE: {}\n", path.display()));
        report.push_str(&record.summary());
        report.push('\n');
    }

    if args.output.as_os_str() == "-" {
        io::stdout().write_all(report.as_bytes())?;
    } else {
        fs::write(&args.output, &report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Wrote summary report: {}", args.output.display());
    }
    Ok(())
}

fn handle_report(args: ReportArgs) -> Result<()> {
    let data = Dataset::from_path(&args.csv)
        .with_context(|| format!("failed to load {}", args.csv.display()))?;
    if data.activities.is_empty() {
        return Err(anyhow!("no activities found in {}", args.csv.display()));
    }
    info!(
        "Loaded {} activities from {}",
        data.activities.len(),
        args.csv.display()
    );

    let years: Vec<i32> = match args.years.as_ref() {
        Some(list) => {
            let years = parse_year_list(list)?;
            if years.is_empty() {
                return Err(anyhow!("--years list was empty"));
            }
            years
        }
        None => {
            let first = data.activities.first().map(|a| a.date.year());
            let last = data.activities.last().map(|a| a.date.year());
            match (first, last) {
                (Some(first), Some(last)) => (first..=last).collect(),
                _ => Vec::new(),
            }
        }
    };

    let filter = ReportFilter {
        sport: args.sport.clone(),
        threshold_m: args.threshold,
    };

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    for year in years {
        let annual = data.annual(year, &filter);
        let annual_path = args
            .output_dir
            .join(format!("{}_{}.txt", year, filter.sport_label()));
        fs::write(&annual_path, render_annual(&annual))
            .with_context(|| format!("failed to write {}", annual_path.display()))?;
        info!("Wrote annual report: {}", annual_path.display());

        let monthly = data.monthly(year, &filter);
        let monthly_path = args
            .output_dir
            .join(format!("{}_monthly_{}.txt", year, filter.sport_label()));
        fs::write(&monthly_path, render_monthly(&monthly))
            .with_context(|| format!("failed to write {}", monthly_path.display()))?;
        info!("Wrote monthly report: {}", monthly_path.display());

        if !args.no_charts && monthly.total_activities > 0 {
            render_month_charts(&args.output_dir, year, &monthly, filter.sport_label());
        }
    }
    Ok(())
}

fn handle_patch(args: PatchArgs) -> Result<()> {
    let (output, outcome) = patch_file(&args.input, args.speed, args.output.clone())
        .with_context(|| format!("failed to patch {}", args.input.display()))?;
    info!(
        "Wrote patched TCX: {} ({} trackpoints, {:.1} m over {} s)",
        output.display(),
        outcome.trackpoints,
        outcome.final_distance_m,
        outcome.elapsed_s
    );
    Ok(())
}

fn parse_year_list(input: &str) -> Result<Vec<i32>> {
    let mut out = Vec::new();
    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: i32 = trimmed
            .parse()
            .with_context(|| format!("invalid year '{}': expected a calendar year", trimmed))?;
        out.push(value);
    }
    Ok(out)
}

fn render_month_charts(dir: &Path, year: i32, report: &MonthlyReport, sport: &str) {
    let mut moving = [0.0f64; 12];
    let mut distance = [0.0f64; 12];
    let mut elevation = [0.0f64; 12];
    let mut speed = [0.0f64; 12];
    for (index, month) in report.months.iter().enumerate() {
        moving[index] = month.moving_time_s;
        distance[index] = month.distance_m / 1000.0;
        elevation[index] = month.elevation_gain_m;
        speed[index] = month.avg_speed_kmh;
    }

    let charts: [(&str, &str, &[f64; 12]); 4] = [
        ("_time", "Moving Time [s]", &moving),
        ("_dist", "Distance [km]", &distance),
        ("_ele", "Elevation Gain [m]", &elevation),
        ("_pace", "Average Pace [km/h]", &speed),
    ];
    for (suffix, label, values) in charts {
        let path = dir.join(format!("{}_monthly_{}{}.png", year, sport, suffix));
        if let Err(err) = render_chart_guard(&path, year, values, label) {
            warn!("Skipping PNG render ({}): {}", path.display(), err);
        } else {
            info!("Wrote chart: {}", path.display());
        }
    }
}

fn render_chart_guard(
    path: &Path,
    year: i32,
    values: &[f64; 12],
    y_label: &str,
) -> Result<(), String> {
    let render = || -> Result<(), String> {
        render_month_chart(path, year, values, y_label)
            .map_err(|e| format!("plotting error: {}", e))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

fn render_month_chart(path: &Path, year: i32, values: &[f64; 12], y_label: &str) -> Result<()> {
    let area = BitMapBackend::new(path, (1280, 720)).into_drawing_area();
    area.fill(&WHITE)?;

    let y_max = values.iter().copied().fold(f64::MIN, f64::max).max(1.0) * 1.1;

    let mut chart = ChartBuilder::on(&area)
        .margin(25)
        .caption(
            year.to_string(),
            FontDesc::new(FontFamily::SansSerif, 24.0, FontStyle::Bold),
        )
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d((0u32..12u32).into_segmented(), 0.0..y_max)?;

    let axis_font = FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(12)
        .x_label_formatter(&|value| match value {
            SegmentValue::CenterOf(index) | SegmentValue::Exact(index) => MONTH_INITIALS
                .get(*index as usize)
                .copied()
                .unwrap_or("")
                .to_string(),
            SegmentValue::Last => String::new(),
        })
        .y_label_formatter(&|v| format!("{:.0}", v))
        .x_desc("Months")
        .y_desc(y_label)
        .axis_desc_style(FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Bold))
        .label_style(axis_font.color(&BLACK.mix(0.85)))
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(RGBColor(31, 119, 180).filled())
            .margin(4)
            .data((0u32..).zip(values.iter().copied())),
    )?;

    Ok(())
}
