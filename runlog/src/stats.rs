//! Strava bulk-export statistics: dataset loading, annual and monthly reports.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::RunlogError;

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// X-axis labels for the monthly bar charts.
pub const MONTH_INITIALS: [&str; 12] = ["J", "F", "M", "A", "M", "J", "J", "A", "S", "O", "N", "D"];

const EN_DATE_FORMAT: &str = "%b %d, %Y, %I:%M:%S %p";
const FR_DATE_FORMAT: &str = "%d %m %Y à %H:%M:%S";

// Abbreviated month names as the French export writes them.
const FR_MONTHS: [(&str, u32); 12] = [
    ("janv.", 1),
    ("févr.", 2),
    ("mars", 3),
    ("avr.", 4),
    ("mai", 5),
    ("juin", 6),
    ("juil.", 7),
    ("août", 8),
    ("sept.", 9),
    ("oct.", 10),
    ("nov.", 11),
    ("déc.", 12),
];

const FR_SPORTS: [(&str, &str); 4] = [
    ("Course à pied", "Run"),
    ("Vélo", "Ride"),
    ("Randonnée", "Hike"),
    ("Marche", "Walk"),
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lang {
    En,
    Fr,
}

// Column indices resolved from the header row. The export duplicates the
// elapsed-time and distance headers; the second occurrence of each is the
// one to consume.
struct Columns {
    date: usize,
    sport: usize,
    elapsed: usize,
    moving: usize,
    distance: usize,
    elevation: usize,
    avg_hr: usize,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, lang: Lang) -> Result<Columns, RunlogError> {
        match lang {
            Lang::En => Ok(Columns {
                date: column_index(headers, "Activity Date", 0)?,
                sport: column_index(headers, "Activity Type", 0)?,
                elapsed: column_index(headers, "Elapsed Time", 1)?,
                moving: column_index(headers, "Moving Time", 0)?,
                distance: column_index(headers, "Distance", 1)?,
                elevation: column_index(headers, "Elevation Gain", 0)?,
                avg_hr: column_index(headers, "Average Heart Rate", 0)?,
            }),
            Lang::Fr => Ok(Columns {
                date: column_index(headers, "Date de l'activité", 0)?,
                sport: column_index(headers, "Type d'activité", 0)?,
                elapsed: column_index(headers, "Temps écoulé", 1)?,
                moving: column_index(headers, "Durée de déplacement", 0)?,
                distance: column_index(headers, "Distance", 1)?,
                elevation: column_index(headers, "Dénivelé positif", 0)?,
                avg_hr: column_index(headers, "Fréquence cardiaque moyenne", 0)?,
            }),
        }
    }
}

fn column_index(
    headers: &csv::StringRecord,
    name: &'static str,
    occurrence: usize,
) -> Result<usize, RunlogError> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, header)| *header == name)
        .map(|(index, _)| index)
        .nth(occurrence)
        .ok_or(RunlogError::MissingColumn(name))
}

/// One line of the export, normalized: canonical English sport labels,
/// blank elevation as 0.0, blank heart rate as absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub date: NaiveDateTime,
    pub sport: String,
    pub elapsed_time_s: f64,
    pub moving_time_s: f64,
    pub distance_m: f64,
    pub elevation_gain_m: f64,
    pub avg_heart_rate: Option<f64>,
}

/// A whole `activities.csv`, rows sorted by date.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub activities: Vec<ActivityRow>,
}

/// Year/sport/threshold selection for the reports. `sport: None` keeps
/// every activity type; the threshold is a minimum distance in meters.
#[derive(Clone, Debug, Default)]
pub struct ReportFilter {
    pub sport: Option<String>,
    pub threshold_m: f64,
}

impl ReportFilter {
    pub fn sport_label(&self) -> &str {
        self.sport.as_deref().unwrap_or("All")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnualSummary {
    pub year: i32,
    pub sport: String,
    pub threshold_m: f64,
    pub recorded: usize,
    pub filtered_out: usize,
    pub without_hr: usize,
    pub elapsed_time_s: f64,
    pub moving_time_s: f64,
    pub distance_m: f64,
    pub elevation_gain_m: f64,
    pub avg_speed_kmh: f64,
    pub avg_pace: String,
    pub avg_heart_rate: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub recorded: usize,
    pub filtered_out: usize,
    pub without_hr: usize,
    pub elapsed_time_s: f64,
    pub moving_time_s: f64,
    pub distance_m: f64,
    pub elevation_gain_m: f64,
    pub avg_speed_kmh: f64,
    pub avg_pace: String,
    pub avg_heart_rate: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAverage {
    pub moving_time_s: f64,
    pub distance_km: f64,
    pub elevation_m: f64,
    pub speed_kmh: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub sport: String,
    pub threshold_m: f64,
    pub total_activities: usize,
    pub months: Vec<MonthSummary>,
    pub average: MonthlyAverage,
}

impl Dataset {
    /// Load an export file. Existence is checked before the file is opened.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Dataset, RunlogError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RunlogError::FileNotFound(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|source| RunlogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Dataset, RunlogError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let lang = if headers.get(0) == Some("Activity ID") {
            Lang::En
        } else {
            Lang::Fr
        };
        let columns = Columns::resolve(&headers, lang)?;

        let mut activities = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            activities.push(parse_row(&row, &columns, lang)?);
        }
        activities.sort_by_key(|a| a.date);
        Ok(Dataset { activities })
    }

    /// Whole-year aggregate. Time, distance and elevation sums (and the
    /// pace derived from them) are taken before the distance threshold is
    /// applied; the threshold then trims the activity count and the
    /// heart-rate average. Threshold comparison is strictly-greater.
    pub fn annual(&self, year: i32, filter: &ReportFilter) -> AnnualSummary {
        let rows = self.select(year, filter);

        let elapsed: f64 = rows.iter().map(|a| a.elapsed_time_s).sum();
        let moving: f64 = rows.iter().map(|a| a.moving_time_s).sum();
        let distance: f64 = rows.iter().map(|a| a.distance_m).sum();
        let elevation: f64 = rows.iter().map(|a| a.elevation_gain_m).sum();
        let (avg_speed_kmh, avg_pace) = compute_pace(distance, moving);

        let kept: Vec<&ActivityRow> = if filter.threshold_m > 0.0 {
            rows.iter()
                .copied()
                .filter(|a| a.distance_m > filter.threshold_m)
                .collect()
        } else {
            rows.clone()
        };
        let (without_hr, avg_heart_rate) = heart_rate_stats(&kept);

        AnnualSummary {
            year,
            sport: filter.sport_label().to_string(),
            threshold_m: filter.threshold_m,
            recorded: kept.len(),
            filtered_out: rows.len() - kept.len(),
            without_hr,
            elapsed_time_s: elapsed,
            moving_time_s: moving,
            distance_m: distance,
            elevation_gain_m: elevation,
            avg_speed_kmh,
            avg_pace,
            avg_heart_rate,
        }
    }

    /// Twelve month buckets plus their average. Unlike the annual report,
    /// each month applies the threshold (greater-or-equal keep) before
    /// summing.
    pub fn monthly(&self, year: i32, filter: &ReportFilter) -> MonthlyReport {
        let rows = self.select(year, filter);

        let below = if filter.threshold_m > 0.0 {
            rows.iter()
                .filter(|a| a.distance_m < filter.threshold_m)
                .count()
        } else {
            0
        };
        let total_activities = rows.len() - below;

        let mut months = Vec::with_capacity(12);
        for month in 1..=12u32 {
            let in_month: Vec<&ActivityRow> = rows
                .iter()
                .copied()
                .filter(|a| a.date.month() == month)
                .collect();
            let recorded = in_month.len();
            let kept: Vec<&ActivityRow> = if filter.threshold_m > 0.0 {
                in_month
                    .iter()
                    .copied()
                    .filter(|a| a.distance_m >= filter.threshold_m)
                    .collect()
            } else {
                in_month
            };

            let elapsed: f64 = kept.iter().map(|a| a.elapsed_time_s).sum();
            let moving: f64 = kept.iter().map(|a| a.moving_time_s).sum();
            let distance: f64 = kept.iter().map(|a| a.distance_m).sum();
            let elevation: f64 = kept.iter().map(|a| a.elevation_gain_m).sum();
            let (avg_speed_kmh, avg_pace) = compute_pace(distance, moving);
            let (without_hr, avg_heart_rate) = heart_rate_stats(&kept);

            months.push(MonthSummary {
                recorded,
                filtered_out: recorded - kept.len(),
                without_hr,
                elapsed_time_s: elapsed,
                moving_time_s: moving,
                distance_m: distance,
                elevation_gain_m: elevation,
                avg_speed_kmh,
                avg_pace,
                avg_heart_rate,
            });
        }

        let moving_avg = months.iter().map(|m| m.moving_time_s).sum::<f64>() / 12.0;
        let distance_avg_km = months.iter().map(|m| m.distance_m).sum::<f64>() / 12.0 / 1000.0;
        let elevation_avg = months.iter().map(|m| m.elevation_gain_m).sum::<f64>() / 12.0;
        let speed_kmh = compute_pace(distance_avg_km * 1000.0, moving_avg).0;

        MonthlyReport {
            year,
            sport: filter.sport_label().to_string(),
            threshold_m: filter.threshold_m,
            total_activities,
            months,
            average: MonthlyAverage {
                moving_time_s: moving_avg,
                distance_km: distance_avg_km,
                elevation_m: elevation_avg,
                speed_kmh,
            },
        }
    }

    fn select(&self, year: i32, filter: &ReportFilter) -> Vec<&ActivityRow> {
        self.activities
            .iter()
            .filter(|a| a.date.year() == year)
            .filter(|a| filter.sport.as_deref().map_or(true, |s| a.sport == s))
            .collect()
    }
}

fn heart_rate_stats(rows: &[&ActivityRow]) -> (usize, Option<f64>) {
    let rates: Vec<f64> = rows.iter().filter_map(|a| a.avg_heart_rate).collect();
    let without = rows.len() - rates.len();
    if rates.is_empty() {
        (without, None)
    } else {
        (without, Some(rates.iter().sum::<f64>() / rates.len() as f64))
    }
}

fn parse_row(
    row: &csv::StringRecord,
    columns: &Columns,
    lang: Lang,
) -> Result<ActivityRow, RunlogError> {
    let raw_date = row.get(columns.date).unwrap_or("").trim();
    let date = match lang {
        Lang::En => NaiveDateTime::parse_from_str(raw_date, EN_DATE_FORMAT).ok(),
        Lang::Fr => parse_fr_date(raw_date),
    }
    .ok_or_else(|| RunlogError::InvalidField {
        field: "Activity Date",
        value: raw_date.to_string(),
    })?;

    let raw_sport = row.get(columns.sport).unwrap_or("").trim();
    let sport = match lang {
        Lang::En => raw_sport.to_string(),
        Lang::Fr => FR_SPORTS
            .iter()
            .find(|(fr, _)| *fr == raw_sport)
            .map(|(_, en)| en.to_string())
            .unwrap_or_else(|| raw_sport.to_string()),
    };

    Ok(ActivityRow {
        date,
        sport,
        elapsed_time_s: numeric(row, columns.elapsed, "Elapsed Time")?,
        moving_time_s: numeric(row, columns.moving, "Moving Time")?,
        distance_m: numeric(row, columns.distance, "Distance")?,
        elevation_gain_m: numeric(row, columns.elevation, "Elevation Gain")?,
        avg_heart_rate: optional(row, columns.avg_hr, "Average Heart Rate")?,
    })
}

fn parse_fr_date(raw: &str) -> Option<NaiveDateTime> {
    let mut parts = raw.splitn(3, ' ');
    let day = parts.next()?;
    let month_name = parts.next()?;
    let rest = parts.next()?;
    let month = FR_MONTHS
        .iter()
        .find(|(name, _)| *name == month_name)
        .map(|(_, number)| *number)?;
    NaiveDateTime::parse_from_str(&format!("{} {} {}", day, month, rest), FR_DATE_FORMAT).ok()
}

// Blank numeric cells read as zero so they drop out of the sums.
fn numeric(row: &csv::StringRecord, index: usize, field: &'static str) -> Result<f64, RunlogError> {
    let raw = row.get(index).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse().map_err(|_| RunlogError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

fn optional(
    row: &csv::StringRecord,
    index: usize,
    field: &'static str,
) -> Result<Option<f64>, RunlogError> {
    let raw = row.get(index).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|_| RunlogError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

/// Seconds to `h:mm:ss`.
pub fn s_to_hms(seconds: f64) -> String {
    let total = seconds as i64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Speed in km/h and a formatted `min/km` pace from a distance in meters
/// and a time in seconds. Durations under one second and zero distances
/// yield a zero pace.
pub fn compute_pace(distance_m: f64, time_s: f64) -> (f64, String) {
    if time_s < 1.0 || distance_m <= 0.0 {
        return (0.0, "0.0".to_string());
    }
    let speed_kmh = distance_m / time_s * 3.6;
    let secs_per_km = time_s / distance_m * 1000.0;
    let minutes = (secs_per_km / 60.0) as i64;
    let seconds = (secs_per_km % 60.0) as i64;
    (speed_kmh, format!("{:>2}:{:02} min/km", minutes, seconds))
}

pub fn render_annual(summary: &AnnualSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n========== {} ==========\n", summary.year));
    if summary.recorded == 0 {
        out.push_str("\nNo activity found.\n");
        return out;
    }
    out.push_str(&format!("\nActivities recorded: {:>5}\n", summary.recorded));
    out.push_str(&format!("Activities w/o HR: {:>7}\n", summary.without_hr));
    out.push_str(&format!("Threshold: {:>13.2} m\n", summary.threshold_m));
    out.push_str(&format!("Activities filtered: {:>5}\n", summary.filtered_out));
    out.push_str(&format!(
        "\n- Elapsed Time: {:>10}\n",
        s_to_hms(summary.elapsed_time_s)
    ));
    out.push_str(&format!(
        "- Moving Time: {:>11}\n",
        s_to_hms(summary.moving_time_s)
    ));
    out.push_str(&format!("- Distance: {:>11.2} km\n", summary.distance_m / 1000.0));
    out.push_str(&format!("- Elevation: {:>11.2} m\n", summary.elevation_gain_m));
    out.push_str(&format!("- Avg Speed: {:>8.2} km/h\n", summary.avg_speed_kmh));
    out.push_str(&format!("- Avg Speed: {:>13}\n", summary.avg_pace));
    if let Some(avg) = summary.avg_heart_rate {
        out.push_str(&format!("- Avg HR: {:>12.2} bpm\n", avg));
    }
    out
}

pub fn render_monthly(report: &MonthlyReport) -> String {
    let mut out = String::new();
    if report.total_activities == 0 {
        out.push_str("\nNo activity found.\n");
        return out;
    }
    for (name, month) in MONTH_NAMES.iter().zip(report.months.iter()) {
        out.push_str(&format!("\n---------- {}. ----------\n", name));
        out.push_str(&format!("\nActivities recorded: {:>5}\n", month.recorded));
        if month.recorded == 0 {
            continue;
        }
        out.push_str(&format!("Activities w/o HR: {:>7}\n", month.without_hr));
        out.push_str(&format!("Threshold: {:>13.2} m\n", report.threshold_m));
        out.push_str(&format!("Activities filtered: {:>5}\n", month.filtered_out));
        out.push_str(&format!(
            "\n- Elapsed Time: {:>10}\n",
            s_to_hms(month.elapsed_time_s)
        ));
        out.push_str(&format!(
            "- Moving Time: {:>11}\n",
            s_to_hms(month.moving_time_s)
        ));
        out.push_str(&format!("- Distance: {:>11.2} km\n", month.distance_m / 1000.0));
        out.push_str(&format!("- Elevation: {:>11.2} m\n", month.elevation_gain_m));
        out.push_str(&format!("- Avg Speed: {:>8.2} km/h\n", month.avg_speed_kmh));
        out.push_str(&format!("- Avg Speed: {:>13}\n", month.avg_pace));
        if let Some(avg) = month.avg_heart_rate {
            out.push_str(&format!("- Avg HR: {:>12.2} bpm\n", avg));
        }
    }

    out.push_str("\n**** AVERAGE P. MONTH ****\n\n");
    out.push_str(&format!(
        "Avg Moving Time: {:>9}\n",
        s_to_hms(report.average.moving_time_s)
    ));
    out.push_str(&format!("Avg Distance: {:>9.2} km\n", report.average.distance_km));
    out.push_str(&format!("Avg Elevation: {:>9.2} m\n", report.average.elevation_m));
    out.push_str(&format!("Avg Speed: {:>10.2} km/h\n", report.average.speed_kmh));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EN_CSV: &str = "\
Activity ID,Activity Date,Activity Name,Activity Type,Elapsed Time,Distance,Filename,Elapsed Time,Moving Time,Distance,Max Speed,Elevation Gain,Average Heart Rate
1,\"Jun 3, 2023, 7:12:45 AM\",Morning Run,Run,9999,7.25,activities/1.gpx,2595.0,2580.0,7250.0,4.2,52.0,142.5
2,\"Jun 10, 2023, 8:01:00 AM\",Trail,Run,9999,3.0,activities/2.gpx,1810.0,1800.0,3000.0,3.9,,
3,\"Jul 2, 2023, 9:00:00 AM\",Tour,Ride,9999,20.0,activities/3.gpx,3650.0,3600.0,20000.0,11.0,120.0,130.0
4,\"Mar 5, 2022, 2:30:00 PM\",Old Run,Run,9999,2.0,activities/4.gpx,910.0,900.0,2000.0,3.1,15.0,150.0
";

    const FR_CSV: &str = "\
ID de l'activité,Date de l'activité,Nom de l'activité,Type d'activité,Temps écoulé,Distance,Nom du fichier,Temps écoulé,Durée de déplacement,Distance,Vitesse max.,Dénivelé positif,Fréquence cardiaque moyenne
10,3 juin 2023 à 07:12:45,Sortie matinale,Course à pied,9999,7.25,activities/10.gpx,2595.0,2580.0,7250.0,4.2,52.0,140.0
";

    fn en_dataset() -> Dataset {
        Dataset::from_reader(EN_CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_rows_sorted_and_second_columns_consumed() {
        let data = en_dataset();
        assert_eq!(data.activities.len(), 4);
        // Sorted by date, so the 2022 row comes first.
        assert_eq!(data.activities[0].date.year(), 2022);
        // The duplicated headers resolve to the second occurrence.
        assert_eq!(data.activities[1].elapsed_time_s, 2595.0);
        assert_eq!(data.activities[1].distance_m, 7250.0);
        // Blank elevation reads as zero, blank heart rate as absent.
        assert_eq!(data.activities[2].elevation_gain_m, 0.0);
        assert_eq!(data.activities[2].avg_heart_rate, None);
    }

    #[test]
    fn test_annual_all_activities() {
        let data = en_dataset();
        let summary = data.annual(2023, &ReportFilter::default());
        assert_eq!(summary.recorded, 3);
        assert_eq!(summary.filtered_out, 0);
        assert_eq!(summary.elapsed_time_s, 8055.0);
        assert_eq!(summary.moving_time_s, 7980.0);
        assert_eq!(summary.distance_m, 30250.0);
        assert_eq!(summary.elevation_gain_m, 172.0);
        assert_eq!(summary.without_hr, 1);
        let avg = summary.avg_heart_rate.unwrap();
        assert!((avg - 136.25).abs() < 1e-9);
    }

    #[test]
    fn test_annual_threshold_trims_count_but_not_sums() {
        let data = en_dataset();
        let filter = ReportFilter {
            sport: Some("Run".to_string()),
            threshold_m: 3000.0,
        };
        let summary = data.annual(2023, &filter);
        // The 3000 m activity sits exactly on the threshold and is dropped
        // by the strictly-greater comparison.
        assert_eq!(summary.recorded, 1);
        assert_eq!(summary.filtered_out, 1);
        // Sums still cover both runs.
        assert_eq!(summary.distance_m, 10250.0);
        assert_eq!(summary.moving_time_s, 4380.0);
        assert_eq!(summary.avg_heart_rate, Some(142.5));
        assert_eq!(summary.without_hr, 0);
    }

    #[test]
    fn test_monthly_threshold_keeps_boundary_activity() {
        let data = en_dataset();
        let filter = ReportFilter {
            sport: Some("Run".to_string()),
            threshold_m: 3000.0,
        };
        let report = data.monthly(2023, &filter);
        assert_eq!(report.total_activities, 2);
        let june = &report.months[5];
        // Greater-or-equal keep, so the boundary activity stays here even
        // though the annual report drops it.
        assert_eq!(june.recorded, 2);
        assert_eq!(june.filtered_out, 0);
        assert_eq!(june.distance_m, 10250.0);
        let july = &report.months[6];
        assert_eq!(july.recorded, 0);

        assert!((report.average.moving_time_s - 4380.0 / 12.0).abs() < 1e-9);
        assert!((report.average.distance_km - 10.25 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_annual_layout() {
        let data = en_dataset();
        let filter = ReportFilter {
            sport: Some("Run".to_string()),
            threshold_m: 3000.0,
        };
        let text = render_annual(&data.annual(2023, &filter));
        assert!(text.starts_with("\n========== 2023 ==========\n"));
        assert!(text.contains("\nActivities recorded:     1\n"));
        assert!(text.contains("Threshold:       3000.00 m\n"));
        assert!(text.contains("Activities filtered:     1\n"));
        assert!(text.contains("- Moving Time:     1:13:00\n"));
        assert!(text.contains("- Distance:       10.25 km\n"));
        assert!(text.contains("- Avg Speed:   7:07 min/km\n"));
        assert!(text.contains("- Avg HR:       142.50 bpm\n"));
    }

    #[test]
    fn test_render_annual_empty_year() {
        let data = en_dataset();
        let text = render_annual(&data.annual(2021, &ReportFilter::default()));
        assert_eq!(text, "\n========== 2021 ==========\n\nNo activity found.\n");
    }

    #[test]
    fn test_render_monthly_layout() {
        let data = en_dataset();
        let text = render_monthly(&data.monthly(2023, &ReportFilter::default()));
        assert!(text.contains("\n---------- Jun. ----------\n"));
        assert!(text.contains("\n---------- Jul. ----------\n\nActivities recorded:     1\n"));
        // Empty months keep their header and count only.
        assert!(text.contains("\n---------- Aug. ----------\n\nActivities recorded:     0\n"));
        assert!(text.contains("\n**** AVERAGE P. MONTH ****\n\n"));
    }

    #[test]
    fn test_render_monthly_empty_year() {
        let data = en_dataset();
        let text = render_monthly(&data.monthly(2021, &ReportFilter::default()));
        assert_eq!(text, "\nNo activity found.\n");
    }

    #[test]
    fn test_french_export() {
        let data = Dataset::from_reader(FR_CSV.as_bytes()).unwrap();
        assert_eq!(data.activities.len(), 1);
        let row = &data.activities[0];
        assert_eq!(row.sport, "Run");
        assert_eq!(row.date.year(), 2023);
        assert_eq!(row.date.month(), 6);
        assert_eq!(row.date.day(), 3);
        assert_eq!(row.elapsed_time_s, 2595.0);
        assert_eq!(row.avg_heart_rate, Some(140.0));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let csv = "Activity ID,Activity Date,Activity Type\n1,\"Jun 3, 2023, 7:12:45 AM\",Run\n";
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, RunlogError::MissingColumn("Elapsed Time")));
    }

    #[test]
    fn test_s_to_hms() {
        assert_eq!(s_to_hms(3725.0), "1:02:05");
        assert_eq!(s_to_hms(59.0), "0:00:59");
        assert_eq!(s_to_hms(0.0), "0:00:00");
    }

    #[test]
    fn test_compute_pace() {
        let (speed, pace) = compute_pace(1000.0, 300.0);
        assert_eq!(speed, 12.0);
        assert_eq!(pace, " 5:00 min/km");

        let (speed, pace) = compute_pace(7250.0, 2580.0);
        assert!((speed - 10.1163).abs() < 1e-3);
        assert_eq!(pace, " 5:55 min/km");

        // Sub-second durations degrade to the zero pace.
        let (speed, pace) = compute_pace(100.0, 0.5);
        assert_eq!(speed, 0.0);
        assert_eq!(pace, "0.0");
    }

    #[test]
    fn test_compute_pace_zero_distance() {
        // Zero distance with positive time degrades to the zero pace.
        let (speed, pace) = compute_pace(0.0, 3600.0);
        assert_eq!(speed, 0.0);
        assert_eq!(pace, "0.0");
    }

    #[test]
    fn test_render_monthly_zero_distance_pace() {
        // Gym-style rows carry time but no distance.
        let csv = "\
Activity ID,Activity Date,Activity Name,Activity Type,Elapsed Time,Distance,Filename,Elapsed Time,Moving Time,Distance,Max Speed,Elevation Gain,Average Heart Rate
7,\"Jan 6, 2024, 6:00:00 AM\",Strength,Workout,9999,0.0,activities/7.gpx,3605.0,3600.0,0.0,0.0,,
";
        let data = Dataset::from_reader(csv.as_bytes()).unwrap();
        let report = data.monthly(2024, &ReportFilter::default());
        assert_eq!(report.months[0].avg_pace, "0.0");

        let text = render_monthly(&report);
        assert!(text.contains("- Avg Speed:     0.00 km/h\n"));
        assert!(text.contains("- Avg Speed:           0.0\n"));
        assert!(text.contains("Avg Speed:       0.00 km/h\n"));
    }
}
