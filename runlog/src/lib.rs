//! Core activity-export parsing library for the runlog toolkit.

pub mod patch;
pub mod stats;
mod xml;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::xml::Element;

#[derive(Error, Debug)]
pub enum RunlogError {
    #[error("no such file or directory: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("unsupported activity format: {} (expected .gpx or .tcx)", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("malformed {format} document: {detail}")]
    MalformedDocument { format: Format, detail: String },
    #[error("io error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read activity export: {0}")]
    Csv(#[from] csv::Error),
    #[error("activity export is missing column {0:?}")]
    MissingColumn(&'static str),
    #[error("could not parse {field} value {value:?}")]
    InvalidField { field: &'static str, value: String },
}

const UNKNOWN: &str = "Unknown";

const GPX_NAMESPACES: &[&str] = &[
    "http://www.topografix.com/GPX/1/1",
    "http://www.garmin.com/xmlschemas/TrackPointExtension/v1",
    "http://www.garmin.com/xmlschemas/TrackPointExtension/v2",
];

const TCX_NAMESPACES: &[&str] = &[
    "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2",
    "http://www.garmin.com/xmlschemas/ActivityExtension/v2",
];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Format {
    Gpx,
    Tcx,
}

impl Format {
    /// Detect the format from the file name suffix. The match is
    /// case-sensitive, following the exporter's own naming.
    pub fn from_path(path: &Path) -> Result<Format, RunlogError> {
        let name = path.to_str().unwrap_or("");
        if name.ends_with(".gpx") {
            Ok(Format::Gpx)
        } else if name.ends_with(".tcx") {
            Ok(Format::Tcx)
        } else {
            Err(RunlogError::UnsupportedFormat(path.to_path_buf()))
        }
    }

    /// Namespace URIs that qualified lookups may match for this format.
    pub fn namespaces(self) -> &'static [&'static str] {
        match self {
            Format::Gpx => GPX_NAMESPACES,
            Format::Tcx => TCX_NAMESPACES,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Gpx => write!(f, "GPX"),
            Format::Tcx => write!(f, "TCX"),
        }
    }
}

/// One recorded sample. Every field is optional: an absent element stays
/// absent, it never collapses into a zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trackpoint {
    pub timestamp: Option<String>,
    pub latitude_deg: Option<f64>,
    pub longitude_deg: Option<f64>,
    pub elevation_m: Option<f64>,
    pub distance_m: Option<f64>,
    pub heart_rate_bpm: Option<f64>,
}

/// Flat metadata of one activity file plus its samples in document order.
///
/// Metadata fields use per-format sentinel defaults ("Unknown" for text,
/// 0.0 for numbers) when the source has no such element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub sport: String,
    pub start_time: String,
    pub total_time_seconds: f64,
    pub total_distance_meters: f64,
    pub calories: f64,
    pub avg_heart_rate_bpm: f64,
    pub max_heart_rate_bpm: f64,
    pub device_name: String,
    pub trackpoints: Vec<Trackpoint>,
}

impl Default for ActivityRecord {
    fn default() -> Self {
        Self {
            sport: UNKNOWN.to_string(),
            start_time: UNKNOWN.to_string(),
            total_time_seconds: 0.0,
            total_distance_meters: 0.0,
            calories: 0.0,
            avg_heart_rate_bpm: 0.0,
            max_heart_rate_bpm: 0.0,
            device_name: UNKNOWN.to_string(),
            trackpoints: Vec::new(),
        }
    }
}

impl ActivityRecord {
    /// Parse the activity file at `path`, dispatching on its suffix.
    ///
    /// Existence is checked before anything else, then the suffix, then the
    /// document is read and parsed within this call.
    pub fn from_path(path: impl AsRef<Path>) -> Result<ActivityRecord, RunlogError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RunlogError::FileNotFound(path.to_path_buf()));
        }
        let format = Format::from_path(path)?;
        let text = fs::read_to_string(path).map_err(|source| RunlogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_xml(&text, format)
    }

    /// Parse activity XML already in memory as `format`.
    pub fn from_xml(text: &str, format: Format) -> Result<ActivityRecord, RunlogError> {
        let root = xml::parse_document(text, format)?;
        match format {
            Format::Gpx => extract_gpx(&root, format),
            Format::Tcx => extract_tcx(&root, format),
        }
    }

    /// Human-readable listing of metadata and coarse trackpoint flags.
    pub fn summary(&self) -> String {
        let rule = "-".repeat(45);
        let mut out = String::new();

        out.push_str(&format!("{}\n{:^45}\n{}\n", rule, "METADATA", rule));
        let fields: [(&str, String); 8] = [
            ("sport", self.sport.clone()),
            ("start_time", self.start_time.clone()),
            ("total_time", self.total_time_seconds.to_string()),
            ("total_dist", self.total_distance_meters.to_string()),
            ("calories", self.calories.to_string()),
            ("avg_bpm", self.avg_heart_rate_bpm.to_string()),
            ("max_bpm", self.max_heart_rate_bpm.to_string()),
            ("device", self.device_name.clone()),
        ];
        for (name, value) in fields {
            out.push_str(&format!("{:<12}: {}\n", name, value));
        }

        out.push_str(&format!("{}\n{:^45}\n{}\n", rule, "TRACK DATA", rule));
        out.push_str(&format!("{:<12}: {}\n", "trackpoints", self.trackpoints.len()));

        // The flags inspect the first two samples, so short tracks report
        // the condition instead of indexing out of range.
        if self.trackpoints.len() > 2 {
            let first = &self.trackpoints[0];
            let second = &self.trackpoints[1];
            let flags: [(&str, bool); 5] = [
                ("with time", first.timestamp.is_some()),
                (
                    "with coord",
                    first.latitude_deg.is_some() && first.longitude_deg.is_some(),
                ),
                ("with ele", first.elevation_m.is_some()),
                ("with dist", matches!(second.distance_m, Some(d) if d > 0.0)),
                ("with bpm", first.heart_rate_bpm.is_some()),
            ];
            for (name, value) in flags {
                out.push_str(&format!("{:<12}: {}\n", name, value));
            }
        } else {
            out.push_str("track too short for sample flags\n");
        }
        out
    }
}

fn extract_gpx(root: &Element, format: Format) -> Result<ActivityRecord, RunlogError> {
    let mut record = ActivityRecord::default();

    if let Some(sport) = root.descendant_text(format, "type") {
        record.sport = sport.to_string();
    }
    if let Some(time) = root.find_text(format, "metadata/time") {
        record.start_time = time.to_string();
    }
    // Total time, distance, calories, heart rates and device stay at their
    // defaults: GPX has no place for them.

    for segment in root.find_all_descendants(format, "trkseg") {
        for point in segment.children_named(format, "trkpt") {
            record.trackpoints.push(gpx_trackpoint(point, format)?);
        }
    }
    Ok(record)
}

fn gpx_trackpoint(point: &Element, format: Format) -> Result<Trackpoint, RunlogError> {
    Ok(Trackpoint {
        timestamp: point.find_text(format, "time").map(str::to_string),
        latitude_deg: point.attr_f64(format, "lat")?,
        longitude_deg: point.attr_f64(format, "lon")?,
        elevation_m: point.find_f64(format, "ele")?,
        // GPX carries no odometer; the zero is a documented format gap.
        distance_m: Some(0.0),
        heart_rate_bpm: point.descendant_f64(format, "hr")?,
    })
}

fn extract_tcx(root: &Element, format: Format) -> Result<ActivityRecord, RunlogError> {
    let mut record = ActivityRecord::default();

    if let Some(activity) = root.find_descendant(format, "Activity") {
        if let Some(sport) = activity.attr("Sport") {
            record.sport = sport.to_string();
        }
    }
    if let Some(id) = root.descendant_text(format, "Id") {
        record.start_time = id.to_string();
    }
    if let Some(total) = root.descendant_f64(format, "TotalTimeSeconds")? {
        record.total_time_seconds = total;
    }
    // First DistanceMeters in document order: the lap summary when the file
    // has one, otherwise the first trackpoint odometer reading.
    if let Some(distance) = root.descendant_f64(format, "DistanceMeters")? {
        record.total_distance_meters = distance;
    }
    if let Some(calories) = root.descendant_f64(format, "Calories")? {
        record.calories = calories;
    }
    if let Some(avg) = root.find_descendant(format, "AverageHeartRateBpm") {
        if let Some(value) = avg.find_f64(format, "Value")? {
            record.avg_heart_rate_bpm = value;
        }
    }
    if let Some(max) = root.find_descendant(format, "MaximumHeartRateBpm") {
        if let Some(value) = max.find_f64(format, "Value")? {
            record.max_heart_rate_bpm = value;
        }
    }
    if let Some(creator) = root.find_descendant(format, "Creator") {
        if let Some(name) = creator.find_text(format, "Name") {
            record.device_name = name.to_string();
        }
    }

    for track in root.find_all_descendants(format, "Track") {
        for point in track.children_named(format, "Trackpoint") {
            record.trackpoints.push(tcx_trackpoint(point, format)?);
        }
    }
    Ok(record)
}

fn tcx_trackpoint(point: &Element, format: Format) -> Result<Trackpoint, RunlogError> {
    Ok(Trackpoint {
        timestamp: point.find_text(format, "Time").map(str::to_string),
        latitude_deg: point.find_f64(format, "Position/LatitudeDegrees")?,
        longitude_deg: point.find_f64(format, "Position/LongitudeDegrees")?,
        elevation_m: point.find_f64(format, "AltitudeMeters")?,
        distance_m: point.find_f64(format, "DistanceMeters")?,
        heart_rate_bpm: point.find_f64(format, "HeartRateBpm/Value")?,
    })
}
