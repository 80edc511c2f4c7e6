//! Distance repair for single-lap Garmin TCX exports whose odometer went
//! missing. The document is rewritten line by line rather than through the
//! XML layer: every `<DistanceMeters>` inside the track is replaced with a
//! constant-speed synthetic value, and the lap total is updated to match.
//!
//! The rewrite leans on the fixed layout of these exports: the two-digit
//! seconds field sits at a known byte offset in the `<Time>` and
//! `<Lap StartTime=...>` lines, and the lap total distance occupies line 14
//! of the file.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::{Format, RunlogError};

pub const DEFAULT_SPEED_KMH: f64 = 25.0;

// Line index of the lap total DistanceMeters in a single-lap export.
const LAP_DISTANCE_LINE: usize = 13;

// Byte offset of the seconds digits in a stripped `<Time>` line and in a
// stripped `<Lap StartTime="...">` line.
const TIME_SECONDS_OFFSET: usize = 23;
const LAP_SECONDS_OFFSET: usize = 33;

const TRACKPOINT_INDENT: &str = "            ";
const LAP_INDENT: &str = "        ";

/// What a patch run did: how many trackpoints were rewritten, the elapsed
/// time reconstructed from their timestamps, and the final odometer value
/// written to the lap total.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchOutcome {
    pub trackpoints: usize,
    pub elapsed_s: i64,
    pub final_distance_m: f64,
}

fn malformed(detail: String) -> RunlogError {
    RunlogError::MalformedDocument {
        format: Format::Tcx,
        detail,
    }
}

/// Patch a TCX file on disk and write the result next to it as `clean.tcx`
/// (or to `output` when given). The input file is left untouched.
pub fn patch_file(
    path: impl AsRef<Path>,
    speed_kmh: f64,
    output: Option<PathBuf>,
) -> Result<(PathBuf, PatchOutcome), RunlogError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RunlogError::FileNotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| RunlogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let outcome = patch_lines(&mut lines, speed_kmh, &mut rand::thread_rng())?;

    let output = output.unwrap_or_else(|| path.with_file_name("clean.tcx"));
    let mut patched = lines.join("\n");
    patched.push('\n');
    fs::write(&output, patched).map_err(|source| RunlogError::Io {
        path: output.clone(),
        source,
    })?;
    Ok((output, outcome))
}

/// Rewrite the distance lines in place. Timestamps only expose their seconds
/// digits at the fixed offset, so a decrease between consecutive trackpoints
/// is read as a minute rollover. Each synthetic distance gets a small
/// uniform jitter so the track does not look machine-generated.
pub fn patch_lines<R: Rng>(
    lines: &mut [String],
    speed_kmh: f64,
    rng: &mut R,
) -> Result<PatchOutcome, RunlogError> {
    let mut track_start = None;
    let mut track_end = None;
    let mut lap_seconds = 0i64;
    for (index, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        if stripped == "<Track>" {
            track_start = Some(index);
        } else if stripped.get(38..) == Some("0Z\">") {
            if let Some(seconds) = parse_seconds(stripped, LAP_SECONDS_OFFSET) {
                lap_seconds = seconds;
            }
        } else if stripped == "</Track>" {
            track_end = Some(index);
            break;
        }
    }
    let track_start = track_start.ok_or_else(|| malformed("no <Track> element".to_string()))?;
    let track_end = track_end.ok_or_else(|| malformed("no </Track> element".to_string()))?;

    let speed = speed_kmh * 1000.0 / 3600.0;
    let mut elapsed = 0i64;
    let mut old_seconds = lap_seconds;
    let mut last_distance = None;
    let mut patched = 0usize;

    for index in track_start..track_end {
        if lines[index].trim() != "<Trackpoint>" {
            continue;
        }
        let seconds = lines
            .get(index + 1)
            .and_then(|line| parse_seconds(line, TIME_SECONDS_OFFSET))
            .ok_or_else(|| {
                malformed(format!(
                    "trackpoint at line {} lacks a parsable <Time>",
                    index + 1
                ))
            })?;
        let dt = seconds - old_seconds;
        elapsed += if dt > 0 {
            dt
        } else if dt < 0 {
            dt + 60
        } else {
            0
        };
        old_seconds = seconds;

        let distance = speed * elapsed as f64 + rng.gen_range(-0.1..0.1);
        let slot = lines.get_mut(index + 2).ok_or_else(|| {
            malformed(format!(
                "trackpoint at line {} lacks a distance line",
                index + 1
            ))
        })?;
        *slot = format!(
            "{}<DistanceMeters>{}</DistanceMeters>",
            TRACKPOINT_INDENT, distance
        );
        last_distance = Some(distance);
        patched += 1;
    }

    let final_distance = last_distance
        .ok_or_else(|| malformed("no <Trackpoint> elements inside the track".to_string()))?;
    let lap_line = lines.get_mut(LAP_DISTANCE_LINE).ok_or_else(|| {
        malformed(format!(
            "document shorter than {} lines, cannot rewrite the lap distance",
            LAP_DISTANCE_LINE + 1
        ))
    })?;
    *lap_line = format!(
        "{}<DistanceMeters>{}</DistanceMeters>",
        LAP_INDENT, final_distance
    );

    Ok(PatchOutcome {
        trackpoints: patched,
        elapsed_s: elapsed,
        final_distance_m: final_distance,
    })
}

fn parse_seconds(line: &str, offset: usize) -> Option<i64> {
    line.trim()
        .get(offset..offset + 2)
        .and_then(|digits| digits.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::env;
    use std::path::PathBuf;
    use std::process;

    // Lap total DistanceMeters on line index 13, three trackpoints whose
    // seconds run 45, 55, 05 so the last step crosses a minute boundary.
    const PATCH_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <Activities>
    <Activity Sport="Biking">
      <Id>2023-06-03T07:12:45.000Z</Id>
      <Lap StartTime="2023-06-03T07:12:45.000Z">
        <TotalTimeSeconds>80.0</TotalTimeSeconds>
        <Calories>25</Calories>
        <Intensity>Active</Intensity>
        <TriggerMethod>Manual</TriggerMethod>
        <MaximumSpeed>0.0</MaximumSpeed>
        <AverageHeartRateBpm><Value>120</Value></AverageHeartRateBpm>
        <MaximumHeartRateBpm><Value>140</Value></MaximumHeartRateBpm>
        <DistanceMeters>0.0</DistanceMeters>
        <Track>
          <Trackpoint>
            <Time>2023-06-03T07:12:45.000Z</Time>
            <DistanceMeters>0.0</DistanceMeters>
          </Trackpoint>
          <Trackpoint>
            <Time>2023-06-03T07:12:55.000Z</Time>
            <DistanceMeters>1.0</DistanceMeters>
          </Trackpoint>
          <Trackpoint>
            <Time>2023-06-03T07:13:05.000Z</Time>
            <DistanceMeters>2.0</DistanceMeters>
          </Trackpoint>
        </Track>
      </Lap>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#;

    fn fixture_lines() -> Vec<String> {
        PATCH_DOC.lines().map(str::to_string).collect()
    }

    fn distance_in(line: &str) -> f64 {
        let start = line.find('>').unwrap() + 1;
        let end = line.rfind("</").unwrap();
        line[start..end].parse().unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("runlog_patch_{}_{}", process::id(), name))
    }

    #[test]
    fn test_patch_synthesizes_constant_pace_distances() {
        let mut lines = fixture_lines();
        let mut rng = StdRng::seed_from_u64(42);
        let outcome = patch_lines(&mut lines, DEFAULT_SPEED_KMH, &mut rng).unwrap();

        assert_eq!(outcome.trackpoints, 3);
        // 0 s at the lap start, +10 s, then +10 s across the minute wrap.
        assert_eq!(outcome.elapsed_s, 20);

        let meters_per_second = DEFAULT_SPEED_KMH * 1000.0 / 3600.0;
        assert!(lines[17].starts_with("            <DistanceMeters>"));
        assert!(distance_in(&lines[17]).abs() < 0.1);
        assert!((distance_in(&lines[21]) - meters_per_second * 10.0).abs() < 0.1);
        assert!((distance_in(&lines[25]) - meters_per_second * 20.0).abs() < 0.1);
    }

    #[test]
    fn test_patch_rewrites_lap_total_with_last_distance() {
        let mut lines = fixture_lines();
        let mut rng = StdRng::seed_from_u64(42);
        let outcome = patch_lines(&mut lines, DEFAULT_SPEED_KMH, &mut rng).unwrap();

        assert_eq!(outcome.final_distance_m, distance_in(&lines[25]));
        assert_eq!(
            lines[13],
            format!(
                "        <DistanceMeters>{}</DistanceMeters>",
                outcome.final_distance_m
            )
        );
    }

    #[test]
    fn test_patch_is_deterministic_for_a_seed() {
        let mut first = fixture_lines();
        let mut second = fixture_lines();
        patch_lines(&mut first, DEFAULT_SPEED_KMH, &mut StdRng::seed_from_u64(7)).unwrap();
        patch_lines(&mut second, DEFAULT_SPEED_KMH, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_patch_requires_track_bounds() {
        let mut lines: Vec<String> = PATCH_DOC
            .lines()
            .filter(|line| line.trim() != "<Track>")
            .map(str::to_string)
            .collect();
        let err =
            patch_lines(&mut lines, DEFAULT_SPEED_KMH, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(err.to_string().contains("no <Track>"));
    }

    #[test]
    fn test_patch_requires_trackpoints() {
        let mut lines: Vec<String> = PATCH_DOC
            .lines()
            .filter(|line| {
                let stripped = line.trim();
                !stripped.starts_with("<Trackpoint>")
                    && !stripped.starts_with("<Time>")
                    && !stripped.starts_with("<DistanceMeters>")
                    && !stripped.starts_with("</Trackpoint>")
            })
            .map(str::to_string)
            .collect();
        let err =
            patch_lines(&mut lines, DEFAULT_SPEED_KMH, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(err.to_string().contains("no <Trackpoint>"));
    }

    #[test]
    fn test_patch_rejects_documents_without_a_lap_line() {
        let doc = r#"<Tcx>
  <Lap StartTime="2023-06-03T07:12:45.000Z">
    <Track>
      <Trackpoint>
        <Time>2023-06-03T07:12:45.000Z</Time>
        <DistanceMeters>0.0</DistanceMeters>
      </Trackpoint>
    </Track>
  </Lap>
</Tcx>"#;
        let mut lines: Vec<String> = doc.lines().map(str::to_string).collect();
        let err =
            patch_lines(&mut lines, DEFAULT_SPEED_KMH, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(err.to_string().contains("lap distance"));
    }

    #[test]
    fn test_patch_file_writes_clean_sibling() {
        let dir = temp_path("outdir");
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("activity.tcx");
        std::fs::write(&input, format!("{}\n", PATCH_DOC)).unwrap();

        let (output, outcome) = patch_file(&input, DEFAULT_SPEED_KMH, None).unwrap();
        assert_eq!(output, dir.join("clean.tcx"));
        assert_eq!(outcome.trackpoints, 3);

        let patched = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = patched.lines().collect();
        assert!(lines[13].contains("<DistanceMeters>"));
        assert_eq!(distance_in(lines[13]), outcome.final_distance_m);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_patch_file_missing_input() {
        let err = patch_file("no_such_activity.tcx", DEFAULT_SPEED_KMH, None).unwrap_err();
        assert!(matches!(err, RunlogError::FileNotFound(_)));
    }
}
