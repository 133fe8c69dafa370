//! CSV and JSON export of the buffered history.

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use climate_core::{Reading, RunningStats};
use serde::Serialize;

pub const CSV_FILENAME: &str = "airquality_data.csv";
pub const JSON_FILENAME: &str = "airquality_data.json";
pub const CSV_HEADER: &str = "Timestamp,Temperature (°C),Humidity (%),Heat Index (°C)";

/// Epoch milliseconds as `2024-05-01T12:00:00.000Z`.
pub fn iso_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}

pub fn to_csv(readings: &[Reading]) -> String {
    let mut csv = String::with_capacity(CSV_HEADER.len() + 1 + readings.len() * 48);
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for r in readings {
        // Writing into a String cannot fail.
        let _ = writeln!(
            csv,
            "{},{},{},{}",
            iso_timestamp(r.timestamp),
            r.temperature,
            r.humidity,
            r.heat_index
        );
    }
    csv
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExport<'a> {
    pub export_date: String,
    pub stats: &'a RunningStats,
    pub data: &'a [Reading],
}

impl<'a> JsonExport<'a> {
    pub fn new(now_ms: i64, stats: &'a RunningStats, data: &'a [Reading]) -> Self {
        Self {
            export_date: iso_timestamp(now_ms),
            stats,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_core::Measurement;

    #[test]
    fn timestamps_are_iso_8601_utc() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_timestamp(1_700_000_000_123), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn csv_has_header_and_one_line_per_reading() {
        let readings = vec![
            Measurement::new(25.0, 40.0, None).unwrap().stamp(0, 1),
            Measurement::new(26.5, 41.0, Some(27.1)).unwrap().stamp(2_000, 2),
        ];
        let csv = to_csv(&readings);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                CSV_HEADER,
                "1970-01-01T00:00:00.000Z,25,40,25",
                "1970-01-01T00:00:02.000Z,26.5,41,27.1",
            ]
        );
    }

    #[test]
    fn json_export_shape() {
        let stats = RunningStats::default();
        let export = JsonExport::new(0, &stats, &[]);
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["exportDate"], "1970-01-01T00:00:00.000Z");
        assert_eq!(json["stats"]["totalReadings"], 0);
        assert!(json["data"].as_array().unwrap().is_empty());
    }
}
