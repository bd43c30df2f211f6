//! Hourly measurement CSV files.
//!
//! Columns are located by header name, so column order is free and extra
//! columns (station coordinates, for instance) are ignored. Accepted names:
//!
//! | field       | header names                          |
//! |-------------|---------------------------------------|
//! | timestamp   | `timestamp`, `time`                   |
//! | pm25        | `pm25`, `pm2_5`, `pm2.5`              |
//! | pm10        | `pm10`                                |
//! | temperature | `temperature`, `temperatura`, `temp`  |
//! | humidity    | `humidity`, `humedad`                 |
//! | pressure    | `pressure`, `presion`                 |
//! | co2         | `co2`                                 |
//!
//! Header matching is case-insensitive.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::types::FeatureRow;

use super::DatasetError;

/// Header written by [`write_csv`].
pub const CSV_HEADER: &str = "timestamp,pm25,pm10,temperature,humidity,pressure,co2";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column positions resolved from a header line.
struct Columns {
    timestamp: usize,
    pm25: usize,
    pm10: usize,
    temperature: usize,
    humidity: usize,
    pressure: usize,
    co2: usize,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, DatasetError> {
        let names: Vec<String> = header
            .split(',')
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
            .collect();
        let find = |field: &'static str, aliases: &[&str]| {
            names
                .iter()
                .position(|n| aliases.contains(&n.as_str()))
                .ok_or(DatasetError::MissingColumn(field))
        };

        Ok(Self {
            timestamp: find("timestamp", &["timestamp", "time"])?,
            pm25: find("pm25", &["pm25", "pm2_5", "pm2.5"])?,
            pm10: find("pm10", &["pm10"])?,
            temperature: find("temperature", &["temperature", "temperatura", "temp"])?,
            humidity: find("humidity", &["humidity", "humedad"])?,
            pressure: find("pressure", &["pressure", "presion"])?,
            co2: find("co2", &["co2"])?,
        })
    }

    fn parse(&self, line: &str, line_num: usize) -> Result<FeatureRow, DatasetError> {
        let fields: Vec<&str> = line.split(',').collect();
        let get = |idx: usize, name: &str| {
            fields.get(idx).map(|s| s.trim()).ok_or_else(|| DatasetError::Parse {
                line: line_num,
                reason: format!("missing value for {name}"),
            })
        };
        let number = |idx: usize, name: &str| -> Result<f64, DatasetError> {
            let raw = get(idx, name)?;
            raw.parse::<f64>().map_err(|_| DatasetError::Parse {
                line: line_num,
                reason: format!("cannot parse {name} as a number: '{raw}'"),
            })
        };

        let raw_ts = get(self.timestamp, "timestamp")?;
        let timestamp = parse_timestamp(raw_ts).map_err(|reason| DatasetError::Parse {
            line: line_num,
            reason,
        })?;

        Ok(FeatureRow {
            timestamp: Some(timestamp),
            pm25: number(self.pm25, "pm25")?,
            pm10: number(self.pm10, "pm10")?,
            temperature: number(self.temperature, "temperature")?,
            humidity: number(self.humidity, "humidity")?,
            pressure: number(self.pressure, "pressure")?,
            co2: number(self.co2, "co2")?,
        })
    }
}

/// Parse RFC 3339 or naive `YYYY-MM-DD HH:MM[:SS]` (taken as UTC).
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("cannot parse timestamp '{s}'"))
}

/// Parse CSV rows from any reader. The first non-empty line is the header.
pub fn parse_csv<R: BufRead>(reader: R) -> Result<Vec<FeatureRow>, DatasetError> {
    let mut columns: Option<Columns> = None;
    let mut rows = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_num = idx + 1;
        let line = line.map_err(|e| DatasetError::Parse {
            line: line_num,
            reason: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match &columns {
            None => columns = Some(Columns::from_header(&line)?),
            Some(cols) => rows.push(cols.parse(&line, line_num)?),
        }
    }

    if columns.is_none() {
        return Err(DatasetError::MissingColumn("timestamp"));
    }
    Ok(rows)
}

/// Read a CSV history file.
pub fn read_csv(path: &Path) -> Result<Vec<FeatureRow>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = parse_csv(BufReader::new(file))?;
    tracing::info!(count = rows.len(), path = %path.display(), "Loaded measurement rows from CSV");
    Ok(rows)
}

/// Write rows under [`CSV_HEADER`]. Rows without a timestamp get an empty
/// timestamp field.
pub fn write_csv(path: &Path, rows: &[FeatureRow]) -> Result<(), DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    writeln!(out, "{CSV_HEADER}").map_err(io_err)?;
    for row in rows {
        let ts = row
            .timestamp
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{ts},{:.2},{:.2},{:.1},{:.0},{:.2},{:.0}",
            row.pm25, row.pm10, row.temperature, row.humidity, row.pressure, row.co2
        )
        .map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;

    tracing::info!(count = rows.len(), path = %path.display(), "Wrote measurement rows to CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn test_parse_station_export() {
        let csv = "\
timestamp,PM2_5,PM10,Temperatura,Humedad,Presion,CO2,Latitud,Longitud
2024-01-01 00:00:00,35.2,70.1,22.5,80,1008.3,512,-8.1098,-79.0238
2024-01-01 01:00:00,36.0,71.0,22.1,81,1007.9,530,-8.1098,-79.0238
";
        let rows = parse_csv(Cursor::new(csv)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pm25, 35.2);
        assert_eq!(rows[0].co2, 512.0);
        assert_eq!(rows[1].humidity, 81.0);
        assert_eq!(
            rows[1].timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_columns_in_any_order() {
        let csv = "co2,pressure,humidity,temperature,pm10,pm25,timestamp\n\
                   600,1013.25,80,25,70,40,2024-03-01T12:00:00Z\n";
        let rows = parse_csv(Cursor::new(csv)).unwrap();
        assert_eq!(rows[0].pm25, 40.0);
        assert_eq!(rows[0].co2, 600.0);
        assert_eq!(rows[0].pressure, 1013.25);
    }

    #[test]
    fn test_missing_column_and_bad_value() {
        let csv = "timestamp,pm25,pm10,temperature,humidity,pressure\n";
        assert!(matches!(
            parse_csv(Cursor::new(csv)),
            Err(DatasetError::MissingColumn("co2"))
        ));

        let csv = format!("{CSV_HEADER}\n2024-01-01 00:00,abc,1,1,1,1,1\n");
        assert!(matches!(
            parse_csv(Cursor::new(csv)),
            Err(DatasetError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 0).unwrap();
        for s in ["2024-05-06T07:08:00Z", "2024-05-06 07:08:00", "2024-05-06 07:08", "2024-05-06T07:08:00"] {
            assert_eq!(parse_timestamp(s).unwrap(), expected, "{s}");
        }
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("history.csv");
        let rows: Vec<FeatureRow> = (0..3)
            .map(|h| FeatureRow {
                timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()),
                pm25: 30.25,
                pm10: 60.5,
                temperature: 21.5,
                humidity: 79.0,
                pressure: 1009.75,
                co2: 480.0,
            })
            .collect();

        write_csv(&path, &rows).unwrap();
        assert_eq!(read_csv(&path).unwrap(), rows);
    }
}
