use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use model::Sample;
use serde::{Deserialize, Serialize};

pub const CSV_HEADER: [&str; 5] = ["Time", "Speed", "Acceleration", "Gyroscope", "GPS"];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("cannot write to {}: {source}", .path.display())]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: {source}")]
    MalformedLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Writes the header row and one row per sample, in order.
pub fn write_csv<W: Write>(samples: &[Sample], out: W) -> Result<(), csv::Error> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    w.write_record(CSV_HEADER)?;
    for s in samples {
        w.serialize(CsvRow::from(s))?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_csv<R: Read>(input: R) -> Result<Vec<Sample>, csv::Error> {
    let mut rdr = csv::Reader::from_reader(input);
    let mut samples = Vec::new();
    for rec in rdr.deserialize() {
        let r: CsvRow = rec?;
        samples.push(r.into());
    }
    Ok(samples)
}

pub fn export_csv(samples: &[Sample], path: &Path) -> Result<(), ExportError> {
    let f = File::create(path).map_err(|source| unavailable(path, source))?;
    write_csv(samples, f).map_err(|e| {
        if e.is_io_error() {
            unavailable(path, e.into())
        } else {
            ExportError::Csv(e)
        }
    })
}

pub fn import_csv(path: &Path) -> Result<Vec<Sample>, ExportError> {
    let f = File::open(path).map_err(|source| ExportError::SourceUnavailable { path: path.to_path_buf(), source })?;
    Ok(read_csv(f)?)
}

pub fn export_ndjson(samples: &[Sample], path: &Path) -> Result<(), ExportError> {
    let f = File::create(path).map_err(|source| unavailable(path, source))?;
    let mut w = BufWriter::new(f);
    for s in samples {
        let line = serde_json::to_string(s)?;
        writeln!(w, "{}", line).map_err(|source| unavailable(path, source))?;
    }
    w.flush().map_err(|source| unavailable(path, source))?;
    Ok(())
}

pub fn import_ndjson(path: &Path) -> Result<Vec<Sample>, ExportError> {
    let f = File::open(path).map_err(|source| ExportError::SourceUnavailable { path: path.to_path_buf(), source })?;
    let mut samples = vec![];
    for (i, line) in BufReader::new(f).lines().enumerate() {
        let s = line.map_err(|source| ExportError::SourceUnavailable { path: path.to_path_buf(), source })?;
        if s.trim().is_empty() {
            continue;
        }
        let sample = serde_json::from_str(&s).map_err(|source| ExportError::MalformedLine { line: i + 1, source })?;
        samples.push(sample);
    }
    Ok(samples)
}

fn unavailable(path: &Path, source: io::Error) -> ExportError {
    ExportError::DestinationUnavailable { path: path.to_path_buf(), source }
}

#[derive(Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Time")]
    time: f64,
    #[serde(rename = "Speed")]
    speed: f64,
    #[serde(rename = "Acceleration")]
    acceleration: f64,
    #[serde(rename = "Gyroscope")]
    gyroscope: f64,
    #[serde(rename = "GPS")]
    gps: String,
}

impl From<&Sample> for CsvRow {
    fn from(s: &Sample) -> Self {
        Self {
            time: s.elapsed_s,
            speed: s.speed_kmh,
            acceleration: s.acceleration,
            gyroscope: s.gyroscope,
            gps: s.gps.clone(),
        }
    }
}

impl From<CsvRow> for Sample {
    fn from(r: CsvRow) -> Self {
        Sample {
            elapsed_s: r.time,
            speed_kmh: r.speed,
            acceleration: r.acceleration,
            gyroscope: r.gyroscope,
            gps: r.gps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Sample> {
        (0..12)
            .map(|i| Sample {
                elapsed_s: i as f64 * 0.1003,
                speed_kmh: 50.0,
                acceleration: 10.0 + (i as f64).sin() * 0.2,
                gyroscope: -1.5 * i as f64 / 7.0,
                gps: model::HIGHWAY_GPS.into(),
            })
            .collect()
    }

    #[test]
    fn csv_round_trip_keeps_order_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let orig = samples();
        export_csv(&orig, &path).unwrap();

        let back = import_csv(&path).unwrap();
        assert_eq!(back.len(), orig.len());
        for (a, b) in orig.iter().zip(&back) {
            assert!((a.elapsed_s - b.elapsed_s).abs() < 1e-9);
            assert!((a.speed_kmh - b.speed_kmh).abs() < 1e-9);
            assert!((a.acceleration - b.acceleration).abs() < 1e-9);
            assert!((a.gyroscope - b.gyroscope).abs() < 1e-9);
            assert_eq!(a.gps, b.gps);
        }
    }

    #[test]
    fn header_row_and_quoted_gps() {
        let mut buf = Vec::new();
        write_csv(&samples()[..1], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Time,Speed,Acceleration,Gyroscope,GPS"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("0.0,50.0,"));
        assert!(row.ends_with("\"34.0522° N, 118.2437° W\""));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_log_exports_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        export_csv(&[], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), "Time,Speed,Acceleration,Gyroscope,GPS");
        assert!(import_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_destination_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/run.csv");
        let err = export_csv(&samples(), &path).unwrap_err();
        assert!(matches!(err, ExportError::DestinationUnavailable { .. }));
        let err = export_ndjson(&samples(), &path).unwrap_err();
        assert!(matches!(err, ExportError::DestinationUnavailable { .. }));
    }

    #[test]
    fn ndjson_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.ndjson");
        let orig = samples();
        export_ndjson(&orig, &path).unwrap();
        assert_eq!(import_ndjson(&path).unwrap(), orig);
    }

    #[test]
    fn ndjson_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ndjson");
        std::fs::write(&path, "{\"elapsed_s\":0.0}\n").unwrap();
        let err = import_ndjson(&path).unwrap_err();
        assert!(matches!(err, ExportError::MalformedLine { line: 1, .. }));
    }
}
