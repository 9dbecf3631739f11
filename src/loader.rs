use std::fs::File;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use tracing::{debug, info};

use crate::errors::LoadError;
use crate::models::{CellValue, Reading};

/// Timestamp renderings accepted from text cells, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

/// Column indices for the semantic fields the pipeline needs, resolved once
/// at load time against the actual sheet headers.
#[derive(Debug, Clone)]
pub struct SchemaMap {
    pub timestamp: ResolvedColumn,
    pub temperature: ResolvedColumn,
    pub humidity: ResolvedColumn,
    pub light: ResolvedColumn,
    pub latitude: ResolvedColumn,
    pub longitude: ResolvedColumn,
    pub hour_bucket: ResolvedColumn,
}

#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub index: usize,
    pub header: String,
}

/// (semantic field, header substrings that identify it, case-insensitive)
const FIELD_PATTERNS: &[(&str, &[&str])] = &[
    ("timestamp", &["date time", "datetime", "data/hora", "timestamp"]),
    ("temperature", &["temperatura", "temp"]),
    ("humidity", &["umidade", "humidity", "%ur"]),
    ("light", &["luz", "light", "lx"]),
    ("latitude", &["latitude", "lat"]),
    ("longitude", &["longitude", "lon", "lng"]),
    ("hour_bucket", &["hora", "hour"]),
];

impl SchemaMap {
    /// Resolve every semantic field to a concrete column, failing fast with
    /// the missing field named. Exact (case-insensitive) header matches win
    /// over substring matches; a column feeds at most one field.
    pub fn resolve(headers: &[String]) -> Result<Self, LoadError> {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut claimed = vec![false; headers.len()];
        let mut found: Vec<ResolvedColumn> = Vec::with_capacity(FIELD_PATTERNS.len());

        for &(field, patterns) in FIELD_PATTERNS {
            let exact = lowered
                .iter()
                .enumerate()
                .find(|(i, h)| !claimed[*i] && patterns.iter().any(|p| h.as_str() == *p));
            let by_substring = || {
                lowered
                    .iter()
                    .enumerate()
                    .find(|(i, h)| !claimed[*i] && patterns.iter().any(|p| h.contains(*p)))
            };
            match exact.or_else(by_substring) {
                Some((index, _)) => {
                    claimed[index] = true;
                    found.push(ResolvedColumn {
                        index,
                        header: headers[index].trim().to_string(),
                    });
                }
                None => {
                    return Err(LoadError::MissingColumn {
                        field,
                        headers: headers.to_vec(),
                    })
                }
            }
        }

        let mut it = found.into_iter();
        Ok(SchemaMap {
            timestamp: it.next().unwrap(),
            temperature: it.next().unwrap(),
            humidity: it.next().unwrap(),
            light: it.next().unwrap(),
            latitude: it.next().unwrap(),
            longitude: it.next().unwrap(),
            hour_bucket: it.next().unwrap(),
        })
    }
}

/// Load the input file, resolve its schema, and shape the usable rows.
///
/// Returns the readings in file order together with the resolved schema
/// (downstream tables reuse the source header names).
pub fn load_readings(path: &Path) -> Result<(Vec<Reading>, SchemaMap), LoadError> {
    let (headers, rows) = read_table(path)?;
    let (headers, rows) = drop_empty_columns(headers, rows);
    let schema = SchemaMap::resolve(&headers)?;

    let total = rows.len();
    let mut readings = Vec::with_capacity(total);
    let mut dropped = 0usize;

    for row in rows {
        match shape_row(&row, &schema) {
            Some(reading) => readings.push(reading),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!("Dropped {} of {} rows missing required fields", dropped, total);
    }
    if readings.is_empty() {
        return Err(LoadError::NoRows {
            path: path.to_path_buf(),
        });
    }

    info!(
        "Loaded {} readings from {} ({} dropped)",
        readings.len(),
        path.display(),
        dropped
    );
    Ok((readings, schema))
}

fn shape_row(row: &[CellValue], schema: &SchemaMap) -> Option<Reading> {
    let cell = |col: &ResolvedColumn| row.get(col.index).unwrap_or(&CellValue::Empty);

    let timestamp = parse_timestamp(cell(&schema.timestamp))?;
    let latitude = cell(&schema.latitude).as_f64()?;
    let longitude = cell(&schema.longitude).as_f64()?;
    let temperature = cell(&schema.temperature).as_f64()?;
    let humidity = cell(&schema.humidity).as_f64()?;
    let hour_bucket = cell(&schema.hour_bucket).as_text()?;
    // Light rarely drives acceptance decisions; a gap reads as zero lux.
    let light = cell(&schema.light).as_f64().unwrap_or(0.0);

    Some(Reading {
        timestamp,
        latitude,
        longitude,
        temperature,
        humidity,
        light,
        hour_bucket,
        address: None,
    })
}

fn parse_timestamp(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::DateTime(ts) => Some(*ts),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        }
        _ => None,
    }
}

fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<CellValue>>), LoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xls") => {
            read_workbook(path)
        }
        Some(ext) if ext.eq_ignore_ascii_case("csv") => read_csv(path),
        _ => Err(LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// First worksheet only; the cell decoding itself belongs to calamine.
fn read_workbook(path: &Path) -> Result<(Vec<String>, Vec<Vec<CellValue>>), LoadError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::WorkbookError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::EmptyWorkbook {
            path: path.to_path_buf(),
        })?
        .map_err(|e| LoadError::WorkbookError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|r| r.iter().map(header_text).collect())
        .unwrap_or_default();

    let data = rows
        .map(|r| r.iter().map(convert_cell).collect())
        .collect();
    Ok((headers, data))
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::String(s) => CellValue::from_str(s),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Empty),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_str(s),
    }
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<CellValue>>), LoadError> {
    let file = File::open(path).map_err(|e| LoadError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::CsvError {
            path: path.to_path_buf(),
            source: e,
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LoadError::CsvError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut row: Vec<CellValue> = record.iter().map(CellValue::from_str).collect();
        // Short records index safely downstream.
        row.resize(headers.len().max(row.len()), CellValue::Empty);
        rows.push(row);
    }
    Ok((headers, rows))
}

/// Drop columns whose data cells are entirely empty, keeping headers and
/// rows aligned.
fn drop_empty_columns(
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
) -> (Vec<String>, Vec<Vec<CellValue>>) {
    let width = headers.len();
    let mut keep = vec![false; width];
    for row in &rows {
        for (i, cell) in row.iter().take(width).enumerate() {
            if !cell.is_empty() {
                keep[i] = true;
            }
        }
    }
    if keep.iter().all(|k| *k) {
        return (headers, rows);
    }

    let filter = |row: Vec<CellValue>| -> Vec<CellValue> {
        row.into_iter()
            .enumerate()
            .filter(|(i, _)| *i < width && keep[*i])
            .map(|(_, c)| c)
            .collect()
    };
    let headers = headers
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .map(|(_, h)| h)
        .collect();
    let rows = rows.into_iter().map(filter).collect();
    (headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn schema_resolves_expected_portuguese_headers() {
        let schema = SchemaMap::resolve(&headers(&[
            "Date Time",
            "Temperatura (°C)",
            "Umidade (%UR)",
            "Luz (lx)",
            "latitude",
            "longitude",
            "Hora",
        ]))
        .unwrap();

        assert_eq!(schema.timestamp.index, 0);
        assert_eq!(schema.temperature.index, 1);
        assert_eq!(schema.humidity.index, 2);
        assert_eq!(schema.light.index, 3);
        assert_eq!(schema.latitude.index, 4);
        assert_eq!(schema.longitude.index, 5);
        assert_eq!(schema.hour_bucket.index, 6);
        assert_eq!(schema.temperature.header, "Temperatura (°C)");
    }

    #[test]
    fn schema_fails_fast_naming_the_missing_field() {
        let err = SchemaMap::resolve(&headers(&[
            "Date Time",
            "Temperatura (°C)",
            "Umidade (%UR)",
            "Luz (lx)",
            "latitude",
            "longitude",
        ]))
        .unwrap_err();

        match err {
            LoadError::MissingColumn { field, .. } => assert_eq!(field, "hour_bucket"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn schema_prefers_exact_matches_over_substrings() {
        // "lat" also occurs inside "relative"; the exact header must win.
        let schema = SchemaMap::resolve(&headers(&[
            "timestamp",
            "temp",
            "relative humidity",
            "light",
            "lat",
            "lng",
            "hour",
        ]))
        .unwrap();
        assert_eq!(schema.latitude.index, 4);
        assert_eq!(schema.humidity.index, 2);
    }

    #[test]
    fn empty_columns_are_dropped() {
        let hdrs = headers(&["a", "b", "c"]);
        let rows = vec![
            vec![
                CellValue::Number(1.0),
                CellValue::Empty,
                CellValue::Text("x".into()),
            ],
            vec![
                CellValue::Number(2.0),
                CellValue::Empty,
                CellValue::Text("y".into()),
            ],
        ];
        let (hdrs, rows) = drop_empty_columns(hdrs, rows);
        assert_eq!(hdrs, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1][1], CellValue::Text("y".into()));
    }

    #[test]
    fn timestamp_accepts_common_renderings() {
        for raw in [
            "2024-03-01 08:30:00",
            "01/03/2024 08:30:00",
            "01/03/2024 08:30",
            "2024-03-01T08:30:00",
        ] {
            let parsed = parse_timestamp(&CellValue::Text(raw.into()));
            assert!(parsed.is_some(), "failed to parse {raw}");
        }
        assert!(parse_timestamp(&CellValue::Text("yesterday".into())).is_none());
    }

    #[test]
    fn rows_missing_required_fields_are_dropped() {
        let schema = SchemaMap::resolve(&headers(&[
            "Date Time",
            "Temperatura (°C)",
            "Umidade (%UR)",
            "Luz (lx)",
            "latitude",
            "longitude",
            "Hora",
        ]))
        .unwrap();

        let complete = vec![
            CellValue::Text("2024-03-01 08:00:00".into()),
            CellValue::Number(21.5),
            CellValue::Number(55.0),
            CellValue::Number(120.0),
            CellValue::Number(-22.9),
            CellValue::Number(-43.3),
            CellValue::Number(1.0),
        ];
        assert!(shape_row(&complete, &schema).is_some());

        let mut missing_temp = complete.clone();
        missing_temp[1] = CellValue::Empty;
        assert!(shape_row(&missing_temp, &schema).is_none());

        let mut bad_date = complete.clone();
        bad_date[0] = CellValue::Text("not a date".into());
        assert!(shape_row(&bad_date, &schema).is_none());

        // Light is tolerated as a gap.
        let mut missing_light = complete;
        missing_light[3] = CellValue::Empty;
        let shaped = shape_row(&missing_light, &schema).unwrap();
        assert_eq!(shaped.light, 0.0);
    }
}
