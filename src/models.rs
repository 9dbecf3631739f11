use chrono::NaiveDateTime;

/// Parse a number that may use a comma decimal separator.
pub fn parse_comma_decimal(s: &str) -> Result<f64, std::num::ParseFloatError> {
    s.replace(',', ".").parse::<f64>()
}

/// One cell of the input sheet, after the spreadsheet reader has decoded it.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Empty,
}

impl CellValue {
    /// Interpret the cell as text, parsing numbers (comma decimals allowed).
    pub fn from_str(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('"');
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match parse_comma_decimal(trimmed) {
            Ok(num) => CellValue::Number(num),
            Err(_) => CellValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => parse_comma_decimal(s).ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::DateTime(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            CellValue::Empty => None,
        }
    }
}

/// Render a number the way the sheet showed it: integral values lose the
/// trailing ".0".
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One telemetry sample, immutable once loaded.
#[derive(Debug, Clone)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub light: f64,
    pub hour_bucket: String,
    /// Resolved by the geocoding pass; None when geocoding is disabled.
    pub address: Option<String>,
}

impl Reading {
    /// Coordinates rendered at 6 decimals, the report's display precision.
    pub fn coordinate_string(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Tabular companion of one numbered map marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerEntry {
    pub index: usize,
    pub coordinates: String,
    pub address: Option<String>,
}
