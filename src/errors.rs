use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error reading input file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to open workbook {path}: {message}")]
    WorkbookError { path: PathBuf, message: String },
    #[error("Error reading CSV data in {path}: {source}")]
    CsvError {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Workbook {path} contains no worksheets")]
    EmptyWorkbook { path: PathBuf },
    #[error("No column matching required field '{field}' was found (headers: {headers:?})")]
    MissingColumn {
        field: &'static str,
        headers: Vec<String>,
    },
    #[error("Unsupported input extension for {path}: expected .xlsx or .csv")]
    UnsupportedFormat { path: PathBuf },
    #[error("No usable rows remain in {path} after dropping incomplete ones")]
    NoRows { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Cannot build a route map from zero readings")]
    NoReadings,
    #[error("IO error writing map artifact {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No headless browser binary found (tried {tried:?})")]
    BrowserNotFound { tried: Vec<&'static str> },
    #[error("Failed to launch headless browser: {0}")]
    LaunchError(#[source] io::Error),
    #[error("Screenshot {path} never appeared after {attempts} attempts")]
    ScreenshotMissing { path: PathBuf, attempts: u32 },
    #[error("Raster fallback failed: {0}")]
    Raster(String),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Chart rendering failed: {0}")]
    Chart(String),
    #[error("PDF generation failed: {0}")]
    Pdf(String),
    #[error("IO error writing report artifact {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Loading input failed: {0}")]
    Load(#[from] LoadError),
    #[error("Map construction failed: {0}")]
    Map(#[from] MapError),
    #[error("Map capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("Report generation failed: {0}")]
    Report(#[from] ReportError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
