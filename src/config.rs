use serde::{Deserialize, Serialize};

/// Lower/upper acceptable bounds for one metric, user-supplied and immutable
/// for the run. Drives both percentage computation and PDF cell coloring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecLimits {
    pub lower: f64,
    pub upper: f64,
}

impl SpecLimits {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

/// Whether the run resolves coordinates to addresses. An explicit pipeline
/// input, not an ambient flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeocodingMode {
    WithAddresses,
    WithoutAddresses,
}

impl GeocodingMode {
    pub fn enabled(self) -> bool {
        matches!(self, GeocodingMode::WithAddresses)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub temperature: SpecLimits,
    pub humidity: SpecLimits,
    pub geocoding: GeocodingMode,
    /// Free-text observations shown on the cover page.
    pub observations: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            temperature: SpecLimits::new(15.0, 30.0),
            humidity: SpecLimits::new(0.0, 100.0),
            geocoding: GeocodingMode::WithAddresses,
            observations: None,
        }
    }
}
