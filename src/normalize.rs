use tracing::{info, warn};

use crate::models::Reading;

const MICRODEGREE_SCALE: f64 = 1_000_000.0;

/// Detect integer-microdegree coordinates and rescale them to decimal
/// degrees in place.
///
/// The decision is made from the first sample only: if the absolute value of
/// either coordinate exceeds 180, the whole column pair is treated as
/// microdegrees. Mixed encodings within one file are not supported.
pub fn normalize_coordinates(readings: &mut [Reading]) -> bool {
    let Some(first) = readings.first() else {
        return false;
    };

    if first.latitude.abs() <= 180.0 && first.longitude.abs() <= 180.0 {
        return false;
    }

    let (sample_lat, sample_lon) = (first.latitude, first.longitude);
    warn!(
        "Coordinates look like integer microdegrees (first sample {}, {}); rescaling all rows",
        sample_lat, sample_lon
    );

    for reading in readings.iter_mut() {
        reading.latitude /= MICRODEGREE_SCALE;
        reading.longitude /= MICRODEGREE_SCALE;
    }

    info!(
        "Converted coordinates: {} -> {:.6}, {} -> {:.6}",
        sample_lat,
        sample_lat / MICRODEGREE_SCALE,
        sample_lon,
        sample_lon / MICRODEGREE_SCALE
    );
    true
}
