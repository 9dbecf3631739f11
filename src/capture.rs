use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use tracing::{debug, info, warn};

use crate::errors::CaptureError;
use crate::models::Reading;

/// Raster size of the embedded route image, in pixels.
pub const CAPTURE_SIZE: (u32, u32) = (1200, 800);

const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Bounded retry policy for polling operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_base: 1.5,
        }
    }
}

/// Execute an operation with exponential backoff until it succeeds or the
/// attempt budget is spent.
pub fn retry_with_backoff<T, E, F>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation() {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        "Operation '{}' succeeded after {} attempts",
                        operation_name, attempt
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt >= config.max_attempts {
                    warn!(
                        "Operation '{}' failed after {} attempts. Final error: {}",
                        operation_name, attempt, error
                    );
                    return Err(error);
                }

                debug!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name, attempt, config.max_attempts, error, delay
                );

                std::thread::sleep(delay);

                delay = Duration::from_millis(
                    (delay.as_millis() as f64 * config.backoff_base) as u64,
                );
                if delay > config.max_delay {
                    delay = config.max_delay;
                }
            }
        }
    }
}

/// Seam for turning the map HTML artifact into a raster image.
pub trait MapCapture {
    fn capture(&self, map_html: &Path, output_png: &Path) -> Result<(), CaptureError>;
}

/// Headless-browser screenshot capture. Readiness is a bounded poll for the
/// screenshot file, not a blind fixed wait.
pub struct ChromiumCapture {
    binary: PathBuf,
    retry: RetryConfig,
}

impl ChromiumCapture {
    /// Locate a usable browser binary on PATH.
    pub fn discover() -> Result<Self, CaptureError> {
        for candidate in BROWSER_CANDIDATES {
            if let Some(binary) = find_on_path(candidate) {
                debug!("Using headless browser {}", binary.display());
                return Ok(Self {
                    binary,
                    retry: RetryConfig::default(),
                });
            }
        }
        Err(CaptureError::BrowserNotFound {
            tried: BROWSER_CANDIDATES.to_vec(),
        })
    }
}

impl MapCapture for ChromiumCapture {
    fn capture(&self, map_html: &Path, output_png: &Path) -> Result<(), CaptureError> {
        let url = format!("file://{}", map_html.display());
        let status = Command::new(&self.binary)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg(format!("--window-size={},{}", CAPTURE_SIZE.0, CAPTURE_SIZE.1))
            .arg(format!("--screenshot={}", output_png.display()))
            .arg(&url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(CaptureError::LaunchError)?;

        if !status.success() {
            warn!("Headless browser exited with {status}, polling for the screenshot anyway");
        }

        retry_with_backoff(&self.retry, "map screenshot poll", || {
            match std::fs::metadata(output_png) {
                Ok(meta) if meta.len() > 0 => Ok(()),
                _ => Err(CaptureError::ScreenshotMissing {
                    path: output_png.to_path_buf(),
                    attempts: self.retry.max_attempts,
                }),
            }
        })
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Native fallback: draw the route directly so the report still carries a
/// map image when no browser is available. White canvas, bounding-box fit
/// with padding, connecting polyline, filled circle markers.
pub fn render_static_map(readings: &[Reading], path: &Path) -> Result<(), CaptureError> {
    let (width, height) = CAPTURE_SIZE;
    let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
    for r in readings {
        min_lat = min_lat.min(r.latitude);
        max_lat = max_lat.max(r.latitude);
        min_lon = min_lon.min(r.longitude);
        max_lon = max_lon.max(r.longitude);
    }
    // A single point still needs a nonzero extent to project into.
    let lat_span = (max_lat - min_lat).max(1e-6);
    let lon_span = (max_lon - min_lon).max(1e-6);

    let pad = 60.0;
    let to_px = |lat: f64, lon: f64| -> (i32, i32) {
        let x = pad + (lon - min_lon) / lon_span * (width as f64 - 2.0 * pad);
        // Latitude grows north, pixel rows grow south.
        let y = pad + (max_lat - lat) / lat_span * (height as f64 - 2.0 * pad);
        (x as i32, y as i32)
    };

    let route_blue = Rgba([42, 111, 239, 255]);
    let mut last: Option<(i32, i32)> = None;
    for r in readings {
        let (x, y) = to_px(r.latitude, r.longitude);
        if let Some((lx, ly)) = last {
            draw_line(&mut img, lx, ly, x, y, route_blue);
        }
        last = Some((x, y));
    }
    for r in readings {
        let (x, y) = to_px(r.latitude, r.longitude);
        fill_circle(&mut img, x, y, 5, route_blue);
    }

    img.save(path)
        .map_err(|e| CaptureError::Raster(e.to_string()))?;
    info!("Rendered static route map to {}", path.display());
    Ok(())
}

/// Bresenham line drawing.
fn draw_line(img: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x0 >= 0 && y0 >= 0 && (x0 as u32) < img.width() && (y0 as u32) < img.height() {
            img.put_pixel(x0 as u32, y0 as u32, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_circle(img: &mut RgbaImage, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
