use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::MapError;
use crate::models::{MarkerEntry, Reading};

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
const OSM_TILES: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Serialize a self-contained Leaflet route map to `path` and return the
/// parallel marker table (index, coordinates, optional address).
///
/// The map carries a bounding-box fit over every point, a connecting
/// polyline, and one numbered marker per point with a detail popup.
pub fn build_route_map(readings: &[Reading], path: &Path) -> Result<Vec<MarkerEntry>, MapError> {
    if readings.is_empty() {
        return Err(MapError::NoReadings);
    }

    let markers: Vec<MarkerEntry> = readings
        .iter()
        .enumerate()
        .map(|(i, r)| MarkerEntry {
            index: i + 1,
            coordinates: r.coordinate_string(),
            address: r.address.clone(),
        })
        .collect();

    let html = render_map_html(readings);
    fs::write(path, html).map_err(|e| MapError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("Wrote route map with {} markers to {}", markers.len(), path.display());
    Ok(markers)
}

fn render_map_html(readings: &[Reading]) -> String {
    let first = &readings[0];
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str("    <meta charset=\"utf-8\"/>\n");
    out.push_str("    <title>Mapa do trajeto da rota</title>\n");
    let _ = writeln!(out, "    <link rel=\"stylesheet\" href=\"{LEAFLET_CSS}\"/>");
    let _ = writeln!(out, "    <script src=\"{LEAFLET_JS}\"></script>");
    out.push_str("    <style>html, body, #map { height: 100%; margin: 0; }</style>\n");
    out.push_str("</head>\n<body>\n    <div id=\"map\"></div>\n    <script>\n");

    let _ = writeln!(
        out,
        "        var map = L.map('map').setView([{:.6}, {:.6}], 10);",
        first.latitude, first.longitude
    );
    let _ = writeln!(
        out,
        "        L.tileLayer('{OSM_TILES}', {{\n            attribution: '&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors'\n        }}).addTo(map);"
    );

    out.push_str("        var path = [\n");
    for reading in readings {
        let _ = writeln!(
            out,
            "            [{:.6}, {:.6}],",
            reading.latitude, reading.longitude
        );
    }
    out.push_str("        ];\n");
    out.push_str(
        "        L.polyline(path, { color: 'blue', weight: 2.5, opacity: 1 }).addTo(map);\n",
    );

    for (i, reading) in readings.iter().enumerate() {
        let icon_html = format!(
            "<div style=\\\"font-size: 10pt; color: white; background-color: blue; \
             border-radius: 50%; width: 20px; height: 20px; text-align: center; \
             line-height: 20px;\\\">{}</div>",
            i + 1
        );
        let _ = writeln!(
            out,
            "        L.marker([{:.6}, {:.6}], {{ icon: L.divIcon({{ className: '', html: \"{}\", iconSize: [20, 20], iconAnchor: [10, 10] }}) }})\n            .bindPopup(\"{}\", {{ maxWidth: 300 }}).addTo(map);",
            reading.latitude,
            reading.longitude,
            icon_html,
            escape_js(&popup_html(i + 1, reading)),
        );
    }

    out.push_str("        map.fitBounds(path, { padding: [30, 30] });\n");
    out.push_str("    </script>\n</body>\n</html>\n");
    out
}

fn popup_html(index: usize, reading: &Reading) -> String {
    let mut popup = format!(
        "<b>Ponto {index}</b><br><b>Coordenadas:</b> {}<br>",
        reading.coordinate_string()
    );
    if let Some(address) = &reading.address {
        let _ = write!(popup, "<b>Endereço:</b> {address}<br>");
    }
    let _ = write!(
        popup,
        "<b>Data/Hora:</b> {}<br><b>Temperatura:</b> {:.2}°C<br><b>Umidade:</b> {:.2}%",
        reading.timestamp.format("%Y-%m-%d %H:%M:%S"),
        reading.temperature,
        reading.humidity
    );
    popup
}

/// Escape text for interpolation inside a double-quoted JS string literal.
fn escape_js(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reading(lat: f64, lon: f64, address: Option<&str>) -> Reading {
        Reading {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            latitude: lat,
            longitude: lon,
            temperature: 22.5,
            humidity: 61.0,
            light: 300.0,
            hour_bucket: "1".to_string(),
            address: address.map(|s| s.to_string()),
        }
    }

    #[test]
    fn empty_route_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_route_map(&[], &dir.path().join("map.html")).unwrap_err();
        assert!(matches!(err, MapError::NoReadings));
    }

    #[test]
    fn map_artifact_and_marker_table_stay_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.html");
        let rows = vec![
            reading(-22.943178, -43.384319, Some("Rua A - Rio de Janeiro")),
            reading(-22.944000, -43.385000, None),
        ];

        let markers = build_route_map(&rows, &path).unwrap();

        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].index, 1);
        assert_eq!(markers[0].coordinates, "-22.943178, -43.384319");
        assert_eq!(markers[0].address.as_deref(), Some("Rua A - Rio de Janeiro"));
        assert!(markers[1].address.is_none());

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("L.polyline"));
        assert!(html.contains("fitBounds"));
        assert!(html.contains("Ponto 1"));
        assert!(html.contains("-22.943178, -43.384319"));
        assert!(html.contains("Rua A - Rio de Janeiro"));
    }

    #[test]
    fn popup_omits_address_when_absent() {
        let popup = popup_html(3, &reading(1.0, 2.0, None));
        assert!(!popup.contains("Endereço"));
        assert!(popup.contains("Ponto 3"));
        assert!(popup.contains("22.50°C"));
    }

    #[test]
    fn js_escaping_neutralizes_quotes() {
        assert_eq!(escape_js(r#"a "b" \c"#), r#"a \"b\" \\c"#);
    }
}
