use std::path::Path;

use crate::config::SpecLimits;
use crate::loader::load_readings;
use crate::normalize::normalize_coordinates;
use crate::pdf::{PdfReport, TableLimits, TableOptions};
use crate::summary::{summarize, Metric};
use crate::tests::test_helpers::write_sample_csv;

fn build_report(out: &Path, input: &Path) -> (usize, Vec<Vec<f64>>) {
    let (mut readings, _schema) = load_readings(input).unwrap();
    normalize_coordinates(&mut readings);

    let limits = SpecLimits::new(15.0, 30.0);
    let buckets = summarize(&readings, Metric::Temperature, limits);
    let numeric: Vec<Vec<f64>> = buckets.iter().map(|b| b.numeric_row()).collect();
    let rows: Vec<Vec<String>> = buckets.iter().map(|b| b.display_row()).collect();

    let mut report = PdfReport::new("teste").unwrap();
    report.cover("Dados brutos do teste de Distribuição térmica em Rota", None);
    report.add_page();
    report.draw_table(
        &Metric::Temperature.summary_headers(),
        &rows,
        Some(&numeric),
        &TableLimits {
            temperature: Some(limits),
            humidity: None,
        },
        &TableOptions {
            title: Some(Metric::Temperature.title().to_string()),
            ..TableOptions::default()
        },
    );
    let pages = report.finish(out).unwrap();
    (pages, numeric)
}

#[test]
fn loading_normalizes_microdegrees_and_drops_incomplete_rows() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_sample_csv(dir.path());

    let (mut readings, schema) = load_readings(&input).unwrap();
    // The row with the missing temperature is gone.
    assert_eq!(readings.len(), 5);
    assert_eq!(schema.temperature.header, "Temperatura (°C)");

    let converted = normalize_coordinates(&mut readings);
    assert!(converted);
    assert!((readings[0].latitude - -22.943178).abs() < 1e-9);
    assert!((readings[0].longitude - -43.384319).abs() < 1e-9);
    for r in &readings {
        assert!(r.latitude.abs() <= 180.0);
        assert!(r.longitude.abs() <= 180.0);
    }
}

#[test]
fn summaries_hold_the_percentage_invariant_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_sample_csv(dir.path());
    let (readings, _schema) = load_readings(&input).unwrap();

    for metric in [Metric::Temperature, Metric::Humidity] {
        let limits = match metric {
            Metric::Temperature => SpecLimits::new(15.0, 30.0),
            Metric::Humidity => SpecLimits::new(30.0, 70.0),
        };
        for bucket in summarize(&readings, metric, limits) {
            let total = bucket.below_pct + bucket.within_pct + bucket.above_pct;
            assert!((total - 100.0).abs() < 1e-9, "bucket {:?}", bucket.interval);
            assert!(bucket.min <= bucket.mean && bucket.mean <= bucket.max);
        }
    }
}

#[test]
fn regenerating_the_report_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_sample_csv(dir.path());

    let (pages_a, numeric_a) = build_report(&dir.path().join("a.pdf"), &input);
    let (pages_b, numeric_b) = build_report(&dir.path().join("b.pdf"), &input);

    assert_eq!(pages_a, pages_b);
    assert_eq!(numeric_a.len(), numeric_b.len());
    for (row_a, row_b) in numeric_a.iter().zip(&numeric_b) {
        for (a, b) in row_a.iter().zip(row_b) {
            if a.is_nan() {
                assert!(b.is_nan());
            } else {
                assert_eq!(a, b);
            }
        }
    }
}
