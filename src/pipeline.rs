//! Sequential report pipeline: load -> normalize -> geocode -> aggregate ->
//! render -> assemble. All intermediate artifacts live in a run-scoped
//! temporary directory that is removed on every exit path.

use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::capture::{render_static_map, ChromiumCapture, MapCapture};
use crate::charts;
use crate::config::ReportConfig;
use crate::errors::PipelineError;
use crate::geocode::{annotate_readings, NominatimClient};
use crate::loader::{self, SchemaMap};
use crate::map;
use crate::models::Reading;
use crate::normalize::normalize_coordinates;
use crate::pdf::{PdfReport, TableLimits, TableOptions};
use crate::summary::{summarize, summarize_route, BucketSummary, Metric};

const COVER_TITLE: &str = "Dados brutos do teste de Distribuição térmica em Rota";
const REPORT_TITLE: &str = "Relatório de Distribuição Térmica em Rota";

/// What one run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub readings: usize,
    pub buckets: usize,
    pub pages: usize,
    pub output: PathBuf,
}

/// Run the whole pipeline against `input`, writing the report to `output`.
pub fn run(input: &Path, output: &Path, config: &ReportConfig) -> Result<RunSummary, PipelineError> {
    let started = Instant::now();

    let (mut readings, schema) = loader::load_readings(input)?;
    normalize_coordinates(&mut readings);

    if config.geocoding.enabled() {
        resolve_addresses(&mut readings);
    }

    let temp_buckets = summarize(&readings, Metric::Temperature, config.temperature);
    let humid_buckets = summarize(&readings, Metric::Humidity, config.humidity);
    let temp_route = summarize_route(&readings, Metric::Temperature, config.temperature);
    let humid_route = summarize_route(&readings, Metric::Humidity, config.humidity);

    let workdir = tempfile::tempdir()?;
    let artifact = |name: &str| workdir.path().join(name);

    let temp_chart = artifact("grafico_temp.png");
    let humid_chart = artifact("grafico_umid.png");
    let temp_light_chart = artifact("grafico_temp_luz.png");
    let humid_light_chart = artifact("grafico_umid_luz.png");
    let map_html = artifact("mapa.html");
    let map_png = artifact("mapa.png");

    charts::render_bucket_chart(&temp_chart, &temp_buckets, Metric::Temperature, config.temperature)?;
    charts::render_bucket_chart(&humid_chart, &humid_buckets, Metric::Humidity, config.humidity)?;
    charts::render_metric_light_chart(
        &temp_light_chart,
        &readings,
        Metric::Temperature,
        config.temperature,
    )?;
    charts::render_metric_light_chart(
        &humid_light_chart,
        &readings,
        Metric::Humidity,
        config.humidity,
    )?;

    let markers = map::build_route_map(&readings, &map_html)?;
    info!("Route map built with {} markers", markers.len());
    capture_map(&readings, &map_html, &map_png)?;

    let pages = assemble_report(
        output,
        config,
        &readings,
        &schema,
        &temp_buckets,
        &humid_buckets,
        &temp_route.display_row(),
        &humid_route.display_row(),
        &map_png,
        &temp_chart,
        &humid_chart,
        &temp_light_chart,
        &humid_light_chart,
    )?;

    info!(
        "Report with {} pages written to {} in {:.2}s",
        pages,
        output.display(),
        started.elapsed().as_secs_f32()
    );

    Ok(RunSummary {
        readings: readings.len(),
        buckets: temp_buckets.len(),
        pages,
        output: output.to_path_buf(),
    })
}

/// Row-wise geocoding pass with a terminal progress bar. Never fails the
/// pipeline: transport problems degrade to per-row sentinel strings, and an
/// unusable client just skips the pass.
fn resolve_addresses(readings: &mut [Reading]) {
    let mut client = match NominatimClient::new() {
        Ok(client) => client,
        Err(e) => {
            warn!("Geocoding disabled: could not build HTTP client: {e}");
            return;
        }
    };

    info!("Resolving addresses for {} readings", readings.len());
    let bar = ProgressBar::new(readings.len() as u64);
    annotate_readings(readings, &mut client, |done, _total| {
        bar.set_position(done as u64)
    });
    bar.finish_and_clear();
}

/// Screenshot the map with a headless browser when one exists; otherwise
/// draw the route natively so the report still carries a map image.
fn capture_map(readings: &[Reading], map_html: &Path, map_png: &Path) -> Result<(), PipelineError> {
    match ChromiumCapture::discover().and_then(|browser| browser.capture(map_html, map_png)) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Headless capture unavailable ({e}); falling back to the static renderer");
            render_static_map(readings, map_png)?;
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_report(
    output: &Path,
    config: &ReportConfig,
    readings: &[Reading],
    schema: &SchemaMap,
    temp_buckets: &[BucketSummary],
    humid_buckets: &[BucketSummary],
    temp_route_row: &[String],
    humid_route_row: &[String],
    map_png: &Path,
    temp_chart: &Path,
    humid_chart: &Path,
    temp_light_chart: &Path,
    humid_light_chart: &Path,
) -> Result<usize, PipelineError> {
    let mut report = PdfReport::new(REPORT_TITLE)?;

    let temp_limits = TableLimits {
        temperature: Some(config.temperature),
        humidity: None,
    };
    let humid_limits = TableLimits {
        temperature: None,
        humidity: Some(config.humidity),
    };
    let both_limits = TableLimits {
        temperature: Some(config.temperature),
        humidity: Some(config.humidity),
    };

    report.cover(COVER_TITLE, config.observations.as_deref());
    report.image_page("Mapa do trajeto da rota", map_png, None)?;

    report.image_page("Gráfico de Temperaturas por Hora", temp_chart, None)?;
    summary_table_page(&mut report, Metric::Temperature, temp_buckets, &temp_limits);

    report.image_page("Gráfico de Umidade Relativa por Hora", humid_chart, None)?;
    summary_table_page(&mut report, Metric::Humidity, humid_buckets, &humid_limits);

    report.image_page(
        "Gráfico de Temperatura e Luz ao Longo do Tempo",
        temp_light_chart,
        Some(90.0),
    )?;
    report.set_cursor(120.0);
    mini_table(
        &mut report,
        "Tabela de resumo de dados de temperatura",
        &Metric::Temperature.route_headers(),
        temp_route_row,
    );

    report.image_page(
        "Gráfico de Umidade relativa e Luz ao Longo do Tempo",
        humid_light_chart,
        Some(90.0),
    )?;
    report.set_cursor(120.0);
    mini_table(
        &mut report,
        "Tabela de resumo de dados de Umidade Relativa",
        &Metric::Humidity.route_headers(),
        humid_route_row,
    );

    report.add_page();
    let (raw_headers, raw_rows) = raw_data_table(readings, schema);
    report.draw_table(
        &raw_headers,
        &raw_rows,
        None,
        &both_limits,
        &TableOptions::default(),
    );

    Ok(report.finish(output)?)
}

fn summary_table_page(
    report: &mut PdfReport,
    metric: Metric,
    buckets: &[BucketSummary],
    limits: &TableLimits,
) {
    let rows: Vec<Vec<String>> = buckets.iter().map(|b| b.display_row()).collect();
    let numeric: Vec<Vec<f64>> = buckets.iter().map(|b| b.numeric_row()).collect();

    report.add_page();
    report.draw_table(
        &metric.summary_headers(),
        &rows,
        Some(&numeric),
        limits,
        &TableOptions {
            title: Some(metric.title().to_string()),
            ..TableOptions::default()
        },
    );
}

/// Whole-route one-row table drawn beneath a dual-axis chart.
fn mini_table(report: &mut PdfReport, title: &str, headers: &[String], row: &[String]) {
    report.draw_table(
        headers,
        &[row.to_vec()],
        None,
        &TableLimits::default(),
        &TableOptions {
            title: Some(title.to_string()),
            equal_widths: true,
            ..TableOptions::default()
        },
    );
}

/// Full raw-data table: every reading, source header names, hour-bucket
/// column omitted, address appended when the geocoding pass ran.
fn raw_data_table(readings: &[Reading], schema: &SchemaMap) -> (Vec<String>, Vec<Vec<String>>) {
    let with_addresses = readings.iter().any(|r| r.address.is_some());

    let mut headers = vec![
        schema.timestamp.header.clone(),
        schema.temperature.header.clone(),
        schema.humidity.header.clone(),
        schema.light.header.clone(),
        schema.latitude.header.clone(),
        schema.longitude.header.clone(),
    ];
    if with_addresses {
        headers.push("Endereço".to_string());
    }

    let rows = readings
        .iter()
        .map(|r| {
            let mut row = vec![
                r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                format!("{}", r.temperature),
                format!("{}", r.humidity),
                format!("{}", r.light),
                format!("{}", r.latitude),
                format!("{}", r.longitude),
            ];
            if with_addresses {
                row.push(r.address.clone().unwrap_or_default());
            }
            row
        })
        .collect();

    (headers, rows)
}
