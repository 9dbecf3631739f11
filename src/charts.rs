use std::fmt::Display;
use std::path::Path;

use chrono::NaiveDateTime;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;

use crate::config::SpecLimits;
use crate::errors::ReportError;
use crate::models::Reading;
use crate::summary::{BucketSummary, Metric};

const CHART_SIZE: (u32, u32) = (1200, 600);

fn chart_err(e: impl Display) -> ReportError {
    ReportError::Chart(e.to_string())
}

fn metric_axis_label(metric: Metric) -> &'static str {
    match metric {
        Metric::Temperature => "Temperatura (°C)",
        Metric::Humidity => "Umidade Relativa (%)",
    }
}

fn metric_unit(metric: Metric) -> &'static str {
    match metric {
        Metric::Temperature => "°C",
        Metric::Humidity => "%",
    }
}

/// Y range that always contains both the data extremes and the thresholds:
/// `min(data, lower) - 1 ..= max(data, upper) + 1`, rounded outward to
/// integers for tick placement.
fn adaptive_range(values: impl Iterator<Item = f64>, limits: SpecLimits) -> (f64, f64) {
    let (mut lo, mut hi) = (limits.lower, limits.upper);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    ((lo - 1.0).floor(), (hi + 1.0).ceil())
}

/// Per-bucket min/mean/max line chart with both spec thresholds drawn as
/// dashed horizontal lines.
pub fn render_bucket_chart(
    path: &Path,
    summaries: &[BucketSummary],
    metric: Metric,
    limits: SpecLimits,
) -> Result<(), ReportError> {
    let n = summaries.len().max(1);
    let labels: Vec<String> = summaries.iter().map(|s| s.interval.clone()).collect();

    let (y_min, y_max) = match metric {
        // Humidity is always plotted on the full percentage scale.
        Metric::Humidity => (0.0, 100.0),
        Metric::Temperature => adaptive_range(
            summaries.iter().flat_map(|s| [s.min, s.mean, s.max]),
            limits,
        ),
    };
    let y_labels = match metric {
        Metric::Humidity => 11,
        Metric::Temperature => (((y_max - y_min) / 2.0) as usize + 1).clamp(5, 25),
    };

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(12)
        .x_label_area_size(70)
        .y_label_area_size(55)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_min..y_max)
        .map_err(chart_err)?;

    let skip_every_other = n > 20;
    chart
        .configure_mesh()
        .x_desc("Intervalo")
        .y_desc(metric_axis_label(metric))
        .x_labels(n)
        .y_labels(y_labels)
        .x_label_formatter(&|x| {
            let idx = x.round() as i64;
            if idx < 0 || idx as usize >= labels.len() || (x - idx as f64).abs() > 0.25 {
                return String::new();
            }
            if skip_every_other && idx % 2 != 0 {
                return String::new();
            }
            labels[idx as usize].clone()
        })
        .label_style(("sans-serif", 13))
        .draw()
        .map_err(chart_err)?;

    let series: [(&str, &RGBColor, fn(&BucketSummary) -> f64); 3] = [
        ("Mínima", &BLUE, |s| s.min),
        ("Média", &full_palette::ORANGE, |s| s.mean),
        ("Máxima", &GREEN, |s| s.max),
    ];
    for (name, color, pick) in series {
        chart
            .draw_series(
                LineSeries::new(
                    summaries
                        .iter()
                        .enumerate()
                        .map(|(i, s)| (i as f64, pick(s))),
                    color.stroke_width(2),
                )
                .point_size(3),
            )
            .map_err(chart_err)?
            .label(name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], *color));
    }

    let unit = metric_unit(metric);
    for (value, color, label) in [
        (limits.lower, &RED, format!("LI - Especificação ({:.2}{unit})", limits.lower)),
        (limits.upper, &GREEN, format!("LS - Especificação ({:.2}{unit})", limits.upper)),
    ] {
        chart
            .draw_series(DashedLineSeries::new(
                vec![(-0.5f64, value), (n as f64 - 0.5, value)],
                6,
                4,
                color.stroke_width(1),
            ))
            .map_err(chart_err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], *color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

/// Dual-axis time series: the metric on the left axis with its spec
/// thresholds, light level on the right axis.
pub fn render_metric_light_chart(
    path: &Path,
    readings: &[Reading],
    metric: Metric,
    limits: SpecLimits,
) -> Result<(), ReportError> {
    if readings.is_empty() {
        return Err(ReportError::Chart(
            "cannot plot a time series from zero readings".to_string(),
        ));
    }

    let t0 = readings.iter().map(|r| r.timestamp).min().unwrap();
    let mut t1 = readings.iter().map(|r| r.timestamp).max().unwrap();
    if t0 == t1 {
        // A degenerate range breaks the axis; widen it by a minute.
        t1 = t1 + chrono::Duration::minutes(1);
    }

    let (y_min, y_max) = adaptive_range(readings.iter().map(|r| metric.value(r)), limits);
    let light_max = readings.iter().map(|r| r.light).fold(0.0f64, f64::max);
    let light_top = if light_max > 0.0 { light_max * 1.1 } else { 1.0 };

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(12)
        .x_label_area_size(70)
        .y_label_area_size(55)
        .right_y_label_area_size(55)
        .build_cartesian_2d(RangedDateTime::from(t0..t1), y_min..y_max)
        .map_err(chart_err)?
        .set_secondary_coord(RangedDateTime::from(t0..t1), 0.0..light_top);

    chart
        .configure_mesh()
        .x_desc("Data e Hora")
        .y_desc(metric_axis_label(metric))
        .x_labels(12)
        .x_label_formatter(&|ts: &NaiveDateTime| ts.format("%d-%m %H:%M").to_string())
        .label_style(("sans-serif", 12))
        .draw()
        .map_err(chart_err)?;

    chart
        .configure_secondary_axes()
        .y_desc("Luz (lx)")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(
            LineSeries::new(
                readings.iter().map(|r| (r.timestamp, metric.value(r))),
                BLUE.stroke_width(2),
            )
            .point_size(2),
        )
        .map_err(chart_err)?
        .label(metric_axis_label(metric))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    let unit = metric_unit(metric);
    for (value, color, label) in [
        (limits.lower, &RED, format!("LI - Especificação ({:.2}{unit})", limits.lower)),
        (limits.upper, &GREEN, format!("LS - Especificação ({:.2}{unit})", limits.upper)),
    ] {
        chart
            .draw_series(DashedLineSeries::new(
                vec![(t0, value), (t1, value)],
                6,
                4,
                color.stroke_width(1),
            ))
            .map_err(chart_err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], *color));
    }

    chart
        .draw_secondary_series(
            LineSeries::new(
                readings.iter().map(|r| (r.timestamp, r.light)),
                full_palette::ORANGE.stroke_width(2),
            )
            .point_size(2),
        )
        .map_err(chart_err)?
        .label("Luz (lx)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], full_palette::ORANGE));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_range_contains_data_and_thresholds() {
        let (lo, hi) = adaptive_range([18.0, 22.5, 31.2].into_iter(), SpecLimits::new(15.0, 30.0));
        assert_eq!(lo, 14.0); // floor(15.0 - 1)
        assert_eq!(hi, 33.0); // ceil(31.2 + 1)
    }

    #[test]
    fn adaptive_range_widens_to_thresholds_when_data_is_inside() {
        let (lo, hi) = adaptive_range([20.0, 21.0].into_iter(), SpecLimits::new(15.0, 30.0));
        assert_eq!(lo, 14.0);
        assert_eq!(hi, 31.0);
    }

    #[test]
    fn adaptive_range_rounds_outward_to_integers() {
        let (lo, hi) = adaptive_range([17.3, 29.8].into_iter(), SpecLimits::new(18.0, 28.0));
        assert_eq!(lo, (17.3f64 - 1.0).floor());
        assert_eq!(hi, (29.8f64 + 1.0).ceil());
        assert_eq!(lo.fract(), 0.0);
        assert_eq!(hi.fract(), 0.0);
    }

    #[test]
    fn empty_time_series_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_metric_light_chart(
            &dir.path().join("x.png"),
            &[],
            Metric::Temperature,
            SpecLimits::new(15.0, 30.0),
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::Chart(_)));
    }
}
