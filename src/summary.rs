use crate::config::SpecLimits;
use crate::models::Reading;

/// Which telemetry metric a summary is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
}

impl Metric {
    pub fn value(&self, reading: &Reading) -> f64 {
        match self {
            Metric::Temperature => reading.temperature,
            Metric::Humidity => reading.humidity,
        }
    }

    /// Headers of the per-bucket summary table.
    pub fn summary_headers(&self) -> Vec<String> {
        let prefix = match self {
            Metric::Temperature => "Temperatura",
            Metric::Humidity => "Umidade",
        };
        vec![
            "Intervalo".to_string(),
            format!("{prefix}_Mínima"),
            format!("{prefix}_Média"),
            format!("{prefix}_Máxima"),
            "% Abaixo da especificação".to_string(),
            "% Dentro da especificação".to_string(),
            "% Acima da especificação".to_string(),
        ]
    }

    /// Headers of the whole-route one-row table.
    pub fn route_headers(&self) -> Vec<String> {
        let unit = match self {
            Metric::Temperature => "ºC",
            Metric::Humidity => "%UR",
        };
        vec![
            format!("{unit} Mínima"),
            format!("{unit} Média"),
            format!("{unit} Máxima"),
            "%Abaixo da especificação".to_string(),
            "%Dentro da especificação".to_string(),
            "%Acima da especificação".to_string(),
        ]
    }

    pub fn title(&self) -> &'static str {
        match self {
            Metric::Temperature => "Resumo de Temperaturas por Hora",
            Metric::Humidity => "Resumo de Umidade Relativa por Hora",
        }
    }
}

/// One hour-bucket's statistics. Percentages are mutually exclusive and sum
/// to 100 for non-empty buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSummary {
    pub interval: String,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub below_pct: f64,
    pub within_pct: f64,
    pub above_pct: f64,
}

impl BucketSummary {
    /// Fixed 2-decimal strings for on-screen and PDF tables.
    pub fn display_row(&self) -> Vec<String> {
        let mut row = vec![self.interval.clone()];
        row.extend(self.numeric_tail().iter().map(|v| format!("{v:.2}")));
        row
    }

    /// Numeric companion of `display_row`; the interval slot is NaN so the
    /// columns stay aligned.
    pub fn numeric_row(&self) -> Vec<f64> {
        let mut row = vec![f64::NAN];
        row.extend(self.numeric_tail());
        row
    }

    fn numeric_tail(&self) -> [f64; 6] {
        [
            self.min,
            self.mean,
            self.max,
            self.below_pct,
            self.within_pct,
            self.above_pct,
        ]
    }
}

/// Whole-route statistics for one metric, used by the inline mini-tables.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub below_pct: f64,
    pub within_pct: f64,
    pub above_pct: f64,
}

impl RouteSummary {
    pub fn display_row(&self) -> Vec<String> {
        self.numeric_row().iter().map(|v| format!("{v:.2}")).collect()
    }

    pub fn numeric_row(&self) -> Vec<f64> {
        vec![
            self.min,
            self.mean,
            self.max,
            self.below_pct,
            self.within_pct,
            self.above_pct,
        ]
    }
}

/// Group readings by hour-bucket label (first-seen order) and compute
/// min/mean/max plus strict-below / inclusive-within / strict-above
/// percentages against the spec limits. Buckets are relabeled "1ª Hora",
/// "2ª Hora", … positionally.
pub fn summarize(readings: &[Reading], metric: Metric, limits: SpecLimits) -> Vec<BucketSummary> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<f64>> = std::collections::HashMap::new();

    for reading in readings {
        if !groups.contains_key(&reading.hour_bucket) {
            order.push(reading.hour_bucket.clone());
        }
        groups
            .entry(reading.hour_bucket.clone())
            .or_default()
            .push(metric.value(reading));
    }

    order
        .iter()
        .enumerate()
        .map(|(position, key)| {
            let values = &groups[key];
            let (min, mean, max) = min_mean_max(values);
            let (below_pct, within_pct, above_pct) = spec_percentages(values, limits);
            BucketSummary {
                interval: format!("{}ª Hora", position + 1),
                min,
                mean,
                max,
                below_pct,
                within_pct,
                above_pct,
            }
        })
        .collect()
}

/// Whole-route counterpart of `summarize`, no bucketing.
pub fn summarize_route(readings: &[Reading], metric: Metric, limits: SpecLimits) -> RouteSummary {
    let values: Vec<f64> = readings.iter().map(|r| metric.value(r)).collect();
    let (min, mean, max) = min_mean_max(&values);
    let (below_pct, within_pct, above_pct) = spec_percentages(&values, limits);
    RouteSummary {
        min,
        mean,
        max,
        below_pct,
        within_pct,
        above_pct,
    }
}

fn min_mean_max(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (min, mean, max)
}

fn spec_percentages(values: &[f64], limits: SpecLimits) -> (f64, f64, f64) {
    let total = values.len();
    if total == 0 {
        return (0.0, 0.0, 0.0);
    }
    let below = values.iter().filter(|v| **v < limits.lower).count();
    let within = values
        .iter()
        .filter(|v| **v >= limits.lower && **v <= limits.upper)
        .count();
    let above = values.iter().filter(|v| **v > limits.upper).count();
    let pct = |count: usize| count as f64 / total as f64 * 100.0;
    (pct(below), pct(within), pct(above))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn reading(bucket: &str, temperature: f64, humidity: f64) -> Reading {
        Reading {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            latitude: -22.9,
            longitude: -43.3,
            temperature,
            humidity,
            light: 100.0,
            hour_bucket: bucket.to_string(),
            address: None,
        }
    }

    #[test]
    fn first_hour_scenario_splits_into_thirds() {
        let rows = vec![
            reading("1", 10.0, 50.0),
            reading("1", 20.0, 50.0),
            reading("1", 30.0, 50.0),
        ];
        let summaries = summarize(&rows, Metric::Temperature, SpecLimits::new(15.0, 25.0));

        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.interval, "1ª Hora");
        assert_relative_eq!(s.min, 10.0);
        assert_relative_eq!(s.mean, 20.0);
        assert_relative_eq!(s.max, 30.0);
        assert_relative_eq!(s.below_pct, 100.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(s.within_pct, 100.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(s.above_pct, 100.0 / 3.0, epsilon = 1e-9);
        assert_eq!(
            s.display_row(),
            vec!["1ª Hora", "10.00", "20.00", "30.00", "33.33", "33.33", "33.33"]
        );
    }

    #[test]
    fn percentages_sum_to_one_hundred_per_bucket() {
        let rows: Vec<Reading> = (0..37)
            .map(|i| reading(&format!("b{}", i % 5), 10.0 + i as f64 * 0.7, 40.0))
            .collect();
        let summaries = summarize(&rows, Metric::Temperature, SpecLimits::new(14.0, 28.0));

        assert_eq!(summaries.len(), 5);
        for s in &summaries {
            let total = s.below_pct + s.within_pct + s.above_pct;
            assert_relative_eq!(total, 100.0, epsilon = 1e-9);
            assert!(s.min <= s.mean && s.mean <= s.max);
        }
    }

    #[test]
    fn buckets_keep_first_seen_order() {
        let rows = vec![
            reading("manhã", 20.0, 50.0),
            reading("tarde", 22.0, 50.0),
            reading("manhã", 21.0, 50.0),
            reading("noite", 19.0, 50.0),
        ];
        let summaries = summarize(&rows, Metric::Temperature, SpecLimits::new(15.0, 30.0));
        let intervals: Vec<&str> = summaries.iter().map(|s| s.interval.as_str()).collect();
        assert_eq!(intervals, vec!["1ª Hora", "2ª Hora", "3ª Hora"]);
        // "manhã" bucket aggregates both of its rows.
        assert_relative_eq!(summaries[0].mean, 20.5);
    }

    #[test]
    fn boundary_values_count_as_within() {
        let rows = vec![
            reading("1", 15.0, 50.0),
            reading("1", 25.0, 50.0),
        ];
        let s = &summarize(&rows, Metric::Temperature, SpecLimits::new(15.0, 25.0))[0];
        assert_relative_eq!(s.within_pct, 100.0);
        assert_relative_eq!(s.below_pct, 0.0);
        assert_relative_eq!(s.above_pct, 0.0);
    }

    #[test]
    fn empty_input_yields_zeroed_route_summary() {
        let route = summarize_route(&[], Metric::Humidity, SpecLimits::new(30.0, 70.0));
        assert_eq!(route.below_pct + route.within_pct + route.above_pct, 0.0);
        assert_eq!(route.min, 0.0);
    }

    #[test]
    fn route_summary_covers_all_rows() {
        let rows = vec![
            reading("1", 10.0, 20.0),
            reading("2", 20.0, 60.0),
            reading("3", 30.0, 90.0),
        ];
        let route = summarize_route(&rows, Metric::Humidity, SpecLimits::new(30.0, 70.0));
        assert_relative_eq!(route.min, 20.0);
        assert_relative_eq!(route.mean, 170.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(route.max, 90.0);
        assert_relative_eq!(route.below_pct, 100.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(route.within_pct, 100.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(route.above_pct, 100.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn humidity_metric_reads_the_humidity_field() {
        let rows = vec![reading("1", 99.0, 55.0)];
        let s = &summarize(&rows, Metric::Humidity, SpecLimits::new(0.0, 100.0))[0];
        assert_relative_eq!(s.mean, 55.0);
    }
}
