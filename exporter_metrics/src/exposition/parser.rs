use super::format_value;
use crate::error::ParseError;
use crate::family::{MetricFamily, MetricType, Sample};
use openmetrics_parser::prometheus::parse_prometheus;
use openmetrics_parser::{PrometheusType, PrometheusValue};
use std::collections::BTreeMap;

type ParsedFamily = openmetrics_parser::MetricFamily<PrometheusType, PrometheusValue>;
type ParsedSample = openmetrics_parser::Sample<PrometheusValue>;

/// Decodes text exposition output into metric families sorted by name.
/// Families declared by HELP/TYPE but without samples are dropped.
pub fn parse(input: &[u8]) -> Result<Vec<MetricFamily>, ParseError> {
    let text = std::str::from_utf8(input)
        .map_err(|e| ParseError::new(format!("output is not valid UTF-8: {}", e)))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut text = text.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }

    let exposition = parse_prometheus(&text).map_err(|e| ParseError::new(e.to_string()))?;

    let mut families = exposition
        .families
        .values()
        .map(convert_family)
        .collect::<Result<Vec<_>, _>>()?;
    families.retain(|family| !family.samples.is_empty());
    families.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(families)
}

fn metric_type(family_type: &PrometheusType) -> MetricType {
    match family_type {
        PrometheusType::Counter => MetricType::Counter,
        PrometheusType::Gauge => MetricType::Gauge,
        PrometheusType::Histogram => MetricType::Histogram,
        PrometheusType::Summary => MetricType::Summary,
        PrometheusType::Unknown => MetricType::Untyped,
    }
}

fn convert_family(parsed: &ParsedFamily) -> Result<MetricFamily, ParseError> {
    let name = parsed.family_name.as_str();
    let mut family = MetricFamily::new(name, &parsed.help, metric_type(&parsed.family_type));

    for sample in parsed.iter_samples() {
        let labels = labels(sample)?;
        let timestamp_ms = sample.timestamp.map(|ts| ts as i64);
        let mut push = |series: String, extra: Option<(&str, String)>, value: f64| {
            let mut labels = labels.clone();
            if let Some((label, label_value)) = extra {
                labels.insert(label.to_string(), label_value);
            }
            family.samples.push(Sample {
                name: series,
                labels,
                value,
                timestamp_ms,
            });
        };

        match &sample.value {
            PrometheusValue::Unknown(number) | PrometheusValue::Gauge(number) => {
                push(name.to_string(), None, number.as_f64())
            }
            PrometheusValue::Counter(counter) => push(name.to_string(), None, counter.value.as_f64()),
            PrometheusValue::Histogram(histogram) => {
                let bucket = format!("{}_bucket", name);
                let mut saw_inf = false;
                for b in &histogram.buckets {
                    let upper_bound = b.upper_bound as f64;
                    saw_inf |= upper_bound == f64::INFINITY;
                    push(bucket.clone(), Some(("le", format_value(upper_bound))), b.count as f64);
                }
                if let (false, Some(count)) = (saw_inf, histogram.count) {
                    push(bucket, Some(("le", format_value(f64::INFINITY))), count as f64);
                }
                if let Some(sum) = &histogram.sum {
                    push(format!("{}_sum", name), None, sum.as_f64());
                }
                if let Some(count) = histogram.count {
                    push(format!("{}_count", name), None, count as f64);
                }
            }
            PrometheusValue::Summary(summary) => {
                for q in &summary.quantiles {
                    push(
                        name.to_string(),
                        Some(("quantile", format_value(q.quantile as f64))),
                        q.value as f64,
                    );
                }
                if let Some(sum) = &summary.sum {
                    push(format!("{}_sum", name), None, sum.as_f64());
                }
                if let Some(count) = summary.count {
                    push(format!("{}_count", name), None, count as f64);
                }
            }
        }
    }

    Ok(family)
}

fn labels(sample: &ParsedSample) -> Result<BTreeMap<String, String>, ParseError> {
    let labelset = sample
        .get_labelset()
        .map_err(|e| ParseError::new(e.to_string()))?;

    Ok(labelset
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}
