use crate::exposition::format_value;
use crate::family::{MetricFamily, MetricType, Sample};
use prometheus::proto;
use std::collections::BTreeMap;

/// A process-wide collector merged into every snapshot after the scripts.
pub trait MetricSource: Send + Sync {
    fn collect(&self) -> Vec<MetricFamily>;
}

impl MetricSource for prometheus::Registry {
    fn collect(&self) -> Vec<MetricFamily> {
        self.gather().iter().map(convert_family).collect()
    }
}

pub(crate) fn convert_family(source: &proto::MetricFamily) -> MetricFamily {
    let name = source.get_name();
    let metric_type = match source.get_field_type() {
        proto::MetricType::COUNTER => MetricType::Counter,
        proto::MetricType::GAUGE => MetricType::Gauge,
        proto::MetricType::HISTOGRAM => MetricType::Histogram,
        proto::MetricType::SUMMARY => MetricType::Summary,
        proto::MetricType::UNTYPED => MetricType::Untyped,
    };

    let mut family = MetricFamily::new(name, source.get_help(), metric_type);

    for metric in source.get_metric() {
        let labels: BTreeMap<String, String> = metric
            .get_label()
            .iter()
            .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
            .collect();
        let timestamp_ms = Some(metric.get_timestamp_ms()).filter(|ts| *ts != 0);

        let mut push = |sample_name: String, extra: Option<(&str, f64)>, value: f64| {
            let mut labels = labels.clone();
            if let Some((label, bound)) = extra {
                labels.insert(label.to_string(), format_value(bound));
            }
            family.samples.push(Sample {
                name: sample_name,
                labels,
                value,
                timestamp_ms,
            });
        };

        match metric_type {
            MetricType::Counter => push(name.to_string(), None, metric.get_counter().get_value()),
            MetricType::Gauge => push(name.to_string(), None, metric.get_gauge().get_value()),
            MetricType::Untyped => push(name.to_string(), None, metric.get_untyped().get_value()),
            MetricType::Histogram => {
                let histogram = metric.get_histogram();
                let bucket_name = format!("{}_bucket", name);
                let mut saw_inf = false;

                for bucket in histogram.get_bucket() {
                    let bound = bucket.get_upper_bound();
                    saw_inf |= bound == f64::INFINITY;
                    push(
                        bucket_name.clone(),
                        Some(("le", bound)),
                        bucket.get_cumulative_count() as f64,
                    );
                }
                if !saw_inf {
                    push(
                        bucket_name,
                        Some(("le", f64::INFINITY)),
                        histogram.get_sample_count() as f64,
                    );
                }
                push(format!("{}_sum", name), None, histogram.get_sample_sum());
                push(
                    format!("{}_count", name),
                    None,
                    histogram.get_sample_count() as f64,
                );
            }
            MetricType::Summary => {
                let summary = metric.get_summary();
                for quantile in summary.get_quantile() {
                    push(
                        name.to_string(),
                        Some(("quantile", quantile.get_quantile())),
                        quantile.get_value(),
                    );
                }
                push(format!("{}_sum", name), None, summary.get_sample_sum());
                push(
                    format!("{}_count", name),
                    None,
                    summary.get_sample_count() as f64,
                );
            }
        }
    }

    family
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

    #[test]
    fn test_registry_counters_and_histograms() {
        let registry = Registry::new();
        let runs = IntCounterVec::new(Opts::new("runs_total", "Runs"), &["kind"]).unwrap();
        let latency = Histogram::with_opts(
            HistogramOpts::new("latency_seconds", "Latency").buckets(vec![0.1, 1.0]),
        )
        .unwrap();
        registry.register(Box::new(runs.clone())).unwrap();
        registry.register(Box::new(latency.clone())).unwrap();

        runs.with_label_values(&["cron"]).inc_by(3);
        latency.observe(0.5);

        let families = registry.collect();

        let latency = families.iter().find(|f| f.name == "latency_seconds").unwrap();
        assert_eq!(latency.metric_type, MetricType::Histogram);
        let rendered: Vec<_> = latency
            .samples
            .iter()
            .map(|s| (s.name.as_str(), s.label("le"), s.value))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("latency_seconds_bucket", Some("0.1"), 0.0),
                ("latency_seconds_bucket", Some("1"), 1.0),
                ("latency_seconds_bucket", Some("+Inf"), 1.0),
                ("latency_seconds_sum", None, 0.5),
                ("latency_seconds_count", None, 1.0),
            ]
        );

        let runs = families.iter().find(|f| f.name == "runs_total").unwrap();
        assert_eq!(runs.metric_type, MetricType::Counter);
        assert_eq!(runs.samples[0].label("kind"), Some("cron"));
        assert_eq!(runs.samples[0].value, 3.0);
    }

    #[test]
    fn test_summary_conversion() {
        let mut quantile = proto::Quantile::default();
        quantile.set_quantile(0.5);
        quantile.set_value(0.25);

        let mut summary = proto::Summary::default();
        summary.set_sample_count(4);
        summary.set_sample_sum(1.0);
        summary.mut_quantile().push(quantile);

        let mut metric = proto::Metric::default();
        metric.set_summary(summary);

        let mut source = proto::MetricFamily::default();
        source.set_name("rpc_seconds".to_string());
        source.set_help("RPC latency".to_string());
        source.set_field_type(proto::MetricType::SUMMARY);
        source.mut_metric().push(metric);

        let family = convert_family(&source);

        assert_eq!(family.metric_type, MetricType::Summary);
        assert_eq!(family.samples.len(), 3);
        assert_eq!(family.samples[0].label("quantile"), Some("0.5"));
        assert_eq!(family.samples[2].name, "rpc_seconds_count");
        assert_eq!(family.samples[2].value, 4.0);
    }
}
