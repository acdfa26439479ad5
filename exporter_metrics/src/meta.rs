use crate::family::{MetricFamily, MetricType, Sample};
use crate::labeler::COMMAND_LABEL;
use exporter_core::ExecutionOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDescriptor {
    pub name: String,
    pub help: String,
}

impl MetaDescriptor {
    fn new(namespace: &str, name: &str, help: &str) -> Self {
        let name = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", namespace, name)
        };

        Self {
            name,
            help: help.to_string(),
        }
    }

    fn gauge(&self, script: &str, value: f64) -> MetricFamily {
        MetricFamily::new(&self.name, &self.help, MetricType::Gauge)
            .with_sample(Sample::new(&self.name, value).with_label(COMMAND_LABEL, script))
    }
}

/// Descriptor table for the three per-script gauges. Built once at startup
/// and shared read-only by every gather cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDescriptors {
    pub success: MetaDescriptor,
    pub duration: MetaDescriptor,
    pub metric_count: MetaDescriptor,
}

impl MetaDescriptors {
    pub fn new(namespace: &str) -> Self {
        Self {
            success: MetaDescriptor::new(
                namespace,
                "success",
                "denotes whether the command ran successfully and exited success",
            ),
            duration: MetaDescriptor::new(
                namespace,
                "duration_seconds",
                "duration in seconds that the command execution took",
            ),
            metric_count: MetaDescriptor::new(
                namespace,
                "metric_count",
                "number of metrics the command produced",
            ),
        }
    }

    /// Whether `name` belongs to one of the meta gauges. Scripts may not
    /// emit families under these names.
    pub fn is_reserved(&self, name: &str) -> bool {
        [&self.success, &self.duration, &self.metric_count]
            .iter()
            .any(|descriptor| descriptor.name == name)
    }

    /// Synthesizes the meta gauges for one script run. `parsed` holds the
    /// families kept from its output, empty when nothing was usable.
    pub fn emit(&self, outcome: &ExecutionOutcome, parsed: &[MetricFamily]) -> Vec<MetricFamily> {
        let success = if outcome.succeeded() { 1.0 } else { 0.0 };
        let metric_count: usize = parsed.iter().map(MetricFamily::sample_count).sum();

        vec![
            self.success.gauge(&outcome.script, success),
            self.duration.gauge(&outcome.script, outcome.duration.as_secs_f64()),
            self.metric_count.gauge(&outcome.script, metric_count as f64),
        ]
    }
}

impl Default for MetaDescriptors {
    fn default() -> Self {
        Self::new("command")
    }
}
