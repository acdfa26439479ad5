use crate::family::{MetricFamily, Sample};
use std::fmt::{self, Write};

/// Displays families in the text exposition format, one HELP/TYPE header
/// per family followed by its samples.
pub struct Exposition<'a>(pub &'a [MetricFamily]);

impl fmt::Display for Exposition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for family in self.0 {
            if !family.help.is_empty() {
                writeln!(f, "# HELP {} {}", family.name, escape_help(&family.help))?;
            }
            writeln!(f, "# TYPE {} {}", family.name, family.metric_type)?;

            for sample in &family.samples {
                write_sample(f, sample)?;
            }
        }
        Ok(())
    }
}

pub fn encode(families: &[MetricFamily]) -> String {
    Exposition(families).to_string()
}

fn write_sample(f: &mut fmt::Formatter<'_>, sample: &Sample) -> fmt::Result {
    f.write_str(&sample.name)?;

    if !sample.labels.is_empty() {
        f.write_char('{')?;
        for (index, (name, value)) in sample.labels.iter().enumerate() {
            if index > 0 {
                f.write_char(',')?;
            }
            write!(f, "{}=\"{}\"", name, escape_label_value(value))?;
        }
        f.write_char('}')?;
    }

    write!(f, " {}", format_value(sample.value))?;
    if let Some(timestamp) = sample.timestamp_ms {
        write!(f, " {}", timestamp)?;
    }
    f.write_char('\n')
}

pub(crate) fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
