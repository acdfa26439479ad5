//! Prometheus text exposition format (version 0.0.4).
//!
//! [`parse`] decodes script output into [`MetricFamily`] values and
//! [`encode`] renders families back into text for the HTTP layer.
//!
//! [`MetricFamily`]: crate::family::MetricFamily

mod encoder;
mod parser;

pub use encoder::{encode, Exposition};
pub use parser::parse;

pub(crate) use encoder::format_value;

/// Content type for responses carrying [`encode`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
