pub mod aggregator;
pub mod error;
pub mod exposition;
pub mod family;
pub mod labeler;
pub mod merge;
pub mod meta;
pub mod source;

pub use aggregator::{Aggregator, Contribution};
pub use error::{GatherError, ParseError};
pub use exposition::{encode, parse, Exposition, CONTENT_TYPE};
pub use family::{MetricFamily, MetricType, Sample, Snapshot};
pub use labeler::{parse_output, COMMAND_LABEL};
pub use merge::{merge, Merger};
pub use meta::{MetaDescriptor, MetaDescriptors};
pub use source::MetricSource;
