pub mod error;
pub mod outcome;
pub mod runner;
pub mod script;
pub mod startup;

pub use error::{ExporterError, Result};
pub use outcome::{ExecutionOutcome, Termination};
pub use runner::{ProcessRunner, Runner};
pub use script::{Command, ScriptSpec, ScriptSpecBuilder, DEFAULT_TIMEOUT};
pub use startup::run_startup;

// Re-export commonly used types
pub use async_trait::async_trait;
