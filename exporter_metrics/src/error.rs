use crate::family::MetricType;
use std::time::Duration;
use thiserror::Error;

/// Malformed exposition text.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A problem recovered during a gather cycle. None of these abort the
/// cycle; they only affect the script or family they name.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatherError {
    #[error("command '{script}' could not be started: {message}")]
    Start { script: String, message: String },

    #[error("command '{script}' timed out after {timeout:?}")]
    Timeout { script: String, timeout: Duration },

    #[error("command '{script}' exited {code}")]
    NonZeroExit {
        script: String,
        code: i32,
        stderr: Option<String>,
    },

    #[error("command '{script}' failed: {message}")]
    Failed { script: String, message: String },

    #[error("pipeline for command '{script}' aborted: {message}")]
    Pipeline { script: String, message: String },

    #[error("command '{script}' produced invalid metrics: {source}")]
    Parse {
        script: String,
        #[source]
        source: ParseError,
    },

    #[error("command '{script}' metric family '{family}' already has a '{label}' label")]
    LabelConflict {
        script: String,
        family: String,
        label: String,
    },

    #[error("command '{script}' emitted reserved metric family '{family}', dropping it")]
    ReservedName { script: String, family: String },

    #[error("metric family '{family}' collected as both {existing} and {conflicting}, dropping it")]
    MergeConflict {
        family: String,
        existing: MetricType,
        conflicting: MetricType,
    },

    #[error("metric family '{family}' has sample '{sample}' collected twice with the same labels")]
    DuplicateSample { family: String, sample: String },
}

impl GatherError {
    /// The script the error is isolated to, if it is script-local.
    pub fn script(&self) -> Option<&str> {
        match self {
            GatherError::Start { script, .. }
            | GatherError::Timeout { script, .. }
            | GatherError::NonZeroExit { script, .. }
            | GatherError::Failed { script, .. }
            | GatherError::Pipeline { script, .. }
            | GatherError::Parse { script, .. }
            | GatherError::LabelConflict { script, .. }
            | GatherError::ReservedName { script, .. } => Some(script),
            GatherError::MergeConflict { .. } | GatherError::DuplicateSample { .. } => None,
        }
    }
}
