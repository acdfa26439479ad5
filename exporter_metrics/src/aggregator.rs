use crate::error::GatherError;
use crate::family::{MetricFamily, Snapshot};
use crate::labeler::parse_output;
use crate::merge::Merger;
use crate::meta::MetaDescriptors;
use crate::source::MetricSource;
use exporter_core::{ExecutionOutcome, ProcessRunner, Runner, ScriptSpec, Termination};
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// What one script adds to a gather cycle: its labeled families followed by
/// the three meta gauges, plus the errors isolated to it.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub script: String,
    pub families: Vec<MetricFamily>,
    pub errors: Vec<GatherError>,
}

/// Runs every configured script concurrently and merges the results into
/// one snapshot.
///
/// Each script gets its own task. If the caller stops waiting, the tasks
/// are detached rather than aborted, so in-flight processes are still
/// reaped.
#[derive(Clone)]
pub struct Aggregator {
    runner: Arc<dyn Runner>,
    descriptors: Arc<MetaDescriptors>,
    source: Option<Arc<dyn MetricSource>>,
}

impl Aggregator {
    pub fn new(runner: Arc<dyn Runner>, descriptors: Arc<MetaDescriptors>) -> Self {
        Self {
            runner,
            descriptors,
            source: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(ProcessRunner::new()),
            Arc::new(MetaDescriptors::default()),
        )
    }

    pub fn with_source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn descriptors(&self) -> &MetaDescriptors {
        &self.descriptors
    }

    /// One gather cycle. Never fails as a whole: per-script and per-family
    /// problems come back alongside a best-effort snapshot.
    pub async fn gather_all(&self, specs: &[ScriptSpec]) -> (Snapshot, Vec<GatherError>) {
        let start = Instant::now();

        let handles: Vec<_> = specs
            .iter()
            .cloned()
            .map(|spec| {
                let runner = Arc::clone(&self.runner);
                let descriptors = Arc::clone(&self.descriptors);
                let dispatched = Instant::now();
                tokio::spawn(async move {
                    run_pipeline(runner.as_ref(), &descriptors, &spec, dispatched).await
                })
            })
            .collect();

        let results = join_all(handles).await;

        let mut merger = Merger::new();
        let mut errors = Vec::new();

        for (spec, result) in specs.iter().zip(results) {
            let contribution = match result {
                Ok(contribution) => contribution,
                Err(e) => self.aborted(spec, e.to_string(), start),
            };
            merger.extend(contribution.families);
            errors.extend(contribution.errors);
        }

        if let Some(source) = &self.source {
            merger.extend(source.collect());
        }

        let (snapshot, merge_errors) = merger.finish();
        errors.extend(merge_errors);

        debug!(
            scripts = specs.len(),
            families = snapshot.families().len(),
            samples = snapshot.sample_count(),
            errors = errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Gather cycle complete"
        );

        (snapshot, errors)
    }

    /// Stands in for a pipeline task that panicked, so the script still
    /// reports `success=0`.
    fn aborted(&self, spec: &ScriptSpec, message: String, start: Instant) -> Contribution {
        error!("Pipeline for '{}' aborted: {}", spec.name(), message);

        let outcome = ExecutionOutcome {
            script: spec.name().to_string(),
            termination: Termination::Failed(message.clone()),
            stdout: Vec::new(),
            stderr: Vec::new(),
            duration: start.elapsed(),
        };

        Contribution {
            script: spec.name().to_string(),
            families: self.descriptors.emit(&outcome, &[]),
            errors: vec![GatherError::Pipeline {
                script: spec.name().to_string(),
                message,
            }],
        }
    }
}

/// Runner, then parser and labeler, then meta gauges, for a single script.
/// The reported duration is measured from `dispatched`.
pub async fn run_pipeline(
    runner: &dyn Runner,
    descriptors: &MetaDescriptors,
    spec: &ScriptSpec,
    dispatched: Instant,
) -> Contribution {
    let mut outcome = runner.run(spec).await;
    outcome.duration = dispatched.elapsed();
    let mut errors: Vec<GatherError> = outcome_error(spec, &outcome).into_iter().collect();

    let mut families = match outcome.parseable_output() {
        Some(_) if spec.raw_output() => {
            debug!("Skipping metric parsing for raw output of '{}'", spec.name());
            Vec::new()
        }
        Some(stdout) => match parse_output(stdout, spec.name()) {
            Ok(parsed) => usable_families(parsed, descriptors, spec.name(), &mut errors),
            Err(e) => {
                warn!("{}", e);
                errors.push(e);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let meta = descriptors.emit(&outcome, &families);
    families.extend(meta);

    Contribution {
        script: outcome.script,
        families,
        errors,
    }
}

/// Drops families under the meta gauge names and repeated series, so the
/// metric count matches what the script actually contributes.
fn usable_families(
    parsed: Vec<MetricFamily>,
    descriptors: &MetaDescriptors,
    script: &str,
    errors: &mut Vec<GatherError>,
) -> Vec<MetricFamily> {
    let mut merger = Merger::new();

    for family in parsed {
        if descriptors.is_reserved(&family.name) {
            let error = GatherError::ReservedName {
                script: script.to_string(),
                family: family.name,
            };
            warn!("{}", error);
            errors.push(error);
            continue;
        }
        merger.add(family);
    }

    let (families, duplicates) = merger.into_families();
    errors.extend(duplicates);
    families
}

fn outcome_error(spec: &ScriptSpec, outcome: &ExecutionOutcome) -> Option<GatherError> {
    let script = outcome.script.clone();

    match &outcome.termination {
        Termination::Exited(0) => None,
        Termination::Exited(code) => Some(GatherError::NonZeroExit {
            script,
            code: *code,
            stderr: outcome.stderr_text(),
        }),
        Termination::TimedOut => Some(GatherError::Timeout {
            script,
            timeout: spec.timeout(),
        }),
        Termination::Failed(message) => Some(GatherError::Failed {
            script,
            message: message.clone(),
        }),
        Termination::NotStarted(message) => Some(GatherError::Start {
            script,
            message: message.clone(),
        }),
    }
}
