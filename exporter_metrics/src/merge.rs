use crate::error::GatherError;
use crate::family::{MetricFamily, Sample, Snapshot};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

type SeriesKey = (String, BTreeMap<String, String>);

struct MergedFamily {
    family: MetricFamily,
    series: HashSet<SeriesKey>,
}

/// Type-checked accumulation of metric families by name.
///
/// Same-name families must agree on type; their samples are concatenated in
/// the order they were added. A type mismatch drops the name for the rest of
/// the merge.
#[derive(Default)]
pub struct Merger {
    families: BTreeMap<String, MergedFamily>,
    conflicted: BTreeSet<String>,
    errors: Vec<GatherError>,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, family: MetricFamily) {
        if self.conflicted.contains(&family.name) {
            debug!("Dropping '{}': name already in conflict", family.name);
            return;
        }

        match self.families.entry(family.name.clone()) {
            Entry::Vacant(entry) => {
                let MetricFamily {
                    name,
                    help,
                    metric_type,
                    samples,
                } = family;
                let merged = entry.insert(MergedFamily {
                    family: MetricFamily::new(name, help, metric_type),
                    series: HashSet::new(),
                });
                append_samples(merged, samples, &mut self.errors);
            }
            Entry::Occupied(entry) if entry.get().family.metric_type != family.metric_type => {
                let (name, existing) = entry.remove_entry();
                let error = GatherError::MergeConflict {
                    family: name.clone(),
                    existing: existing.family.metric_type,
                    conflicting: family.metric_type,
                };
                warn!("{}", error);
                self.errors.push(error);
                self.conflicted.insert(name);
            }
            Entry::Occupied(entry) => {
                let merged = entry.into_mut();
                if merged.family.help.is_empty() {
                    merged.family.help = family.help;
                }
                append_samples(merged, family.samples, &mut self.errors);
            }
        }
    }

    pub fn extend(&mut self, families: impl IntoIterator<Item = MetricFamily>) {
        for family in families {
            self.add(family);
        }
    }

    /// Families sorted by name, plus every conflict recorded on the way.
    pub fn finish(self) -> (Snapshot, Vec<GatherError>) {
        let (families, errors) = self.into_families();
        (Snapshot::from_sorted(families), errors)
    }

    pub fn into_families(self) -> (Vec<MetricFamily>, Vec<GatherError>) {
        let families = self
            .families
            .into_values()
            .map(|merged| merged.family)
            .collect();

        (families, self.errors)
    }
}

fn append_samples(merged: &mut MergedFamily, samples: Vec<Sample>, errors: &mut Vec<GatherError>) {
    for sample in samples {
        let key = (sample.name.clone(), sample.labels.clone());
        if !merged.series.insert(key) {
            let error = GatherError::DuplicateSample {
                family: merged.family.name.clone(),
                sample: sample.name,
            };
            warn!("{}", error);
            errors.push(error);
            continue;
        }
        merged.family.samples.push(sample);
    }
}

/// Merges any number of contributions in one pass.
pub fn merge<I, C>(contributions: I) -> (Snapshot, Vec<GatherError>)
where
    I: IntoIterator<Item = C>,
    C: IntoIterator<Item = MetricFamily>,
{
    let mut merger = Merger::new();
    for contribution in contributions {
        merger.extend(contribution);
    }
    merger.finish()
}
