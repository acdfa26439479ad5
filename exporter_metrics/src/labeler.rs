use crate::error::GatherError;
use crate::exposition;
use crate::family::MetricFamily;

/// Label added to every sample a script produces.
pub const COMMAND_LABEL: &str = "command";

/// Decodes a script's stdout and tags every sample with
/// `command="<script>"`.
///
/// Output that already uses the `command` label is rejected as a whole:
/// overwriting the value would merge series the script meant to keep apart.
pub fn parse_output(stdout: &[u8], script: &str) -> Result<Vec<MetricFamily>, GatherError> {
    let mut families = exposition::parse(stdout).map_err(|source| GatherError::Parse {
        script: script.to_string(),
        source,
    })?;

    label_families(&mut families, script)?;
    Ok(families)
}

fn label_families(families: &mut [MetricFamily], script: &str) -> Result<(), GatherError> {
    let conflict = families.iter().find(|family| {
        family
            .samples
            .iter()
            .any(|sample| sample.labels.contains_key(COMMAND_LABEL))
    });

    if let Some(family) = conflict {
        return Err(GatherError::LabelConflict {
            script: script.to_string(),
            family: family.name.clone(),
            label: COMMAND_LABEL.to_string(),
        });
    }

    for sample in families.iter_mut().flat_map(|family| family.samples.iter_mut()) {
        sample
            .labels
            .insert(COMMAND_LABEL.to_string(), script.to_string());
    }

    Ok(())
}
