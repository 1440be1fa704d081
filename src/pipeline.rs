use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::data::loader::load_file;
use crate::data::merge::{join, Discrepancy, MergePolicy};
use crate::data::model::{MeasurementSet, Metadata};
use crate::render::{render_all, ALTITUDE_RANGES};

// ---------------------------------------------------------------------------
// One quick-look run: load → merge → render
// ---------------------------------------------------------------------------

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Number of input files merged.
    pub files: usize,
    /// String fields that differed between files (kept from the first file).
    pub discrepancies: Vec<Discrepancy>,
    /// Every image written, grouped by altitude range.
    pub images: Vec<PathBuf>,
}

/// Load every input in order. Any failure aborts the whole batch.
pub fn load_all(inputs: &[PathBuf]) -> Result<(Vec<MeasurementSet>, Vec<Metadata>)> {
    let mut sets = Vec::with_capacity(inputs.len());
    let mut metadata = Vec::with_capacity(inputs.len());

    for path in inputs {
        let (set, meta) = load_file(path)?;
        let profiles: usize = set.channels.values().map(|c| c.profile_count()).sum();
        info!(
            "loaded {} ({} channels, {profiles} profiles)",
            path.display(),
            set.len()
        );
        sets.push(set);
        metadata.push(meta);
    }
    Ok((sets, metadata))
}

/// Merge `inputs` (chronological order) and write both altitude variants
/// under `outdir`.
pub fn run(outdir: &Path, inputs: &[PathBuf]) -> Result<RunSummary> {
    let (sets, metadata) = load_all(inputs)?;
    if let Some(first) = metadata.first() {
        debug!("metadata keys: {:?}", first.keys().collect::<Vec<_>>());
    }

    let outcome = join(&sets, MergePolicy::Warn).context("merging input files")?;
    for d in &outcome.discrepancies {
        warn!("{d}");
    }
    drop(sets);

    let mut images = Vec::new();
    for range in ALTITUDE_RANGES {
        let dir = outdir.join(range.dir_name());
        info!(
            "rendering {} - {} m into {}",
            range.lower,
            range.upper,
            dir.display()
        );
        images.extend(render_all(&outcome.joined, &dir, range)?);
    }

    Ok(RunSummary {
        files: inputs.len(),
        discrepancies: outcome.discrepancies,
        images,
    })
}
