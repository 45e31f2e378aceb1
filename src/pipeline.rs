use crate::baseline::{self, BaselineError, CorpusBaseline};
use crate::catalog::CacheError;
use crate::describe;
use crate::mood::{MoodClassifier, MoodError};
use crate::record::{EnrichedRecord, RawFeatureRecord, TrackMetadata, ValidatedRecord};
use crate::tagger;
use crate::validate::{self, ValidationError};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

/// Run-level failures. Anything per-track lands in [`PipelineReport::rejected`]
/// instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    EmptyCorpus(#[from] BaselineError),
    #[error("Mood classification failed: {0}")]
    Mood(#[from] MoodError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    /// Reconstructed from a stored catalog.
    Loaded,
    /// Freshly extracted and enriched.
    Computed,
}

/// A track that did not make it into the catalog, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub track_id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub source: CatalogSource,
    /// Tracks that entered the run, including ones that failed extraction.
    pub processed: usize,
    pub validated: usize,
    pub rejected: Vec<Rejection>,
    pub persisted: bool,
}

/// Tag and classify every record. Classification sees the whole batch, so
/// this runs only after extraction has finished.
pub fn enrich(
    records: BTreeMap<String, RawFeatureRecord>,
    baseline: &CorpusBaseline,
    classifier: &dyn MoodClassifier,
) -> Result<BTreeMap<String, EnrichedRecord>, MoodError> {
    let moods = classifier.classify(&records, baseline)?;
    log::info!(
        "Classified {} tracks with the {} strategy",
        moods.len(),
        classifier.name()
    );

    Ok(records
        .into_iter()
        .filter_map(|(id, raw)| {
            let Some(&mood) = moods.get(&id) else {
                log::error!("Classifier returned no mood for {}", id);
                return None;
            };
            let function = tagger::tag_functions(&id);
            Some((id, EnrichedRecord::new(raw, mood, function)))
        })
        .collect())
}

/// Validate every record, then describe the accepted ones.
///
/// Descriptions are judged against a baseline over exactly the accepted
/// records. A stored catalog holds only those, so rebuilding from it yields
/// the same baseline and the same text.
pub fn finalize(
    enriched: BTreeMap<String, EnrichedRecord>,
    jobs: usize,
) -> Result<(BTreeMap<String, ValidatedRecord>, Vec<Rejection>), PipelineError> {
    let pb = ProgressBar::new(enriched.len() as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message("Validating...");

    let check = |(id, record): (String, EnrichedRecord)| {
        let result = validate::validate(&record).map(|m| (record, m));
        pb.inc(1);
        (id, result)
    };
    let results: Vec<(String, Result<(EnrichedRecord, TrackMetadata), ValidationError>)> =
        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(|| enriched.into_par_iter().map(check).collect()),
            Err(e) => {
                log::warn!("Falling back to sequential validation: {}", e);
                enriched.into_iter().map(check).collect()
            }
        };

    let mut accepted = BTreeMap::new();
    let mut rejected = Vec::new();
    for (track_id, result) in results {
        match result {
            Ok(pair) => {
                accepted.insert(track_id, pair);
            }
            Err(e) => {
                log::warn!("Rejected {}: {}", track_id, e);
                rejected.push(Rejection {
                    track_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    let baseline = baseline::compute(accepted.values().map(|(record, _)| &record.raw))?;
    let records: BTreeMap<String, ValidatedRecord> = accepted
        .into_iter()
        .map(|(id, (_, metadata))| {
            let record = describe::attach(id.clone(), metadata, &baseline);
            (id, record)
        })
        .collect();

    pb.finish_with_message(format!(
        "Done: {} validated, {} rejected",
        records.len(),
        rejected.len()
    ));
    Ok((records, rejected))
}
