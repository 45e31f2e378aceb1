use super::Catalog;
use crate::baseline;
use crate::extract::FeatureExtractor;
use crate::mood::MoodClassifier;
use crate::pipeline::{self, CatalogSource, PipelineError, PipelineReport, Rejection};
use crate::record::{EnrichedRecord, TrackMetadata, ValidatedRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// The catalog file exists but cannot be parsed. Fatal at startup.
    #[error("Corrupted catalog {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk shape of one catalog entry.
#[derive(Serialize)]
struct PersistedRecord<'a> {
    #[serde(flatten)]
    metadata: &'a TrackMetadata,
    description: &'a str,
}

/// Load-or-compute persistence for the catalog.
///
/// A catalog that already exists on disk is the source of truth: it is read
/// once at startup and never rewritten by a later run.
pub struct MetadataCache {
    path: PathBuf,
    jobs: usize,
}

impl MetadataCache {
    pub fn new(path: impl Into<PathBuf>, jobs: usize) -> Self {
        Self {
            path: path.into(),
            jobs: jobs.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored catalog. `Ok(None)` means no catalog exists yet;
    /// unparseable content is an error, never treated as absent.
    pub fn load(&self) -> Result<Option<BTreeMap<String, TrackMetadata>>, CacheError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let records = serde_json::from_str(&contents).map_err(|source| CacheError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(records))
    }

    /// Write every record as one document. Returns `false` without touching
    /// the file when a catalog already exists at the path.
    pub fn persist(&self, records: &BTreeMap<String, ValidatedRecord>) -> Result<bool, CacheError> {
        if self.path.exists() {
            log::info!(
                "Catalog {} already exists, leaving it untouched",
                self.path.display()
            );
            return Ok(false);
        }

        let document: BTreeMap<&str, PersistedRecord<'_>> = records
            .iter()
            .map(|(id, r)| {
                (
                    id.as_str(),
                    PersistedRecord {
                        metadata: r.metadata(),
                        description: r.description(),
                    },
                )
            })
            .collect();

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document.serialize(&mut ser)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &buf).map_err(|source| self.io_error(source))?;
        std::fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;

        log::info!(
            "Wrote {} tracks to {}",
            records.len(),
            self.path.display()
        );
        Ok(true)
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Serve the catalog from disk if present; otherwise extract, enrich,
    /// validate, describe and persist it.
    ///
    /// `track_ids` is only called when there is no stored catalog.
    pub fn load_or_compute<F>(
        &self,
        extractor: &dyn FeatureExtractor,
        track_ids: F,
        classifier: &dyn MoodClassifier,
    ) -> Result<(Catalog, PipelineReport), PipelineError>
    where
        F: FnOnce() -> Vec<String>,
    {
        match self.load()? {
            Some(stored) => {
                log::info!(
                    "Loaded {} tracks from {}, skipping extraction",
                    stored.len(),
                    self.path.display()
                );
                self.rebuild(stored)
            }
            None => {
                log::info!("No catalog at {}, computing", self.path.display());
                self.compute(extractor, track_ids(), classifier)
            }
        }
    }

    /// Reconstruct working state from stored entries. Mood and function are
    /// kept; descriptions are regenerated against the stored tracks, which
    /// are exactly the ones the computing run described against.
    fn rebuild(
        &self,
        stored: BTreeMap<String, TrackMetadata>,
    ) -> Result<(Catalog, PipelineReport), PipelineError> {
        let processed = stored.len();
        let enriched: BTreeMap<String, EnrichedRecord> = stored
            .into_iter()
            .map(|(id, m)| (id, EnrichedRecord::from(m)))
            .collect();

        let (records, rejected) = pipeline::finalize(enriched, self.jobs)?;
        let report = PipelineReport {
            source: CatalogSource::Loaded,
            processed,
            validated: records.len(),
            rejected,
            persisted: false,
        };
        Ok((Catalog::new(records), report))
    }

    fn compute(
        &self,
        extractor: &dyn FeatureExtractor,
        track_ids: Vec<String>,
        classifier: &dyn MoodClassifier,
    ) -> Result<(Catalog, PipelineReport), PipelineError> {
        let extraction = extractor.extract(&track_ids);
        let mut rejected: Vec<Rejection> = extraction
            .failures
            .iter()
            .map(|f| Rejection {
                track_id: f.track_id.clone(),
                reason: f.error.to_string(),
            })
            .collect();

        let processed = extraction.records.len() + extraction.failures.len();
        let baseline = baseline::compute(extraction.records.values())?;
        let enriched = pipeline::enrich(extraction.records, &baseline, classifier)?;
        let (records, invalid) = pipeline::finalize(enriched, self.jobs)?;
        rejected.extend(invalid);

        let persisted = self.persist(&records)?;
        let report = PipelineReport {
            source: CatalogSource::Computed,
            processed,
            validated: records.len(),
            rejected,
            persisted,
        };
        Ok((Catalog::new(records), report))
    }
}
