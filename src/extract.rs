use crate::record::{FeatureProfile, RawFeatureRecord};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed feature file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A track the extractor could not produce features for.
#[derive(Debug)]
pub struct ExtractFailure {
    pub track_id: String,
    pub error: ExtractError,
}

/// Output of one extraction batch. Failures are per-track and never abort
/// the batch.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: BTreeMap<String, RawFeatureRecord>,
    pub failures: Vec<ExtractFailure>,
}

/// Produces raw feature records for a batch of track ids. Called once per
/// pipeline run.
pub trait FeatureExtractor {
    fn extract(&self, track_ids: &[String]) -> Extraction;
}

/// Reads extractor output written ahead of time as one JSON
/// [`FeatureProfile`] per track: `<dir>/<track_id>.json`.
pub struct SidecarExtractor {
    dir: PathBuf,
    jobs: usize,
}

const SIDECAR_EXT: &str = "json";

impl SidecarExtractor {
    pub fn new(dir: impl Into<PathBuf>, jobs: usize) -> Self {
        Self {
            dir: dir.into(),
            jobs: jobs.max(1),
        }
    }

    /// List every track id with a sidecar file under the directory, sorted.
    pub fn discover(&self) -> Vec<String> {
        let mut ids: Vec<String> = WalkDir::new(&self.dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| x.eq_ignore_ascii_case(SIDECAR_EXT))
            })
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&self.dir).ok()?.with_extension("");
                Some(rel.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        ids.sort();
        log::info!("Found {} feature files in {}", ids.len(), self.dir.display());
        ids
    }

    fn sidecar_path(&self, track_id: &str) -> PathBuf {
        self.dir.join(format!("{track_id}.{SIDECAR_EXT}"))
    }

    fn extract_one(&self, track_id: &str) -> Result<RawFeatureRecord, ExtractError> {
        let path = self.sidecar_path(track_id);
        let profile = read_profile(&path)?;
        Ok(RawFeatureRecord::from_profile(track_id, profile))
    }
}

fn read_profile(path: &Path) -> Result<FeatureProfile, ExtractError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ExtractError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl FeatureExtractor for SidecarExtractor {
    fn extract(&self, track_ids: &[String]) -> Extraction {
        let pb = ProgressBar::new(track_ids.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("Extracting...");

        let results: Vec<(String, Result<RawFeatureRecord, ExtractError>)> =
            match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => pool.install(|| {
                    track_ids
                        .par_iter()
                        .map(|id| {
                            let r = self.extract_one(id);
                            pb.inc(1);
                            (id.clone(), r)
                        })
                        .collect()
                }),
                Err(e) => {
                    log::warn!("Falling back to sequential extraction: {}", e);
                    track_ids
                        .iter()
                        .map(|id| {
                            let r = self.extract_one(id);
                            pb.inc(1);
                            (id.clone(), r)
                        })
                        .collect()
                }
            };

        let mut extraction = Extraction::default();
        for (track_id, result) in results {
            match result {
                Ok(record) => {
                    extraction.records.insert(track_id, record);
                }
                Err(error) => {
                    log::warn!("Extraction failed for {}: {}", track_id, error);
                    extraction.failures.push(ExtractFailure { track_id, error });
                }
            }
        }

        pb.finish_with_message(format!(
            "Done: {} extracted, {} failed",
            extraction.records.len(),
            extraction.failures.len()
        ));
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PROFILE_JSON: &str = r#"{
        "sampling_rate": 22050,
        "tempo": 151.99,
        "rhythm_regularity": 3.4,
        "spectral_centroid_mean": 1900.0,
        "spectral_contrast_mean": [18.0, 20.0, 22.0, 24.0, 26.0, 28.0, 30.0],
        "energy_mean": 0.42,
        "energy_std": 0.08,
        "zero_crossing_rate_mean": 0.09,
        "mfcc_profile": [-4, -2, -2, 0, 1, 2, 3, 4, 5, 6, 6, 6, 6],
        "tonal_features": [0.02, -0.03, 0.01, 0.04, -0.02, 0.0],
        "chroma_mean": [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88],
        "beat_times": [0.4, 0.8],
        "tempo_structure": [1.0, 2.0]
    }"#;

    #[test]
    fn test_discover_and_extract() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("overworld_theme.mp3.json"), PROFILE_JSON).unwrap();
        std::fs::write(dir.path().join("broken_effect.wav.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let ex = SidecarExtractor::new(dir.path(), 2);
        let ids = ex.discover();
        assert_eq!(ids, vec!["broken_effect.wav", "overworld_theme.mp3"]);

        let out = ex.extract(&ids);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].track_id, "broken_effect.wav");
        assert!(matches!(out.failures[0].error, ExtractError::Parse { .. }));

        let rec = &out.records["overworld_theme.mp3"];
        assert_eq!(rec.tempo, 151);
        assert_eq!(rec.key.as_deref(), Some("C Major"));
        assert_eq!(rec.exploratory.tempo_structure, Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_missing_sidecar_is_isolated() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav.json"), PROFILE_JSON).unwrap();

        let ex = SidecarExtractor::new(dir.path(), 1);
        let out = ex.extract(&["a.wav".to_string(), "ghost.wav".to_string()]);
        assert!(out.records.contains_key("a.wav"));
        assert!(matches!(out.failures[0].error, ExtractError::Io { .. }));
    }
}
