pub mod cache;

use crate::record::ValidatedRecord;
use std::collections::BTreeMap;

pub use cache::{CacheError, MetadataCache};

/// The validated catalog: every accepted track keyed by id.
///
/// This is the only view downstream consumers (search, chat) get of the
/// audio corpus.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: BTreeMap<String, ValidatedRecord>,
}

impl Catalog {
    pub fn new(records: BTreeMap<String, ValidatedRecord>) -> Self {
        Self { records }
    }

    pub fn get(&self, track_id: &str) -> Option<&ValidatedRecord> {
        self.records.get(track_id)
    }

    /// All records in track id order.
    pub fn iter(&self) -> impl Iterator<Item = &ValidatedRecord> {
        self.records.values()
    }

    pub fn track_ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Human-readable description of every persisted field, in document order.
pub fn field_descriptions() -> &'static [(&'static str, &'static str)] {
    FIELD_DESCRIPTIONS
}

const FIELD_DESCRIPTIONS: &[(&str, &str)] = &[
    ("sampling_rate", "Audio sampling rate in Hz"),
    ("tempo", "Tempo in beats per minute (BPM)"),
    (
        "rhythm_regularity",
        "Measure of rhythm consistency (std/mean of tempo structure). Lower values indicate more regular patterns",
    ),
    (
        "spectral_centroid_mean",
        "Average frequency center of the spectrum. Higher values indicate brighter sounds",
    ),
    (
        "spectral_contrast_mean",
        "Mean spectral contrast values across frequency bands",
    ),
    (
        "bass_contrast",
        "Contrast in the bass frequencies. Higher values indicate stronger bass presence",
    ),
    (
        "treble_contrast",
        "Contrast in the treble frequencies. Higher values indicate brighter treble",
    ),
    (
        "energy_mean",
        "Average energy/RMS of the audio. Higher values indicate louder or more consistent volume",
    ),
    (
        "energy_std",
        "Standard deviation of energy/RMS. Higher values indicate more dynamic range",
    ),
    (
        "zero_crossing_rate_mean",
        "Average rate of sign changes in the audio. Higher values indicate more high-frequency content or noise",
    ),
    (
        "mfcc_profile",
        "Average values for each MFCC coefficient, representing the timbre profile",
    ),
    (
        "low_mfcc",
        "Average of lower MFCCs (1-4), related to timbre and bass characteristics",
    ),
    (
        "mid_mfcc",
        "Average of middle MFCCs (5-9), related to timbral characteristics",
    ),
    (
        "high_mfcc",
        "Average of higher MFCCs (10-13), related to high-frequency characteristics",
    ),
    (
        "mfcc_spread",
        "Standard deviation of MFCC values, indicating timbral complexity",
    ),
    (
        "tonal_features",
        "Average tonnetz features representing harmonic content",
    ),
    (
        "key",
        "Estimated musical key of the audio based on Krumhansl-Schmuckler key profiles",
    ),
    (
        "complexity_score",
        "Overall complexity measure based on spectral contrast. Higher values indicate more complex audio",
    ),
    (
        "tonal_stability",
        "Standard deviation of tonal features. Lower values indicate more stable tonality",
    ),
    (
        "mood",
        "Classified mood of the track based on energy, tempo, complexity, and tonality",
    ),
    (
        "function",
        "Categorized in-game function of the audio track. Multiple functions are joined with commas",
    ),
    (
        "description",
        "Human-readable description of the audio track's characteristics",
    ),
];
