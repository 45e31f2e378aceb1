use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::key;

/// Per-track measurements as emitted by the external feature extractor.
///
/// Only the primary measurements live here; everything the catalog derives
/// from them (contrast bands, MFCC bands, spreads, key) is computed by
/// [`RawFeatureRecord::from_profile`].
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureProfile {
    pub sampling_rate: u32,
    /// Float BPM as reported by the beat tracker.
    pub tempo: f64,
    pub rhythm_regularity: f64,
    pub spectral_centroid_mean: f64,
    pub spectral_contrast_mean: Vec<f64>,
    pub energy_mean: f64,
    pub energy_std: f64,
    pub zero_crossing_rate_mean: f64,
    pub mfcc_profile: Vec<f64>,
    pub tonal_features: Vec<f64>,
    /// Per-pitch-class harmonic energy, input to key estimation.
    pub chroma_mean: Vec<f64>,
    #[serde(default)]
    pub beat_times: Option<Vec<f64>>,
    #[serde(default)]
    pub beat_strength: Option<f64>,
    #[serde(default)]
    pub tempo_scores: Option<Vec<f64>>,
    #[serde(default)]
    pub tempo_structure: Option<Vec<f64>>,
}

/// Extraction-only fields. Never validated, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exploratory {
    pub beat_times: Option<Vec<f64>>,
    pub beat_strength: Option<f64>,
    pub tempo_scores: Option<Vec<f64>>,
    pub tempo_structure: Option<Vec<f64>>,
    pub chroma_mean: Option<Vec<f64>>,
}

/// One track's features before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeatureRecord {
    pub sampling_rate: u32,
    pub tempo: u32,
    pub rhythm_regularity: f64,
    pub spectral_centroid_mean: f64,
    pub spectral_contrast_mean: Vec<f64>,
    pub bass_contrast: f64,
    pub treble_contrast: f64,
    pub energy_mean: f64,
    pub energy_std: f64,
    pub zero_crossing_rate_mean: f64,
    pub mfcc_profile: Vec<f64>,
    pub low_mfcc: f64,
    pub mid_mfcc: f64,
    pub high_mfcc: f64,
    pub mfcc_spread: f64,
    pub tonal_features: Vec<f64>,
    /// `None` when key estimation failed for this track.
    pub key: Option<String>,
    pub complexity_score: f64,
    pub tonal_stability: f64,
    pub exploratory: Exploratory,
}

/// Number of leading spectral contrast bands counted as bass.
const BASS_BANDS: usize = 3;

impl RawFeatureRecord {
    /// Build a complete record from extractor output, deriving every
    /// aggregate field and estimating the key from the chroma profile.
    pub fn from_profile(track_id: &str, p: FeatureProfile) -> Self {
        let contrast = &p.spectral_contrast_mean;
        let (bass_contrast, _) = mean_std(head(contrast, BASS_BANDS));
        let (treble_contrast, _) = mean_std(tail(contrast, BASS_BANDS));
        let (complexity_score, _) = mean_std(contrast);

        let mfcc = &p.mfcc_profile;
        let (low_mfcc, _) = mean_std(head(mfcc, 4));
        let (mid_mfcc, _) = mean_std(range(mfcc, 4, 9));
        let (high_mfcc, _) = mean_std(tail(mfcc, 9));
        let (_, mfcc_spread) = mean_std(mfcc);

        let (_, tonal_stability) = mean_std(&p.tonal_features);

        let key = match key::estimate_key(&p.chroma_mean) {
            Ok(k) => Some(k.to_string()),
            Err(e) => {
                log::warn!("Key estimation failed for {}: {}", track_id, e);
                None
            }
        };

        Self {
            sampling_rate: p.sampling_rate,
            // Saturating cast: NaN and negatives land on 0 and fail validation.
            tempo: p.tempo as u32,
            rhythm_regularity: p.rhythm_regularity,
            spectral_centroid_mean: p.spectral_centroid_mean,
            bass_contrast,
            treble_contrast,
            complexity_score,
            energy_mean: p.energy_mean,
            energy_std: p.energy_std,
            zero_crossing_rate_mean: p.zero_crossing_rate_mean,
            low_mfcc,
            mid_mfcc,
            high_mfcc,
            mfcc_spread,
            tonal_stability,
            key,
            spectral_contrast_mean: p.spectral_contrast_mean,
            mfcc_profile: p.mfcc_profile,
            tonal_features: p.tonal_features,
            exploratory: Exploratory {
                beat_times: p.beat_times,
                beat_strength: p.beat_strength,
                tempo_scores: p.tempo_scores,
                tempo_structure: p.tempo_structure,
                chroma_mean: Some(p.chroma_mean),
            },
        }
    }
}

fn head(v: &[f64], n: usize) -> &[f64] {
    &v[..n.min(v.len())]
}

fn tail(v: &[f64], n: usize) -> &[f64] {
    &v[n.min(v.len())..]
}

fn range(v: &[f64], start: usize, end: usize) -> &[f64] {
    &v[start.min(v.len())..end.min(v.len())]
}

/// Population mean and standard deviation. Empty input yields (0, 0).
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Mood label assigned by a [`crate::mood::MoodClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Energetic,
    Triumphant,
    Mysterious,
    Balanced,
    Intense,
    Calm,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Energetic => "energetic",
            Self::Triumphant => "triumphant",
            Self::Mysterious => "mysterious",
            Self::Balanced => "balanced",
            Self::Intense => "intense",
            Self::Calm => "calm",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-game function of a track. Variant order matches the alphabetical order
/// of the wire names, so a sorted set serializes canonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionTag {
    Background,
    Effect,
    GameOver,
    Hurry,
    Victory,
}

impl FunctionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Effect => "effect",
            Self::GameOver => "game_over",
            Self::Hurry => "hurry",
            Self::Victory => "victory",
        }
    }
}

impl FromStr for FunctionTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "background" => Ok(Self::Background),
            "effect" => Ok(Self::Effect),
            "game_over" => Ok(Self::GameOver),
            "hurry" => Ok(Self::Hurry),
            "victory" => Ok(Self::Victory),
            other => Err(format!("unknown function tag: {other:?}")),
        }
    }
}

/// Zero or more function tags. On the wire: sorted names joined by `,`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionTags(BTreeSet<FunctionTag>);

impl FunctionTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tag: FunctionTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = FunctionTag> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<FunctionTag> for FunctionTags {
    fn from_iter<I: IntoIterator<Item = FunctionTag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for FunctionTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(tag.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for FunctionTags {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(FunctionTag::from_str)
            .collect()
    }
}

impl Serialize for FunctionTags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FunctionTags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A raw record after function tagging and mood classification.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub raw: RawFeatureRecord,
    pub mood: Mood,
    pub function: FunctionTags,
}

impl EnrichedRecord {
    pub fn new(raw: RawFeatureRecord, mood: Mood, function: FunctionTags) -> Self {
        Self { raw, mood, function }
    }
}

/// The persisted per-track schema, minus the description.
///
/// Field order is the on-disk order. Unknown keys (the stored description,
/// stray exploratory fields) are ignored when reading a catalog back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub sampling_rate: u32,
    pub tempo: u32,
    pub rhythm_regularity: f64,
    pub spectral_centroid_mean: f64,
    pub spectral_contrast_mean: Vec<f64>,
    pub bass_contrast: f64,
    pub treble_contrast: f64,
    pub energy_mean: f64,
    pub energy_std: f64,
    pub zero_crossing_rate_mean: f64,
    pub mfcc_profile: Vec<f64>,
    pub low_mfcc: f64,
    pub mid_mfcc: f64,
    pub high_mfcc: f64,
    pub mfcc_spread: f64,
    pub tonal_features: Vec<f64>,
    pub key: String,
    pub complexity_score: f64,
    pub tonal_stability: f64,
    pub mood: Mood,
    pub function: FunctionTags,
}

impl From<TrackMetadata> for EnrichedRecord {
    /// Reconstruct working state from a stored catalog entry. Exploratory
    /// fields are absent; mood and function are carried over as assigned.
    fn from(m: TrackMetadata) -> Self {
        let raw = RawFeatureRecord {
            sampling_rate: m.sampling_rate,
            tempo: m.tempo,
            rhythm_regularity: m.rhythm_regularity,
            spectral_centroid_mean: m.spectral_centroid_mean,
            spectral_contrast_mean: m.spectral_contrast_mean,
            bass_contrast: m.bass_contrast,
            treble_contrast: m.treble_contrast,
            energy_mean: m.energy_mean,
            energy_std: m.energy_std,
            zero_crossing_rate_mean: m.zero_crossing_rate_mean,
            mfcc_profile: m.mfcc_profile,
            low_mfcc: m.low_mfcc,
            mid_mfcc: m.mid_mfcc,
            high_mfcc: m.high_mfcc,
            mfcc_spread: m.mfcc_spread,
            tonal_features: m.tonal_features,
            key: Some(m.key),
            complexity_score: m.complexity_score,
            tonal_stability: m.tonal_stability,
            exploratory: Exploratory::default(),
        };
        EnrichedRecord::new(raw, m.mood, m.function)
    }
}

/// A fully validated, described catalog entry. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    track_id: String,
    metadata: TrackMetadata,
    description: String,
}

impl ValidatedRecord {
    pub(crate) fn new(track_id: String, metadata: TrackMetadata, description: String) -> Self {
        Self {
            track_id,
            metadata,
            description,
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A well-formed record with the four mood-relevant features set.
    pub fn raw(energy: f64, tempo: u32, complexity: f64, tonal: f64) -> RawFeatureRecord {
        RawFeatureRecord {
            sampling_rate: 22050,
            tempo,
            rhythm_regularity: 4.2,
            spectral_centroid_mean: 1800.0,
            spectral_contrast_mean: vec![20.0, 19.0, 21.0, 22.0, 18.0, 20.0, 25.0],
            bass_contrast: 20.0,
            treble_contrast: 21.25,
            energy_mean: energy,
            energy_std: 0.05,
            zero_crossing_rate_mean: 0.08,
            mfcc_profile: vec![
                -210.0, 110.0, -12.0, 30.0, 4.0, 9.0, -3.0, 6.0, -1.0, 2.0, 0.5, -2.5, 1.0,
            ],
            low_mfcc: -20.5,
            mid_mfcc: 3.0,
            high_mfcc: 0.25,
            mfcc_spread: 67.0,
            tonal_features: vec![0.02, -0.01, 0.05, 0.03, -0.02, 0.01],
            key: Some("C Major".to_string()),
            complexity_score: complexity,
            tonal_stability: tonal,
            exploratory: Exploratory::default(),
        }
    }

    pub fn enriched(raw: RawFeatureRecord) -> EnrichedRecord {
        EnrichedRecord::new(raw, Mood::Balanced, FunctionTags::new())
    }

    pub fn profile() -> FeatureProfile {
        FeatureProfile {
            sampling_rate: 22050,
            tempo: 143.55,
            rhythm_regularity: 3.1,
            spectral_centroid_mean: 2100.0,
            spectral_contrast_mean: vec![18.0, 20.0, 22.0, 24.0, 26.0, 28.0, 30.0],
            energy_mean: 0.31,
            energy_std: 0.07,
            zero_crossing_rate_mean: 0.11,
            mfcc_profile: vec![
                -4.0, -2.0, -2.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 6.0, 6.0, 6.0,
            ],
            tonal_features: vec![0.1, -0.1, 0.1, -0.1],
            chroma_mean: vec![
                6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
            ],
            beat_times: Some(vec![0.5, 0.92, 1.34]),
            beat_strength: Some(12.0),
            tempo_scores: None,
            tempo_structure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_profile_derives_aggregates() {
        let rec = RawFeatureRecord::from_profile("overworld_theme.mp3", fixtures::profile());

        assert_eq!(rec.tempo, 143);
        assert!((rec.bass_contrast - 20.0).abs() < 1e-12);
        assert!((rec.treble_contrast - 27.0).abs() < 1e-12);
        assert!((rec.complexity_score - 24.0).abs() < 1e-12);
        assert!((rec.low_mfcc - -2.0).abs() < 1e-12);
        assert!((rec.mid_mfcc - 3.0).abs() < 1e-12);
        assert!((rec.high_mfcc - 6.0).abs() < 1e-12);
        assert!((rec.tonal_stability - 0.1).abs() < 1e-12);
        assert!(rec.mfcc_spread > 0.0);
        assert_eq!(rec.key.as_deref(), Some("C Major"));
        assert_eq!(rec.exploratory.beat_times.as_ref().map(Vec::len), Some(3));
        assert!(rec.exploratory.chroma_mean.is_some());
    }

    #[test]
    fn test_from_profile_leaves_key_unset_on_silent_chroma() {
        let mut p = fixtures::profile();
        p.chroma_mean = vec![0.0; 12];
        let rec = RawFeatureRecord::from_profile("silence.wav", p);
        assert!(rec.key.is_none());
    }

    #[test]
    fn test_from_profile_short_vectors_yield_zero() {
        let mut p = fixtures::profile();
        p.spectral_contrast_mean = vec![15.0, 15.0];
        let rec = RawFeatureRecord::from_profile("blip.wav", p);
        assert_eq!(rec.treble_contrast, 0.0);
        assert!((rec.bass_contrast - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_function_tags_canonical_string() {
        let tags: FunctionTags = [FunctionTag::Victory, FunctionTag::Background, FunctionTag::Effect]
            .into_iter()
            .collect();
        assert_eq!(tags.to_string(), "background,effect,victory");
        assert_eq!(FunctionTags::new().to_string(), "");
    }

    #[test]
    fn test_function_tags_parse_tolerates_spaces() {
        let tags: FunctionTags = "victory, game_over".parse().unwrap();
        assert!(tags.contains(FunctionTag::Victory));
        assert!(tags.contains(FunctionTag::GameOver));
        assert_eq!(tags.len(), 2);

        let empty: FunctionTags = "".parse().unwrap();
        assert!(empty.is_empty());

        assert!("victory,boss".parse::<FunctionTags>().is_err());
    }

    #[test]
    fn test_metadata_ignores_stored_description() {
        let json = r#"{
            "sampling_rate": 22050, "tempo": 120, "rhythm_regularity": 2.0,
            "spectral_centroid_mean": 1500.0, "spectral_contrast_mean": [20.0],
            "bass_contrast": 20.0, "treble_contrast": 20.0, "energy_mean": 0.3,
            "energy_std": 0.1, "zero_crossing_rate_mean": 0.1,
            "mfcc_profile": [0,0,0,0,0,0,0,0,0,0,0,0,0],
            "low_mfcc": 0.0, "mid_mfcc": 0.0, "high_mfcc": 0.0, "mfcc_spread": 0.0,
            "tonal_features": [0.0], "key": "A Minor", "complexity_score": 20.0,
            "tonal_stability": 0.01, "mood": "calm", "function": "hurry",
            "description": "stale text"
        }"#;
        let m: TrackMetadata = serde_json::from_str(json).unwrap();
        let rec = EnrichedRecord::from(m);
        assert_eq!(rec.mood, Mood::Calm);
        assert!(rec.function.contains(FunctionTag::Hurry));
        assert_eq!(rec.raw.key.as_deref(), Some("A Minor"));
        assert_eq!(rec.raw.exploratory, Exploratory::default());
    }
}
