use super::{MoodClassifier, MoodError};
use crate::baseline::CorpusBaseline;
use crate::record::{Mood, RawFeatureRecord};
use std::collections::BTreeMap;

/// Threshold rules against the corpus baseline. Deterministic, per-track.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

/// Classify one track. Rules are tried in priority order; first match wins.
///
/// 1. energy, tempo and complexity all above baseline → energetic
/// 2. tonal stability and energy above baseline → triumphant
/// 3. energy and complexity both below baseline → mysterious
/// 4. otherwise → balanced
pub fn classify_track(r: &RawFeatureRecord, b: &CorpusBaseline) -> Mood {
    let high_energy = r.energy_mean > b.energy_mean;
    let fast = r.tempo as f64 > b.tempo;
    let complex = r.complexity_score > b.complexity_score;

    if high_energy && fast && complex {
        Mood::Energetic
    } else if r.tonal_stability > b.tonal_stability && high_energy {
        Mood::Triumphant
    } else if r.energy_mean < b.energy_mean && r.complexity_score < b.complexity_score {
        Mood::Mysterious
    } else {
        Mood::Balanced
    }
}

impl MoodClassifier for RuleClassifier {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn classify(
        &self,
        records: &BTreeMap<String, RawFeatureRecord>,
        baseline: &CorpusBaseline,
    ) -> Result<BTreeMap<String, Mood>, MoodError> {
        Ok(records
            .iter()
            .map(|(id, r)| (id.clone(), classify_track(r, baseline)))
            .collect())
    }
}
