use crate::baseline::CorpusBaseline;
use crate::record::{TrackMetadata, ValidatedRecord};

/// Render the natural-language summary of one validated track.
///
/// Every comparison is a strict greater-than against the baseline mean, so
/// the same metadata and baseline always produce the same sentence.
pub fn describe(track_id: &str, m: &TrackMetadata, b: &CorpusBaseline) -> String {
    let function = if m.function.is_empty() {
        "untagged".to_string()
    } else {
        m.function.to_string()
    };
    let energy = if m.energy_mean > b.energy_mean { "high" } else { "low" };
    let structure = if m.complexity_score > b.complexity_score {
        "complex"
    } else {
        "simple"
    };
    let bass = if m.bass_contrast > b.bass_contrast {
        "strong"
    } else {
        "subtle"
    };
    let treble = if m.treble_contrast > b.treble_contrast {
        "bright"
    } else {
        "warm"
    };

    format!(
        "This track is named {track_id}. This is a {mood} {function} track in {key} \
         with a tempo of {tempo} BPM. It has {energy} energy and {structure} structure. \
         The track features {bass} bass and {treble} treble characteristics.",
        mood = m.mood,
        key = m.key,
        tempo = m.tempo,
    )
}

/// Attach a freshly rendered description, producing the final catalog entry.
pub fn attach(track_id: String, metadata: TrackMetadata, baseline: &CorpusBaseline) -> ValidatedRecord {
    let description = describe(&track_id, &metadata, baseline);
    ValidatedRecord::new(track_id, metadata, description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FunctionTag, FunctionTags, Mood, fixtures};
    use crate::validate::validate;

    fn baseline() -> CorpusBaseline {
        CorpusBaseline {
            energy_mean: 0.5,
            tempo: 115.0,
            complexity_score: 23.5,
            tonal_stability: 0.075,
            bass_contrast: 19.0,
            treble_contrast: 22.0,
            tracks: 2,
        }
    }

    #[test]
    fn test_template() {
        let raw = fixtures::raw(0.8, 150, 35.0, 0.1);
        let tags: FunctionTags = [FunctionTag::Background, FunctionTag::Hurry].into_iter().collect();
        let m = validate(&crate::record::EnrichedRecord::new(raw, Mood::Energetic, tags)).unwrap();

        let text = describe("overworld_theme_hurry.mp3", &m, &baseline());
        assert_eq!(
            text,
            "This track is named overworld_theme_hurry.mp3. This is a energetic \
             background,hurry track in C Major with a tempo of 150 BPM. It has high \
             energy and complex structure. The track features strong bass and warm \
             treble characteristics."
        );
    }

    #[test]
    fn test_equal_to_baseline_reads_low() {
        let mut raw = fixtures::raw(0.5, 115, 23.5, 0.075);
        raw.bass_contrast = 19.0;
        raw.treble_contrast = 22.0;
        let m = validate(&fixtures::enriched(raw)).unwrap();
        let text = describe("coin.wav", &m, &baseline());
        assert!(text.contains("balanced untagged track"));
        assert!(text.contains("low energy and simple structure"));
        assert!(text.contains("subtle bass and warm treble"));
    }

    #[test]
    fn test_attach_is_deterministic() {
        let m = validate(&fixtures::enriched(fixtures::raw(0.3, 90, 15.0, 0.02))).unwrap();
        let a = attach("cave.wav".to_string(), m.clone(), &baseline());
        let b = attach("cave.wav".to_string(), m, &baseline());
        assert_eq!(a.description(), b.description());
        assert_eq!(a.track_id(), "cave.wav");
    }
}
