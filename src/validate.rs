use crate::record::{EnrichedRecord, TrackMetadata};
use thiserror::Error;

/// Why a single record was rejected. Carries the field and the offending value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} = {value} is below the minimum {min}")]
    BelowMinimum {
        field: &'static str,
        value: f64,
        min: f64,
    },
    #[error("{field} contains a non-finite value ({value})")]
    NotFinite { field: &'static str, value: f64 },
    #[error("{field} is missing")]
    Missing { field: &'static str },
    #[error("{field} has {actual} values, expected {expected}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::OutOfRange { field, .. }
            | Self::BelowMinimum { field, .. }
            | Self::NotFinite { field, .. }
            | Self::Missing { field }
            | Self::Length { field, .. } => *field,
        }
    }
}

/// Inclusive bounds for every range-checked scalar.
pub const BOUNDS: &[(&str, f64, f64)] = &[
    ("sampling_rate", 8000.0, 48000.0),
    ("tempo", 50.0, 300.0),
    ("rhythm_regularity", 1.0, 15.0),
    ("spectral_centroid_mean", 50.0, 3000.0),
    ("bass_contrast", 10.0, 30.0),
    ("treble_contrast", 5.0, 40.0),
    ("energy_mean", 0.0, 1.0),
    ("energy_std", 0.0, 1.0),
    ("zero_crossing_rate_mean", 0.0, 0.5),
    ("complexity_score", 10.0, 40.0),
    ("tonal_stability", 0.0, 0.5),
];

pub const MFCC_COEFFICIENTS: usize = 13;

fn check_range(field: &'static str, value: f64) -> Result<(), ValidationError> {
    check_finite(field, value)?;
    let (min, max) = BOUNDS
        .iter()
        .find(|(name, _, _)| *name == field)
        .map(|&(_, min, max)| (min, max))
        .unwrap_or((f64::NEG_INFINITY, f64::INFINITY));
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite { field, value })
    }
}

fn check_all_finite(field: &'static str, values: &[f64]) -> Result<(), ValidationError> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(&value) => Err(ValidationError::NotFinite { field, value }),
        None => Ok(()),
    }
}

/// Check an enriched record against the catalog schema and produce its
/// persisted form. Exploratory fields are dropped here.
pub fn validate(record: &EnrichedRecord) -> Result<TrackMetadata, ValidationError> {
    let r = &record.raw;

    check_range("sampling_rate", r.sampling_rate as f64)?;
    check_range("tempo", r.tempo as f64)?;
    check_range("rhythm_regularity", r.rhythm_regularity)?;
    check_range("spectral_centroid_mean", r.spectral_centroid_mean)?;
    check_range("bass_contrast", r.bass_contrast)?;
    check_range("treble_contrast", r.treble_contrast)?;
    check_range("energy_mean", r.energy_mean)?;
    check_range("energy_std", r.energy_std)?;
    check_range("zero_crossing_rate_mean", r.zero_crossing_rate_mean)?;
    check_range("complexity_score", r.complexity_score)?;
    check_range("tonal_stability", r.tonal_stability)?;

    check_finite("mfcc_spread", r.mfcc_spread)?;
    if r.mfcc_spread < 0.0 {
        return Err(ValidationError::BelowMinimum {
            field: "mfcc_spread",
            value: r.mfcc_spread,
            min: 0.0,
        });
    }
    check_finite("low_mfcc", r.low_mfcc)?;
    check_finite("mid_mfcc", r.mid_mfcc)?;
    check_finite("high_mfcc", r.high_mfcc)?;

    if r.mfcc_profile.len() != MFCC_COEFFICIENTS {
        return Err(ValidationError::Length {
            field: "mfcc_profile",
            expected: MFCC_COEFFICIENTS,
            actual: r.mfcc_profile.len(),
        });
    }
    check_all_finite("mfcc_profile", &r.mfcc_profile)?;
    check_all_finite("spectral_contrast_mean", &r.spectral_contrast_mean)?;
    check_all_finite("tonal_features", &r.tonal_features)?;

    let key = match r.key.as_deref() {
        Some(k) if !k.trim().is_empty() => k.to_string(),
        _ => return Err(ValidationError::Missing { field: "key" }),
    };

    Ok(TrackMetadata {
        sampling_rate: r.sampling_rate,
        tempo: r.tempo,
        rhythm_regularity: r.rhythm_regularity,
        spectral_centroid_mean: r.spectral_centroid_mean,
        spectral_contrast_mean: r.spectral_contrast_mean.clone(),
        bass_contrast: r.bass_contrast,
        treble_contrast: r.treble_contrast,
        energy_mean: r.energy_mean,
        energy_std: r.energy_std,
        zero_crossing_rate_mean: r.zero_crossing_rate_mean,
        mfcc_profile: r.mfcc_profile.clone(),
        low_mfcc: r.low_mfcc,
        mid_mfcc: r.mid_mfcc,
        high_mfcc: r.high_mfcc,
        mfcc_spread: r.mfcc_spread,
        tonal_features: r.tonal_features.clone(),
        key,
        complexity_score: r.complexity_score,
        tonal_stability: r.tonal_stability,
        mood: record.mood,
        function: record.function.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RawFeatureRecord, fixtures};

    #[test]
    fn test_well_formed_record_passes() {
        let rec = fixtures::enriched(fixtures::raw(0.4, 120, 22.0, 0.04));
        let m = validate(&rec).unwrap();
        assert_eq!(m.tempo, 120);
        assert_eq!(m.key, "C Major");
    }

    #[test]
    fn test_tempo_400_rejected_others_accepted() {
        let batch = vec![
            fixtures::enriched(fixtures::raw(0.4, 120, 22.0, 0.04)),
            fixtures::enriched(fixtures::raw(0.4, 400, 22.0, 0.04)),
            fixtures::enriched(fixtures::raw(0.6, 90, 30.0, 0.02)),
        ];
        let results: Vec<_> = batch.iter().map(validate).collect();
        assert!(results[0].is_ok());
        assert!(results[2].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.field(), "tempo");
        assert_eq!(
            *err,
            ValidationError::OutOfRange {
                field: "tempo",
                value: 400.0,
                min: 50.0,
                max: 300.0
            }
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let mut raw = fixtures::raw(1.0, 300, 40.0, 0.5);
        raw.sampling_rate = 8000;
        raw.zero_crossing_rate_mean = 0.5;
        assert!(validate(&fixtures::enriched(raw)).is_ok());
    }

    fn assert_rejects(field: &str, mutate: impl Fn(&mut RawFeatureRecord)) {
        let mut raw = fixtures::raw(0.4, 120, 22.0, 0.04);
        mutate(&mut raw);
        let err = validate(&fixtures::enriched(raw)).unwrap_err();
        assert_eq!(err.field(), field);
    }

    #[test]
    fn test_each_bound_checked() {
        assert_rejects("sampling_rate", |r| r.sampling_rate = 96000);
        assert_rejects("rhythm_regularity", |r| r.rhythm_regularity = 0.5);
        assert_rejects("spectral_centroid_mean", |r| r.spectral_centroid_mean = 3500.0);
        assert_rejects("bass_contrast", |r| r.bass_contrast = 9.0);
        assert_rejects("treble_contrast", |r| r.treble_contrast = 41.0);
        assert_rejects("energy_mean", |r| r.energy_mean = 1.2);
        assert_rejects("energy_std", |r| r.energy_std = -0.1);
        assert_rejects("zero_crossing_rate_mean", |r| r.zero_crossing_rate_mean = 0.6);
        assert_rejects("complexity_score", |r| r.complexity_score = 5.0);
        assert_rejects("tonal_stability", |r| r.tonal_stability = 0.7);
        assert_rejects("mfcc_spread", |r| r.mfcc_spread = -1.0);
    }

    #[test]
    fn test_missing_key() {
        let mut raw = fixtures::raw(0.4, 120, 22.0, 0.04);
        raw.key = None;
        let err = validate(&fixtures::enriched(raw)).unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "key" });
    }

    #[test]
    fn test_non_finite_values() {
        let mut raw = fixtures::raw(0.4, 120, 22.0, 0.04);
        raw.energy_mean = f64::NAN;
        let err = validate(&fixtures::enriched(raw)).unwrap_err();
        assert_eq!(err.field(), "energy_mean");

        let mut raw = fixtures::raw(0.4, 120, 22.0, 0.04);
        raw.tonal_features[2] = f64::INFINITY;
        let err = validate(&fixtures::enriched(raw)).unwrap_err();
        assert_eq!(err.field(), "tonal_features");
    }

    #[test]
    fn test_mfcc_profile_length() {
        let mut raw = fixtures::raw(0.4, 120, 22.0, 0.04);
        raw.mfcc_profile.pop();
        let err = validate(&fixtures::enriched(raw)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Length {
                field: "mfcc_profile",
                expected: 13,
                actual: 12
            }
        );
    }

    #[test]
    fn test_exploratory_fields_dropped() {
        let mut raw = fixtures::raw(0.4, 120, 22.0, 0.04);
        raw.exploratory.beat_times = Some(vec![0.5, 1.0]);
        raw.exploratory.chroma_mean = Some(vec![1.0; 12]);
        let m = validate(&fixtures::enriched(raw)).unwrap();
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("beat_times").is_none());
        assert!(json.get("chroma_mean").is_none());
        assert!(json.get("tempo_structure").is_none());
    }
}
