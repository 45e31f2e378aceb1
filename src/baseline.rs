use crate::record::RawFeatureRecord;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum BaselineError {
    #[error("Empty corpus: no tracks to compute a baseline from")]
    EmptyCorpus,
}

/// Corpus-wide means used for relative ("above/below average") judgments.
/// Recomputed from whatever records are in hand on every run; never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorpusBaseline {
    pub energy_mean: f64,
    pub tempo: f64,
    pub complexity_score: f64,
    pub tonal_stability: f64,
    pub bass_contrast: f64,
    pub treble_contrast: f64,
    /// Number of tracks the means were taken over.
    pub tracks: usize,
}

/// Arithmetic means over every record. Iteration order is the caller's, so
/// pass records in a stable order (a `BTreeMap`) for reproducible sums.
pub fn compute<'a, I>(records: I) -> Result<CorpusBaseline, BaselineError>
where
    I: IntoIterator<Item = &'a RawFeatureRecord>,
{
    let mut sums = [0.0_f64; 6];
    let mut n = 0usize;

    for r in records {
        sums[0] += r.energy_mean;
        sums[1] += r.tempo as f64;
        sums[2] += r.complexity_score;
        sums[3] += r.tonal_stability;
        sums[4] += r.bass_contrast;
        sums[5] += r.treble_contrast;
        n += 1;
    }

    if n == 0 {
        return Err(BaselineError::EmptyCorpus);
    }

    let count = n as f64;
    Ok(CorpusBaseline {
        energy_mean: sums[0] / count,
        tempo: sums[1] / count,
        complexity_score: sums[2] / count,
        tonal_stability: sums[3] / count,
        bass_contrast: sums[4] / count,
        treble_contrast: sums[5] / count,
        tracks: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures;

    #[test]
    fn test_empty_corpus() {
        let none: Vec<RawFeatureRecord> = Vec::new();
        assert_eq!(compute(&none), Err(BaselineError::EmptyCorpus));
    }

    #[test]
    fn test_single_track_is_its_own_baseline() {
        let rec = fixtures::raw(0.37, 133, 27.3, 0.041);
        let b = compute([&rec]).unwrap();
        assert_eq!(b.energy_mean, 0.37);
        assert_eq!(b.tempo, 133.0);
        assert_eq!(b.complexity_score, 27.3);
        assert_eq!(b.tonal_stability, 0.041);
        assert_eq!(b.bass_contrast, rec.bass_contrast);
        assert_eq!(b.treble_contrast, rec.treble_contrast);
        assert_eq!(b.tracks, 1);
    }

    #[test]
    fn test_two_track_means() {
        let a = fixtures::raw(0.8, 150, 35.0, 0.1);
        let b = fixtures::raw(0.2, 80, 12.0, 0.05);
        let base = compute([&a, &b]).unwrap();
        assert!((base.energy_mean - 0.5).abs() < 1e-12);
        assert!((base.tempo - 115.0).abs() < 1e-12);
        assert!((base.complexity_score - 23.5).abs() < 1e-12);
        assert!((base.tonal_stability - 0.075).abs() < 1e-12);
        assert_eq!(base.tracks, 2);
    }
}
