//! Musical key estimation from a 12-bin harmonic-content (chroma) profile.
//!
//! Each of the 24 candidate keys is scored by the Pearson correlation between
//! the profile, rotated so the candidate tonic sits at index 0, and the
//! Krumhansl-Schmuckler reference profile for the candidate's mode.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum KeyError {
    #[error("Invalid harmonic profile: {0}")]
    InvalidInput(String),
}

/// Pitch class names, index 0 = C.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Krumhansl-Schmuckler major key profile (tonic first).
const KS_MAJOR: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Schmuckler minor key profile (tonic first).
const KS_MINOR: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    fn profile(&self) -> &'static [f64; 12] {
        match self {
            Self::Major => &KS_MAJOR,
            Self::Minor => &KS_MINOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    /// Pitch class of the tonic, 0..12.
    pub tonic: usize,
    pub mode: Mode,
}

impl Key {
    /// Same mode, tonic moved up by `semitones`.
    pub fn transpose(self, semitones: usize) -> Self {
        Self {
            tonic: (self.tonic + semitones) % 12,
            mode: self.mode,
        }
    }

    /// All 24 keys in tie-break order: majors C..B, then minors C..B.
    pub fn all() -> impl Iterator<Item = Key> {
        [Mode::Major, Mode::Minor]
            .into_iter()
            .flat_map(|mode| (0..12).map(move |tonic| Key { tonic, mode }))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "Major",
            Mode::Minor => "Minor",
        };
        write!(f, "{} {}", PITCH_CLASSES[self.tonic], mode)
    }
}

/// Estimate the key of a chroma profile.
///
/// The profile must have exactly 12 finite, non-negative entries that are not
/// all equal (an all-zero or flat profile has no defined correlation).
/// Ties keep the first candidate in [`Key::all`] order.
pub fn estimate_key(profile: &[f64]) -> Result<Key, KeyError> {
    check_profile(profile)?;

    best_key(Key::all().map(|candidate| {
        let rotated: Vec<f64> = (0..12)
            .map(|m| profile[(candidate.tonic + m) % 12])
            .collect();
        (candidate, pearson(candidate.mode.profile(), &rotated))
    }))
    .ok_or_else(|| KeyError::InvalidInput("no candidate keys".to_string()))
}

/// Highest-scoring candidate; on equal scores the earlier one wins.
fn best_key(scores: impl Iterator<Item = (Key, f64)>) -> Option<Key> {
    let mut best: Option<(Key, f64)> = None;
    for (candidate, score) in scores {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate, score)),
        }
    }
    best.map(|(key, _)| key)
}

fn check_profile(profile: &[f64]) -> Result<(), KeyError> {
    if profile.len() != 12 {
        return Err(KeyError::InvalidInput(format!(
            "expected 12 pitch classes, got {}",
            profile.len()
        )));
    }
    if let Some(v) = profile.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(KeyError::InvalidInput(format!(
            "pitch class energy must be finite and non-negative, got {v}"
        )));
    }
    if profile.iter().all(|&v| v == 0.0) {
        return Err(KeyError::InvalidInput("profile is all zeros".to_string()));
    }
    if profile.iter().all(|&v| v == profile[0]) {
        return Err(KeyError::InvalidInput("profile has no variance".to_string()));
    }
    Ok(())
}

/// Pearson correlation coefficient of two equal-length series.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0_f64;
    let mut var_a = 0.0_f64;
    let mut var_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    cov / (var_a.sqrt() * var_b.sqrt())
}
