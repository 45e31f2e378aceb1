use super::{MoodClassifier, MoodError};
use crate::baseline::{BaselineError, CorpusBaseline};
use crate::record::{Mood, RawFeatureRecord, mean_std};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Dimensions of the clustering feature space, in vector order.
pub const FEATURE_NAMES: [&str; 8] = [
    "tempo",
    "spectral_centroid_mean",
    "energy_mean",
    "zero_crossing_rate_mean",
    "mfcc_mean",
    "spectral_contrast_mean",
    "complexity_score",
    "tonal_stability",
];

const TEMPO: usize = 0;
const ENERGY: usize = 2;
const COMPLEXITY: usize = 6;
const TONAL: usize = 7;

/// Build the 8-dimension clustering vector for one track.
pub fn feature_vector(r: &RawFeatureRecord) -> Vec<f64> {
    vec![
        r.tempo as f64,
        r.spectral_centroid_mean,
        r.energy_mean,
        r.zero_crossing_rate_mean,
        mean_std(&r.mfcc_profile).0,
        mean_std(&r.spectral_contrast_mean).0,
        r.complexity_score,
        r.tonal_stability,
    ]
}

/// Per-dimension z-score scaler fitted on a corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    /// Population std per dimension; a constant dimension gets 1.0.
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let dim = rows.first().map_or(0, Vec::len);
        let mut means = Vec::with_capacity(dim);
        let mut scales = Vec::with_capacity(dim);
        for d in 0..dim {
            let column: Vec<f64> = rows.iter().map(|row| row[d]).collect();
            let (mean, std) = mean_std(&column);
            means.push(mean);
            scales.push(if std < 1e-12 { 1.0 } else { std });
        }
        Self { means, scales }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(d, &v)| (v - self.means[d]) / self.scales[d])
            .collect()
    }

    pub fn inverse_transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(d, &v)| v * self.scales[d] + self.means[d])
            .collect()
    }
}

/// Everything a clustering run produced, kept for inspection and reuse.
#[derive(Debug, Clone)]
pub struct ClusterModel {
    pub scaler: StandardScaler,
    /// Centroids in standardized space.
    pub centroids: Vec<Vec<f64>>,
    /// Cluster index per track, in record order.
    pub assignments: Vec<usize>,
    /// Mood per cluster index.
    pub labels: Vec<Mood>,
}

/// Seeded k-means over standardized features; each centroid is named by
/// heuristics on its descaled tempo, energy, complexity and tonal stability,
/// judged against the corpus means and spreads.
#[derive(Debug, Clone)]
pub struct ClusterClassifier {
    clusters: usize,
    seed: u64,
    max_iterations: usize,
}

impl ClusterClassifier {
    pub fn new(clusters: usize, seed: u64) -> Result<Self, MoodError> {
        if !(4..=6).contains(&clusters) {
            return Err(MoodError::ClusterCount(clusters));
        }
        Ok(Self {
            clusters,
            seed,
            max_iterations: 300,
        })
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Fit the scaler and k-means on the whole batch.
    ///
    /// A batch smaller than the configured cluster count gets one cluster
    /// per track.
    pub fn fit(
        &self,
        records: &BTreeMap<String, RawFeatureRecord>,
    ) -> Result<ClusterModel, MoodError> {
        if records.is_empty() {
            return Err(BaselineError::EmptyCorpus.into());
        }

        let rows: Vec<Vec<f64>> = records.values().map(feature_vector).collect();
        let scaler = StandardScaler::fit(&rows);
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();

        let k = self.clusters.min(scaled.len());
        let mut rng = StdRng::seed_from_u64(self.seed);
        let (centroids, assignments) = kmeans(&scaled, k, self.max_iterations, &mut rng);

        let mut labels = Vec::with_capacity(centroids.len());
        for (i, c) in centroids.iter().enumerate() {
            let descaled = scaler.inverse_transform(c);
            let mood = label_centroid(&descaled, &scaler);
            if log::log_enabled!(log::Level::Trace) {
                let dims: Vec<String> = FEATURE_NAMES
                    .iter()
                    .zip(&descaled)
                    .map(|(name, v)| format!("{name}={v:.3}"))
                    .collect();
                log::trace!("Cluster {} -> {}: {}", i, mood, dims.join(" "));
            }
            labels.push(mood);
        }

        log::debug!(
            "Clustered {} tracks into {} clusters (seed {})",
            scaled.len(),
            k,
            self.seed
        );

        Ok(ClusterModel {
            scaler,
            centroids,
            assignments,
            labels,
        })
    }
}

impl MoodClassifier for ClusterClassifier {
    fn name(&self) -> &'static str {
        "clusters"
    }

    fn classify(
        &self,
        records: &BTreeMap<String, RawFeatureRecord>,
        _baseline: &CorpusBaseline,
    ) -> Result<BTreeMap<String, Mood>, MoodError> {
        let model = self.fit(records)?;
        Ok(records
            .keys()
            .zip(&model.assignments)
            .map(|(id, &cluster)| (id.clone(), model.labels[cluster]))
            .collect())
    }
}

/// Name a descaled centroid relative to the corpus the scaler was fitted on.
fn label_centroid(c: &[f64], s: &StandardScaler) -> Mood {
    let mean = &s.means;
    let std = &s.scales;

    let energy = c[ENERGY];
    let tempo = c[TEMPO];
    let complexity = c[COMPLEXITY];
    let tonal = c[TONAL];

    if energy > mean[ENERGY] + std[ENERGY] && tempo > mean[TEMPO] {
        Mood::Intense
    } else if energy > mean[ENERGY] && tempo > mean[TEMPO] && complexity > mean[COMPLEXITY] {
        Mood::Energetic
    } else if tonal > mean[TONAL] + std[TONAL] && energy > mean[ENERGY] {
        Mood::Triumphant
    } else if energy < mean[ENERGY] - std[ENERGY] && complexity < mean[COMPLEXITY] {
        Mood::Calm
    } else if energy < mean[ENERGY] && complexity < mean[COMPLEXITY] {
        Mood::Mysterious
    } else {
        Mood::Balanced
    }
}

/// Lloyd's k-means with k-means++ seeding. Returns (centroids, assignments).
fn kmeans(
    points: &[Vec<f64>],
    k: usize,
    max_iterations: usize,
    rng: &mut StdRng,
) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut centroids = init_centroids(points, k, rng);
    let mut assignments = vec![usize::MAX; points.len()];

    for iteration in 0..max_iterations {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let nearest = nearest_centroid(p, &centroids).0;
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            log::trace!("k-means converged after {} iterations", iteration);
            break;
        }

        let dim = points[0].len();
        let mut sums = vec![vec![0.0_f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (p, &a) in points.iter().zip(&assignments) {
            counts[a] += 1;
            for (s, v) in sums[a].iter_mut().zip(p) {
                *s += v;
            }
        }
        // An emptied cluster keeps its previous centroid.
        for c in 0..k {
            if counts[c] > 0 {
                let n = counts[c] as f64;
                centroids[c] = sums[c].iter().map(|s| s / n).collect();
            }
        }
    }

    (centroids, assignments)
}

/// k-means++: first centroid uniform, the rest weighted by squared distance
/// to the nearest centroid chosen so far.
fn init_centroids(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..n)].clone());

    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| nearest_centroid(p, &centroids).1)
            .collect();
        let total: f64 = weights.iter().sum();

        let chosen = if total <= 0.0 {
            // Every point already coincides with a centroid.
            centroids.len() % n
        } else {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &w) in weights.iter().enumerate() {
                if target < w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        };
        centroids.push(points[chosen].clone());
    }

    centroids
}

/// Index of and squared distance to the closest centroid; ties go to the
/// lowest index.
fn nearest_centroid(p: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d: f64 = p.iter().zip(c).map(|(a, b)| (a - b) * (a - b)).sum();
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}
