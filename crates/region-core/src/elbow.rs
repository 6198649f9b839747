//! Model Selector: within-SS for k = 1..=k_max, for the operator to inspect.
//!
//! Every k gets a fresh [`KMeans`] with the same seed, so each point on the
//! curve is reproducible in isolation. Knee location is optional and
//! pluggable through [`KneeLocator`].

#[cfg(feature = "threading")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cluster::{KMeans, NonConvergence};
use crate::error::{ConfigurationError, Result};
use crate::normalize::NormalizedGrid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElbowPoint {
    pub k: usize,
    pub total_within_ss: f64,
}

/// Dispersion per cluster count, ordered by k.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElbowSeries {
    pub points: Vec<ElbowPoint>,
    #[serde(default)]
    pub warnings: Vec<NonConvergence>,
}

impl ElbowSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, k: usize) -> Option<f64> {
        self.points.iter().find(|p| p.k == k).map(|p| p.total_within_ss)
    }

    /// True when dispersion never rises with k.
    pub fn is_non_increasing(&self, tolerance: f64) -> bool {
        self.points.windows(2).all(|w| w[1].total_within_ss <= w[0].total_within_ss + tolerance)
    }
}

/// Runs the clusterer once per k with shared sampling parameters.
#[derive(Debug, Clone, Copy)]
pub struct ElbowSweep {
    pub max_clusters: usize,
    /// Template; its `k` is replaced for every run.
    pub kmeans: KMeans,
}

impl ElbowSweep {
    pub fn new(max_clusters: usize, kmeans: KMeans) -> Self {
        Self { max_clusters, kmeans }
    }

    /// Fit k = 1..=max_clusters. The first failing k aborts the sweep.
    pub fn run(&self, grid: &NormalizedGrid) -> Result<ElbowSeries> {
        if self.max_clusters < 1 {
            return Err(ConfigurationError::MaxClusters(self.max_clusters).into());
        }
        let fit_k = |k: usize| -> Result<(ElbowPoint, Vec<NonConvergence>)> {
            let fit = KMeans { k, ..self.kmeans }.fit_matrix(grid.features(), grid.n_bands())?;
            Ok((ElbowPoint { k, total_within_ss: fit.within_ss }, fit.warnings))
        };

        #[cfg(feature = "threading")]
        let runs: Vec<Result<_>> = (1..=self.max_clusters).into_par_iter().map(fit_k).collect();
        #[cfg(not(feature = "threading"))]
        let runs: Vec<Result<_>> = (1..=self.max_clusters).map(fit_k).collect();

        let mut series = ElbowSeries::default();
        for run in runs {
            let (point, warnings) = run?;
            info!(k = point.k, within_ss = point.total_within_ss, "elbow point");
            series.points.push(point);
            series.warnings.extend(warnings);
        }
        Ok(series)
    }
}

/// Suggests a cluster count from an elbow curve.
pub trait KneeLocator {
    fn locate(&self, series: &ElbowSeries) -> Option<usize>;
}

/// Picks the k whose point lies farthest below the chord joining the first
/// and last points, after scaling both axes to [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxDistanceKnee;

impl KneeLocator for MaxDistanceKnee {
    fn locate(&self, series: &ElbowSeries) -> Option<usize> {
        let pts = &series.points;
        if pts.len() < 3 {
            return None;
        }
        let (first, last) = (pts[0], pts[pts.len() - 1]);
        let dk = (last.k - first.k) as f64;
        let dw = first.total_within_ss - last.total_within_ss;
        if dk <= 0.0 || dw <= 0.0 {
            return None;
        }
        pts.iter()
            .map(|p| {
                let x = (p.k - first.k) as f64 / dk;
                let y = (p.total_within_ss - last.total_within_ss) / dw;
                // Chord runs from (0, 1) to (1, 0): distance ∝ 1 − x − y.
                (p.k, 1.0 - x - y)
            })
            .filter(|&(_, gap)| gap > 0.0)
            .fold(None, |best: Option<(usize, f64)>, cur| match best {
                Some(b) if b.1 >= cur.1 => Some(b),
                _ => Some(cur),
            })
            .map(|(k, _)| k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, InvalidInputError};
    use crate::grid::{Band, Grid};
    use crate::normalize::Normalizer;

    /// Four tight blobs at the corners of a square, 16 cells each.
    fn corner_blobs() -> NormalizedGrid {
        let (w, h) = (8, 8);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for r in 0..h {
            for c in 0..w {
                let j = ((r * 5 + c * 3) % 7) as f32 * 0.03;
                x.push(if c < 4 { j } else { 10.0 + j });
                y.push(if r < 4 { j } else { 10.0 - j });
            }
        }
        let g = Grid::new(w, h, vec![Band::new("x", x), Band::new("y", y)]).unwrap();
        Normalizer::default().fit(&g).unwrap()
    }

    fn sweep(max_clusters: usize) -> ElbowSweep {
        ElbowSweep::new(max_clusters, KMeans::new(1).with_restarts(100).with_seed(3))
    }

    #[test]
    fn series_covers_every_k_in_order() {
        let s = sweep(5).run(&corner_blobs()).unwrap();
        let ks: Vec<usize> = s.points.iter().map(|p| p.k).collect();
        assert_eq!(ks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn dispersion_does_not_rise_with_k() {
        let s = sweep(5).run(&corner_blobs()).unwrap();
        assert!(s.is_non_increasing(1e-9), "{:?}", s.points);
        assert!(s.get(4).unwrap() < 0.05 * s.get(1).unwrap());
    }

    #[test]
    fn each_point_matches_a_standalone_fit() {
        let ng = corner_blobs();
        let s = sweep(4).run(&ng).unwrap();
        let solo = KMeans::new(3).with_restarts(100).with_seed(3).fit(&ng).unwrap();
        assert_eq!(s.get(3).unwrap().to_bits(), solo.total_within_ss.to_bits());
    }

    #[test]
    fn sweep_aborts_when_k_exceeds_valid_cells() {
        let g = Grid::new(2, 2, vec![Band::new("x", vec![0.0, 1.0, 2.0, f32::NAN])]).unwrap();
        let ng = Normalizer::default().fit(&g).unwrap();
        assert!(matches!(
            sweep(4).run(&ng),
            Err(Error::InvalidInput(InvalidInputError::TooManyClusters { k: 4, available: 3 }))
        ));
    }

    #[test]
    fn knee_of_four_blobs_is_four() {
        let s = sweep(8).run(&corner_blobs()).unwrap();
        assert_eq!(MaxDistanceKnee.locate(&s), Some(4));
    }

    #[test]
    fn knee_needs_three_points() {
        let s = ElbowSeries {
            points: vec![
                ElbowPoint { k: 1, total_within_ss: 10.0 },
                ElbowPoint { k: 2, total_within_ss: 1.0 },
            ],
            warnings: vec![],
        };
        assert_eq!(MaxDistanceKnee.locate(&s), None);
    }
}
