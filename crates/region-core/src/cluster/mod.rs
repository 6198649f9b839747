//! Stochastic k-means clusterer.
//!
//! A fit draws a reproducible sample of valid cells, runs `restarts`
//! independent Lloyd starts on it, keeps the start with the smallest
//! within-cluster sum of squares and finally assigns every valid cell of the
//! grid to its nearest winning center.
//!
//! ```text
//! W = Σ_c Σ_{x ∈ C_c} ||x − μ_c||²      (over the fitting sample)
//! ```

pub mod assign;
pub mod lloyd;
pub mod sampling;

#[cfg(feature = "threading")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigurationError, InvalidInputError, Result};
use crate::normalize::NormalizedGrid;
use assign::assign_rows;
use lloyd::{run_start, total_ss, StartFit};
use sampling::{draw_sample, gather_rows, sample_rng, start_rng};

/// Default Lloyd iteration cap per start.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// A start that hit the iteration cap before assignments settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonConvergence {
    pub k: usize,
    pub start: usize,
    pub iterations: usize,
}

/// Result of one clustering run. Centers are in normalized feature space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModel {
    pub k: usize,
    pub centers: Vec<Vec<f64>>,
    /// Within-cluster sum of squares of the winning start over the sample.
    pub total_within_ss: f64,
    /// Sum of squares of the sample about its overall mean.
    pub total_ss: f64,
    pub between_ss: f64,
    /// Cluster index per grid cell, row-major; `None` for no-data cells.
    pub assignment: Vec<Option<usize>>,
    /// Full-grid cell count per cluster.
    pub sizes: Vec<usize>,
    pub sample_size: usize,
    pub winning_start: usize,
    pub iterations: usize,
    pub converged: bool,
    pub warnings: Vec<NonConvergence>,
}

impl ClusterModel {
    /// Centers expressed in the original band units.
    pub fn denormalized_centers(&self, grid: &NormalizedGrid) -> Vec<Vec<f64>> {
        self.centers.iter().map(|c| grid.denormalize(c)).collect()
    }

    pub fn n_assigned(&self) -> usize {
        self.sizes.iter().sum()
    }
}

/// Multi-start k-means parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeans {
    pub k: usize,
    pub sample_size: usize,
    pub restarts: usize,
    pub max_iterations: usize,
    pub seed: u64,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            sample_size: 10_000,
            restarts: 25,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: 42,
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn check(&self) -> Result<()> {
        if self.k < 1 {
            return Err(ConfigurationError::ChosenClusters(self.k).into());
        }
        if self.restarts < 1 {
            return Err(ConfigurationError::Restarts(self.restarts).into());
        }
        if self.sample_size == 0 {
            return Err(ConfigurationError::SampleSize(self.sample_size).into());
        }
        if self.max_iterations == 0 {
            return Err(ConfigurationError::MaxIterations(self.max_iterations).into());
        }
        Ok(())
    }

    /// Fit centers on a sample of `grid` and assign every valid cell.
    pub fn fit(&self, grid: &NormalizedGrid) -> Result<ClusterModel> {
        let fit = self.fit_matrix(grid.features(), grid.n_bands())?;

        let d = grid.n_bands();
        let rows = assign_rows(grid.features(), d, &fit.centers);
        let mut assignment = vec![None; grid.len()];
        let mut sizes = vec![0usize; self.k];
        for (&cell, &c) in grid.cells().iter().zip(&rows) {
            assignment[cell] = Some(c);
            sizes[c] += 1;
        }

        info!(
            k = self.k,
            within_ss = fit.within_ss,
            start = fit.winning.start,
            iterations = fit.winning.iterations,
            "k-means fit complete"
        );

        Ok(ClusterModel {
            k: self.k,
            centers: fit.centers.chunks(d).map(<[f64]>::to_vec).collect(),
            total_within_ss: fit.within_ss,
            total_ss: fit.total_ss,
            between_ss: (fit.total_ss - fit.within_ss).max(0.0),
            assignment,
            sizes,
            sample_size: fit.sample_size,
            winning_start: fit.winning.start,
            iterations: fit.winning.iterations,
            converged: fit.winning.converged,
            warnings: fit.warnings,
        })
    }

    /// Fit centers on a flat `n × d` feature matrix without touching any grid.
    pub fn fit_matrix(&self, features: &[f64], d: usize) -> Result<MatrixFit> {
        self.check()?;
        if d == 0 || features.len() % d != 0 {
            return Err(InvalidInputError::DimensionMismatch { expected: d, found: features.len() }.into());
        }
        let n_valid = features.len() / d;
        if n_valid == 0 {
            return Err(InvalidInputError::NoValidCells.into());
        }
        if self.k > n_valid {
            return Err(InvalidInputError::TooManyClusters { k: self.k, available: n_valid }.into());
        }

        let rows = draw_sample(n_valid, self.sample_size, &mut sample_rng(self.seed));
        if self.k > rows.len() {
            return Err(InvalidInputError::TooManyClusters { k: self.k, available: rows.len() }.into());
        }
        if rows.len() < self.sample_size {
            debug!(requested = self.sample_size, available = n_valid, "sample clamped to all valid cells");
        }
        let sample = gather_rows(features, d, &rows);

        let run = |s: usize| run_start(&sample, d, self.k, self.max_iterations, s, &mut start_rng(self.seed, s));
        #[cfg(feature = "threading")]
        let starts: Vec<StartFit> = (0..self.restarts).into_par_iter().map(run).collect();
        #[cfg(not(feature = "threading"))]
        let starts: Vec<StartFit> = (0..self.restarts).map(run).collect();

        let mut warnings = Vec::new();
        for s in &starts {
            debug!(k = self.k, start = s.start, within_ss = s.within_ss, iterations = s.iterations, "k-means start");
            if !s.converged {
                warn!(k = self.k, start = s.start, iterations = s.iterations, "k-means start hit the iteration cap");
                warnings.push(NonConvergence { k: self.k, start: s.start, iterations: s.iterations });
            }
        }

        // Starts are ordered by index, so a strict `<` keeps the lowest index on ties.
        let mut best = 0;
        for (i, s) in starts.iter().enumerate() {
            if s.within_ss < starts[best].within_ss {
                best = i;
            }
        }
        let winning = starts.into_iter().nth(best).ok_or(ConfigurationError::Restarts(0))?;

        Ok(MatrixFit {
            centers: winning.centers.clone(),
            within_ss: winning.within_ss,
            total_ss: total_ss(&sample, d),
            sample_size: rows.len(),
            winning,
            warnings,
        })
    }
}

/// Winning centers of a fit on a bare feature matrix.
#[derive(Debug, Clone)]
pub struct MatrixFit {
    /// Flat `k × d` centers.
    pub centers: Vec<f64>,
    pub within_ss: f64,
    pub total_ss: f64,
    pub sample_size: usize,
    pub winning: StartFit,
    pub warnings: Vec<NonConvergence>,
}
