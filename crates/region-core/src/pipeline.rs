//! Pipeline orchestrator: normalize → sweep or fit → remap → classify.

use serde::Serialize;
use tracing::info;

use crate::classify::{classify, RegionGrid};
use crate::cluster::{ClusterModel, KMeans, NonConvergence};
use crate::config::RegionConfig;
use crate::elbow::{ElbowSeries, ElbowSweep};
use crate::error::{ConfigurationError, Result};
use crate::grid::Grid;
use crate::labels::LabelLut;
use crate::normalize::{NormalizedGrid, Normalizer};

// ── Outputs ───────────────────────────────────────────────────────────────────

/// Everything produced by the final run.
#[derive(Debug, Clone)]
pub struct RegionResult {
    pub normalized: NormalizedGrid,
    pub model: ClusterModel,
    pub lut: LabelLut,
    pub regions: RegionGrid,
}

/// One canonical label of the final model, for external reporting.
#[derive(Debug, Clone, Serialize)]
pub struct LabelSummary {
    pub label: u32,
    pub raw_index: usize,
    /// Center in original band units.
    pub center: Vec<f64>,
    pub center_normalized: Vec<f64>,
    pub size: usize,
}

/// Serializable digest of the final model, labels in canonical order.
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub k: usize,
    pub bands: Vec<String>,
    pub reference_band: String,
    pub total_within_ss: f64,
    pub total_ss: f64,
    pub between_ss: f64,
    pub sample_size: usize,
    pub converged: bool,
    pub labels: Vec<LabelSummary>,
    pub warnings: Vec<NonConvergence>,
}

impl RegionResult {
    pub fn report(&self) -> ModelReport {
        let bands = self.normalized.band_names();
        let labels = self
            .lut
            .inverse()
            .iter()
            .enumerate()
            .map(|(pos, &raw)| LabelSummary {
                label: pos as u32 + 1,
                raw_index: raw,
                center: self.normalized.denormalize(&self.model.centers[raw]),
                center_normalized: self.model.centers[raw].clone(),
                size: self.model.sizes[raw],
            })
            .collect();
        ModelReport {
            k: self.model.k,
            reference_band: bands[self.lut.reference_band].clone(),
            bands,
            total_within_ss: self.model.total_within_ss,
            total_ss: self.model.total_ss,
            between_ss: self.model.between_ss,
            sample_size: self.model.sample_size,
            converged: self.model.converged,
            labels,
            warnings: self.model.warnings.clone(),
        }
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Runs the regionalization stages with one validated configuration.
#[derive(Debug, Clone)]
pub struct Regionalizer {
    config: RegionConfig,
}

impl Regionalizer {
    pub fn new(config: RegionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.config.normalize, self.config.std_convention)
    }

    pub fn kmeans(&self, k: usize) -> KMeans {
        KMeans::new(k)
            .with_sample_size(self.config.sample_size)
            .with_restarts(self.config.restarts)
            .with_max_iterations(self.config.max_iterations)
            .with_seed(self.config.seed)
    }

    /// Elbow series for k = 1..=max_clusters.
    pub fn sweep(&self, grid: &Grid) -> Result<ElbowSeries> {
        let normalized = self.normalizer().fit(grid)?;
        let series = ElbowSweep::new(self.config.max_clusters, self.kmeans(1)).run(&normalized)?;
        info!(max_clusters = self.config.max_clusters, n_valid = normalized.n_valid(), "elbow sweep complete");
        Ok(series)
    }

    /// Final run with the configured `chosen_clusters`.
    pub fn regionalize(&self, grid: &Grid) -> Result<RegionResult> {
        let k = self.config.chosen_clusters.ok_or(ConfigurationError::NoChosenClusters)?;
        self.regionalize_with(grid, k)
    }

    /// Final run with an explicit cluster count.
    ///
    /// Pipeline order:
    ///   1. Resolve the reference band (before any work)
    ///   2. Normalize
    ///   3. Multi-start k-means, full-grid assignment
    ///   4. Canonical label table from the winning centers
    ///   5. Region grid
    pub fn regionalize_with(&self, grid: &Grid, k: usize) -> Result<RegionResult> {
        if k < 1 {
            return Err(ConfigurationError::ChosenClusters(k).into());
        }

        // ── 1. Reference band ───────────────────────────────────────────────
        grid.validate()?;
        let reference_band = self.config.reference_band.resolve(grid)?;

        // ── 2. Normalize ────────────────────────────────────────────────────
        let normalized = self.normalizer().fit(grid)?;

        // ── 3. Cluster ──────────────────────────────────────────────────────
        let model = self.kmeans(k).fit(&normalized)?;

        // ── 4. Canonical labels ─────────────────────────────────────────────
        let lut = LabelLut::from_model(&model, reference_band)?;

        // ── 5. Classify ─────────────────────────────────────────────────────
        let regions = classify(&normalized, &model, &lut)?;

        info!(
            k,
            reference_band = %grid.bands[reference_band].name,
            n_valid = regions.n_valid(),
            "regionalization complete"
        );
        Ok(RegionResult { normalized, model, lut, regions })
    }
}
