//! Band Normalizer: per-band standardization of the valid cells of a grid.
//!
//! Statistics are taken over the jointly-valid cells, the same cells that
//! are later clustered, so a normalized band has mean 0 and (by the chosen
//! convention) standard deviation 1 over exactly those cells. No-data cells
//! are not stored; [`NormalizedGrid::cells`] maps each feature row back to
//! its row-major grid position.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{NormalizeMode, StdConvention};
use crate::error::{InvalidInputError, Result};
use crate::grid::{Extent, Grid};

/// Relative spread below which a band counts as constant.
const CONSTANT_BAND_TOLERANCE: f64 = 1e-12;

/// Location and spread of one band over the valid cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStats {
    pub name: String,
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl BandStats {
    /// `(offset, scale)` such that normalized = (x − offset) / scale.
    pub fn transform(&self, mode: NormalizeMode) -> (f64, f64) {
        let offset = if mode.centers() { self.mean } else { 0.0 };
        let scale = if mode.scales() { self.std } else { 1.0 };
        (offset, scale)
    }
}

/// Standardized feature vectors of the valid cells of one [`Grid`].
#[derive(Debug, Clone)]
pub struct NormalizedGrid {
    pub width: usize,
    pub height: usize,
    pub extent: Extent,
    pub crs: Option<String>,
    pub mode: NormalizeMode,
    pub stats: Vec<BandStats>,
    cells: Vec<usize>,
    features: Vec<f64>,
}

impl NormalizedGrid {
    /// Total cells in the source grid, valid or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn n_bands(&self) -> usize {
        self.stats.len()
    }

    #[inline]
    pub fn n_valid(&self) -> usize {
        self.cells.len()
    }

    /// Row-major grid index of each feature row.
    #[inline]
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    /// Flat `n_valid × n_bands` feature matrix.
    #[inline]
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    #[inline]
    pub fn feature(&self, row: usize) -> &[f64] {
        let d = self.n_bands();
        &self.features[row * d..(row + 1) * d]
    }

    pub fn band_names(&self) -> Vec<String> {
        self.stats.iter().map(|s| s.name.clone()).collect()
    }

    /// Map a normalized feature vector back to original band units.
    pub fn denormalize(&self, v: &[f64]) -> Vec<f64> {
        v.iter()
            .zip(&self.stats)
            .map(|(&x, s)| {
                let (offset, scale) = s.transform(self.mode);
                x * scale + offset
            })
            .collect()
    }

    /// Standardize the already-normalized features again. On data produced
    /// by [`Normalizer::fit`] with the same settings this is the identity
    /// up to rounding.
    ///
    /// The returned `stats` describe this grid's features, not the original
    /// bands, so [`denormalize`](Self::denormalize) on the result maps back
    /// to this grid's normalized space.
    pub fn renormalize(&self, normalizer: &Normalizer) -> Result<NormalizedGrid> {
        let names = self.band_names();
        let stats = column_stats(&self.features, &names, normalizer.convention)?;
        let mut features = self.features.clone();
        apply_stats(&mut features, &stats, normalizer.mode);
        Ok(NormalizedGrid {
            mode: normalizer.mode,
            stats,
            cells: self.cells.clone(),
            features,
            crs: self.crs.clone(),
            ..*self
        })
    }
}

/// Center and/or scale every band of a grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    pub mode: NormalizeMode,
    pub convention: StdConvention,
}

impl Normalizer {
    pub fn new(mode: NormalizeMode, convention: StdConvention) -> Self {
        Self { mode, convention }
    }

    /// Compute band statistics from `grid` and standardize it.
    ///
    /// Errors: a band with no valid value, a grid with no jointly-valid cell,
    /// or a band whose standard deviation is zero.
    pub fn fit(&self, grid: &Grid) -> Result<NormalizedGrid> {
        grid.validate()?;
        for (b, band) in grid.bands.iter().enumerate() {
            if grid.band_valid_count(b) == 0 {
                return Err(InvalidInputError::AllNoDataBand(band.name.clone()).into());
            }
        }
        let (cells, mut features) = extract_features(grid, &identity_order(grid.n_bands()));
        if cells.is_empty() {
            return Err(InvalidInputError::NoValidCells.into());
        }
        let stats = column_stats(&features, &grid.band_names(), self.convention)?;
        apply_stats(&mut features, &stats, self.mode);
        debug!(n_valid = cells.len(), n_bands = stats.len(), mode = ?self.mode, "normalized grid");
        Ok(NormalizedGrid {
            width: grid.width,
            height: grid.height,
            extent: grid.extent,
            crs: grid.crs.clone(),
            mode: self.mode,
            stats,
            cells,
            features,
        })
    }

    /// Standardize `grid` with previously fitted statistics.
    ///
    /// Bands are matched by name, so the grid may list them in another order
    /// or carry extra bands; feature columns follow the order of `stats`.
    pub fn apply(&self, grid: &Grid, stats: &[BandStats]) -> Result<NormalizedGrid> {
        grid.validate()?;
        let order = stats
            .iter()
            .map(|s| {
                grid.band_index(&s.name).ok_or_else(|| InvalidInputError::MissingBand {
                    band: s.name.clone(),
                    expected: stats.iter().map(|s| s.name.clone()).collect(),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let (cells, mut features) = extract_features(grid, &order);
        if cells.is_empty() {
            return Err(InvalidInputError::NoValidCells.into());
        }
        apply_stats(&mut features, stats, self.mode);
        Ok(NormalizedGrid {
            width: grid.width,
            height: grid.height,
            extent: grid.extent,
            crs: grid.crs.clone(),
            mode: self.mode,
            stats: stats.to_vec(),
            cells,
            features,
        })
    }
}

fn identity_order(n: usize) -> Vec<usize> {
    (0..n).collect()
}

/// Pull the valid cells of the selected bands into a flat f64 matrix.
/// Validity is judged on the selected bands only.
fn extract_features(grid: &Grid, order: &[usize]) -> (Vec<usize>, Vec<f64>) {
    let d = order.len();
    let mut cells = Vec::new();
    let mut features = Vec::new();
    let mut row = vec![0.0f64; d];
    'cell: for i in 0..grid.len() {
        for (j, &b) in order.iter().enumerate() {
            let v = grid.bands[b].data[i];
            if !v.is_finite() || grid.nodata == Some(v) {
                continue 'cell;
            }
            row[j] = v as f64;
        }
        cells.push(i);
        features.extend_from_slice(&row);
    }
    (cells, features)
}

fn column_stats(features: &[f64], names: &[String], convention: StdConvention) -> Result<Vec<BandStats>> {
    let d = names.len();
    let n = features.len() / d.max(1);
    let mut stats = Vec::with_capacity(d);
    for (b, name) in names.iter().enumerate() {
        let column = || features.iter().skip(b).step_by(d);
        let mean = column().sum::<f64>() / n as f64;
        let ss = column().map(|&x| (x - mean) * (x - mean)).sum::<f64>();
        let denom = match convention {
            StdConvention::Sample => n.saturating_sub(1),
            StdConvention::Population => n,
        };
        let std = if denom == 0 { 0.0 } else { (ss / denom as f64).sqrt() };
        // Relative to the column's own magnitude: tiny but varying bands survive.
        let max_abs = column().fold(0.0f64, |m, &x| m.max(x.abs()));
        if std == 0.0 || std <= CONSTANT_BAND_TOLERANCE * max_abs {
            return Err(InvalidInputError::ConstantBand { band: name.clone(), value: mean }.into());
        }
        stats.push(BandStats { name: name.clone(), mean, std, count: n });
    }
    Ok(stats)
}

fn apply_stats(features: &mut [f64], stats: &[BandStats], mode: NormalizeMode) {
    let transforms: Vec<(f64, f64)> = stats.iter().map(|s| s.transform(mode)).collect();
    for row in features.chunks_exact_mut(stats.len()) {
        for (x, &(offset, scale)) in row.iter_mut().zip(&transforms) {
            *x = (*x - offset) / scale;
        }
    }
}
