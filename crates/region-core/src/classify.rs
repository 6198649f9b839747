//! Grid Classifier: categorical output raster in canonical-label space.

use serde::{Deserialize, Serialize};

use crate::cluster::assign::assign_rows;
use crate::cluster::ClusterModel;
use crate::error::{InvalidInputError, Result};
use crate::grid::{Extent, Grid};
use crate::labels::LabelLut;
use crate::normalize::{NormalizedGrid, Normalizer};

/// Single-band categorical grid. `None` marks no-data; labels are 1..=k.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionGrid {
    pub width: usize,
    pub height: usize,
    pub extent: Extent,
    pub crs: Option<String>,
    pub k: usize,
    pub labels: Vec<Option<u32>>,
}

impl RegionGrid {
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        self.labels[row * self.width + col]
    }

    pub fn n_valid(&self) -> usize {
        self.labels.iter().filter(|l| l.is_some()).count()
    }

    /// Cell count per label; entry 0 is label 1.
    pub fn label_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.k];
        for &l in self.labels.iter().flatten() {
            counts[l as usize - 1] += 1;
        }
        counts
    }
}

/// Relabel a model's full-grid assignment into a [`RegionGrid`].
///
/// The output has the grid's size and exactly its no-data footprint.
pub fn classify(grid: &NormalizedGrid, model: &ClusterModel, lut: &LabelLut) -> Result<RegionGrid> {
    if model.assignment.len() != grid.len() {
        return Err(InvalidInputError::AssignmentShape { expected: grid.len(), found: model.assignment.len() }.into());
    }
    Ok(RegionGrid {
        width: grid.width,
        height: grid.height,
        extent: grid.extent,
        crs: grid.crs.clone(),
        k: lut.len(),
        labels: lut.remap(&model.assignment)?,
    })
}

/// Classify another grid carrying the same bands with an existing model.
///
/// The grid is standardized with `stats` from the fitted grid, each valid cell
/// goes to its nearest model center, and labels follow `lut`.
pub fn classify_with_stats(
    grid: &Grid,
    normalizer: &Normalizer,
    fitted: &NormalizedGrid,
    model: &ClusterModel,
    lut: &LabelLut,
) -> Result<RegionGrid> {
    let ng = normalizer.apply(grid, &fitted.stats)?;
    let d = ng.n_bands();
    if let Some(c) = model.centers.iter().find(|c| c.len() != d) {
        return Err(InvalidInputError::DimensionMismatch { expected: d, found: c.len() }.into());
    }
    let flat: Vec<f64> = model.centers.concat();
    let rows = assign_rows(ng.features(), d, &flat);

    let mut labels = vec![None; ng.len()];
    for (&cell, &c) in ng.cells().iter().zip(&rows) {
        labels[cell] = lut.label(c);
    }
    Ok(RegionGrid {
        width: ng.width,
        height: ng.height,
        extent: ng.extent,
        crs: ng.crs.clone(),
        k: lut.len(),
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::KMeans;
    use crate::error::Error;
    use crate::grid::Band;

    fn stripes() -> Grid {
        // Left column low, right column high, middle row of the right column missing.
        let a = vec![1.0, 9.0, 1.1, f32::NAN, 0.9, 9.2];
        let b = vec![2.0, 7.0, 2.1, 7.1, 1.9, 6.9];
        Grid::new(2, 3, vec![Band::new("a", a), Band::new("b", b)]).unwrap()
    }

    fn fitted() -> (NormalizedGrid, ClusterModel, LabelLut) {
        let ng = Normalizer::default().fit(&stripes()).unwrap();
        let model = KMeans::new(2).with_restarts(4).fit(&ng).unwrap();
        let lut = LabelLut::from_model(&model, 0).unwrap();
        (ng, model, lut)
    }

    #[test]
    fn output_keeps_shape_and_no_data_footprint() {
        let (ng, model, lut) = fitted();
        let rg = classify(&ng, &model, &lut).unwrap();
        assert_eq!((rg.width, rg.height), (2, 3));
        assert_eq!(rg.labels[3], None);
        assert_eq!(rg.n_valid(), 5);
        // High band-0 column gets label 1.
        assert_eq!(rg.get(0, 1), Some(1));
        assert_eq!(rg.get(2, 1), Some(1));
        assert_eq!(rg.get(0, 0), Some(2));
        assert_eq!(rg.label_counts(), vec![2, 3]);
    }

    #[test]
    fn mismatched_assignment_length_is_rejected() {
        let (ng, mut model, lut) = fitted();
        model.assignment.pop();
        assert!(matches!(
            classify(&ng, &model, &lut),
            Err(Error::InvalidInput(InvalidInputError::AssignmentShape { expected: 6, found: 5 }))
        ));
    }

    #[test]
    fn reclassifying_the_fitting_grid_reproduces_the_model() {
        let (ng, model, lut) = fitted();
        let direct = classify(&ng, &model, &lut).unwrap();
        let again = classify_with_stats(&stripes(), &Normalizer::default(), &ng, &model, &lut).unwrap();
        assert_eq!(direct, again);
    }

    #[test]
    fn new_grid_uses_fitted_statistics() {
        let (ng, model, lut) = fitted();
        let g = Grid::new(3, 1, vec![Band::new("a", vec![8.8, 1.2, f32::NAN]), Band::new("b", vec![7.0, 2.0, 1.0])])
            .unwrap();
        let rg = classify_with_stats(&g, &Normalizer::default(), &ng, &model, &lut).unwrap();
        assert_eq!(rg.labels, vec![Some(1), Some(2), None]);
    }
}
