//! Canonical Label Remapper.
//!
//! Raw cluster indices depend on which start won. Sorting clusters by the
//! center value of one reference band, highest first, gives labels 1..=k that
//! mean the same thing across reruns.

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterModel;
use crate::error::{ConfigurationError, Error, InvalidInputError, Result};

/// Bijection between raw cluster index (0..k) and canonical label (1..=k).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelLut {
    /// `to_label[index]` is the canonical label of raw cluster `index`.
    to_label: Vec<u32>,
    /// `to_index[label - 1]` is the raw cluster carrying `label`.
    to_index: Vec<usize>,
    pub reference_band: usize,
}

impl LabelLut {
    /// Order `model`'s clusters by descending center value on `reference_band`.
    /// Equal values keep ascending raw index order.
    pub fn from_model(model: &ClusterModel, reference_band: usize) -> Result<Self> {
        Self::from_centers(&model.centers, reference_band)
    }

    pub fn from_centers(centers: &[Vec<f64>], reference_band: usize) -> Result<Self> {
        let n_bands = centers.first().map_or(0, Vec::len);
        if reference_band >= n_bands {
            return Err(ConfigurationError::ReferenceBandIndex { index: reference_band, n_bands }.into());
        }
        let mut to_index: Vec<usize> = (0..centers.len()).collect();
        // Stable sort: ties stay in raw index order.
        to_index.sort_by(|&a, &b| centers[b][reference_band].total_cmp(&centers[a][reference_band]));

        let mut to_label = vec![0u32; centers.len()];
        for (pos, &index) in to_index.iter().enumerate() {
            to_label[index] = pos as u32 + 1;
        }
        Ok(Self { to_label, to_index, reference_band })
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.to_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_label.is_empty()
    }

    /// Canonical label for a raw cluster index.
    pub fn label(&self, index: usize) -> Option<u32> {
        self.to_label.get(index).copied()
    }

    /// Raw cluster index carrying a canonical label.
    pub fn index(&self, label: u32) -> Option<usize> {
        (label as usize).checked_sub(1).and_then(|i| self.to_index.get(i).copied())
    }

    /// Raw indices listed in canonical label order.
    pub fn inverse(&self) -> &[usize] {
        &self.to_index
    }

    /// Relabel a per-cell assignment; `None` cells stay `None`.
    pub fn remap(&self, assignment: &[Option<usize>]) -> Result<Vec<Option<u32>>> {
        assignment
            .iter()
            .enumerate()
            .map(|(cell, a)| match *a {
                None => Ok(None),
                Some(index) => self.label(index).map(Some).ok_or_else(|| {
                    Error::from(InvalidInputError::UnknownCluster { cell, index, k: self.len() })
                }),
            })
            .collect()
    }

    /// Reorder per-cluster values (centers, sizes) into canonical label order.
    pub fn reorder<T: Clone>(&self, per_cluster: &[T]) -> Vec<T> {
        self.to_index.iter().map(|&i| per_cluster[i].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_reference_value_gets_label_one() {
        let centers = vec![vec![0.5, 9.0], vec![2.0, 1.0], vec![-1.0, 5.0]];
        let lut = LabelLut::from_centers(&centers, 0).unwrap();
        assert_eq!(lut.label(1), Some(1));
        assert_eq!(lut.label(0), Some(2));
        assert_eq!(lut.label(2), Some(3));
        let by_b1 = LabelLut::from_centers(&centers, 1).unwrap();
        assert_eq!(by_b1.inverse(), &[0, 2, 1]);
    }

    #[test]
    fn ties_fall_back_to_raw_index() {
        let centers = vec![vec![1.0], vec![3.0], vec![1.0], vec![3.0]];
        let lut = LabelLut::from_centers(&centers, 0).unwrap();
        assert_eq!(lut.inverse(), &[1, 3, 0, 2]);
    }

    #[test]
    fn label_and_index_are_inverse() {
        let centers: Vec<Vec<f64>> = [4.0, -2.0, 7.5, 0.0, 3.3].iter().map(|&v| vec![v]).collect();
        let lut = LabelLut::from_centers(&centers, 0).unwrap();
        let mut labels: Vec<u32> = (0..5).map(|i| lut.label(i).unwrap()).collect();
        for i in 0..5 {
            assert_eq!(lut.index(lut.label(i).unwrap()), Some(i));
        }
        labels.sort_unstable();
        assert_eq!(labels, vec![1, 2, 3, 4, 5]);
        assert_eq!(lut.index(0), None);
        assert_eq!(lut.index(6), None);
    }

    #[test]
    fn remap_preserves_no_data() {
        let lut = LabelLut::from_centers(&[vec![0.0], vec![1.0]], 0).unwrap();
        let out = lut.remap(&[Some(0), None, Some(1)]).unwrap();
        assert_eq!(out, vec![Some(2), None, Some(1)]);
    }

    #[test]
    fn remap_rejects_out_of_range_index() {
        let lut = LabelLut::from_centers(&[vec![0.0], vec![1.0]], 0).unwrap();
        assert!(matches!(
            lut.remap(&[Some(2)]),
            Err(Error::InvalidInput(InvalidInputError::UnknownCluster { cell: 0, index: 2, k: 2 }))
        ));
    }

    #[test]
    fn reference_band_out_of_range_is_a_configuration_error() {
        assert!(matches!(
            LabelLut::from_centers(&[vec![0.0, 1.0]], 2),
            Err(Error::Configuration(ConfigurationError::ReferenceBandIndex { index: 2, n_bands: 2 }))
        ));
    }
}
