//! Nearest-center assignment over flat `n × d` feature matrices.

#[cfg(feature = "threading")]
use rayon::prelude::*;

#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Index of the closest center and its squared distance.
/// Ties go to the lowest center index.
#[inline]
pub fn nearest(point: &[f64], centers: &[f64], d: usize) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, center) in centers.chunks_exact(d).enumerate() {
        let dist = squared_euclidean(point, center);
        if dist < best.1 {
            best = (c, dist);
        }
    }
    best
}

/// Nearest center for every row of `features`.
pub fn assign_rows(features: &[f64], d: usize, centers: &[f64]) -> Vec<usize> {
    #[cfg(feature = "threading")]
    {
        features.par_chunks(d).map(|p| nearest(p, centers, d).0).collect()
    }
    #[cfg(not(feature = "threading"))]
    {
        features.chunks(d).map(|p| nearest(p, centers, d).0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_prefers_lowest_index_on_tie() {
        let centers = [0.0, 0.0, 2.0, 0.0];
        assert_eq!(nearest(&[1.0, 0.0], &centers, 2), (0, 1.0));
        assert_eq!(nearest(&[1.5, 0.0], &centers, 2).0, 1);
    }

    #[test]
    fn assign_rows_maps_each_row() {
        let centers = [0.0, 10.0];
        let rows = [0.5, 9.0, 4.9, 5.1];
        assert_eq!(assign_rows(&rows, 1, &centers), vec![0, 1, 0, 1]);
    }
}
