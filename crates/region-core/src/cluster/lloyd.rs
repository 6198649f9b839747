//! One k-means start: Forgy initialization followed by Lloyd iterations.

use rand::rngs::StdRng;
use rand::seq::index;

use super::assign::{nearest, squared_euclidean};

/// Final state of a single start.
#[derive(Debug, Clone)]
pub struct StartFit {
    pub start: usize,
    /// Flat `k × d` centers.
    pub centers: Vec<f64>,
    pub within_ss: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Run Lloyd's algorithm on the flat `n × d` matrix `data`.
///
/// Initial centers are `k` distinct rows chosen by `rng`. Iteration stops when
/// no row changes cluster or after `max_iterations` assignment passes; in the
/// latter case the last centers are kept and `converged` is false. Requires
/// `1 <= k <= n`.
pub fn run_start(data: &[f64], d: usize, k: usize, max_iterations: usize, start: usize, rng: &mut StdRng) -> StartFit {
    let n = data.len() / d;
    debug_assert!(k >= 1 && k <= n);

    let mut centers = Vec::with_capacity(k * d);
    for r in index::sample(rng, n, k).into_iter() {
        centers.extend_from_slice(&data[r * d..(r + 1) * d]);
    }

    let mut labels = vec![usize::MAX; n];
    let mut dists = vec![0.0f64; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;

        // ── Assignment ──────────────────────────────────────────────────────
        let mut changed = 0usize;
        for (i, row) in data.chunks_exact(d).enumerate() {
            let (c, dist) = nearest(row, &centers, d);
            if labels[i] != c {
                labels[i] = c;
                changed += 1;
            }
            dists[i] = dist;
        }
        if changed == 0 {
            converged = true;
            break;
        }

        // ── Update ──────────────────────────────────────────────────────────
        let mut sums = vec![0.0f64; k * d];
        let mut counts = vec![0usize; k];
        for (i, row) in data.chunks_exact(d).enumerate() {
            let c = labels[i];
            counts[c] += 1;
            for (s, &x) in sums[c * d..(c + 1) * d].iter_mut().zip(row) {
                *s += x;
            }
        }
        let mut taken = vec![false; n];
        for c in 0..k {
            let center = &mut centers[c * d..(c + 1) * d];
            if counts[c] > 0 {
                let inv = 1.0 / counts[c] as f64;
                for (m, &s) in center.iter_mut().zip(&sums[c * d..(c + 1) * d]) {
                    *m = s * inv;
                }
                continue;
            }
            // Empty cluster: move it onto the worst-fitted row not yet used.
            let far = (0..n)
                .filter(|&i| !taken[i])
                .fold(None, |best: Option<usize>, i| match best {
                    Some(b) if dists[b] >= dists[i] => Some(b),
                    _ => Some(i),
                });
            if let Some(i) = far {
                taken[i] = true;
                center.copy_from_slice(&data[i * d..(i + 1) * d]);
            }
        }
    }

    let within_ss = data.chunks_exact(d).map(|row| nearest(row, &centers, d).1).sum();
    StartFit { start, centers, within_ss, iterations, converged }
}

/// Sum of squared distances of every row to the column means.
pub fn total_ss(data: &[f64], d: usize) -> f64 {
    let n = data.len() / d;
    if n == 0 {
        return 0.0;
    }
    let mut mean = vec![0.0f64; d];
    for row in data.chunks_exact(d) {
        for (m, &x) in mean.iter_mut().zip(row) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= n as f64;
    }
    data.chunks_exact(d).map(|row| squared_euclidean(row, &mean)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::sampling::start_rng;

    fn two_groups() -> Vec<f64> {
        let mut v = Vec::new();
        for i in 0..10 {
            v.extend_from_slice(&[0.0 + i as f64 * 0.01, 0.0]);
        }
        for i in 0..10 {
            v.extend_from_slice(&[5.0 + i as f64 * 0.01, 5.0]);
        }
        v
    }

    #[test]
    fn separates_two_groups_and_converges() {
        let data = two_groups();
        let fit = run_start(&data, 2, 2, 50, 0, &mut start_rng(1, 0));
        assert!(fit.converged);
        let mut xs: Vec<f64> = fit.centers.chunks(2).map(|c| c[0]).collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((xs[0] - 0.045).abs() < 1e-9, "{xs:?}");
        assert!((xs[1] - 5.045).abs() < 1e-9, "{xs:?}");
        assert!(fit.within_ss < 0.02);
    }

    #[test]
    fn single_cluster_within_ss_equals_total_ss() {
        let data = two_groups();
        let fit = run_start(&data, 2, 1, 50, 0, &mut start_rng(3, 0));
        assert!((fit.within_ss - total_ss(&data, 2)).abs() < 1e-9);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let data = two_groups();
        let fit = run_start(&data, 2, 2, 1, 0, &mut start_rng(5, 0));
        assert_eq!(fit.iterations, 1);
        assert!(!fit.converged);
        assert!(fit.within_ss.is_finite());
    }

    #[test]
    fn duplicate_rows_do_not_produce_nan_centers() {
        let data = vec![1.0, 1.0, 1.0, 1.0, 9.0, 9.0];
        let fit = run_start(&data, 2, 3, 20, 0, &mut start_rng(0, 0));
        assert!(fit.centers.iter().all(|c| c.is_finite()));
        assert!(fit.within_ss.abs() < 1e-12);
    }
}
