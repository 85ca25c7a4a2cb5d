//! Energy and overlap diagnostics used by the ergodicity check.
//!
//! Overlap of two sequences is the fraction of positions where they agree.
//! Three overlaps are tracked:
//!
//! - auto: consecutive draws of the same chain
//! - check: draws half a chain apart
//! - cross: the same draw index in two different chains
//!
//! Well-mixed chains have `auto ≈ check ≈ cross`.

use ndarray::{s, Array2, ArrayView1};

use bmdca_samplers::Samples;

/// Energy of the first and last draw of each chain, summarised across chains.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyStats {
    pub start_mean: f64,
    pub start_sigma: f64,
    pub end_mean: f64,
    pub end_sigma: f64,
    /// `sqrt((start_sigma² + end_sigma²) / chains)`
    pub err: f64,
}

/// Mean overlap of draws `distance` apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapPoint {
    pub distance: usize,
    pub mean: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationStats {
    pub auto_corr: f64,
    pub auto_corr_sigma: f64,
    pub check_corr: f64,
    pub check_corr_sigma: f64,
    pub cross_corr: f64,
    pub cross_corr_sigma: f64,
    /// Standard errors of auto and cross combined in quadrature.
    pub auto_cross_err: f64,
    /// Standard errors of cross and check combined in quadrature.
    pub cross_check_err: f64,
    /// Overlap decay at distances 1, 2, 4, ... below the chain length.
    pub overlap_curve: Vec<OverlapPoint>,
}

/// Summarise `energies` (`[draw, chain]`).
pub fn energy_stats(energies: &Array2<f64>) -> EnergyStats {
    let (draws, chains) = energies.dim();
    if draws == 0 || chains == 0 {
        return EnergyStats::default();
    }
    let (start_mean, start_sigma) = mean_std(energies.row(0).iter().copied());
    let (end_mean, end_sigma) = mean_std(energies.row(draws - 1).iter().copied());
    EnergyStats {
        start_mean,
        start_sigma,
        end_mean,
        end_sigma,
        err: ((start_sigma.powi(2) + end_sigma.powi(2)) / chains as f64).sqrt(),
    }
}

/// Overlap diagnostics for `samples` (`[draw, position, chain]`).
///
/// Needs at least two draws per chain; with fewer every field is zero.
pub fn correlation_stats(samples: &Samples) -> CorrelationStats {
    let (draws, _, chains) = samples.dim();
    if draws < 2 || chains == 0 {
        return CorrelationStats::default();
    }

    let (auto_corr, auto_corr_sigma) = lagged_overlap(samples, 1);
    let (check_corr, check_corr_sigma) = lagged_overlap(samples, draws / 2);

    let (cross_corr, cross_corr_sigma) = if chains > 1 {
        let per_draw = (0..draws).map(|m| {
            let mut total = 0.0;
            let mut count = 0usize;
            for c1 in 0..chains {
                for c2 in (c1 + 1)..chains {
                    total += overlap(
                        samples.slice(s![m, .., c1]),
                        samples.slice(s![m, .., c2]),
                    );
                    count += 1;
                }
            }
            total / count as f64
        });
        let (mean, std) = mean_std(per_draw);
        (mean, std / (draws as f64).sqrt())
    } else {
        (0.0, 0.0)
    };

    let overlap_curve = std::iter::successors(Some(1usize), |d| Some(d * 2))
        .take_while(|&d| d < draws)
        .map(|distance| {
            let (mean, sigma) = lagged_overlap(samples, distance);
            OverlapPoint {
                distance,
                mean,
                sigma,
            }
        })
        .collect();

    CorrelationStats {
        auto_corr,
        auto_corr_sigma,
        check_corr,
        check_corr_sigma,
        cross_corr,
        cross_corr_sigma,
        auto_cross_err: auto_corr_sigma.hypot(cross_corr_sigma),
        cross_check_err: cross_corr_sigma.hypot(check_corr_sigma),
        overlap_curve,
    }
}

/// Fraction of positions where two sequences agree.
pub fn overlap(a: ArrayView1<'_, usize>, b: ArrayView1<'_, usize>) -> f64 {
    let n = a.len();
    if n == 0 {
        return 0.0;
    }
    let same = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    same as f64 / n as f64
}

/// Per-chain mean overlap of draws `lag` apart; returns the mean across
/// chains and its standard error.
fn lagged_overlap(samples: &Samples, lag: usize) -> (f64, f64) {
    let (draws, _, chains) = samples.dim();
    let per_chain = (0..chains).map(|c| {
        let pairs = draws - lag;
        let total: f64 = (0..pairs)
            .map(|m| {
                overlap(
                    samples.slice(s![m, .., c]),
                    samples.slice(s![m + lag, .., c]),
                )
            })
            .sum();
        total / pairs as f64
    });
    let (mean, std) = mean_std(per_chain);
    (mean, std / (chains as f64).sqrt())
}

/// Mean and population standard deviation.
pub(crate) fn mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut n, mut sum, mut sum_sq) = (0usize, 0.0, 0.0);
    for v in values {
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    (mean, var.sqrt())
}
