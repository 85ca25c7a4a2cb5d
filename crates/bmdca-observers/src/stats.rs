//! Sample-statistics engine.

use bmdca_core::{CouplingTensor, Dims, PottsTensors};
use bmdca_models::AbstractEBM;
use bmdca_samplers::{sequence, Samples};
use ndarray::{Array2, Array3, Zip};
use rayon::prelude::*;

use crate::diagnostics::{self, CorrelationStats, EnergyStats};

/// One- and two-point frequencies with their standard errors.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyStats {
    /// `Q × N`, indexed `[a, i]`
    pub frequency_1p: Array2<f64>,
    pub frequency_1p_sigma: Array2<f64>,
    pub frequency_2p: CouplingTensor,
    pub frequency_2p_sigma: CouplingTensor,
}

impl FrequencyStats {
    pub fn zeros(dims: Dims) -> Self {
        Self {
            frequency_1p: Array2::zeros(dims.field_shape()),
            frequency_1p_sigma: Array2::zeros(dims.field_shape()),
            frequency_2p: CouplingTensor::zeros(dims),
            frequency_2p_sigma: CouplingTensor::zeros(dims),
        }
    }
}

/// Statistics of the current MCMC samples.
///
/// [`SampleStats::update_data`] takes a copy of the samples and their
/// energies; the `compute_*` methods then fill the cached statistics read
/// through the accessors. Importance reweighting keeps a running log-weight
/// per sample, reset by every `update_data`.
#[derive(Debug, Clone)]
pub struct SampleStats {
    dims: Dims,
    temperature: f64,
    samples: Samples,
    /// `[draw, chain]`, under the parameters of the last update
    energies: Array2<f64>,
    log_weights: Array2<f64>,
    frequencies: FrequencyStats,
    energy_stats: EnergyStats,
    correlation_stats: CorrelationStats,
    z_ratio: f64,
}

impl SampleStats {
    pub fn new(dims: Dims, temperature: f64) -> Self {
        Self {
            dims,
            temperature,
            samples: Samples::zeros((0, dims.n, 0)),
            energies: Array2::zeros((0, 0)),
            log_weights: Array2::zeros((0, 0)),
            frequencies: FrequencyStats::zeros(dims),
            energy_stats: EnergyStats::default(),
            correlation_stats: CorrelationStats::default(),
            z_ratio: 1.0,
        }
    }

    /// Take new samples drawn from `params`.
    pub fn update_data(&mut self, samples: &Samples, params: &PottsTensors) {
        self.samples.clone_from(samples);
        self.energies = sample_energies(&self.samples, params);
        self.log_weights = Array2::zeros(self.energies.dim());
        self.z_ratio = 1.0;
    }

    pub fn compute_energy_stats(&mut self) {
        self.energy_stats = diagnostics::energy_stats(&self.energies);
    }

    pub fn compute_correlation_stats(&mut self) {
        self.correlation_stats = diagnostics::correlation_stats(&self.samples);
    }

    /// Frequencies with every sample weighted equally.
    pub fn compute_frequency_stats(&mut self) {
        let weights = Array2::ones(self.energies.dim());
        self.frequencies = weighted_frequencies(&self.samples, self.dims, &weights);
    }

    /// Reweight the samples from `previous` to `current` parameters.
    ///
    /// Each sample's weight is multiplied by `exp(-(E_cur - E_prev) / T)`,
    /// so the accumulated weight always targets `current` from the sampling
    /// distribution. The reweighting ratio is the mean incremental weight
    /// under the previous normalised weights, an estimate of `Z_cur / Z_prev`.
    pub fn compute_frequency_stats_importance(
        &mut self,
        current: &PottsTensors,
        previous: &PottsTensors,
    ) {
        let e_cur = sample_energies(&self.samples, current);
        let e_prev = sample_energies(&self.samples, previous);
        let beta = 1.0 / self.temperature;
        let log_increment = (&e_prev - &e_cur) * beta;

        let prev_weights = normalised(&self.log_weights);
        let shift = log_increment.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
        let z = Zip::from(&prev_weights)
            .and(&log_increment)
            .fold(0.0, |acc, &w, &d| acc + w * (d - shift).exp());
        self.z_ratio = z * shift.exp();

        self.log_weights += &log_increment;
        self.energies = e_cur;
        let weights = normalised(&self.log_weights);
        self.frequencies = weighted_frequencies(&self.samples, self.dims, &weights);
    }

    pub const fn dims(&self) -> Dims {
        self.dims
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// `[draw, chain]`
    pub fn energies(&self) -> &Array2<f64> {
        &self.energies
    }

    pub fn frequencies(&self) -> &FrequencyStats {
        &self.frequencies
    }

    pub fn frequency_1p(&self) -> &Array2<f64> {
        &self.frequencies.frequency_1p
    }

    pub fn frequency_1p_sigma(&self) -> &Array2<f64> {
        &self.frequencies.frequency_1p_sigma
    }

    pub fn frequency_2p(&self) -> &CouplingTensor {
        &self.frequencies.frequency_2p
    }

    pub fn frequency_2p_sigma(&self) -> &CouplingTensor {
        &self.frequencies.frequency_2p_sigma
    }

    pub fn energy_stats(&self) -> EnergyStats {
        self.energy_stats
    }

    pub fn correlation_stats(&self) -> &CorrelationStats {
        &self.correlation_stats
    }

    /// Ratio from the last importance step; 1 after fresh sampling.
    pub fn z_ratio(&self) -> f64 {
        self.z_ratio
    }
}

/// Energy of every sample under `params`, `[draw, chain]`.
pub fn sample_energies(samples: &Samples, params: &PottsTensors) -> Array2<f64> {
    let (draws, _, chains) = samples.dim();
    let flat: Vec<f64> = (0..draws * chains)
        .into_par_iter()
        .map(|k| params.energy(&sequence(samples, k / chains, k % chains)))
        .collect();
    Array2::from_shape_vec((draws, chains), flat)
        .unwrap_or_else(|_| Array2::zeros((draws, chains)))
}

/// `exp(log_w)` scaled to sum to one.
fn normalised(log_weights: &Array2<f64>) -> Array2<f64> {
    let shift = log_weights.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
    let mut w = log_weights.mapv(|x| (x - shift).exp());
    let total = w.sum();
    if total > 0.0 {
        w /= total;
    }
    w
}

/// Weighted frequencies over all samples, with standard errors from the
/// spread of per-chain frequencies (each chain normalised by its own weight).
fn weighted_frequencies(samples: &Samples, dims: Dims, weights: &Array2<f64>) -> FrequencyStats {
    let (draws, _, chains) = samples.dim();
    let mut total_1p = Array2::<f64>::zeros(dims.field_shape());
    let mut total_2p = Array3::<f64>::zeros(dims.coupling_shape());
    let mut sum_1p = total_1p.clone();
    let mut sq_1p = total_1p.clone();
    let mut sum_2p = total_2p.clone();
    let mut sq_2p = total_2p.clone();
    let mut chain_1p = total_1p.clone();
    let mut chain_2p = total_2p.clone();
    let mut weight_total = 0.0;

    for c in 0..chains {
        chain_1p.fill(0.0);
        chain_2p.fill(0.0);
        let mut chain_weight = 0.0;
        for m in 0..draws {
            let w = weights[[m, c]];
            chain_weight += w;
            for i in 0..dims.n {
                chain_1p[[samples[[m, i, c]], i]] += w;
            }
            for (k, i, j) in dims.pairs() {
                chain_2p[[k, samples[[m, i, c]], samples[[m, j, c]]]] += w;
            }
        }
        total_1p += &chain_1p;
        total_2p += &chain_2p;
        weight_total += chain_weight;

        if chain_weight > 0.0 {
            chain_1p /= chain_weight;
            chain_2p /= chain_weight;
        }
        sum_1p += &chain_1p;
        sq_1p += &chain_1p.mapv(|x| x * x);
        sum_2p += &chain_2p;
        sq_2p += &chain_2p.mapv(|x| x * x);
    }

    if weight_total > 0.0 {
        total_1p /= weight_total;
        total_2p /= weight_total;
    }
    FrequencyStats {
        frequency_1p: total_1p,
        frequency_1p_sigma: chain_sigma(sum_1p, sq_1p, chains),
        frequency_2p: coupling(dims, total_2p),
        frequency_2p_sigma: coupling(dims, chain_sigma(sum_2p, sq_2p, chains)),
    }
}

/// Standard error of the mean from per-chain sums and sums of squares.
fn chain_sigma<D: ndarray::Dimension>(
    sum: ndarray::Array<f64, D>,
    sq: ndarray::Array<f64, D>,
    chains: usize,
) -> ndarray::Array<f64, D> {
    if chains < 2 {
        return sum.mapv(|_| 0.0);
    }
    let c = chains as f64;
    let mut out = sq;
    Zip::from(&mut out).and(&sum).for_each(|sq, &s| {
        let mean = s / c;
        *sq = ((*sq / c - mean * mean).max(0.0) / c).sqrt();
    });
    out
}

fn coupling(dims: Dims, data: Array3<f64>) -> CouplingTensor {
    CouplingTensor::from_array(dims, data).unwrap_or_else(|_| CouplingTensor::zeros(dims))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_chain_samples() -> Samples {
        // chain 0: (0,1), (0,1); chain 1: (1,1), (0,0)
        let mut samples = Samples::zeros((2, 2, 2));
        samples[[0, 1, 0]] = 1;
        samples[[1, 1, 0]] = 1;
        samples[[0, 0, 1]] = 1;
        samples[[0, 1, 1]] = 1;
        samples
    }

    #[test]
    fn test_fresh_frequencies_and_sigmas() {
        let dims = Dims::new(2, 2);
        let mut stats = SampleStats::new(dims, 1.0);
        stats.update_data(&two_chain_samples(), &PottsTensors::zeros(dims));
        stats.compute_frequency_stats();

        // position 0 is category 1 in one of four samples
        assert_eq!(stats.frequency_1p()[[1, 0]], 0.25);
        // per chain: 0.0 and 0.5 -> std 0.25, sigma 0.25 / sqrt(2)
        let expected = 0.25 / 2f64.sqrt();
        assert!((stats.frequency_1p_sigma()[[1, 0]] - expected).abs() < 1e-12);
        assert_eq!(stats.frequency_2p().get(0, 1, 0, 1), 0.5);
        assert_eq!(stats.frequency_2p().get(0, 1, 1, 1), 0.25);
        assert_eq!(stats.z_ratio(), 1.0);
    }

    #[test]
    fn test_importance_with_unchanged_parameters_is_neutral() {
        let dims = Dims::new(2, 2);
        let mut params = PottsTensors::zeros(dims);
        params.h[[1, 0]] = 0.7;
        let mut stats = SampleStats::new(dims, 1.0);
        stats.update_data(&two_chain_samples(), &params);
        stats.compute_frequency_stats();
        let fresh = stats.frequencies().clone();

        stats.compute_frequency_stats_importance(&params, &params);
        assert!((stats.z_ratio() - 1.0).abs() < 1e-12);
        let reweighted = stats.frequencies();
        Zip::from(&fresh.frequency_1p)
            .and(&reweighted.frequency_1p)
            .for_each(|a, b| assert!((a - b).abs() < 1e-12));
    }

    #[test]
    fn test_importance_shifts_towards_favoured_category() {
        let dims = Dims::new(2, 2);
        let previous = PottsTensors::zeros(dims);
        let mut current = previous.clone();
        current.h[[1, 0]] = 2f64.ln(); // doubles the weight of s_0 = 1

        let mut stats = SampleStats::new(dims, 1.0);
        stats.update_data(&two_chain_samples(), &previous);
        stats.compute_frequency_stats_importance(&current, &previous);

        // weights 1, 1, 2, 1 over the four samples
        assert!((stats.frequency_1p()[[1, 0]] - 0.4).abs() < 1e-12);
        assert!((stats.z_ratio() - 1.25).abs() < 1e-12);
    }
}
