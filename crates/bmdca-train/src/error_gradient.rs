//! Error and gradient of the regularized likelihood.
//!
//! For fields
//!
//! ```text
//! δ(a,i) = f_mc(a,i) - f(a,i) + λ_h h(a,i)
//! ```
//!
//! and for couplings, with the first-order terms removed,
//!
//! ```text
//! δ(a,b,i,j) = f_mc(a,b,i,j) - f(a,b,i,j)
//!            - (f_mc(a,i) - f(a,i)) f(b,j) - (f_mc(b,j) - f(b,j)) f(a,i)
//!            + λ_J J_ij(a,b)
//! ```
//!
//! The gradient entry becomes `-δ` only where the z-score of the raw
//! frequency deviation exceeds `error_min_update`; other entries keep their
//! previous value.

use bmdca_core::{BmConfig, PottsTensors};
use bmdca_models::TargetStats;
use bmdca_observers::FrequencyStats;

/// Added under every square root of a variance estimate.
pub const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientSettings {
    pub lambda_h: f64,
    pub lambda_j: f64,
    /// Scale coupling regularization by `1 / ((1 + |g_i(a)|)(1 + |g_j(b)|))`
    /// with `g` the target relative-entropy gradient.
    pub use_pos_reg: bool,
    pub error_min_update: f64,
    pub error_max: f64,
}

impl GradientSettings {
    pub fn from_config(config: &BmConfig) -> Self {
        Self {
            lambda_h: config.lambda_reg1,
            lambda_j: config.lambda_reg2,
            use_pos_reg: config.use_pos_reg,
            error_min_update: config.error_min_update,
            error_max: config.error_max,
        }
    }
}

/// Outcome of one error evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorReport {
    /// RMS of the field deviations
    pub error_1p: f64,
    /// RMS of the coupling deviations
    pub error_2p: f64,
    pub error_tot: f64,
    /// RMS z-scores
    pub error_stat_1p: f64,
    pub error_stat_2p: f64,
    pub error_stat_tot: f64,
    /// RMS difference of connected correlations
    pub error_c: f64,
    pub max_delta_1p: f64,
    pub max_delta_2p: f64,
    /// Pearson correlation of sampled vs target connected correlations
    pub rho: f64,
    /// Slope of sampled on target connected correlations through the origin
    pub beta: f64,
    /// Pearson correlation of 1p frequencies, centred at `1/Q`
    pub rho_1p: f64,
    pub updated_1p: usize,
    pub updated_2p: usize,
    pub converged: bool,
}

/// Running sums over one tensor's deviations.
#[derive(Debug, Default)]
struct DeviationSums {
    sq: f64,
    sq_stat: f64,
    max_abs: f64,
    updated: usize,
}

impl DeviationSums {
    /// Accumulate one coordinate; true when its gradient should be updated.
    fn add(&mut self, delta: f64, delta_stat: f64, threshold: f64) -> bool {
        self.sq += delta * delta;
        self.sq_stat += delta_stat * delta_stat;
        self.max_abs = self.max_abs.max(delta.abs());
        let significant = delta_stat.abs() > threshold;
        if significant {
            self.updated += 1;
        }
        significant
    }
}

/// Second-moment sums for the connected-correlation diagnostics.
#[derive(Debug, Default)]
struct CorrelationSums {
    num_rho: f64,
    num_beta: f64,
    den_mc: f64,
    den_stat: f64,
    den_beta: f64,
}

/// Compute the error report and write significant entries of `gradient`.
pub fn estimate_error_gradient(
    target: &TargetStats,
    sampled: &FrequencyStats,
    params: &PottsTensors,
    gradient: &mut PottsTensors,
    settings: &GradientSettings,
) -> ErrorReport {
    let dims = target.dims();
    let m_eff = target.effective_m();
    let f1 = target.frequency_1p();
    let f2 = target.frequency_2p().as_array();
    let reg = target.rel_entropy_grad_1p();
    let f1_mc = &sampled.frequency_1p;
    let f1_sigma = &sampled.frequency_1p_sigma;
    let f2_mc = sampled.frequency_2p.as_array();
    let f2_sigma = sampled.frequency_2p_sigma.as_array();

    // Fields
    let mut sums_1p = DeviationSums::default();
    for ((a, i), g) in gradient.h.indexed_iter_mut() {
        let diff = f1_mc[[a, i]] - f1[[a, i]];
        let delta = diff + settings.lambda_h * params.h[[a, i]];
        let var = f1[[a, i]] * (1.0 - f1[[a, i]]) / m_eff + f1_sigma[[a, i]].powi(2);
        let delta_stat = diff / (var + EPSILON).sqrt();
        if sums_1p.add(delta, delta_stat, settings.error_min_update) {
            *g = -delta;
        }
    }

    // Couplings
    let connected = |k: usize, i: usize, j: usize, a: usize, b: usize| {
        (
            f2_mc[[k, a, b]] - f1_mc[[a, i]] * f1_mc[[b, j]],
            f2[[k, a, b]] - f1[[a, i]] * f1[[b, j]],
        )
    };
    let mut sums_2p = DeviationSums::default();
    let (mut c_mc_sum, mut c_stat_sum, mut c_err_sq) = (0.0, 0.0, 0.0);
    let params_j = params.j.as_array();
    let gradient_j = gradient.j.as_array_mut();
    for (k, i, j) in dims.pairs() {
        for a in 0..dims.q {
            for b in 0..dims.q {
                let lambda = if settings.use_pos_reg {
                    settings.lambda_j / ((1.0 + reg[[a, i]].abs()) * (1.0 + reg[[b, j]].abs()))
                } else {
                    settings.lambda_j
                };
                let diff = f2_mc[[k, a, b]] - f2[[k, a, b]];
                let delta = diff
                    - (f1_mc[[a, i]] - f1[[a, i]]) * f1[[b, j]]
                    - (f1_mc[[b, j]] - f1[[b, j]]) * f1[[a, i]]
                    + lambda * params_j[[k, a, b]];
                let var = f2[[k, a, b]] * (1.0 - f2[[k, a, b]]) / m_eff
                    + f2_sigma[[k, a, b]].powi(2);
                let delta_stat = diff / (var + EPSILON).sqrt();
                if sums_2p.add(delta, delta_stat, settings.error_min_update) {
                    gradient_j[[k, a, b]] = -delta;
                }

                let (c_mc, c_stat) = connected(k, i, j, a, b);
                c_mc_sum += c_mc;
                c_stat_sum += c_stat;
                c_err_sq += (c_mc - c_stat).powi(2);
            }
        }
    }

    let n_1p = dims.n_fields() as f64;
    let n_2p = dims.n_couplings() as f64;
    let c_mc_mean = ratio(c_mc_sum, n_2p);
    let c_stat_mean = ratio(c_stat_sum, n_2p);

    // Centred second moments of the connected correlations
    let mut corr = CorrelationSums::default();
    for (k, i, j) in dims.pairs() {
        for a in 0..dims.q {
            for b in 0..dims.q {
                let (c_mc, c_stat) = connected(k, i, j, a, b);
                corr.num_rho += (c_mc - c_mc_mean) * (c_stat - c_stat_mean);
                corr.num_beta += c_mc * c_stat;
                corr.den_mc += (c_mc - c_mc_mean).powi(2);
                corr.den_stat += (c_stat - c_stat_mean).powi(2);
                corr.den_beta += c_stat * c_stat;
            }
        }
    }

    let uniform = 1.0 / dims.q as f64;
    let mut corr_1p = CorrelationSums::default();
    for ((a, i), &f) in f1.indexed_iter() {
        let x_mc = f1_mc[[a, i]] - uniform;
        let x_stat = f - uniform;
        corr_1p.num_rho += x_mc * x_stat;
        corr_1p.den_mc += x_mc * x_mc;
        corr_1p.den_stat += x_stat * x_stat;
    }

    let error_1p = ratio(sums_1p.sq, n_1p).sqrt();
    let error_2p = ratio(sums_2p.sq, n_2p).sqrt();
    let error_stat_1p = ratio(sums_1p.sq_stat, n_1p).sqrt();
    let error_stat_2p = ratio(sums_2p.sq_stat, n_2p).sqrt();
    let error_tot = error_1p + error_2p;

    let report = ErrorReport {
        error_1p,
        error_2p,
        error_tot,
        error_stat_1p,
        error_stat_2p,
        error_stat_tot: error_stat_1p + error_stat_2p,
        error_c: ratio(c_err_sq, n_2p).sqrt(),
        max_delta_1p: sums_1p.max_abs,
        max_delta_2p: sums_2p.max_abs,
        rho: ratio(corr.num_rho, (corr.den_mc * corr.den_stat).sqrt()),
        beta: ratio(corr.num_beta, corr.den_beta),
        rho_1p: ratio(corr_1p.num_rho, (corr_1p.den_mc * corr_1p.den_stat).sqrt()),
        updated_1p: sums_1p.updated,
        updated_2p: sums_2p.updated,
        converged: error_tot < settings.error_max,
    };
    tracing::debug!(
        error_h = report.error_1p,
        error_j = report.error_2p,
        error_stat = report.error_stat_tot,
        rho = report.rho,
        beta = report.beta,
        rho_1p = report.rho_1p,
        updated_h = report.updated_1p,
        updated_j = report.updated_2p,
        "error evaluated"
    );
    report
}

/// `num / den`, or zero for an empty or degenerate denominator.
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}
