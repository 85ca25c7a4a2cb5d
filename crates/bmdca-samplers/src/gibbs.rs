//! Gibbs sampling of Potts models.
//!
//! Each sweep visits positions in order and redraws position `i` from its
//! conditional distribution
//!
//! ```text
//! P(s_i = a | s_rest) ∝ exp((h(a,i) + Σ_{j≠i} J_ij(a, s_j)) / T)
//! ```
//!
//! using the Gumbel-max trick: `argmax_a(θ_a + Gumbel(0,1))`. Logits are
//! accumulated in f64.

use bmdca_core::{Dims, PottsTensors};
use ndarray::{s, Array2};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::rng::RngKey;
use crate::sampler::{ensure_shape, McmcSampler, Samples};
use crate::schedule::SamplingSchedule;

/// Sequential-sweep Gibbs sampler with one ChaCha8 stream per chain.
#[derive(Debug, Clone)]
pub struct PottsGibbsSampler {
    params: PottsTensors,
}

impl PottsGibbsSampler {
    /// Starts from the uniform model (all parameters zero).
    pub fn new(dims: Dims) -> Self {
        Self {
            params: PottsTensors::zeros(dims),
        }
    }

    pub fn params(&self) -> &PottsTensors {
        &self.params
    }

    fn run(
        &self,
        samples: &mut Samples,
        n_chains: usize,
        schedule: SamplingSchedule,
        initial: Option<&[usize]>,
        seed: u64,
        temperature: f64,
    ) {
        let dims = self.params.dims();
        ensure_shape(samples, schedule.n_samples, dims.n, n_chains);

        let beta = 1.0 / temperature;
        let keys = RngKey::new(seed).split(n_chains);
        let chains: Vec<Array2<usize>> = keys
            .par_iter()
            .map(|&key| run_chain(&self.params, schedule, key, initial, beta))
            .collect();

        for (c, chain) in chains.iter().enumerate() {
            samples.slice_mut(s![.., .., c]).assign(chain);
        }
        tracing::debug!(
            chains = n_chains,
            draws = schedule.n_samples,
            burn_in = schedule.burn_in,
            thinning = schedule.thinning,
            sweeps = schedule.total_sweeps(),
            "Gibbs sampling done"
        );
    }
}

impl McmcSampler for PottsGibbsSampler {
    fn load(&mut self, params: &PottsTensors) {
        self.params.clone_from(params);
    }

    fn sample(
        &mut self,
        samples: &mut Samples,
        n_chains: usize,
        schedule: SamplingSchedule,
        seed: u64,
        temperature: f64,
    ) {
        self.run(samples, n_chains, schedule, None, seed, temperature);
    }

    fn sample_from_initial(
        &mut self,
        samples: &mut Samples,
        n_chains: usize,
        schedule: SamplingSchedule,
        initial: &[usize],
        seed: u64,
        temperature: f64,
    ) {
        self.run(samples, n_chains, schedule, Some(initial), seed, temperature);
    }
}

/// One chain: burn-in, then `n_samples` draws `thinning` sweeps apart.
/// Returns `[draw, position]`.
fn run_chain(
    params: &PottsTensors,
    schedule: SamplingSchedule,
    key: RngKey,
    initial: Option<&[usize]>,
    beta: f64,
) -> Array2<usize> {
    let dims = params.dims();
    let mut rng = key.rng();
    let mut state: Vec<usize> = match initial {
        Some(init) => init.to_vec(),
        None => (0..dims.n).map(|_| rng.gen_range(0..dims.q)).collect(),
    };
    let mut logits = vec![0.0f64; dims.q];
    let mut out = Array2::zeros((schedule.n_samples, dims.n));

    for _ in 0..schedule.burn_in {
        sweep(params, &mut state, &mut logits, beta, &mut rng);
    }
    for t in 0..schedule.n_samples {
        if t > 0 {
            for _ in 0..schedule.thinning {
                sweep(params, &mut state, &mut logits, beta, &mut rng);
            }
        }
        for (dst, &src) in out.row_mut(t).iter_mut().zip(&state) {
            *dst = src;
        }
    }
    out
}

fn sweep(
    params: &PottsTensors,
    state: &mut [usize],
    logits: &mut [f64],
    beta: f64,
    rng: &mut ChaCha8Rng,
) {
    let dims = params.dims();
    for i in 0..dims.n {
        for (a, logit) in logits.iter_mut().enumerate() {
            let mut field = params.h[[a, i]];
            for (j, &b) in state.iter().enumerate() {
                if j != i {
                    field += params.j.get_symmetric(i, j, a, b);
                }
            }
            *logit = beta * field;
        }
        state[i] = gumbel_argmax(logits, rng);
    }
}

fn gumbel_argmax(logits: &[f64], rng: &mut ChaCha8Rng) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (a, &logit) in logits.iter().enumerate() {
        let u: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let score = logit - (-u.ln()).ln();
        if score > best_score {
            best = a;
            best_score = score;
        }
    }
    best
}
