use bmdca_core::PottsTensors;
use ndarray::{s, Array3};

use crate::schedule::SamplingSchedule;

/// MCMC output, indexed `[draw, position, chain]`.
pub type Samples = Array3<usize>;

/// Trait for MCMC samplers driven by the training loop.
///
/// Implementations fill a caller-owned [`Samples`] block in place and are
/// deterministic given the seed. Chains share only the loaded parameter
/// snapshot, so they may run concurrently.
pub trait McmcSampler {
    /// Snapshot the parameters that subsequent draws sample from.
    fn load(&mut self, params: &PottsTensors);

    /// Draw `n_chains` chains from random initial configurations.
    fn sample(
        &mut self,
        samples: &mut Samples,
        n_chains: usize,
        schedule: SamplingSchedule,
        seed: u64,
        temperature: f64,
    );

    /// Draw `n_chains` chains that all start from `initial`.
    fn sample_from_initial(
        &mut self,
        samples: &mut Samples,
        n_chains: usize,
        schedule: SamplingSchedule,
        initial: &[usize],
        seed: u64,
        temperature: f64,
    );
}

/// Reallocate `samples` unless it already has shape `[draws, n, chains]`.
pub fn ensure_shape(samples: &mut Samples, draws: usize, n: usize, chains: usize) {
    if samples.dim() != (draws, n, chains) {
        *samples = Array3::zeros((draws, n, chains));
    }
}

/// Copy one sequence out of a samples block.
pub fn sequence(samples: &Samples, draw: usize, chain: usize) -> Vec<usize> {
    samples.slice(s![draw, .., chain]).to_vec()
}
