use serde::{Deserialize, Serialize};

/// Burn-in, draws per chain and thinning of one sampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplingSchedule {
    /// Sweeps before the first retained draw (`t_wait`).
    pub burn_in: usize,
    /// Draws retained per chain (`M`).
    pub n_samples: usize,
    /// Sweeps between retained draws (`delta_t`).
    pub thinning: usize,
}

impl SamplingSchedule {
    pub fn new(burn_in: usize, n_samples: usize, thinning: usize) -> Self {
        SamplingSchedule {
            burn_in,
            n_samples,
            thinning,
        }
    }

    /// Sweeps one chain performs: burn-in plus the gaps between draws.
    pub fn total_sweeps(&self) -> usize {
        self.n_samples
            .saturating_sub(1)
            .saturating_mul(self.thinning)
            .saturating_add(self.burn_in)
    }
}
