//! # bmdca-samplers
//!
//! Markov-chain Monte Carlo sampling of Potts models.
//!
//! - [`McmcSampler`]: the sampling contract used by the training loop
//! - [`PottsGibbsSampler`]: sequential-sweep Gibbs sampler, f64 on CPU,
//!   chains in parallel
//! - [`SamplingSchedule`]: burn-in, draws per chain and thinning
//! - [`RngKey`]: deterministic seed splitting so every chain gets its own stream
//!
//! ## Samples layout
//!
//! [`Samples`] is indexed `[draw, position, chain]`; each entry is a
//! category in `0..Q`.
//!
//! ```rust
//! use bmdca_samplers::{RngKey, SamplingSchedule};
//!
//! let schedule = SamplingSchedule::new(1000, 50, 10);
//! // 1000 burn-in sweeps, then 50 draws 10 sweeps apart
//!
//! let keys = RngKey::new(42).split(4); // one stream per chain
//! assert_eq!(keys.len(), 4);
//! ```

pub mod gibbs;
pub mod rng;
pub mod sampler;
pub mod schedule;

pub use gibbs::*;
pub use rng::*;
pub use sampler::*;
pub use schedule::*;
