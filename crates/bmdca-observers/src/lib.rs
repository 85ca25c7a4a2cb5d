//! # bmdca-observers
//!
//! Statistics of MCMC samples for Boltzmann-machine learning.
//!
//! - [`SampleStats`]: 1p/2p frequencies with standard errors, sample
//!   energies, importance reweighting between parameter sets
//! - [`EnergyStats`] / [`CorrelationStats`]: the equilibration and mixing
//!   diagnostics read by the ergodicity check
//!
//! Standard errors are the spread of per-chain estimates divided by
//! `sqrt(chains)`; they are zero for a single chain.

pub mod diagnostics;
pub mod stats;
pub mod writer;

pub use diagnostics::*;
pub use stats::*;
