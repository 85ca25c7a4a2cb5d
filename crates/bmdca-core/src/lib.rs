//! # bmdca-core
//!
//! Core types for fitting pairwise Potts models by Boltzmann-machine learning.
//!
//! - [`Dims`]: alphabet size `Q` and sequence length `N`, fixed for a run
//! - [`CouplingTensor`]: couplings `J_ij(a,b)` stored for `i < j` only
//! - [`PottsTensors`]: a `(h, J)` pair, used for parameters, gradients and
//!   learning rates alike
//! - [`BmConfig`]: every training option, loaded from a `[bmDCA]` TOML table
//! - [`ConfigError`]: the fatal configuration error kinds
//!
//! ## Coupling layout
//!
//! Only the upper triangle over positions is stored. Access with `i > j` goes
//! through [`CouplingTensor::get_symmetric`], which swaps the positions and
//! transposes the category pair:
//!
//! ```rust
//! use bmdca_core::{CouplingTensor, Dims};
//!
//! let dims = Dims::new(3, 2);
//! let mut j = CouplingTensor::zeros(dims);
//! j.set(0, 2, 1, 0, 0.5);
//! assert_eq!(j.get_symmetric(2, 0, 0, 1), 0.5);
//! ```

pub mod config;
pub mod error;
pub mod tensor;

pub use config::*;
pub use error::*;
pub use tensor::*;
