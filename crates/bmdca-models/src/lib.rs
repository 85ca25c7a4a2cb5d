//! # bmdca-models
//!
//! The Potts model entity and the data it is fitted to.
//!
//! - [`PottsModel`]: parameters, gradient and learning rates of one model
//! - [`AbstractEBM`]: sequence energies `E(s) = -Σ_i h(s_i, i) - Σ_{i<j} J_ij(s_i, s_j)`
//! - [`TargetStats`]: empirical 1p/2p frequencies of a reference alignment
//! - [`io`]: text and `.npy` persistence of field/coupling tensors
//!
//! ```rust
//! use bmdca_core::Dims;
//! use bmdca_models::{AbstractEBM, PottsModel};
//!
//! let model = PottsModel::new(Dims::new(4, 3), 0.01, 0.001);
//! assert_eq!(model.params.energy(&[0, 1, 2, 0]), 0.0);
//! ```

pub mod error;
pub mod io;
pub mod potts;
pub mod target;

pub use error::*;
pub use io::{OutputFormat, TensorKind};
pub use potts::*;
pub use target::*;
