//! Potts model entity.

use std::path::Path;

use bmdca_core::{Dims, PottsTensors};

use crate::error::ModelError;
use crate::io::{self, OutputFormat, TensorKind};

/// Trait for objects with a well-defined sequence energy.
///
/// The Boltzmann distribution at temperature `T` is `P(s) ∝ exp(-E(s)/T)`.
pub trait AbstractEBM {
    /// Energy of one sequence of category indices, one per position.
    fn energy(&self, sequence: &[usize]) -> f64;
}

impl AbstractEBM for PottsTensors {
    fn energy(&self, sequence: &[usize]) -> f64 {
        let dims = self.dims();
        debug_assert_eq!(sequence.len(), dims.n);

        let mut energy = 0.0;
        for (i, &a) in sequence.iter().enumerate() {
            energy -= self.h[[a, i]];
        }
        for (k, i, j) in dims.pairs() {
            energy -= self.j.as_array()[[k, sequence[i], sequence[j]]];
        }
        energy
    }
}

/// Parameters, gradient and learning rates of one Potts model.
///
/// All three share the model's [`Dims`], fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PottsModel {
    pub params: PottsTensors,
    pub gradient: PottsTensors,
    pub learning_rates: PottsTensors,
}

impl PottsModel {
    /// Zero parameters and gradient; learning rates at the base step sizes.
    pub fn new(dims: Dims, epsilon_h: f64, epsilon_j: f64) -> Self {
        Self {
            params: PottsTensors::zeros(dims),
            gradient: PottsTensors::zeros(dims),
            learning_rates: PottsTensors::filled(dims, epsilon_h, epsilon_j),
        }
    }

    pub const fn dims(&self) -> Dims {
        self.params.dims()
    }

    /// Write parameters, gradient and learning rates for checkpoint `id`.
    pub fn write(&self, dir: &Path, id: &str, format: OutputFormat) -> Result<(), ModelError> {
        io::write_tensors(&self.params, dir, TensorKind::Parameters, id, format)?;
        io::write_tensors(&self.gradient, dir, TensorKind::Gradients, id, format)?;
        io::write_tensors(
            &self.learning_rates,
            dir,
            TensorKind::LearningRates,
            id,
            format,
        )?;
        tracing::debug!(id, ?format, dir = %dir.display(), "model written");
        Ok(())
    }

    /// Load the tensors written by [`PottsModel::write`].
    pub fn read(dims: Dims, dir: &Path, id: &str, format: OutputFormat) -> Result<Self, ModelError> {
        Ok(Self {
            params: io::read_tensors(dims, dir, TensorKind::Parameters, id, format)?,
            gradient: io::read_tensors(dims, dir, TensorKind::Gradients, id, format)?,
            learning_rates: io::read_tensors(dims, dir, TensorKind::LearningRates, id, format)?,
        })
    }
}
