//! # bmdca-train
//!
//! Boltzmann-machine learning of Potts models.
//!
//! [`TrainingController`] alternates MCMC sampling with gradient steps:
//!
//! 1. sample the current model, lengthening burn-in and thinning while the
//!    [`ErgodicityMonitor`] reports unmixed chains
//! 2. compare sampled and target frequencies
//!    ([`estimate_error_gradient`]), stopping once the total error drops
//!    below `error_max`
//! 3. adapt per-coefficient learning rates ([`update_learning_rates`])
//! 4. move couplings, then fields with the gauge correction
//!    ([`apply_update`], [`field_gauge_correction`])
//! 5. optionally reuse the samples for further iterations through
//!    importance reweighting while they stay coherent
//!    ([`ImportanceReweighter`])

pub mod controller;
pub mod ergodicity;
pub mod error;
pub mod error_gradient;
pub mod learning_rate;
pub mod reparam;
pub mod reweight;
pub mod run_log;

pub use controller::{RunOutcome, TrainingController, TrainingPhase, PARAMS_FILE};
pub use ergodicity::{Change, ErgodicityMonitor, ScheduleAdjustment};
pub use error::TrainError;
pub use error_gradient::{estimate_error_gradient, ErrorReport, GradientSettings};
pub use learning_rate::{update_learning_rates, LearningRateSettings, StepBounds};
pub use reparam::{apply_update, field_gauge_correction};
pub use reweight::ImportanceReweighter;
pub use run_log::{RunLog, RunLogRow, RUN_LOG_FILE};
