//! Per-coefficient adaptive learning rates (resilient propagation).
//!
//! Each rate is scaled by `adapt_up` when its gradient keeps its sign,
//! by `adapt_down` when the sign flips, and left alone when either gradient
//! is zero; the result is clamped to the tensor's bounds.

use bmdca_core::{BmConfig, PottsTensors};
use ndarray::{Array, Dimension, Zip};

/// Inclusive learning-rate bounds for one tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepBounds {
    pub min: f64,
    pub max: f64,
}

impl StepBounds {
    /// `min(max, max(min, x))`
    pub fn clamp(&self, x: f64) -> f64 {
        x.max(self.min).min(self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRateSettings {
    pub adapt_up: f64,
    pub adapt_down: f64,
    pub h: StepBounds,
    /// Upper bound already divided by N.
    pub j: StepBounds,
}

impl LearningRateSettings {
    pub fn from_config(config: &BmConfig, n: usize) -> Self {
        Self {
            adapt_up: config.adapt_up,
            adapt_down: config.adapt_down,
            h: StepBounds {
                min: config.min_step_h,
                max: config.max_step_h,
            },
            j: StepBounds {
                min: config.min_step_j,
                max: config.max_step_j(n),
            },
        }
    }
}

/// Multiplier for one coefficient given its current and previous gradient.
pub fn adaptation_factor(gradient: f64, previous: f64, adapt_up: f64, adapt_down: f64) -> f64 {
    let product = gradient * previous;
    if product > 0.0 {
        adapt_up
    } else if product < 0.0 {
        adapt_down
    } else {
        1.0
    }
}

/// Update every field and coupling learning rate in place.
pub fn update_learning_rates(
    rates: &mut PottsTensors,
    gradient: &PottsTensors,
    previous_gradient: &PottsTensors,
    settings: &LearningRateSettings,
) {
    adapt(
        rates.j.as_array_mut(),
        gradient.j.as_array(),
        previous_gradient.j.as_array(),
        settings,
        settings.j,
    );
    adapt(
        &mut rates.h,
        &gradient.h,
        &previous_gradient.h,
        settings,
        settings.h,
    );
}

fn adapt<D: Dimension>(
    rates: &mut Array<f64, D>,
    gradient: &Array<f64, D>,
    previous: &Array<f64, D>,
    settings: &LearningRateSettings,
    bounds: StepBounds,
) {
    Zip::from(rates)
        .and(gradient)
        .and(previous)
        .for_each(|rate, &g, &g_prev| {
            let alfa = adaptation_factor(g, g_prev, settings.adapt_up, settings.adapt_down);
            *rate = bounds.clamp(alfa * *rate);
        });
}
