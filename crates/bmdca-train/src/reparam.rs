//! Parameter update with the field gauge correction.
//!
//! Couplings move by `lr_J · g_J`. Fields move by `lr_h · g_h + Dh`, where
//!
//! ```text
//! Dh(a, i) = -Σ_{j≠i} Σ_b f_j(b) · (lr_J · g_J)_ij(a, b)
//! ```
//!
//! and `f` are the target 1p frequencies. The coupling step for `i > j` is
//! read from the stored `(j, i)` block with categories transposed.

use bmdca_core::{CouplingTensor, PottsTensors};
use ndarray::{Array2, Zip};

/// Field correction implied by one coupling step.
///
/// Pure function of the coupling learning rates, coupling gradient and target
/// 1p frequencies (`Q × N`); returns a `Q × N` tensor.
pub fn field_gauge_correction(
    rates_j: &CouplingTensor,
    gradient_j: &CouplingTensor,
    target_1p: &Array2<f64>,
) -> Array2<f64> {
    let dims = rates_j.dims();
    let mut dh = Array2::<f64>::zeros(dims.field_shape());

    // Each stored pair contributes to both endpoints.
    for (k, i, j) in dims.pairs() {
        let rates = rates_j.as_array();
        let grads = gradient_j.as_array();
        for a in 0..dims.q {
            for b in 0..dims.q {
                let step = rates[[k, a, b]] * grads[[k, a, b]];
                dh[[a, i]] -= target_1p[[b, j]] * step;
                dh[[b, j]] -= target_1p[[a, i]] * step;
            }
        }
    }
    dh
}

/// Apply one update in place: couplings first, then fields with the gauge
/// correction from this step's coupling move.
pub fn apply_update(
    params: &mut PottsTensors,
    rates: &PottsTensors,
    gradient: &PottsTensors,
    target_1p: &Array2<f64>,
) {
    Zip::from(params.j.as_array_mut())
        .and(rates.j.as_array())
        .and(gradient.j.as_array())
        .for_each(|p, &lr, &g| *p += lr * g);

    let dh = field_gauge_correction(&rates.j, &gradient.j, target_1p);
    Zip::from(&mut params.h)
        .and(&rates.h)
        .and(&gradient.h)
        .and(&dh)
        .for_each(|p, &lr, &g, &d| *p += lr * g + d);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmdca_core::Dims;

    /// Same sum over every ordered pair, routed through symmetric access.
    fn correction_by_ordered_pairs(
        rates_j: &CouplingTensor,
        gradient_j: &CouplingTensor,
        target_1p: &Array2<f64>,
    ) -> Array2<f64> {
        let dims = rates_j.dims();
        let mut dh = Array2::<f64>::zeros(dims.field_shape());
        for i in 0..dims.n {
            for a in 0..dims.q {
                for j in (0..dims.n).filter(|&j| j != i) {
                    for b in 0..dims.q {
                        dh[[a, i]] -= target_1p[[b, j]]
                            * rates_j.get_symmetric(i, j, a, b)
                            * gradient_j.get_symmetric(i, j, a, b);
                    }
                }
            }
        }
        dh
    }

    #[test]
    fn test_correction_matches_ordered_pair_sum() {
        let dims = Dims::new(4, 3);
        let mut rates = CouplingTensor::zeros(dims);
        let mut grads = CouplingTensor::zeros(dims);
        for (idx, (r, g)) in rates
            .as_array_mut()
            .iter_mut()
            .zip(grads.as_array_mut().iter_mut())
            .enumerate()
        {
            *r = 0.01 * (1 + idx % 5) as f64;
            *g = ((idx * 7) % 11) as f64 - 5.0;
        }
        let target = Array2::from_shape_fn(dims.field_shape(), |(a, i)| {
            (a + 1) as f64 / (6.0 + i as f64)
        });

        let fast = field_gauge_correction(&rates, &grads, &target);
        let slow = correction_by_ordered_pairs(&rates, &grads, &target);
        Zip::from(&fast)
            .and(&slow)
            .for_each(|x, y| assert!((x - y).abs() < 1e-12, "{x} vs {y}"));
    }

    #[test]
    fn test_zero_coupling_gradient_leaves_plain_field_step() {
        let dims = Dims::new(3, 2);
        let mut params = PottsTensors::zeros(dims);
        let rates = PottsTensors::filled(dims, 0.5, 0.1);
        let mut gradient = PottsTensors::zeros(dims);
        gradient.h[[1, 2]] = 2.0;
        let target = Array2::from_elem(dims.field_shape(), 0.5);

        apply_update(&mut params, &rates, &gradient, &target);
        assert_eq!(params.h[[1, 2]], 1.0);
        assert_eq!(params.h[[0, 2]], 0.0);
        assert!(params.j.as_array().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_single_coupling_step_updates_both_endpoints() {
        let dims = Dims::new(2, 2);
        let mut params = PottsTensors::zeros(dims);
        let rates = PottsTensors::filled(dims, 0.0, 0.5);
        let mut gradient = PottsTensors::zeros(dims);
        gradient.j.set(0, 1, 0, 1, 1.0);
        let mut target = Array2::zeros(dims.field_shape());
        target[[0, 0]] = 0.7;
        target[[1, 0]] = 0.3;
        target[[0, 1]] = 0.4;
        target[[1, 1]] = 0.6;

        apply_update(&mut params, &rates, &gradient, &target);
        assert_eq!(params.j.get(0, 1, 0, 1), 0.5);
        // Dh(0, 0) = -f_1(1) · 0.5; Dh(1, 1) = -f_0(0) · 0.5
        assert!((params.h[[0, 0]] + 0.6 * 0.5).abs() < 1e-15);
        assert!((params.h[[1, 1]] + 0.7 * 0.5).abs() < 1e-15);
        assert_eq!(params.h[[1, 0]], 0.0);
        assert_eq!(params.h[[0, 1]], 0.0);
    }
}
