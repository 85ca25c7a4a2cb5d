//! Properties of the gradient, learning-rate and update rules

use bmdca_core::{CouplingTensor, Dims, PottsTensors};
use bmdca_models::{OutputFormat, PottsModel, TargetStats};
use bmdca_observers::FrequencyStats;
use bmdca_train::{
    apply_update, estimate_error_gradient, update_learning_rates, GradientSettings,
    LearningRateSettings, StepBounds,
};
use ndarray::array;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// N = 2, Q = 2 with per-position distributions (0.7, 0.3) and (0.4, 0.6)
/// and independent pair frequencies.
fn scenario_target() -> TargetStats {
    let f1 = array![[0.7, 0.4], [0.3, 0.6]];
    let dims = Dims::new(2, 2);
    let mut f2 = CouplingTensor::zeros(dims);
    for a in 0..2 {
        for b in 0..2 {
            f2.set(0, 1, a, b, f1[[a, 0]] * f1[[b, 1]]);
        }
    }
    TargetStats::new(f1, f2, 50, 42.5).unwrap()
}

fn perturbed(target: &TargetStats) -> FrequencyStats {
    let mut sampled = FrequencyStats::zeros(target.dims());
    sampled.frequency_1p = array![[0.65, 0.45], [0.35, 0.55]];
    sampled.frequency_1p_sigma.fill(0.01);
    sampled.frequency_2p = target.frequency_2p().clone();
    sampled.frequency_2p.set(0, 1, 0, 0, 0.3);
    sampled.frequency_2p_sigma.as_array_mut().fill(0.01);
    sampled
}

fn settings() -> GradientSettings {
    GradientSettings {
        lambda_h: 0.01,
        lambda_j: 0.01,
        use_pos_reg: false,
        error_min_update: -1.0,
        error_max: 1e-5,
    }
}

fn rate_settings(n: usize) -> LearningRateSettings {
    LearningRateSettings {
        adapt_up: 1.5,
        adapt_down: 0.6,
        h: StepBounds { min: 0.001, max: 2.5 },
        j: StepBounds {
            min: 1e-5,
            max: 2.5 / n as f64,
        },
    }
}

#[test]
fn test_learning_rates_stay_in_bounds_for_any_sign_history() {
    let dims = Dims::new(5, 3);
    let settings = rate_settings(dims.n);
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let mut rates = PottsTensors::filled(dims, 0.01, 0.001);
    let mut previous = PottsTensors::zeros(dims);

    for _ in 0..200 {
        let mut gradient = PottsTensors::zeros(dims);
        gradient.h.mapv_inplace(|_| rng.gen_range(-1i32..=1) as f64);
        gradient
            .j
            .as_array_mut()
            .mapv_inplace(|_| rng.gen_range(-1i32..=1) as f64);

        update_learning_rates(&mut rates, &gradient, &previous, &settings);
        for &r in &rates.h {
            assert!((settings.h.min..=settings.h.max).contains(&r), "h rate {r}");
        }
        for &r in rates.j.as_array() {
            assert!((settings.j.min..=settings.j.max).contains(&r), "J rate {r}");
        }
        previous = gradient;
    }
}

#[test]
fn test_insignificant_gradient_entries_are_bit_identical() {
    let target = scenario_target();
    let sampled = perturbed(&target);
    let params = PottsTensors::zeros(target.dims());
    let mut gradient = PottsTensors::filled(target.dims(), -0.0, 1e-300);
    gradient.h[[1, 1]] = f64::MIN_POSITIVE;
    let before = gradient.clone();

    let mut strict = settings();
    strict.error_min_update = 1e9;
    let report = estimate_error_gradient(&target, &sampled, &params, &mut gradient, &strict);

    assert_eq!((report.updated_1p, report.updated_2p), (0, 0));
    for (a, b) in gradient.h.iter().zip(before.h.iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    for (a, b) in gradient.j.as_array().iter().zip(before.j.as_array().iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_symmetric_access_transposes_lower_triangle() {
    let dims = Dims::new(5, 3);
    let mut coupling = CouplingTensor::zeros(dims);
    for (idx, value) in coupling.as_array_mut().iter_mut().enumerate() {
        *value = idx as f64;
    }
    for i in 0..dims.n {
        for j in 0..i {
            for a in 0..dims.q {
                for b in 0..dims.q {
                    assert_eq!(coupling.get_symmetric(i, j, a, b), coupling.get(j, i, b, a));
                }
            }
        }
    }
}

#[test]
fn test_convergence_is_strict() {
    let target = scenario_target();
    let sampled = perturbed(&target);
    let params = PottsTensors::zeros(target.dims());

    let mut probe = settings();
    probe.error_max = 0.0;
    let mut gradient = PottsTensors::zeros(target.dims());
    let error_tot = estimate_error_gradient(&target, &sampled, &params, &mut gradient, &probe)
        .error_tot;
    assert!(error_tot > 0.0);

    probe.error_max = error_tot;
    let report = estimate_error_gradient(&target, &sampled, &params, &mut gradient, &probe);
    assert_eq!(report.error_tot, error_tot);
    assert!(!report.converged);

    probe.error_max = error_tot * (1.0 + 1e-12);
    let report = estimate_error_gradient(&target, &sampled, &params, &mut gradient, &probe);
    assert!(report.converged);
}

#[test]
fn test_matching_scenario_has_zero_field_error() {
    let target = scenario_target();
    let mut sampled = FrequencyStats::zeros(target.dims());
    sampled.frequency_1p = target.frequency_1p().clone();
    sampled.frequency_2p = target.frequency_2p().clone();
    let params = PottsTensors::zeros(target.dims());
    let mut gradient = PottsTensors::zeros(target.dims());

    let mut s = settings();
    let report = estimate_error_gradient(&target, &sampled, &params, &mut gradient, &s);
    assert_eq!(report.error_1p, 0.0);
    assert!(gradient.h.iter().all(|&g| g == 0.0));
    assert!(report.error_2p < 1e-15);
    assert_eq!(report.converged, report.error_tot < s.error_max);

    // an unreachable threshold never converges
    s.error_max = 0.0;
    let report = estimate_error_gradient(&target, &sampled, &params, &mut gradient, &s);
    assert!(!report.converged);
}

#[test]
fn test_same_sign_accelerates_once_and_clamps() {
    let dims = Dims::new(2, 2);
    let settings = rate_settings(dims.n);
    let mut rates = PottsTensors::filled(dims, 0.01, 0.001);
    rates.h[[1, 1]] = 2.0;
    let mut gradient = PottsTensors::zeros(dims);
    gradient.h[[0, 0]] = 0.2;
    gradient.h[[1, 1]] = -0.3;
    gradient.j.set(0, 1, 1, 0, 0.5);
    let mut previous = PottsTensors::zeros(dims);
    previous.h[[0, 0]] = 0.1;
    previous.h[[1, 1]] = -0.1;
    previous.j.set(0, 1, 1, 0, 0.4);

    update_learning_rates(&mut rates, &gradient, &previous, &settings);
    assert_eq!(rates.h[[0, 0]], 0.01 * 1.5);
    assert_eq!(rates.h[[1, 1]], 2.5);
    assert_eq!(rates.j.get(0, 1, 1, 0), 0.001 * 1.5);
    // zero products leave the rest alone
    assert_eq!(rates.h[[1, 0]], 0.01);
    assert_eq!(rates.j.get(0, 1, 0, 0), 0.001);
}

#[test]
fn test_sign_flip_decelerates_and_floors() {
    let dims = Dims::new(2, 2);
    let settings = rate_settings(dims.n);
    let mut rates = PottsTensors::filled(dims, 0.01, 0.001);
    rates.j.set(0, 1, 0, 1, 1.2e-5);
    let mut gradient = PottsTensors::zeros(dims);
    gradient.h[[0, 1]] = 0.2;
    gradient.j.set(0, 1, 0, 1, -0.5);
    let mut previous = PottsTensors::zeros(dims);
    previous.h[[0, 1]] = -0.1;
    previous.j.set(0, 1, 0, 1, 0.4);

    update_learning_rates(&mut rates, &gradient, &previous, &settings);
    assert_eq!(rates.h[[0, 1]], 0.01 * 0.6);
    assert_eq!(rates.j.get(0, 1, 0, 1), 1e-5);
}

#[test]
fn test_reloaded_parameters_give_identical_next_step() {
    let target = scenario_target();
    let sampled = perturbed(&target);
    let dims = target.dims();

    let mut model = PottsModel::new(dims, 0.01, 0.001);
    estimate_error_gradient(&target, &sampled, &model.params, &mut model.gradient, &settings());
    apply_update(
        &mut model.params,
        &model.learning_rates,
        &model.gradient,
        target.frequency_1p(),
    );

    let dir = tempfile::tempdir().unwrap();
    for format in [OutputFormat::Text, OutputFormat::Npy] {
        model.write(dir.path(), "1", format).unwrap();
        let reloaded = PottsModel::read(dims, dir.path(), "1", format).unwrap();
        assert_eq!(reloaded, model);

        let mut next = model.gradient.clone();
        let mut next_reloaded = reloaded.gradient.clone();
        let a = estimate_error_gradient(&target, &sampled, &model.params, &mut next, &settings());
        let b = estimate_error_gradient(
            &target,
            &sampled,
            &reloaded.params,
            &mut next_reloaded,
            &settings(),
        );
        assert_eq!(a, b);
        assert_eq!(next, next_reloaded);
    }
}
