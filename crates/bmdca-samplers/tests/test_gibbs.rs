//! Tests for the Potts Gibbs sampler

use bmdca_core::{Dims, PottsTensors};
use bmdca_samplers::{McmcSampler, PottsGibbsSampler, Samples, SamplingSchedule};
use ndarray::Array3;

fn two_site_model() -> PottsTensors {
    let mut params = PottsTensors::zeros(Dims::new(2, 2));
    params.h[[1, 0]] = 0.4;
    params.h[[0, 1]] = -0.3;
    params.j.set(0, 1, 1, 1, 0.8);
    params.j.set(0, 1, 0, 1, -0.5);
    params
}

/// Exact marginals `P(s_0 = 1)`, `P(s_1 = 1)` and `P(s_0 = 1, s_1 = 1)` by enumeration.
fn exact_marginals(params: &PottsTensors, temperature: f64) -> (f64, f64, f64) {
    let mut z = 0.0;
    let (mut p0, mut p1, mut p11) = (0.0, 0.0, 0.0);
    for a in 0..2 {
        for b in 0..2 {
            let neg_energy = params.h[[a, 0]] + params.h[[b, 1]] + params.j.get(0, 1, a, b);
            let w = (neg_energy / temperature).exp();
            z += w;
            if a == 1 {
                p0 += w;
            }
            if b == 1 {
                p1 += w;
            }
            if a == 1 && b == 1 {
                p11 += w;
            }
        }
    }
    (p0 / z, p1 / z, p11 / z)
}

fn sampled_marginals(samples: &Samples) -> (f64, f64, f64) {
    let (draws, _, chains) = samples.dim();
    let total = (draws * chains) as f64;
    let (mut p0, mut p1, mut p11) = (0.0, 0.0, 0.0);
    for m in 0..draws {
        for c in 0..chains {
            let (a, b) = (samples[[m, 0, c]], samples[[m, 1, c]]);
            p0 += a as f64;
            p1 += b as f64;
            p11 += (a * b) as f64;
        }
    }
    (p0 / total, p1 / total, p11 / total)
}

#[test]
fn test_samples_have_requested_shape_and_alphabet() {
    let dims = Dims::new(5, 4);
    let mut sampler = PottsGibbsSampler::new(dims);
    let mut samples = Samples::zeros((1, 1, 1));

    sampler.sample(&mut samples, 3, SamplingSchedule::new(2, 7, 1), 11, 1.0);

    assert_eq!(samples.dim(), (7, 5, 3));
    assert!(samples.iter().all(|&a| a < 4));
}

#[test]
fn test_same_seed_same_samples() {
    let mut sampler = PottsGibbsSampler::new(Dims::new(2, 2));
    sampler.load(&two_site_model());
    let schedule = SamplingSchedule::new(5, 20, 2);

    let mut first = Array3::zeros((20, 2, 4));
    let mut second = Array3::zeros((20, 2, 4));
    sampler.sample(&mut first, 4, schedule, 1234, 1.0);
    sampler.sample(&mut second, 4, schedule, 1234, 1.0);
    assert_eq!(first, second);

    let mut other = Array3::zeros((20, 2, 4));
    sampler.sample(&mut other, 4, schedule, 1235, 1.0);
    assert_ne!(first, other);
}

#[test]
fn test_marginals_match_exact_distribution() {
    let params = two_site_model();
    let mut sampler = PottsGibbsSampler::new(params.dims());
    sampler.load(&params);

    let mut samples = Samples::zeros((0, 0, 0));
    sampler.sample(&mut samples, 8, SamplingSchedule::new(20, 2000, 2), 99, 1.0);

    let exact = exact_marginals(&params, 1.0);
    let sampled = sampled_marginals(&samples);
    assert!((exact.0 - sampled.0).abs() < 0.03, "{exact:?} vs {sampled:?}");
    assert!((exact.1 - sampled.1).abs() < 0.03, "{exact:?} vs {sampled:?}");
    assert!((exact.2 - sampled.2).abs() < 0.03, "{exact:?} vs {sampled:?}");
}

#[test]
fn test_low_temperature_sharpens_distribution() {
    let mut params = PottsTensors::zeros(Dims::new(3, 3));
    for i in 0..3 {
        params.h[[2, i]] = 1.0;
    }
    let mut sampler = PottsGibbsSampler::new(params.dims());
    sampler.load(&params);

    let mut samples = Samples::zeros((0, 0, 0));
    sampler.sample(&mut samples, 4, SamplingSchedule::new(10, 100, 1), 5, 0.05);
    let hits = samples.iter().filter(|&&a| a == 2).count();
    assert!(hits as f64 / samples.len() as f64 > 0.99);
}

#[test]
fn test_initial_configuration_is_first_draw_without_burn_in() {
    let dims = Dims::new(4, 3);
    let mut sampler = PottsGibbsSampler::new(dims);
    let initial = [2, 1, 0, 2];

    let mut samples = Samples::zeros((0, 0, 0));
    sampler.sample_from_initial(&mut samples, 3, SamplingSchedule::new(0, 5, 1), &initial, 8, 1.0);

    for c in 0..3 {
        assert_eq!(bmdca_samplers::sequence(&samples, 0, c), initial.to_vec());
    }
}
