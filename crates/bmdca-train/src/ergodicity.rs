//! Burn-in and thinning adaptation from the sampling diagnostics.

use bmdca_core::BmConfig;
use bmdca_observers::{CorrelationStats, EnergyStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Increased,
    Decreased,
    Unchanged,
}

/// New burn-in and thinning after one sampling attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleAdjustment {
    pub burn_in: usize,
    pub burn_in_change: Change,
    pub thinning: usize,
    pub thinning_change: Change,
}

impl ScheduleAdjustment {
    /// Samples are redrawn while either time had to grow.
    pub fn needs_resample(&self) -> bool {
        self.burn_in_change == Change::Increased || self.thinning_change == Change::Increased
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErgodicityMonitor {
    pub adapt_up_time: f64,
    pub adapt_down_time: f64,
    /// Burn-in never grows past this
    pub max_burn_in: usize,
    /// Thinning never grows past this
    pub max_thinning: usize,
}

impl ErgodicityMonitor {
    pub fn from_config(config: &BmConfig) -> Self {
        Self {
            adapt_up_time: config.adapt_up_time,
            adapt_down_time: config.adapt_down_time,
            max_burn_in: config.t_wait_max,
            max_thinning: config.delta_t_max,
        }
    }

    /// Thinning grows while draws half a chain apart are more alike than
    /// draws from different chains, and shrinks once consecutive draws are
    /// as alike as different chains. Burn-in grows while the energy still
    /// drifts down between the first and last draw, and shrinks when it
    /// drifts up.
    ///
    /// Growth is capped at the monitor's ceilings. A time already at its
    /// ceiling reports [`Change::Unchanged`], so it never forces a resample.
    pub fn adjust(
        &self,
        burn_in: usize,
        thinning: usize,
        energy: &EnergyStats,
        corr: &CorrelationStats,
    ) -> ScheduleAdjustment {
        let thinning_up = corr.check_corr - corr.cross_corr >= corr.cross_check_err;
        let thinning_down = corr.auto_corr - corr.cross_corr <= corr.auto_cross_err;
        let drift = energy.start_mean - energy.end_mean;
        let burn_in_up = drift >= 2.0 * energy.err;
        let burn_in_down = drift <= -2.0 * energy.err;

        let (thinning, thinning_change) =
            self.scale(thinning, thinning_up, thinning_down, self.max_thinning);
        let (burn_in, burn_in_change) =
            self.scale(burn_in, burn_in_up, burn_in_down, self.max_burn_in);
        ScheduleAdjustment {
            burn_in,
            burn_in_change,
            thinning,
            thinning_change,
        }
    }

    fn scale(&self, value: usize, up: bool, down: bool, ceiling: usize) -> (usize, Change) {
        if up {
            let grown = rescale(value, self.adapt_up_time)
                .max(value.saturating_add(1))
                .min(ceiling);
            if grown > value {
                (grown, Change::Increased)
            } else {
                (value, Change::Unchanged)
            }
        } else if down {
            (rescale(value, self.adapt_down_time).max(1), Change::Decreased)
        } else {
            (value, Change::Unchanged)
        }
    }
}

fn rescale(value: usize, factor: f64) -> usize {
    (value as f64 * factor).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> ErgodicityMonitor {
        ErgodicityMonitor {
            adapt_up_time: 1.5,
            adapt_down_time: 0.6,
            max_burn_in: 1_000,
            max_thinning: 100,
        }
    }

    fn corr(auto: f64, check: f64, cross: f64, err: f64) -> CorrelationStats {
        CorrelationStats {
            auto_corr: auto,
            check_corr: check,
            cross_corr: cross,
            auto_cross_err: err,
            cross_check_err: err,
            ..Default::default()
        }
    }

    fn energy(start: f64, end: f64, err: f64) -> EnergyStats {
        EnergyStats {
            start_mean: start,
            end_mean: end,
            err,
            ..Default::default()
        }
    }

    #[test]
    fn test_unmixed_chains_grow_both_times() {
        let adj = monitor().adjust(100, 10, &energy(5.0, 1.0, 0.5), &corr(0.9, 0.8, 0.2, 0.01));
        assert_eq!(adj.thinning, 15);
        assert_eq!(adj.burn_in, 150);
        assert!(adj.needs_resample());
    }

    #[test]
    fn test_mixed_chains_shrink_both_times() {
        let adj = monitor().adjust(100, 10, &energy(1.0, 5.0, 0.5), &corr(0.2, 0.2, 0.2, 0.01));
        assert_eq!(adj.thinning, 6);
        assert_eq!(adj.thinning_change, Change::Decreased);
        assert_eq!(adj.burn_in, 60);
        assert!(!adj.needs_resample());
    }

    #[test]
    fn test_decrease_floors_at_one() {
        let adj = monitor().adjust(1, 1, &energy(0.0, 5.0, 0.1), &corr(0.2, 0.2, 0.2, 0.01));
        assert_eq!((adj.burn_in, adj.thinning), (1, 1));
    }

    #[test]
    fn test_increase_wins_over_decrease() {
        // check - cross above its error and auto - cross within its error
        let adj = monitor().adjust(10, 4, &energy(0.0, 0.0, 1.0), &corr(0.3, 0.5, 0.3, 0.1));
        assert_eq!(adj.thinning, 6);
        assert_eq!(adj.thinning_change, Change::Increased);
    }

    #[test]
    fn test_increase_moves_by_at_least_one() {
        let mut monitor = monitor();
        monitor.adapt_up_time = 1.2;
        let adj = monitor.adjust(1, 1, &energy(5.0, 1.0, 0.5), &corr(0.9, 0.8, 0.2, 0.01));
        assert_eq!((adj.burn_in, adj.thinning), (2, 2));
        assert_eq!(adj.burn_in_change, Change::Increased);
        assert_eq!(adj.thinning_change, Change::Increased);
    }

    #[test]
    fn test_growth_stops_at_ceiling() {
        let unmixed = corr(0.9, 0.8, 0.2, 0.01);
        let drifting = energy(5.0, 1.0, 0.5);

        // clamped on the way up
        let adj = monitor().adjust(800, 80, &drifting, &unmixed);
        assert_eq!((adj.burn_in, adj.thinning), (1_000, 100));
        assert!(adj.needs_resample());

        // at the ceiling nothing changes and no resample is asked for
        let adj = monitor().adjust(1_000, 100, &drifting, &unmixed);
        assert_eq!((adj.burn_in, adj.thinning), (1_000, 100));
        assert_eq!(adj.burn_in_change, Change::Unchanged);
        assert_eq!(adj.thinning_change, Change::Unchanged);
        assert!(!adj.needs_resample());
    }

    #[test]
    fn test_repeated_growth_is_bounded() {
        let unmixed = corr(0.9, 0.8, 0.2, 0.0);
        let frozen = energy(0.0, 0.0, 0.0);
        let (mut burn_in, mut thinning) = (10, 2);
        for _ in 0..1_000 {
            let adj = monitor().adjust(burn_in, thinning, &frozen, &unmixed);
            burn_in = adj.burn_in;
            thinning = adj.thinning;
        }
        assert_eq!((burn_in, thinning), (1_000, 100));
    }

    #[test]
    fn test_stationary_energy_leaves_burn_in() {
        let adj = monitor().adjust(10, 4, &energy(1.0, 0.5, 1.0), &corr(0.9, 0.2, 0.2, 0.01));
        assert_eq!(adj.burn_in, 10);
        assert_eq!(adj.burn_in_change, Change::Unchanged);
    }
}
