//! Coherence guard for importance reweighting.

use bmdca_core::PottsTensors;
use bmdca_observers::SampleStats;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportanceReweighter {
    /// In `(0, 1)`.
    pub coherence_min: f64,
}

impl ImportanceReweighter {
    pub fn new(coherence_min: f64) -> Self {
        Self { coherence_min }
    }

    /// Both the ratio and its reciprocal must stay strictly above the
    /// threshold.
    pub fn is_coherent(&self, ratio: f64) -> bool {
        ratio > self.coherence_min && 1.0 / ratio > self.coherence_min
    }

    /// Reweight `stats` from `previous` to `current` parameters and report
    /// whether the old samples are still usable.
    pub fn reweight(
        &self,
        stats: &mut SampleStats,
        current: &PottsTensors,
        previous: &PottsTensors,
    ) -> bool {
        stats.compute_frequency_stats_importance(current, previous);
        let ratio = stats.z_ratio();
        let coherent = self.is_coherent(ratio);
        tracing::debug!(ratio, coherent, "importance reweighting");
        coherent
    }
}
