//! The outer training loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use bmdca_core::BmConfig;
use bmdca_models::{read_alignment, OutputFormat, PottsModel, TargetStats};
use bmdca_observers::SampleStats;
use bmdca_samplers::{McmcSampler, Samples, SamplingSchedule};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::ergodicity::{Change, ErgodicityMonitor};
use crate::error::TrainError;
use crate::error_gradient::{estimate_error_gradient, ErrorReport, GradientSettings};
use crate::learning_rate::{update_learning_rates, LearningRateSettings};
use crate::reparam::apply_update;
use crate::reweight::ImportanceReweighter;
use crate::run_log::{ErgodicityRow, RunLog};

/// Effective configuration written next to the outputs.
pub const PARAMS_FILE: &str = "bmdca_params.conf";

/// Where the loop currently is.
///
/// `Sampling` repeats while the ergodicity check asks for longer chains,
/// `ReweightCheck` and `GradientStep` alternate once per inner iteration,
/// and `Converged`/`Exhausted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    Sampling,
    ReweightCheck,
    GradientStep,
    Converged,
    Exhausted,
}

/// How a run ended. Neither outcome is an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// `error_tot < error_max` at `step`.
    Converged { step: usize, report: ErrorReport },
    /// `step_max` steps without convergence.
    Exhausted { step: usize, report: ErrorReport },
}

impl RunOutcome {
    pub fn step(&self) -> usize {
        match self {
            Self::Converged { step, .. } | Self::Exhausted { step, .. } => *step,
        }
    }

    pub fn report(&self) -> &ErrorReport {
        match self {
            Self::Converged { report, .. } | Self::Exhausted { report, .. } => report,
        }
    }
}

/// Boltzmann-machine learning of a Potts model against fixed target
/// statistics.
///
/// Owns the model, the sampler and the statistics engine for the whole run.
/// Every outer step samples (repeating while the ergodicity check demands
/// longer burn-in or thinning), then runs up to `step_importance_max` inner
/// iterations on those samples, reweighting them for iterations after the
/// first until they lose coherence.
pub struct TrainingController<S: McmcSampler> {
    config: BmConfig,
    target: TargetStats,
    output_dir: PathBuf,
    format: OutputFormat,
    current: PottsModel,
    previous: PottsModel,
    sampler: S,
    samples: Samples,
    stats: SampleStats,
    run_log: RunLog,
    rng: ChaCha8Rng,
    initial_sample: Option<Vec<usize>>,
    gradient_settings: GradientSettings,
    rate_settings: LearningRateSettings,
    monitor: ErgodicityMonitor,
    reweighter: ImportanceReweighter,
    burn_in: usize,
    thinning: usize,
    step: usize,
    importance_iterations: usize,
    phase: TrainingPhase,
    last_report: ErrorReport,
}

impl<S: McmcSampler> TrainingController<S> {
    /// Validate `config`, prepare `output_dir` and write the effective
    /// configuration and the run-log header into it.
    pub fn new(
        mut config: BmConfig,
        target: TargetStats,
        sampler: S,
        output_dir: &Path,
    ) -> Result<Self, TrainError> {
        config.validate()?;
        config.reconcile(target.effective_m());

        fs::create_dir_all(output_dir).map_err(|e| TrainError::io(output_dir, e))?;
        config.write_to(&output_dir.join(PARAMS_FILE))?;

        let dims = target.dims();
        let initial_sample = if config.init_sample {
            Some(read_initial_sample(&config.init_sample_file, &target)?)
        } else {
            None
        };
        let run_log = RunLog::create(output_dir, config.check_ergo)?;
        let current = PottsModel::new(dims, config.epsilon_0_h, config.epsilon_0_j);

        info!(
            n = dims.n,
            q = dims.q,
            m = target.m(),
            m_eff = target.effective_m(),
            chains = config.count_max,
            draws = config.draws_per_chain,
            "training controller ready"
        );

        Ok(Self {
            target,
            output_dir: output_dir.to_path_buf(),
            format: OutputFormat::from_binary_flag(config.output_binary),
            previous: current.clone(),
            current,
            sampler,
            samples: Samples::zeros((config.draws_per_chain, dims.n, config.count_max)),
            stats: SampleStats::new(dims, config.temperature),
            run_log,
            rng: ChaCha8Rng::seed_from_u64(config.random_seed),
            initial_sample,
            gradient_settings: GradientSettings::from_config(&config),
            rate_settings: LearningRateSettings::from_config(&config, dims.n),
            monitor: ErgodicityMonitor::from_config(&config),
            reweighter: ImportanceReweighter::new(config.coherence_min),
            burn_in: config.t_wait_0,
            thinning: config.delta_t_0,
            step: 0,
            importance_iterations: 0,
            phase: TrainingPhase::Sampling,
            last_report: ErrorReport::default(),
            config,
        })
    }

    /// Train until convergence or until `step_max` steps have run.
    pub fn run(&mut self) -> Result<RunOutcome, TrainError> {
        for step in 1..=self.config.step_max {
            self.step = step;
            let step_timer = Instant::now();
            self.run_log
                .begin_row(step, self.config.count_max, self.burn_in, self.thinning);
            info!(step, burn_in = self.burn_in, thinning = self.thinning, "step");

            self.phase = TrainingPhase::Sampling;
            self.sample()?;

            if let Some(report) = self.importance_loop(step, step_timer)? {
                info!(step, error_tot = report.error_tot, "converged");
                return Ok(RunOutcome::Converged { step, report });
            }
            info!(
                step,
                error_h = self.last_report.error_1p,
                error_j = self.last_report.error_2p,
                error_tot = self.last_report.error_tot,
                "step done"
            );
        }

        self.phase = TrainingPhase::Exhausted;
        self.write_data("final")?;
        self.run_log.flush()?;
        warn!(step_max = self.config.step_max, "step budget exhausted");
        Ok(RunOutcome::Exhausted {
            step: self.step,
            report: self.last_report,
        })
    }

    /// Draw samples, redrawing while the ergodicity check lengthens the chains.
    fn sample(&mut self) -> Result<(), TrainError> {
        self.sampler.load(&self.current.params);

        let mut attempts = 0;
        loop {
            attempts += 1;
            let seed = u64::from(self.rng.gen::<u32>());
            if let Some(row) = self.run_log.current_mut() {
                row.seed = seed;
            }

            let timer = Instant::now();
            let schedule =
                SamplingSchedule::new(self.burn_in, self.config.draws_per_chain, self.thinning);
            match &self.initial_sample {
                Some(initial) => self.sampler.sample_from_initial(
                    &mut self.samples,
                    self.config.count_max,
                    schedule,
                    initial,
                    seed,
                    self.config.temperature,
                ),
                None => self.sampler.sample(
                    &mut self.samples,
                    self.config.count_max,
                    schedule,
                    seed,
                    self.config.temperature,
                ),
            }
            self.stats.update_data(&self.samples, &self.current.params);
            tracing::debug!(seed, elapsed = ?timer.elapsed(), "sampled");

            if !self.config.check_ergo {
                return Ok(());
            }

            self.stats.compute_energy_stats();
            self.stats.compute_correlation_stats();
            let energy = self.stats.energy_stats();
            let corr = self.stats.correlation_stats();
            if let Some(row) = self.run_log.current_mut() {
                row.ergodicity = ErgodicityRow::new(&energy, corr);
            }

            let adjustment = self.monitor.adjust(self.burn_in, self.thinning, &energy, corr);
            log_change("thinning", adjustment.thinning_change, adjustment.thinning);
            log_change("burn-in", adjustment.burn_in_change, adjustment.burn_in);
            self.burn_in = adjustment.burn_in;
            self.thinning = adjustment.thinning;

            if !adjustment.needs_resample() {
                return Ok(());
            }
            if attempts >= self.config.max_resample_attempts {
                warn!(attempts, "resampling limit reached, keeping current samples");
                return Ok(());
            }
            info!(attempts, "resampling");
        }
    }

    /// Inner iterations on the current samples. Returns the report when the
    /// run has converged.
    fn importance_loop(
        &mut self,
        step: usize,
        step_timer: Instant,
    ) -> Result<Option<ErrorReport>, TrainError> {
        let step_importance_max = self.config.step_importance_max;
        let mut step_importance = 0;
        let mut coherent = true;

        while step_importance < step_importance_max && coherent {
            step_importance += 1;
            self.importance_iterations = step_importance;
            self.phase = TrainingPhase::ReweightCheck;
            if step_importance > 1 {
                coherent = self.reweighter.reweight(
                    &mut self.stats,
                    &self.current.params,
                    &self.previous.params,
                );
                if !coherent {
                    info!(step_importance, "samples lost coherence");
                }
            } else {
                self.stats.compute_frequency_stats();
            }

            self.phase = TrainingPhase::GradientStep;
            self.previous.gradient.clone_from(&self.current.gradient);
            let report = estimate_error_gradient(
                &self.target,
                self.stats.frequencies(),
                &self.current.params,
                &mut self.current.gradient,
                &self.gradient_settings,
            );
            self.last_report = report;
            if let Some(row) = self.run_log.current_mut() {
                row.record_errors(&report);
            }

            if report.converged {
                self.phase = TrainingPhase::Converged;
                self.write_data("final")?;
                self.run_log.flush()?;
                return Ok(Some(report));
            }

            self.previous
                .learning_rates
                .clone_from(&self.current.learning_rates);
            update_learning_rates(
                &mut self.current.learning_rates,
                &self.current.gradient,
                &self.previous.gradient,
                &self.rate_settings,
            );

            if let Some(row) = self.run_log.current_mut() {
                row.step_time = step_timer.elapsed().as_secs_f64();
            }

            if step % self.config.save_parameters == 0
                && (step_importance == step_importance_max || !coherent)
            {
                self.write_data(&step.to_string())?;
                self.run_log.flush()?;
            }

            self.previous.params.clone_from(&self.current.params);
            apply_update(
                &mut self.current.params,
                &self.current.learning_rates,
                &self.current.gradient,
                self.target.frequency_1p(),
            );
        }
        Ok(None)
    }

    /// Write model tensors and sample statistics for checkpoint `id`.
    fn write_data(&self, id: &str) -> Result<(), TrainError> {
        self.current.write(&self.output_dir, id, self.format)?;
        self.stats
            .write_outputs(&self.output_dir, id, self.format, self.config.check_ergo)?;
        info!(id, dir = %self.output_dir.display(), "checkpoint written");
        Ok(())
    }

    /// Effective configuration after reconciliation.
    pub fn config(&self) -> &BmConfig {
        &self.config
    }

    pub fn model(&self) -> &PottsModel {
        &self.current
    }

    /// Parameters, gradient and learning rates before the last update.
    pub fn previous_model(&self) -> &PottsModel {
        &self.previous
    }

    pub fn stats(&self) -> &SampleStats {
        &self.stats
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn burn_in(&self) -> usize {
        self.burn_in
    }

    pub fn thinning(&self) -> usize {
        self.thinning
    }

    /// Inner iterations run on the samples of the last outer step.
    pub fn importance_iterations(&self) -> usize {
        self.importance_iterations
    }

    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }
}

fn log_change(what: &str, change: Change, value: usize) {
    match change {
        Change::Increased => info!(value, "increasing {what}"),
        Change::Decreased => info!(value, "decreasing {what}"),
        Change::Unchanged => {}
    }
}

/// First sequence of `path`, checked against the target's dimensions.
fn read_initial_sample(path: &Path, target: &TargetStats) -> Result<Vec<usize>, TrainError> {
    let invalid = |reason: String| TrainError::InitialSample {
        path: path.to_path_buf(),
        reason,
    };
    let sequences = read_alignment(path).map_err(|e| invalid(e.to_string()))?;
    let sequence = sequences.row(0).to_vec();
    if sequence.len() != target.n() {
        return Err(invalid(format!(
            "expected {} positions, found {}",
            target.n(),
            sequence.len()
        )));
    }
    if let Some(&a) = sequence.iter().find(|&&a| a >= target.q()) {
        return Err(invalid(format!(
            "category {a} out of range for alphabet size {}",
            target.q()
        )));
    }
    Ok(sequence)
}
