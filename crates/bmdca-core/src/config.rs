//! Training configuration.
//!
//! Options live in a `[bmDCA]` table of a TOML file. Every key is dispatched
//! through [`OPTIONS`], a static table from option name to a typed setter, so
//! an unrecognised key fails at load time with [`ConfigError::UnknownKey`].
//!
//! ```toml
//! [bmDCA]
//! lambda_reg1 = 0.01
//! step_max = 500
//! check_ergo = 1          # booleans also accept 0/1
//! init_sample_file = "seed.txt"
//! ```
//!
//! Tables other than `[bmDCA]` are ignored, as is a file without one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use toml::Value;

use crate::error::ConfigError;

/// Name of the table holding the training options.
pub const SECTION: &str = "bmDCA";

/// Every option of a Boltzmann-machine run.
///
/// Defaults reproduce the reference bmDCA settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BmConfig {
    // BM settings
    /// L2 regularization strength for fields
    pub lambda_reg1: f64,
    /// L2 regularization strength for couplings
    pub lambda_reg2: f64,
    /// Maximum number of outer steps
    pub step_max: usize,
    /// Convergence threshold on the total error
    pub error_max: f64,
    /// Checkpoint interval in outer steps (also the run-log buffer length)
    pub save_parameters: usize,
    /// Seed of the generator that draws per-step sampling seeds
    pub random_seed: u64,

    // Learning rate settings
    pub epsilon_0_h: f64,
    #[serde(rename = "epsilon_0_J")]
    pub epsilon_0_j: f64,
    pub adapt_up: f64,
    pub adapt_down: f64,
    pub min_step_h: f64,
    pub max_step_h: f64,
    #[serde(rename = "min_step_J")]
    pub min_step_j: f64,
    /// Coupling step ceiling before division by `N`
    #[serde(rename = "max_step_J_N")]
    pub max_step_j_n: f64,
    /// Significance threshold on the normalized deviation; negative updates all
    pub error_min_update: f64,

    // Sampling time settings
    /// Initial burn-in
    pub t_wait_0: usize,
    /// Initial thinning interval
    pub delta_t_0: usize,
    pub check_ergo: bool,
    pub adapt_up_time: f64,
    pub adapt_down_time: f64,
    /// Cap on ergodicity-driven resampling attempts within one step
    pub max_resample_attempts: usize,
    /// Ceiling on burn-in growth
    pub t_wait_max: usize,
    /// Ceiling on thinning growth
    pub delta_t_max: usize,

    // Importance sampling settings
    pub step_importance_max: usize,
    pub coherence_min: f64,

    // MCMC settings
    /// Stochastic-sampling-size mode: one draw per chain, `M_eff` chains
    pub use_ss: bool,
    /// Draws per chain
    #[serde(rename = "M")]
    pub draws_per_chain: usize,
    /// Number of independent chains
    pub count_max: usize,
    pub init_sample: bool,
    pub init_sample_file: PathBuf,
    /// Scale coupling regularization by the relative-entropy gradients
    pub use_pos_reg: bool,
    pub temperature: f64,

    /// Write tensors as `.npy` instead of text
    pub output_binary: bool,
}

impl Default for BmConfig {
    fn default() -> Self {
        Self {
            lambda_reg1: 0.01,
            lambda_reg2: 0.01,
            step_max: 2000,
            error_max: 1e-5,
            save_parameters: 100,
            random_seed: 1,

            epsilon_0_h: 0.01,
            epsilon_0_j: 0.001,
            adapt_up: 1.5,
            adapt_down: 0.6,
            min_step_h: 0.001,
            max_step_h: 2.5,
            min_step_j: 1e-5,
            max_step_j_n: 2.5,
            error_min_update: -1.0,

            t_wait_0: 10_000,
            delta_t_0: 100,
            check_ergo: true,
            adapt_up_time: 1.5,
            adapt_down_time: 0.6,
            max_resample_attempts: 100,
            t_wait_max: 1_000_000,
            delta_t_max: 10_000,

            step_importance_max: 1,
            coherence_min: 0.9999,

            use_ss: false,
            draws_per_chain: 1000,
            count_max: 10,
            init_sample: false,
            init_sample_file: PathBuf::new(),
            use_pos_reg: false,
            temperature: 1.0,

            output_binary: false,
        }
    }
}

/// Typed setter for one option.
pub type Setter = fn(&mut BmConfig, &Value) -> Result<(), ConfigError>;

macro_rules! option_table {
    ($($key:literal => $field:ident : $parse:ident),* $(,)?) => {
        /// Option name to typed setter, in file order.
        pub const OPTIONS: &[(&str, Setter)] = &[
            $(($key, |config: &mut BmConfig, value: &Value| {
                config.$field = $parse($key, value)?;
                Ok(())
            })),*
        ];
    };
}

option_table! {
    "lambda_reg1" => lambda_reg1: real,
    "lambda_reg2" => lambda_reg2: real,
    "step_max" => step_max: count,
    "error_max" => error_max: real,
    "save_parameters" => save_parameters: count,
    "random_seed" => random_seed: seed,
    "epsilon_0_h" => epsilon_0_h: real,
    "epsilon_0_J" => epsilon_0_j: real,
    "adapt_up" => adapt_up: real,
    "adapt_down" => adapt_down: real,
    "min_step_h" => min_step_h: real,
    "max_step_h" => max_step_h: real,
    "min_step_J" => min_step_j: real,
    "max_step_J_N" => max_step_j_n: real,
    "error_min_update" => error_min_update: real,
    "t_wait_0" => t_wait_0: count,
    "delta_t_0" => delta_t_0: count,
    "check_ergo" => check_ergo: flag,
    "adapt_up_time" => adapt_up_time: real,
    "adapt_down_time" => adapt_down_time: real,
    "max_resample_attempts" => max_resample_attempts: count,
    "t_wait_max" => t_wait_max: count,
    "delta_t_max" => delta_t_max: count,
    "step_importance_max" => step_importance_max: count,
    "coherence_min" => coherence_min: real,
    "use_ss" => use_ss: flag,
    "M" => draws_per_chain: count,
    "count_max" => count_max: count,
    "init_sample" => init_sample: flag,
    "init_sample_file" => init_sample_file: path,
    "use_pos_reg" => use_pos_reg: flag,
    "temperature" => temperature: real,
    "output_binary" => output_binary: flag,
}

fn invalid(key: &str, expected: &'static str, value: &Value) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        expected,
        value: value.to_string(),
    }
}

fn real(key: &str, value: &Value) -> Result<f64, ConfigError> {
    match value {
        Value::Float(x) => Ok(*x),
        Value::Integer(x) => Ok(*x as f64),
        other => Err(invalid(key, "a real number", other)),
    }
}

fn count(key: &str, value: &Value) -> Result<usize, ConfigError> {
    match value {
        Value::Integer(x) if *x >= 0 => Ok(*x as usize),
        other => Err(invalid(key, "a non-negative integer", other)),
    }
}

fn seed(key: &str, value: &Value) -> Result<u64, ConfigError> {
    match value {
        Value::Integer(x) if *x >= 0 => Ok(*x as u64),
        other => Err(invalid(key, "a non-negative integer", other)),
    }
}

fn flag(key: &str, value: &Value) -> Result<bool, ConfigError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Integer(0) => Ok(false),
        Value::Integer(1) => Ok(true),
        Value::String(s) if s == "true" || s == "1" => Ok(true),
        Value::String(s) if s == "false" || s == "0" => Ok(false),
        other => Err(invalid(key, "true/false or 0/1", other)),
    }
}

fn path(key: &str, value: &Value) -> Result<PathBuf, ConfigError> {
    match value {
        Value::String(s) => Ok(PathBuf::from(s)),
        other => Err(invalid(key, "a path string", other)),
    }
}

/// Read `key=value` lines grouped under `[section]` headers.
///
/// Values are typed by shape: integer, real, `true`/`false`, otherwise a bare
/// string (surrounding quotes removed). Returns `None` when a line is neither
/// a comment, a header nor a `key=value` pair.
fn parse_key_value(contents: &str) -> Option<toml::Table> {
    let mut root = toml::Table::new();
    let mut section: Option<String> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[') {
            let name = header.strip_suffix(']')?.trim();
            root.entry(name.to_string())
                .or_insert_with(|| Value::Table(toml::Table::new()));
            section = Some(name.to_string());
            continue;
        }
        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        let value = bare_value(value.trim());
        match &section {
            Some(name) => {
                if let Some(Value::Table(table)) = root.get_mut(name) {
                    table.insert(key.to_string(), value);
                }
            }
            None => {
                root.insert(key.to_string(), value);
            }
        }
    }
    Some(root)
}

fn bare_value(raw: &str) -> Value {
    if let Ok(x) = raw.parse::<i64>() {
        Value::Integer(x)
    } else if let Ok(x) = raw.parse::<f64>() {
        Value::Float(x)
    } else if raw == "true" || raw == "false" {
        Value::Boolean(raw == "true")
    } else {
        let unquoted = raw
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
            .unwrap_or(raw);
        Value::String(unquoted.to_string())
    }
}

#[derive(Serialize)]
struct ConfigFile<'a> {
    #[serde(rename = "bmDCA")]
    bmdca: &'a BmConfig,
}

impl BmConfig {
    /// Load a config file on top of the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!(path = %path.display(), "Loaded bmDCA config");
        Ok(config)
    }

    /// Parse config text on top of the defaults.
    ///
    /// Text that is not TOML is read in the line format of the original bmDCA
    /// tool, `key=value` with bare values.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = match contents.parse() {
            Ok(table) => table,
            Err(err) => match parse_key_value(contents) {
                Some(table) => {
                    tracing::debug!("config is not TOML, read as key=value lines");
                    table
                }
                None => return Err(err.into()),
            },
        };
        let mut config = Self::default();
        match table.get(SECTION) {
            Some(Value::Table(options)) => {
                for (key, value) in options {
                    config.set(key, value)?;
                }
            }
            Some(other) => return Err(invalid(SECTION, "a table", other)),
            None => {}
        }
        Ok(config)
    }

    /// Set one option by name.
    pub fn set(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
        let (_, setter) = OPTIONS
            .iter()
            .find(|(name, _)| *name == key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        setter(self, value)
    }

    /// Render the effective configuration as a `[bmDCA]` table.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&ConfigFile { bmdca: self })?)
    }

    /// Persist the effective configuration so the run can be reproduced.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_toml_string()?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject values the training loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, key: &'static str, reason: &str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    key,
                    reason: reason.to_string(),
                })
            }
        }

        check(self.lambda_reg1 >= 0.0, "lambda_reg1", "must be >= 0")?;
        check(self.lambda_reg2 >= 0.0, "lambda_reg2", "must be >= 0")?;
        check(self.save_parameters >= 1, "save_parameters", "must be >= 1")?;
        check(self.epsilon_0_h > 0.0, "epsilon_0_h", "must be > 0")?;
        check(self.epsilon_0_j > 0.0, "epsilon_0_J", "must be > 0")?;
        check(self.adapt_up >= 1.0, "adapt_up", "must be >= 1")?;
        check(
            self.adapt_down > 0.0 && self.adapt_down <= 1.0,
            "adapt_down",
            "must lie in (0, 1]",
        )?;
        check(self.min_step_h > 0.0, "min_step_h", "must be > 0")?;
        check(
            self.max_step_h >= self.min_step_h,
            "max_step_h",
            "must be >= min_step_h",
        )?;
        check(self.min_step_j > 0.0, "min_step_J", "must be > 0")?;
        check(self.max_step_j_n > 0.0, "max_step_J_N", "must be > 0")?;
        check(self.t_wait_0 >= 1, "t_wait_0", "must be >= 1")?;
        check(self.delta_t_0 >= 1, "delta_t_0", "must be >= 1")?;
        check(
            self.t_wait_max >= self.t_wait_0,
            "t_wait_max",
            "must be >= t_wait_0",
        )?;
        check(
            self.delta_t_max >= self.delta_t_0,
            "delta_t_max",
            "must be >= delta_t_0",
        )?;
        check(self.adapt_up_time > 1.0, "adapt_up_time", "must be > 1")?;
        check(
            self.adapt_down_time > 0.0 && self.adapt_down_time <= 1.0,
            "adapt_down_time",
            "must lie in (0, 1]",
        )?;
        check(
            self.max_resample_attempts >= 1,
            "max_resample_attempts",
            "must be >= 1",
        )?;
        check(
            self.step_importance_max >= 1,
            "step_importance_max",
            "must be >= 1",
        )?;
        check(
            self.coherence_min > 0.0 && self.coherence_min < 1.0,
            "coherence_min",
            "must lie in (0, 1)",
        )?;
        check(self.draws_per_chain >= 1, "M", "must be >= 1")?;
        check(self.count_max >= 1, "count_max", "must be >= 1")?;
        check(
            !self.init_sample || !self.init_sample_file.as_os_str().is_empty(),
            "init_sample_file",
            "required when init_sample is set",
        )?;
        check(self.temperature > 0.0, "temperature", "must be > 0")?;
        Ok(())
    }

    /// Align the sampling settings with the target dataset.
    ///
    /// Stochastic-sampling-size mode draws once from `round(M_eff)` chains.
    /// The ergodicity check needs two draws per chain for autocorrelations and
    /// two chains for the cross-chain reference, so it is switched off when
    /// `M == 1` or `count_max < 2`.
    pub fn reconcile(&mut self, m_eff: f64) {
        if self.use_ss {
            self.draws_per_chain = 1;
            self.count_max = (m_eff.round() as usize).max(1);
            tracing::info!(
                chains = self.count_max,
                "Stochastic sampling size: one draw per chain"
            );
        }
        if self.draws_per_chain == 1 && self.check_ergo {
            self.check_ergo = false;
            tracing::warn!("Disabling 'check_ergo' when M=1");
        }
        if self.count_max < 2 && self.check_ergo {
            self.check_ergo = false;
            tracing::warn!("Disabling 'check_ergo' with a single chain");
        }
    }

    /// Coupling step ceiling for `n` positions.
    pub fn max_step_j(&self, n: usize) -> f64 {
        self.max_step_j_n / n as f64
    }
}
