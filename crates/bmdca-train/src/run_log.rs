//! Per-step run log (`bmdca_run.log`).
//!
//! Rows are buffered in memory and appended to the file on [`RunLog::flush`],
//! which also clears the buffer. Columns are tab separated; the ergodicity
//! columns appear only when the ergodicity check is on.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::TrainError;
use crate::error_gradient::ErrorReport;
use bmdca_observers::{CorrelationStats, EnergyStats};

pub const RUN_LOG_FILE: &str = "bmdca_run.log";

const ERGODICITY_COLUMNS: [&str; 10] = [
    "auto-corr",
    "cross-corr",
    "check-corr",
    "auto-cross-err",
    "cross-check-err",
    "energy-start-avg",
    "energy-start-sigma",
    "energy-end-avg",
    "energy-end-sigma",
    "energy-err",
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErgodicityRow {
    pub auto_corr: f64,
    pub cross_corr: f64,
    pub check_corr: f64,
    pub auto_cross_err: f64,
    pub cross_check_err: f64,
    pub energy_start_avg: f64,
    pub energy_start_sigma: f64,
    pub energy_end_avg: f64,
    pub energy_end_sigma: f64,
    pub energy_err: f64,
}

impl ErgodicityRow {
    pub fn new(energy: &EnergyStats, corr: &CorrelationStats) -> Self {
        Self {
            auto_corr: corr.auto_corr,
            cross_corr: corr.cross_corr,
            check_corr: corr.check_corr,
            auto_cross_err: corr.auto_cross_err,
            cross_check_err: corr.cross_check_err,
            energy_start_avg: energy.start_mean,
            energy_start_sigma: energy.start_sigma,
            energy_end_avg: energy.end_mean,
            energy_end_sigma: energy.end_sigma,
            energy_err: energy.err,
        }
    }

    fn values(&self) -> [f64; 10] {
        [
            self.auto_corr,
            self.cross_corr,
            self.check_corr,
            self.auto_cross_err,
            self.cross_check_err,
            self.energy_start_avg,
            self.energy_start_sigma,
            self.energy_end_avg,
            self.energy_end_sigma,
            self.energy_err,
        ]
    }
}

/// One outer step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunLogRow {
    pub step: usize,
    /// Chains per sampling pass
    pub chains: usize,
    pub burn_in: usize,
    pub thinning: usize,
    pub ergodicity: ErgodicityRow,
    pub error_h: f64,
    pub error_j: f64,
    pub error_tot: f64,
    pub seed: u64,
    /// Seconds
    pub step_time: f64,
}

impl RunLogRow {
    pub fn record_errors(&mut self, report: &ErrorReport) {
        self.error_h = report.error_1p;
        self.error_j = report.error_2p;
        self.error_tot = report.error_tot;
    }
}

#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    check_ergo: bool,
    rows: Vec<RunLogRow>,
}

impl RunLog {
    /// Create `dir/bmdca_run.log` holding only the header.
    pub fn create(dir: &Path, check_ergo: bool) -> Result<Self, TrainError> {
        let path = dir.join(RUN_LOG_FILE);
        let mut columns = vec!["step", "reps", "burn-in", "burn-between"];
        if check_ergo {
            columns.extend(ERGODICITY_COLUMNS);
        }
        columns.extend(["error-h", "error-J", "error-tot", "seed", "step-time"]);

        let file = File::create(&path).map_err(|e| TrainError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{}", columns.join("\t"))
            .and_then(|()| out.flush())
            .map_err(|e| TrainError::io(&path, e))?;

        Ok(Self {
            path,
            check_ergo,
            rows: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start the row of a new outer step.
    pub fn begin_row(&mut self, step: usize, chains: usize, burn_in: usize, thinning: usize) {
        self.rows.push(RunLogRow {
            step,
            chains,
            burn_in,
            thinning,
            ..Default::default()
        });
    }

    /// Row of the current step, if one was started since the last flush.
    pub fn current_mut(&mut self) -> Option<&mut RunLogRow> {
        self.rows.last_mut()
    }

    /// Rows not yet written.
    pub fn pending(&self) -> &[RunLogRow] {
        &self.rows
    }

    /// Append buffered rows to the file and clear the buffer.
    pub fn flush(&mut self) -> Result<(), TrainError> {
        if self.rows.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| TrainError::io(&self.path, e))?;
        let mut out = BufWriter::new(file);
        for row in &self.rows {
            self.write_row(&mut out, row)
                .map_err(|e| TrainError::io(&self.path, e))?;
        }
        out.flush().map_err(|e| TrainError::io(&self.path, e))?;
        tracing::debug!(rows = self.rows.len(), path = %self.path.display(), "run log flushed");
        self.rows.clear();
        Ok(())
    }

    fn write_row(&self, out: &mut impl Write, row: &RunLogRow) -> std::io::Result<()> {
        write!(
            out,
            "{}\t{}\t{}\t{}\t",
            row.step, row.chains, row.burn_in, row.thinning
        )?;
        if self.check_ergo {
            for value in row.ergodicity.values() {
                write!(out, "{value}\t")?;
            }
        }
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            row.error_h, row.error_j, row.error_tot, row.seed, row.step_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_columns() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::create(dir.path(), false).unwrap();
        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            text,
            "step\treps\tburn-in\tburn-between\terror-h\terror-J\terror-tot\tseed\tstep-time\n"
        );

        let log = RunLog::create(dir.path(), true).unwrap();
        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.trim_end().split('\t').count(), 19);
    }

    #[test]
    fn test_flush_appends_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::create(dir.path(), false).unwrap();
        log.begin_row(1, 10, 100, 5);
        if let Some(row) = log.current_mut() {
            row.error_h = 0.5;
            row.seed = 42;
        }
        log.begin_row(2, 10, 150, 5);
        log.flush().unwrap();
        assert!(log.pending().is_empty());

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1\t10\t100\t5\t0.5\t0\t0\t42\t0");
        assert!(lines[2].starts_with("2\t10\t150\t5\t"));

        // nothing buffered, nothing written
        log.flush().unwrap();
        assert_eq!(std::fs::read_to_string(log.path()).unwrap().lines().count(), 3);
    }
}
