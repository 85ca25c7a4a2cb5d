//! Persistence of sample statistics.
//!
//! | file | contents |
//! |------|----------|
//! | `MC_samples_<id>.txt` | `chains draws N` header, then one sequence per line, chain-major |
//! | `MC_energies_<id>.txt` | one line of draw energies per chain |
//! | `stat_MC_1p[_sigma]_<id>` | 1p frequencies (`i a value`) or `.npy` |
//! | `stat_MC_2p[_sigma]_<id>` | 2p frequencies (`i j a b value`) or `.npy` |
//! | `overlap_<id>.txt` | `distance mean sigma` |
//! | `overlap_inf_<id>.txt` | cross-chain overlap and its error |
//! | `ergo_<id>.txt` | auto, check, cross, auto-cross err, cross-check err |

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bmdca_core::CouplingTensor;
use bmdca_models::io::write_npy;
use bmdca_models::{ModelError, OutputFormat};
use ndarray::Array2;

use crate::stats::SampleStats;

impl SampleStats {
    /// Write samples, energies, frequencies and, with `with_correlations`,
    /// the overlap diagnostics for checkpoint `id`.
    pub fn write_outputs(
        &self,
        dir: &Path,
        id: &str,
        format: OutputFormat,
        with_correlations: bool,
    ) -> Result<(), ModelError> {
        self.write_frequencies(dir, id, format)?;
        self.write_samples(&dir.join(format!("MC_samples_{id}.txt")))?;
        self.write_energies(&dir.join(format!("MC_energies_{id}.txt")))?;
        if with_correlations {
            self.write_correlations(dir, id)?;
        }
        Ok(())
    }

    pub fn write_samples(&self, path: &Path) -> Result<(), ModelError> {
        let samples = self.samples();
        let (draws, n, chains) = samples.dim();
        write_lines(path, |out| {
            writeln!(out, "{chains} {draws} {n}")?;
            for c in 0..chains {
                for m in 0..draws {
                    let line: Vec<String> =
                        (0..n).map(|i| samples[[m, i, c]].to_string()).collect();
                    writeln!(out, "{}", line.join(" "))?;
                }
            }
            Ok(())
        })
    }

    pub fn write_energies(&self, path: &Path) -> Result<(), ModelError> {
        let energies = self.energies();
        write_lines(path, |out| {
            for chain in energies.columns() {
                let line: Vec<String> = chain.iter().map(f64::to_string).collect();
                writeln!(out, "{}", line.join(" "))?;
            }
            Ok(())
        })
    }

    pub fn write_frequencies(
        &self,
        dir: &Path,
        id: &str,
        format: OutputFormat,
    ) -> Result<(), ModelError> {
        let f = self.frequencies();
        match format {
            OutputFormat::Text => {
                write_1p_text(&f.frequency_1p, &dir.join(format!("stat_MC_1p_{id}.txt")))?;
                write_1p_text(
                    &f.frequency_1p_sigma,
                    &dir.join(format!("stat_MC_1p_sigma_{id}.txt")),
                )?;
                write_2p_text(&f.frequency_2p, &dir.join(format!("stat_MC_2p_{id}.txt")))?;
                write_2p_text(
                    &f.frequency_2p_sigma,
                    &dir.join(format!("stat_MC_2p_sigma_{id}.txt")),
                )
            }
            OutputFormat::Npy => {
                write_npy(&f.frequency_1p, &dir.join(format!("stat_MC_1p_{id}.npy")))?;
                write_npy(
                    &f.frequency_1p_sigma,
                    &dir.join(format!("stat_MC_1p_sigma_{id}.npy")),
                )?;
                write_npy(
                    f.frequency_2p.as_array(),
                    &dir.join(format!("stat_MC_2p_{id}.npy")),
                )?;
                write_npy(
                    f.frequency_2p_sigma.as_array(),
                    &dir.join(format!("stat_MC_2p_sigma_{id}.npy")),
                )
            }
        }
    }

    pub fn write_correlations(&self, dir: &Path, id: &str) -> Result<(), ModelError> {
        let corr = self.correlation_stats();
        write_lines(&dir.join(format!("overlap_{id}.txt")), |out| {
            for point in &corr.overlap_curve {
                writeln!(out, "{} {} {}", point.distance, point.mean, point.sigma)?;
            }
            Ok(())
        })?;
        write_lines(&dir.join(format!("overlap_inf_{id}.txt")), |out| {
            writeln!(out, "{} {}", corr.cross_corr, corr.cross_corr_sigma)
        })?;
        write_lines(&dir.join(format!("ergo_{id}.txt")), |out| {
            writeln!(
                out,
                "{} {} {} {} {}",
                corr.auto_corr,
                corr.check_corr,
                corr.cross_corr,
                corr.auto_cross_err,
                corr.cross_check_err
            )
        })
    }
}

fn write_1p_text(frequencies: &Array2<f64>, path: &Path) -> Result<(), ModelError> {
    write_lines(path, |out| {
        for ((a, i), value) in frequencies.indexed_iter() {
            writeln!(out, "{i} {a} {value}")?;
        }
        Ok(())
    })
}

fn write_2p_text(frequencies: &CouplingTensor, path: &Path) -> Result<(), ModelError> {
    let dims = frequencies.dims();
    write_lines(path, |out| {
        for (k, i, j) in dims.pairs() {
            for a in 0..dims.q {
                for b in 0..dims.q {
                    writeln!(out, "{i} {j} {a} {b} {}", frequencies.as_array()[[k, a, b]])?;
                }
            }
        }
        Ok(())
    })
}

fn write_lines(
    path: &Path,
    body: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<(), ModelError> {
    let file = File::create(path).map_err(|e| ModelError::io(path, e))?;
    let mut out = BufWriter::new(file);
    body(&mut out)
        .and_then(|()| out.flush())
        .map_err(|e| ModelError::io(path, e))
}
