//! Target statistics: the empirical frequencies a model is fitted to.

use std::fs;
use std::path::Path;

use bmdca_core::{CouplingTensor, Dims, ShapeError};
use ndarray::{Array2, ArrayView2};

use crate::error::ModelError;

/// Frequencies are clamped to `[EPS, 1 - EPS]` before taking logarithms.
const EPS: f64 = 1e-6;

/// Read-only statistics of the reference dataset.
///
/// Two-point frequencies share the coupling layout: one `Q × Q` block per
/// position pair `i < j`, indexed `[a, b]` for categories at `i` and `j`.
#[derive(Debug, Clone)]
pub struct TargetStats {
    dims: Dims,
    m: usize,
    m_eff: f64,
    frequency_1p: Array2<f64>,
    frequency_2p: CouplingTensor,
    rel_entropy_grad_1p: Array2<f64>,
}

impl TargetStats {
    /// Wrap precomputed frequencies.
    pub fn new(
        frequency_1p: Array2<f64>,
        frequency_2p: CouplingTensor,
        m: usize,
        m_eff: f64,
    ) -> Result<Self, ShapeError> {
        let dims = frequency_2p.dims();
        if frequency_1p.shape() != dims.field_shape() {
            return Err(ShapeError {
                what: "1p frequencies",
                expected: dims.field_shape().to_vec(),
                found: frequency_1p.shape().to_vec(),
            });
        }
        let rel_entropy_grad_1p = relative_entropy_gradient(&frequency_1p, dims.q);
        Ok(Self {
            dims,
            m,
            m_eff,
            frequency_1p,
            frequency_2p,
            rel_entropy_grad_1p,
        })
    }

    /// Count (weighted) frequencies over an `M × N` alignment of category
    /// indices. Without weights every sequence counts once.
    ///
    /// Weights must be finite and non-negative with a positive sum.
    pub fn from_alignment(
        alignment: ArrayView2<'_, usize>,
        q: usize,
        weights: Option<&[f64]>,
    ) -> Result<Self, ModelError> {
        let (m, n) = alignment.dim();
        if let Some(&value) = alignment.iter().find(|&&a| a >= q) {
            return Err(ModelError::CategoryOutOfRange { value, q });
        }
        let dims = Dims::new(n, q);
        if let Some(w) = weights {
            if w.len() != m {
                return Err(ShapeError {
                    what: "sequence weights",
                    expected: vec![m],
                    found: vec![w.len()],
                }
                .into());
            }
            let invalid = w
                .iter()
                .enumerate()
                .find(|(_, x)| !(x.is_finite() && **x >= 0.0));
            if let Some((s, &bad)) = invalid {
                return Err(ModelError::InvalidWeights(format!(
                    "weight {bad} of sequence {s} is not a finite non-negative number"
                )));
            }
        }
        let weight = |s: usize| weights.map_or(1.0, |w| w[s]);
        let m_eff: f64 = (0..m).map(weight).sum();
        if m_eff <= 0.0 {
            return Err(ModelError::InvalidWeights(format!(
                "effective sequence count {m_eff} must be positive"
            )));
        }

        let mut f1 = Array2::<f64>::zeros(dims.field_shape());
        let mut f2 = CouplingTensor::zeros(dims);
        for (s, seq) in alignment.outer_iter().enumerate() {
            let w = weight(s);
            for i in 0..n {
                f1[[seq[i], i]] += w;
            }
            for (k, i, j) in dims.pairs() {
                f2.as_array_mut()[[k, seq[i], seq[j]]] += w;
            }
        }
        f1.mapv_inplace(|x| x / m_eff);
        f2.as_array_mut().mapv_inplace(|x| x / m_eff);

        tracing::info!(m, n, q, m_eff, "target statistics computed");
        Ok(Self::new(f1, f2, m, m_eff)?)
    }

    pub const fn dims(&self) -> Dims {
        self.dims
    }

    pub const fn n(&self) -> usize {
        self.dims.n
    }

    pub const fn q(&self) -> usize {
        self.dims.q
    }

    /// Number of sequences.
    pub const fn m(&self) -> usize {
        self.m
    }

    /// Effective number of sequences (sum of weights).
    pub const fn effective_m(&self) -> f64 {
        self.m_eff
    }

    /// `Q × N`, indexed `[a, i]`.
    pub fn frequency_1p(&self) -> &Array2<f64> {
        &self.frequency_1p
    }

    pub fn frequency_2p(&self) -> &CouplingTensor {
        &self.frequency_2p
    }

    /// Gradient of the relative entropy to a uniform background, `Q × N`.
    pub fn rel_entropy_grad_1p(&self) -> &Array2<f64> {
        &self.rel_entropy_grad_1p
    }
}

/// `ln(f(1-b) / (b(1-f)))` with background `b = 1/Q`.
fn relative_entropy_gradient(frequency_1p: &Array2<f64>, q: usize) -> Array2<f64> {
    let b = 1.0 / q as f64;
    frequency_1p.mapv(|f| {
        let f = f.clamp(EPS, 1.0 - EPS);
        (f * (1.0 - b) / (b * (1.0 - f))).ln()
    })
}

/// Read an alignment of category indices: one sequence per line, values
/// separated by whitespace. Blank lines and `#` comments are skipped.
pub fn read_alignment(path: &Path) -> Result<Array2<usize>, ModelError> {
    let contents = fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
    let mut rows: Vec<Vec<usize>> = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<usize>().map_err(|_| {
                    ModelError::format(path, line_no + 1, format!("bad category '{tok}'"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(ModelError::format(
                    path,
                    line_no + 1,
                    format!("expected {} positions, found {}", first.len(), row.len()),
                ));
            }
        }
        rows.push(row);
    }

    let n = rows.first().map_or(0, Vec::len);
    if n == 0 {
        return Err(ModelError::format(path, 1, "alignment is empty"));
    }
    let m = rows.len();
    let flat: Vec<usize> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((m, n), flat).map_err(|_| ShapeError {
        what: "alignment",
        expected: vec![m, n],
        found: vec![m * n],
    })?)
}

/// Read one weight per line.
pub fn read_weights(path: &Path) -> Result<Vec<f64>, ModelError> {
    let contents = fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line_no, line)| {
            line.trim().parse::<f64>().map_err(|_| {
                ModelError::format(path, line_no + 1, format!("bad weight '{}'", line.trim()))
            })
        })
        .collect()
}
