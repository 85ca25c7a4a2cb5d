//! Field and coupling storage.
//!
//! Fields `h(a, i)` live in a `Q × N` array. Couplings `J_ij(a, b)` live in a
//! `(pairs, Q, Q)` array whose first axis enumerates the position pairs
//! `i < j` in row-major order, so the lower triangle has no storage at all.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ShapeError;

/// Sequence length `N` and alphabet size `Q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dims {
    /// Number of positions
    pub n: usize,
    /// Number of categories per position
    pub q: usize,
}

impl Dims {
    pub const fn new(n: usize, q: usize) -> Self {
        Self { n, q }
    }

    /// Number of position pairs `i < j`.
    pub const fn n_pairs(&self) -> usize {
        self.n * self.n.saturating_sub(1) / 2
    }

    /// Number of field coefficients, `N·Q`.
    pub const fn n_fields(&self) -> usize {
        self.n * self.q
    }

    /// Number of stored coupling coefficients, `N(N-1)/2 · Q²`.
    pub const fn n_couplings(&self) -> usize {
        self.n_pairs() * self.q * self.q
    }

    /// Row-major index of the pair `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics unless `i < j < N`.
    pub fn pair_index(&self, i: usize, j: usize) -> usize {
        assert!(
            i < j && j < self.n,
            "pair ({i}, {j}) is outside the upper triangle of {} positions",
            self.n
        );
        i * (2 * self.n - i - 1) / 2 + (j - i - 1)
    }

    /// Iterate `(pair_index, i, j)` over all pairs `i < j`.
    pub fn pairs(self) -> impl Iterator<Item = (usize, usize, usize)> {
        let n = self.n;
        (0..n)
            .flat_map(move |i| ((i + 1)..n).map(move |j| (i, j)))
            .enumerate()
            .map(|(k, (i, j))| (k, i, j))
    }

    pub const fn field_shape(&self) -> [usize; 2] {
        [self.q, self.n]
    }

    pub const fn coupling_shape(&self) -> [usize; 3] {
        [self.n_pairs(), self.q, self.q]
    }
}

/// Upper-triangular coupling tensor `J_ij(a, b)`, `i < j`.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingTensor {
    dims: Dims,
    data: Array3<f64>,
}

impl CouplingTensor {
    pub fn zeros(dims: Dims) -> Self {
        Self::filled(dims, 0.0)
    }

    pub fn filled(dims: Dims, value: f64) -> Self {
        Self {
            dims,
            data: Array3::from_elem(dims.coupling_shape(), value),
        }
    }

    /// Wrap a `(pairs, Q, Q)` array.
    pub fn from_array(dims: Dims, data: Array3<f64>) -> Result<Self, ShapeError> {
        if data.shape() != dims.coupling_shape() {
            return Err(ShapeError {
                what: "coupling tensor",
                expected: dims.coupling_shape().to_vec(),
                found: data.shape().to_vec(),
            });
        }
        Ok(Self { dims, data })
    }

    pub const fn dims(&self) -> Dims {
        self.dims
    }

    /// `J_ij(a, b)` for `i < j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize, a: usize, b: usize) -> f64 {
        self.data[[self.dims.pair_index(i, j), a, b]]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, a: usize, b: usize, value: f64) {
        let k = self.dims.pair_index(i, j);
        self.data[[k, a, b]] = value;
    }

    /// `J_ij(a, b)` for any `i != j`. For `i > j` this reads the stored
    /// `J_ji(b, a)`.
    #[inline]
    pub fn get_symmetric(&self, i: usize, j: usize, a: usize, b: usize) -> f64 {
        if i < j {
            self.get(i, j, a, b)
        } else {
            self.get(j, i, b, a)
        }
    }

    /// The `Q × Q` block of pair `i < j`, indexed `[a, b]`.
    pub fn block(&self, i: usize, j: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(0), self.dims.pair_index(i, j))
    }

    pub fn as_array(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> &mut Array3<f64> {
        &mut self.data
    }
}

/// A field/coupling pair sharing one [`Dims`].
///
/// The same shape is used for model parameters, their gradient and the
/// per-coefficient learning rates.
#[derive(Debug, Clone, PartialEq)]
pub struct PottsTensors {
    /// Fields, shape `Q × N`, indexed `[a, i]`
    pub h: Array2<f64>,
    /// Couplings for `i < j`
    pub j: CouplingTensor,
}

impl PottsTensors {
    pub fn zeros(dims: Dims) -> Self {
        Self::filled(dims, 0.0, 0.0)
    }

    pub fn filled(dims: Dims, h_value: f64, j_value: f64) -> Self {
        Self {
            h: Array2::from_elem(dims.field_shape(), h_value),
            j: CouplingTensor::filled(dims, j_value),
        }
    }

    pub fn from_parts(h: Array2<f64>, j: CouplingTensor) -> Result<Self, ShapeError> {
        let dims = j.dims();
        if h.shape() != dims.field_shape() {
            return Err(ShapeError {
                what: "field tensor",
                expected: dims.field_shape().to_vec(),
                found: h.shape().to_vec(),
            });
        }
        Ok(Self { h, j })
    }

    pub const fn dims(&self) -> Dims {
        self.j.dims()
    }
}
