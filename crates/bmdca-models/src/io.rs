//! Persistence of field/coupling tensors.
//!
//! Text files hold one coefficient per line, couplings first:
//!
//! ```text
//! J i j a b value      (i < j)
//! h i a value
//! ```
//!
//! Values are written with Rust's shortest round-trip representation, so a
//! reloaded file reproduces the tensors bit for bit. The binary format stores
//! fields (`Q × N`) and couplings (`pairs × Q × Q`) as two `.npy` arrays.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bmdca_core::{CouplingTensor, Dims, PottsTensors};
use ndarray::{Array2, Array3};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};

use crate::error::ModelError;

/// On-disk layout selected by the `output_binary` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Npy,
}

impl OutputFormat {
    pub const fn from_binary_flag(binary: bool) -> Self {
        if binary {
            Self::Npy
        } else {
            Self::Text
        }
    }
}

/// Which of the model's tensors a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorKind {
    Parameters,
    Gradients,
    LearningRates,
}

impl TensorKind {
    const fn stem(self) -> &'static str {
        match self {
            Self::Parameters => "parameters",
            Self::Gradients => "gradients",
            Self::LearningRates => "learning_rates",
        }
    }

    /// Text file name for checkpoint `id`.
    pub fn text_path(self, dir: &Path, id: &str) -> PathBuf {
        dir.join(format!("{}_{id}.txt", self.stem()))
    }

    /// `(fields, couplings)` `.npy` file names for checkpoint `id`.
    pub fn npy_paths(self, dir: &Path, id: &str) -> (PathBuf, PathBuf) {
        (
            dir.join(format!("{}_h_{id}.npy", self.stem())),
            dir.join(format!("{}_J_{id}.npy", self.stem())),
        )
    }
}

pub fn write_tensors(
    tensors: &PottsTensors,
    dir: &Path,
    kind: TensorKind,
    id: &str,
    format: OutputFormat,
) -> Result<(), ModelError> {
    match format {
        OutputFormat::Text => write_text(tensors, &kind.text_path(dir, id)),
        OutputFormat::Npy => {
            let (h_path, j_path) = kind.npy_paths(dir, id);
            write_npy(&tensors.h, &h_path)?;
            write_npy(tensors.j.as_array(), &j_path)
        }
    }
}

pub fn read_tensors(
    dims: Dims,
    dir: &Path,
    kind: TensorKind,
    id: &str,
    format: OutputFormat,
) -> Result<PottsTensors, ModelError> {
    match format {
        OutputFormat::Text => read_text(dims, &kind.text_path(dir, id)),
        OutputFormat::Npy => {
            let (h_path, j_path) = kind.npy_paths(dir, id);
            let h: Array2<f64> = read_npy(&h_path)?;
            let j: Array3<f64> = read_npy(&j_path)?;
            Ok(PottsTensors::from_parts(h, CouplingTensor::from_array(dims, j)?)?)
        }
    }
}

/// Write one array as `.npy`.
pub fn write_npy<T: WriteNpyExt + ?Sized>(array: &T, path: &Path) -> Result<(), ModelError> {
    let file = File::create(path).map_err(|e| ModelError::io(path, e))?;
    array
        .write_npy(BufWriter::new(file))
        .map_err(|source| ModelError::NpyWrite {
            path: path.to_path_buf(),
            source,
        })
}

/// Read one `.npy` array.
pub fn read_npy<T: ReadNpyExt>(path: &Path) -> Result<T, ModelError> {
    let file = File::open(path).map_err(|e| ModelError::io(path, e))?;
    T::read_npy(file).map_err(|source| ModelError::NpyRead {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_text(tensors: &PottsTensors, path: &Path) -> Result<(), ModelError> {
    let dims = tensors.dims();
    let file = File::create(path).map_err(|e| ModelError::io(path, e))?;
    let mut out = BufWriter::new(file);

    let write_all = |out: &mut BufWriter<File>| -> std::io::Result<()> {
        for (k, i, j) in dims.pairs() {
            for a in 0..dims.q {
                for b in 0..dims.q {
                    writeln!(out, "J {i} {j} {a} {b} {}", tensors.j.as_array()[[k, a, b]])?;
                }
            }
        }
        for i in 0..dims.n {
            for a in 0..dims.q {
                writeln!(out, "h {i} {a} {}", tensors.h[[a, i]])?;
            }
        }
        out.flush()
    };
    write_all(&mut out).map_err(|e| ModelError::io(path, e))
}

pub fn read_text(dims: Dims, path: &Path) -> Result<PottsTensors, ModelError> {
    let contents = fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
    let mut tensors = PottsTensors::zeros(dims);

    for (line_no, line) in contents.lines().enumerate() {
        let line_no = line_no + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some((&tag, rest)) = fields.split_first() else {
            continue;
        };

        let parse_index = |s: &str, bound: usize, what: &str| -> Result<usize, ModelError> {
            let value: usize = s
                .parse()
                .map_err(|_| ModelError::format(path, line_no, format!("bad {what} '{s}'")))?;
            if value >= bound {
                return Err(ModelError::format(
                    path,
                    line_no,
                    format!("{what} {value} out of range (< {bound})"),
                ));
            }
            Ok(value)
        };
        let parse_value = |s: &str| -> Result<f64, ModelError> {
            s.parse()
                .map_err(|_| ModelError::format(path, line_no, format!("bad value '{s}'")))
        };

        match (tag, rest) {
            ("J", &[i, j, a, b, value]) => {
                let i = parse_index(i, dims.n, "position")?;
                let j = parse_index(j, dims.n, "position")?;
                if i >= j {
                    return Err(ModelError::format(
                        path,
                        line_no,
                        format!("coupling ({i}, {j}) must have i < j"),
                    ));
                }
                let a = parse_index(a, dims.q, "category")?;
                let b = parse_index(b, dims.q, "category")?;
                tensors.j.set(i, j, a, b, parse_value(value)?);
            }
            ("h", &[i, a, value]) => {
                let i = parse_index(i, dims.n, "position")?;
                let a = parse_index(a, dims.q, "category")?;
                tensors.h[[a, i]] = parse_value(value)?;
            }
            _ => {
                return Err(ModelError::format(
                    path,
                    line_no,
                    format!("unrecognised line '{line}'"),
                ))
            }
        }
    }

    Ok(tensors)
}
