use std::ops::Range;

use ndarray::{s, Array2};

use crate::layout::DType;

/// Fully materialized transcoder output, ready for a sink.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputArray {
    /// Samples indexed `[frame, channel]`.
    Matrix(Array2<i16>),
    /// Frame bytes copied verbatim.
    Fragment(Vec<u8>),
}

impl OutputArray {
    /// Zero-filled array of `dtype` with `shape`; used when reassembling chunks.
    pub fn zeros(dtype: DType, shape: &[usize]) -> anyhow::Result<Self> {
        match (dtype, shape) {
            (DType::I16, &[rows, cols]) => Ok(OutputArray::Matrix(Array2::zeros((rows, cols)))),
            (DType::U8, &[len]) => Ok(OutputArray::Fragment(vec![0; len])),
            _ => anyhow::bail!(
                "unsupported dataset: dtype {} with rank {}",
                dtype.name(),
                shape.len()
            ),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            OutputArray::Matrix(_) => DType::I16,
            OutputArray::Fragment(_) => DType::U8,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            OutputArray::Matrix(m) => m.shape().to_vec(),
            OutputArray::Fragment(b) => vec![b.len()],
        }
    }

    /// Frame-dimension extent for matrices, byte count for fragments.
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.shape().iter().any(|&d| d == 0)
    }

    pub fn as_matrix(&self) -> Option<&Array2<i16>> {
        match self {
            OutputArray::Matrix(m) => Some(m),
            OutputArray::Fragment(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            OutputArray::Fragment(b) => Some(b),
            OutputArray::Matrix(_) => None,
        }
    }

    /// Little-endian bytes of the elements inside `region`, row-major.
    pub fn region_bytes(&self, region: &[Range<usize>]) -> Vec<u8> {
        match (self, region) {
            (OutputArray::Matrix(m), [rows, cols]) => {
                let view = m.slice(s![rows.clone(), cols.clone()]);
                let mut out = Vec::with_capacity(view.len() * 2);
                for v in view.iter() {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                out
            }
            (OutputArray::Fragment(b), [range]) => b[range.clone()].to_vec(),
            _ => Vec::new(),
        }
    }

    /// Inverse of [`region_bytes`](Self::region_bytes).
    pub fn fill_region(&mut self, region: &[Range<usize>], bytes: &[u8]) -> anyhow::Result<()> {
        let expected: usize =
            region.iter().map(|r| r.len()).product::<usize>() * self.dtype().size();
        if bytes.len() != expected {
            anyhow::bail!(
                "chunk holds {} bytes but its region needs {}",
                bytes.len(),
                expected
            );
        }
        match (self, region) {
            (OutputArray::Matrix(m), [rows, cols]) => {
                fill_matrix_region(m, rows.clone(), cols.clone(), bytes)?
            }
            (OutputArray::Fragment(b), [range]) => b[range.clone()].copy_from_slice(bytes),
            _ => anyhow::bail!("region rank {} does not match array", region.len()),
        }
        Ok(())
    }
}

/// Write little-endian `i16` pairs from `bytes` into `rows × cols` of `m`.
pub(crate) fn fill_matrix_region(
    m: &mut Array2<i16>,
    rows: Range<usize>,
    cols: Range<usize>,
    bytes: &[u8],
) -> anyhow::Result<()> {
    let mut view = m.slice_mut(s![rows, cols]);
    if bytes.len() != view.len() * 2 {
        anyhow::bail!(
            "chunk holds {} bytes but its region needs {}",
            bytes.len(),
            view.len() * 2
        );
    }
    for (slot, pair) in view.iter_mut().zip(bytes.chunks_exact(2)) {
        *slot = i16::from_le_bytes([pair[0], pair[1]]);
    }
    Ok(())
}
