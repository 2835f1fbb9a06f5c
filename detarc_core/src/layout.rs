use std::ops::Range;

// ── Element types ───────────────────────────────────────────────────────────

/// Element type of a stored dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    /// Decoded channel samples.
    I16,
    /// Verbatim frame bytes.
    U8,
}

impl DType {
    pub fn code(self) -> u8 {
        match self {
            DType::I16 => 1,
            DType::U8 => 2,
        }
    }

    pub fn from_code(code: u8) -> anyhow::Result<Self> {
        match code {
            1 => Ok(DType::I16),
            2 => Ok(DType::U8),
            _ => anyhow::bail!("unknown dtype code {}", code),
        }
    }

    pub fn size(self) -> usize {
        match self {
            DType::I16 => 2,
            DType::U8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::I16 => "i16",
            DType::U8 => "u8",
        }
    }
}

// ── Filters ─────────────────────────────────────────────────────────────────

pub const FILTER_DEFLATE: u16 = 1;
pub const FILTER_SHUFFLE: u16 = 2;
pub const FILTER_LZ4: u16 = 32004;
pub const FILTER_ZSTD: u16 = 32015;

/// One stage of a chunk filter pipeline, as recorded in the container.
///
/// Ids follow the registered HDF5 filter numbers so the pipeline reads the
/// same as an equivalent HDF5 dataset's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSpec {
    Shuffle,
    Deflate { level: u32 },
    Zstd { level: i32 },
    Lz4,
}

impl FilterSpec {
    pub fn id(&self) -> u16 {
        match self {
            FilterSpec::Shuffle => FILTER_SHUFFLE,
            FilterSpec::Deflate { .. } => FILTER_DEFLATE,
            FilterSpec::Zstd { .. } => FILTER_ZSTD,
            FilterSpec::Lz4 => FILTER_LZ4,
        }
    }

    /// Single integer parameter stored next to the id.
    pub fn param(&self) -> i32 {
        match self {
            FilterSpec::Deflate { level } => *level as i32,
            FilterSpec::Zstd { level } => *level,
            FilterSpec::Shuffle | FilterSpec::Lz4 => 0,
        }
    }

    pub fn from_parts(id: u16, param: i32) -> anyhow::Result<Self> {
        match id {
            FILTER_SHUFFLE => Ok(FilterSpec::Shuffle),
            FILTER_DEFLATE => {
                if !(0..=9).contains(&param) {
                    anyhow::bail!("deflate level {} out of range 0–9", param);
                }
                Ok(FilterSpec::Deflate { level: param as u32 })
            }
            FILTER_ZSTD => Ok(FilterSpec::Zstd { level: param }),
            FILTER_LZ4 => Ok(FilterSpec::Lz4),
            _ => anyhow::bail!("unknown filter id {}", id),
        }
    }
}

/// Compressor placed last in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Deflate(u32),
    Zstd(i32),
    Lz4,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Deflate(3)
    }
}

impl Compression {
    pub fn filter(self) -> FilterSpec {
        match self {
            Compression::Deflate(level) => FilterSpec::Deflate { level },
            Compression::Zstd(level) => FilterSpec::Zstd { level },
            Compression::Lz4 => FilterSpec::Lz4,
        }
    }
}

// ── Output modes ────────────────────────────────────────────────────────────

/// How frames end up in the output array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Decoded samples, shape `(frames, channels)`, shuffled then compressed.
    Matrix {
        frame_chunk: usize,
        channel_chunk: usize,
        delta: bool,
    },
    /// Undecoded frame bytes, shape `(bytes,)`, compressed only.
    Fragment { chunk_len: usize },
}

impl OutputMode {
    pub fn name(&self) -> &'static str {
        match self {
            OutputMode::Matrix { .. } => "matrix",
            OutputMode::Fragment { .. } => "fragment",
        }
    }

    pub fn delta(&self) -> bool {
        matches!(self, OutputMode::Matrix { delta: true, .. })
    }

    /// Zero-sized chunks can never tile a dataset.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            OutputMode::Matrix {
                frame_chunk,
                channel_chunk,
                ..
            } if frame_chunk == 0 || channel_chunk == 0 => Err(format!(
                "chunk extents must be non-zero, got ({}, {})",
                frame_chunk, channel_chunk
            )),
            OutputMode::Fragment { chunk_len: 0 } => {
                Err("chunk length must be non-zero".to_string())
            }
            _ => Ok(()),
        }
    }
}

// ── Layout ──────────────────────────────────────────────────────────────────

/// Shape, chunking and filters of the dataset handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub chunk_shape: Vec<usize>,
    pub filters: Vec<FilterSpec>,
}

impl OutputLayout {
    /// Layout for `mode` holding `n_frames` frames.
    ///
    /// Chunk extents larger than the dataset are clamped to it (never below 1).
    pub fn for_mode(
        mode: OutputMode,
        n_frames: usize,
        n_channels: usize,
        frame_size: usize,
        compression: Compression,
    ) -> Self {
        match mode {
            OutputMode::Matrix {
                frame_chunk,
                channel_chunk,
                ..
            } => Self {
                dtype: DType::I16,
                shape: vec![n_frames, n_channels],
                chunk_shape: vec![
                    clamp_chunk(frame_chunk, n_frames),
                    clamp_chunk(channel_chunk, n_channels),
                ],
                filters: vec![FilterSpec::Shuffle, compression.filter()],
            },
            OutputMode::Fragment { chunk_len } => {
                let total = n_frames * frame_size;
                Self {
                    dtype: DType::U8,
                    shape: vec![total],
                    chunk_shape: vec![clamp_chunk(chunk_len, total)],
                    filters: vec![compression.filter()],
                }
            }
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn grid(&self) -> ChunkGrid {
        ChunkGrid::new(&self.shape, &self.chunk_shape)
    }
}

fn clamp_chunk(requested: usize, extent: usize) -> usize {
    let chunk = requested.min(extent).max(1);
    if chunk != requested {
        log::debug!("chunk extent {} clamped to {}", requested, chunk);
    }
    chunk
}

// ── Chunk grid ──────────────────────────────────────────────────────────────

/// Regular chunk tiling of a dataset, visited in row-major chunk order.
/// Edge chunks are trimmed to the dataset extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGrid {
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,
    grid_shape: Vec<usize>,
}

impl ChunkGrid {
    pub fn new(shape: &[usize], chunk_shape: &[usize]) -> Self {
        let grid_shape = shape
            .iter()
            .zip(chunk_shape)
            .map(|(&extent, &chunk)| extent.div_ceil(chunk.max(1)))
            .collect();
        Self {
            shape: shape.to_vec(),
            chunk_shape: chunk_shape.to_vec(),
            grid_shape,
        }
    }

    /// Chunks along each dimension.
    pub fn grid_shape(&self) -> &[usize] {
        &self.grid_shape
    }

    pub fn len(&self) -> usize {
        self.grid_shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chunk coordinates of linear chunk index `index`.
    pub fn coords(&self, index: usize) -> Vec<usize> {
        let mut coords = vec![0; self.grid_shape.len()];
        let mut rem = index;
        for (dim, &n) in self.grid_shape.iter().enumerate().rev() {
            coords[dim] = rem % n;
            rem /= n;
        }
        coords
    }

    /// Linear chunk index of `coords`.
    pub fn index(&self, coords: &[usize]) -> usize {
        coords
            .iter()
            .zip(&self.grid_shape)
            .fold(0, |acc, (&c, &n)| acc * n + c)
    }

    /// Element ranges covered by chunk `index`, one per dimension.
    pub fn region(&self, index: usize) -> Vec<Range<usize>> {
        self.coords(index)
            .iter()
            .enumerate()
            .map(|(dim, &c)| {
                let start = c * self.chunk_shape[dim];
                start..(start + self.chunk_shape[dim]).min(self.shape[dim])
            })
            .collect()
    }

    /// Chunk indices along dimension 0 that intersect `rows`.
    pub fn leading_chunks(&self, rows: Range<usize>) -> Range<usize> {
        if rows.is_empty() || self.grid_shape.is_empty() {
            return 0..0;
        }
        let chunk = self.chunk_shape[0];
        rows.start / chunk..(rows.end - 1) / chunk + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_layout_shuffles_then_compresses() {
        let mode = OutputMode::Matrix {
            frame_chunk: 512,
            channel_chunk: 16,
            delta: false,
        };
        let layout = OutputLayout::for_mode(mode, 1000, 256, 464, Compression::default());
        assert_eq!(layout.dtype, DType::I16);
        assert_eq!(layout.shape, vec![1000, 256]);
        assert_eq!(layout.chunk_shape, vec![512, 16]);
        assert_eq!(
            layout.filters,
            vec![FilterSpec::Shuffle, FilterSpec::Deflate { level: 3 }]
        );
    }

    #[test]
    fn fragment_layout_is_flat_and_unshuffled() {
        let layout = OutputLayout::for_mode(
            OutputMode::Fragment { chunk_len: 512 },
            4,
            256,
            1024,
            Compression::default(),
        );
        assert_eq!(layout.dtype, DType::U8);
        assert_eq!(layout.shape, vec![4096]);
        assert_eq!(layout.chunk_shape, vec![512]);
        assert_eq!(layout.filters, vec![FilterSpec::Deflate { level: 3 }]);
    }

    #[test]
    fn oversized_chunks_clamp_to_extent() {
        let mode = OutputMode::Matrix {
            frame_chunk: 512,
            channel_chunk: 16,
            delta: true,
        };
        let layout = OutputLayout::for_mode(mode, 3, 256, 464, Compression::Lz4);
        assert_eq!(layout.chunk_shape, vec![3, 16]);

        let empty = OutputLayout::for_mode(mode, 0, 256, 464, Compression::Lz4);
        assert_eq!(empty.chunk_shape, vec![1, 16]);
        assert!(empty.grid().is_empty());
    }

    #[test]
    fn zero_chunks_are_rejected() {
        assert!(OutputMode::Fragment { chunk_len: 0 }.validate().is_err());
        assert!(OutputMode::Matrix {
            frame_chunk: 4,
            channel_chunk: 0,
            delta: false
        }
        .validate()
        .is_err());
        assert!(OutputMode::Fragment { chunk_len: 1 }.validate().is_ok());
    }

    #[test]
    fn grid_regions_trim_edges() {
        let grid = ChunkGrid::new(&[10, 6], &[4, 4]);
        assert_eq!(grid.grid_shape(), &[3, 2]);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.region(0), vec![0..4, 0..4]);
        assert_eq!(grid.region(1), vec![0..4, 4..6]);
        assert_eq!(grid.region(5), vec![8..10, 4..6]);
        assert_eq!(grid.index(&grid.coords(3)), 3);
    }

    #[test]
    fn leading_chunks_cover_row_range() {
        let grid = ChunkGrid::new(&[10, 6], &[4, 4]);
        assert_eq!(grid.leading_chunks(0..1), 0..1);
        assert_eq!(grid.leading_chunks(3..5), 0..2);
        assert_eq!(grid.leading_chunks(8..10), 2..3);
        assert_eq!(grid.leading_chunks(5..5), 0..0);
    }

    #[test]
    fn filter_spec_parts_round_trip() {
        for spec in [
            FilterSpec::Shuffle,
            FilterSpec::Deflate { level: 9 },
            FilterSpec::Zstd { level: -3 },
            FilterSpec::Lz4,
        ] {
            assert_eq!(FilterSpec::from_parts(spec.id(), spec.param()).unwrap(), spec);
        }
        assert!(FilterSpec::from_parts(FILTER_DEFLATE, 12).is_err());
        assert!(FilterSpec::from_parts(999, 0).is_err());
    }
}
