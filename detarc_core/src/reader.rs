use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use ndarray::{s, Array2};
use xxhash_rust::xxh3::xxh3_64;

use crate::array::{fill_matrix_region, OutputArray};
use crate::filter::{FilterPipeline, FilterResolver};
use crate::format::{
    ChunkEntry, Descriptor, Header, CHUNK_ENTRY_SIZE, FLAG_HAS_CHECKSUM, FOOTER_SIZE,
    FORMAT_VERSION, HEADER_SIZE,
};
use crate::layout::{ChunkGrid, DType};

/// Random-access reader for DTARC1 files.
///
/// # Open sequence
/// 1. Read the 64-byte header (magic, version, dtype, shape, chunk shape).
/// 2. Seek to `file_end - 16`, read the index and descriptor offsets.
/// 3. Load the descriptor and resolve its filter pipeline.
/// 4. Load the full chunk index into RAM (`Vec<ChunkEntry>`).
///
/// # Access pattern
/// [`read_chunk`] seeks directly to one chunk and decodes only that chunk.
/// [`read_frames`] and [`read_bytes`] decode only the chunks overlapping the
/// requested range.
///
/// [`read_chunk`]: Reader::read_chunk
/// [`read_frames`]: Reader::read_frames
/// [`read_bytes`]: Reader::read_bytes
pub struct Reader {
    file: File,
    pub header: Header,
    pub descriptor: Descriptor,
    grid: ChunkGrid,
    entries: Vec<ChunkEntry>,
    pipeline: FilterPipeline,
}

impl Reader {
    /// Open a DTARC1 file, building its filters with `resolver`.
    pub fn open(path: impl AsRef<Path>, resolver: FilterResolver) -> anyhow::Result<Self> {
        let mut file = File::open(path)?;

        // ── Read and validate header ────────────────────────────────────────
        let mut header_buf = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header_buf)?;
        let header = Header::from_bytes(&header_buf)?;

        if header.version != FORMAT_VERSION {
            anyhow::bail!(
                "unsupported DTARC version {} (only version {} is supported)",
                header.version,
                FORMAT_VERSION
            );
        }
        let grid = ChunkGrid::new(&header.shape, &header.chunk_shape);
        if grid.len() as u64 != header.chunk_count {
            anyhow::bail!(
                "header lists {} chunks but shape {:?} / chunks {:?} needs {}",
                header.chunk_count,
                header.shape,
                header.chunk_shape,
                grid.len()
            );
        }

        // ── Read footer → index and descriptor offsets ──────────────────────
        let file_len = file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))? + FOOTER_SIZE;
        let mut footer_buf = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer_buf)?;
        let index_offset = u64::from_le_bytes(footer_buf[0..8].try_into()?);
        let descriptor_offset = u64::from_le_bytes(footer_buf[8..16].try_into()?);
        if descriptor_offset > index_offset || index_offset > file_len - FOOTER_SIZE {
            anyhow::bail!(
                "corrupt footer: descriptor at {}, index at {}, file is {} bytes",
                descriptor_offset,
                index_offset,
                file_len
            );
        }

        // ── Load descriptor ─────────────────────────────────────────────────
        file.seek(SeekFrom::Start(descriptor_offset))?;
        let mut descriptor_buf = vec![0u8; (index_offset - descriptor_offset) as usize];
        file.read_exact(&mut descriptor_buf)?;
        let descriptor = Descriptor::from_bytes(&descriptor_buf)?;
        let pipeline = FilterPipeline::resolve(&descriptor.filters, resolver)?;

        // ── Load chunk index ────────────────────────────────────────────────
        let mut entries = Vec::with_capacity(header.chunk_count as usize);
        let mut entry_buf = [0u8; CHUNK_ENTRY_SIZE as usize];
        for _ in 0..header.chunk_count {
            file.read_exact(&mut entry_buf)?;
            entries.push(ChunkEntry::from_bytes(&entry_buf)?);
        }

        Ok(Self {
            file,
            header,
            descriptor,
            grid,
            entries,
            pipeline,
        })
    }

    #[inline]
    pub fn chunk_count(&self) -> u64 {
        self.header.chunk_count
    }

    pub fn dtype(&self) -> DType {
        self.header.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.header.shape
    }

    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    pub fn filter_names(&self) -> Vec<&'static str> {
        self.pipeline.names()
    }

    /// Total size of all chunks before filtering, in bytes.
    pub fn raw_size(&self) -> u64 {
        self.entries.iter().map(|e| e.raw_len as u64).sum()
    }

    /// Total size of all stored chunk payloads (excluding header/index).
    pub fn stored_size(&self) -> u64 {
        self.entries.iter().map(|e| e.encoded_len as u64).sum()
    }

    /// Compression ratio of the chunk payloads (raw / stored).
    pub fn ratio(&self) -> f64 {
        let raw = self.raw_size();
        let stored = self.stored_size();
        if stored == 0 {
            return 1.0;
        }
        raw as f64 / stored as f64
    }

    /// Access the raw `ChunkEntry` slice (for inspection).
    pub fn entries(&self) -> &[ChunkEntry] {
        &self.entries
    }

    /// Read, verify and unfilter chunk `idx`, returning its raw element bytes.
    pub fn read_chunk(&mut self, idx: usize) -> anyhow::Result<Vec<u8>> {
        let entry = self
            .entries
            .get(idx)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "chunk index {} out of range (total {})",
                    idx,
                    self.header.chunk_count
                )
            })?
            .clone();

        self.file.seek(SeekFrom::Start(entry.offset))?;
        let mut encoded = vec![0u8; entry.encoded_len as usize];
        self.file.read_exact(&mut encoded)?;

        if self.header.has_flag(FLAG_HAS_CHECKSUM) {
            let computed = xxh3_64(&encoded);
            if computed != entry.checksum {
                anyhow::bail!(
                    "chunk {} checksum mismatch: expected {:016x}, got {:016x}",
                    idx,
                    entry.checksum,
                    computed
                );
            }
        }

        let raw = self.pipeline.decode(&encoded, self.header.dtype.size())?;
        if raw.len() != entry.raw_len as usize {
            anyhow::bail!(
                "chunk {} decoded to {} bytes but index says {}",
                idx,
                raw.len(),
                entry.raw_len
            );
        }
        Ok(raw)
    }

    /// Decode every chunk into the full array.
    pub fn read_array(&mut self) -> anyhow::Result<OutputArray> {
        let mut array = OutputArray::zeros(self.header.dtype, &self.header.shape)?;
        for idx in 0..self.grid.len() {
            let raw = self.read_chunk(idx)?;
            array.fill_region(&self.grid.region(idx), &raw)?;
        }
        Ok(array)
    }

    /// Frames `start..start + count` of a matrix dataset, clamped to the
    /// stored frame count. Only chunk rows overlapping the range are decoded.
    pub fn read_frames(&mut self, start: usize, count: usize) -> anyhow::Result<Array2<i16>> {
        let (n_frames, n_channels) = match (self.header.dtype, self.header.shape.as_slice()) {
            (DType::I16, &[rows, cols]) => (rows, cols),
            _ => anyhow::bail!("dataset '{}' is not a frame matrix", self.descriptor.name),
        };
        if start >= n_frames && count > 0 {
            anyhow::bail!("frame {} is beyond the {} stored frames", start, n_frames);
        }
        let end = start.saturating_add(count).min(n_frames);
        if start >= end {
            return Ok(Array2::zeros((0, n_channels)));
        }

        let chunk_rows = self.grid.leading_chunks(start..end);
        let grid_cols = self.grid.grid_shape()[1];
        let first_row = chunk_rows.start * self.header.chunk_shape[0];
        let last_row = (chunk_rows.end * self.header.chunk_shape[0]).min(n_frames);

        let mut band = Array2::zeros((last_row - first_row, n_channels));
        for chunk_row in chunk_rows {
            for chunk_col in 0..grid_cols {
                let idx = self.grid.index(&[chunk_row, chunk_col]);
                let raw = self.read_chunk(idx)?;
                let region = self.grid.region(idx);
                let rows = region[0].start - first_row..region[0].end - first_row;
                fill_matrix_region(&mut band, rows, region[1].clone(), &raw)?;
            }
        }

        Ok(band
            .slice(s![start - first_row..end - first_row, ..])
            .to_owned())
    }

    /// Exactly the bytes `start..start + len` of a fragment dataset (clamped to
    /// its end). Only chunks overlapping the range are decoded.
    pub fn read_bytes(&mut self, start: usize, len: usize) -> anyhow::Result<Vec<u8>> {
        let total = match (self.header.dtype, self.header.shape.as_slice()) {
            (DType::U8, &[total]) => total,
            _ => anyhow::bail!("dataset '{}' is not a byte fragment", self.descriptor.name),
        };
        if len == 0 {
            return Ok(Vec::new());
        }
        if start >= total {
            anyhow::bail!("read start {} is beyond dataset size {}", start, total);
        }
        let end = start.saturating_add(len).min(total);

        let mut result = Vec::with_capacity(end - start);
        for idx in self.grid.leading_chunks(start..end) {
            let raw = self.read_chunk(idx)?;
            let chunk = self.grid.region(idx).remove(0);
            let from = start.max(chunk.start) - chunk.start;
            let to = end.min(chunk.end) - chunk.start;
            result.extend_from_slice(&raw[from..to]);
        }
        Ok(result)
    }
}
