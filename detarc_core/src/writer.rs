use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use xxhash_rust::xxh3::xxh3_64;

use crate::filter::FilterPipeline;
use crate::format::{
    ChunkEntry, DatasetAttrs, Descriptor, Header, FLAG_HAS_CHECKSUM, FORMAT_VERSION, HEADER_SIZE,
};
use crate::layout::{ChunkGrid, DType};

/// Chunk-at-a-time writer for DTARC1 files.
///
/// # Write contract
/// Call [`write_chunk`] once per chunk of the dataset's chunk grid, in
/// row-major chunk order, with that chunk's raw little-endian element bytes.
/// Call [`finish`] to append the descriptor, the chunk index and the footer,
/// and write back the final header.
///
/// # Format layout written
/// ```text
/// [HEADER: 64 bytes placeholder]
/// [CHUNK 0] [CHUNK 1] ... [CHUNK N-1]      ← independently filtered chunks
/// [DESCRIPTOR: filters, name, attrs]
/// [CHUNK INDEX: 32 bytes × N]
/// [FOOTER: u64 LE index offset, u64 LE descriptor offset]
/// ← seek back to 0, overwrite header with real values
/// ```
///
/// [`write_chunk`]: Writer::write_chunk
/// [`finish`]: Writer::finish
pub struct Writer {
    file: File,
    pipeline: FilterPipeline,
    name: String,
    dtype: DType,
    grid: ChunkGrid,
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,
    /// In-memory chunk index, appended to file on `finish()`.
    entries: Vec<ChunkEntry>,
    /// Current write position in the file (mirrors the file cursor).
    current_offset: u64,
}

impl Writer {
    /// Create a new DTARC1 file at `path`, truncating any existing file.
    pub fn create(
        path: impl AsRef<Path>,
        name: &str,
        dtype: DType,
        shape: &[usize],
        chunk_shape: &[usize],
        pipeline: FilterPipeline,
    ) -> anyhow::Result<Self> {
        if shape.len() != chunk_shape.len() {
            anyhow::bail!(
                "chunk rank {} does not match dataset rank {}",
                chunk_shape.len(),
                shape.len()
            );
        }
        if chunk_shape.contains(&0) {
            anyhow::bail!("chunk extents must be non-zero, got {:?}", chunk_shape);
        }
        let mut file = File::create(path)?;
        // Write placeholder header (will be overwritten in finish())
        file.write_all(&[0u8; HEADER_SIZE as usize])?;
        Ok(Self {
            file,
            pipeline,
            name: name.to_string(),
            dtype,
            grid: ChunkGrid::new(shape, chunk_shape),
            shape: shape.to_vec(),
            chunk_shape: chunk_shape.to_vec(),
            entries: Vec::new(),
            current_offset: HEADER_SIZE,
        })
    }

    /// Filter and append the next chunk.
    pub fn write_chunk(&mut self, raw: &[u8]) -> anyhow::Result<()> {
        let index = self.entries.len();
        if index >= self.grid.len() {
            anyhow::bail!("dataset already holds all {} chunks", self.grid.len());
        }
        let expected: usize = self.grid.region(index).iter().map(|r| r.len()).product::<usize>()
            * self.dtype.size();
        if raw.len() != expected {
            anyhow::bail!(
                "chunk {} has {} bytes, its region needs {}",
                index,
                raw.len(),
                expected
            );
        }

        let raw_len = index_len(index, "raw", raw.len())?;
        let encoded = self.pipeline.encode(raw, self.dtype.size())?;
        let checksum = xxh3_64(&encoded);
        let encoded_len = index_len(index, "encoded", encoded.len())?;

        self.file.write_all(&encoded)?;
        self.entries.push(ChunkEntry {
            offset: self.current_offset,
            encoded_len,
            raw_len,
            checksum,
        });
        self.current_offset += encoded_len as u64;

        log::debug!(
            "chunk {}/{}: {} → {} bytes",
            index + 1,
            self.grid.len(),
            raw.len(),
            encoded_len
        );
        Ok(())
    }

    /// Write descriptor, chunk index and footer, then seal the file by writing
    /// the final header.
    ///
    /// Returns the number of chunks written.
    pub fn finish(mut self, attrs: DatasetAttrs) -> anyhow::Result<u64> {
        if self.entries.len() != self.grid.len() {
            anyhow::bail!(
                "dataset incomplete: {} of {} chunks written",
                self.entries.len(),
                self.grid.len()
            );
        }

        // ── Descriptor ─────────────────────────────────────────────────────
        let descriptor_offset = self.current_offset;
        let descriptor = Descriptor {
            name: self.name.clone(),
            filters: self.pipeline.specs(),
            attrs,
        };
        let descriptor_bytes = descriptor.to_bytes()?;
        self.file.write_all(&descriptor_bytes)?;
        self.current_offset += descriptor_bytes.len() as u64;

        // ── Chunk index ────────────────────────────────────────────────────
        let index_offset = self.current_offset;
        for entry in &self.entries {
            self.file.write_all(&entry.to_bytes())?;
        }

        // ── Footer ─────────────────────────────────────────────────────────
        self.file.write_all(&index_offset.to_le_bytes())?;
        self.file.write_all(&descriptor_offset.to_le_bytes())?;

        // ── Seek back to 0 and write the real header ────────────────────────
        let chunk_count = self.entries.len() as u64;
        let header = Header {
            version: FORMAT_VERSION,
            dtype: self.dtype,
            shape: self.shape,
            chunk_shape: self.chunk_shape,
            chunk_count,
            flags: FLAG_HAS_CHECKSUM,
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.to_bytes()?)?;
        self.file.flush()?;

        Ok(chunk_count)
    }
}

/// Chunk lengths are stored as `u32` in the index.
fn index_len(index: usize, what: &str, len: usize) -> anyhow::Result<u32> {
    u32::try_from(len).map_err(|_| {
        anyhow::anyhow!(
            "chunk {} has {} {} bytes, over the 4 GiB index limit",
            index,
            len,
            what
        )
    })
}
