use serde::{Deserialize, Serialize};

use crate::layout::{DType, FilterSpec};

/// Magic bytes for DTARC version 1 files.
pub const MAGIC: &[u8; 8] = b"DTARC1\n\x00";

pub const FORMAT_VERSION: u16 = 1;

/// Highest dataset rank the fixed header can describe.
pub const MAX_RANK: usize = 2;

/// Fixed size of the DTARC1 file header in bytes.
///   magic[8] + version:u16 + dtype:u8 + rank:u8 + shape:[u64; 2]
///   + chunk_shape:[u64; 2] + chunk_count:u64 + flags:u64 + reserved[4]
///   = 8 + 2 + 1 + 1 + 16 + 16 + 8 + 8 + 4 = 64
pub const HEADER_SIZE: u64 = 64;

/// Size of each ChunkEntry in the chunk index, in bytes.
///   offset:u64 + encoded_len:u32 + raw_len:u32 + checksum:u64 + _pad[8]
///   = 8 + 4 + 4 + 8 + 8 = 32
pub const CHUNK_ENTRY_SIZE: u64 = 32;

/// Size of the footer in bytes: index offset + descriptor offset.
pub const FOOTER_SIZE: u64 = 16;

/// Each chunk carries an xxhash3-64 checksum of its encoded bytes.
pub const FLAG_HAS_CHECKSUM: u64 = 1 << 0;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 64-byte DTARC1 file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub chunk_shape: Vec<usize>,
    pub chunk_count: u64,
    pub flags: u64,
}

impl Header {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> anyhow::Result<[u8; HEADER_SIZE as usize]> {
        let rank = self.shape.len();
        if rank == 0 || rank > MAX_RANK || self.chunk_shape.len() != rank {
            anyhow::bail!(
                "cannot encode shape {:?} with chunks {:?}",
                self.shape,
                self.chunk_shape
            );
        }
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[..8].copy_from_slice(MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10] = self.dtype.code();
        buf[11] = rank as u8;
        for dim in 0..rank {
            let at = 12 + dim * 8;
            buf[at..at + 8].copy_from_slice(&(self.shape[dim] as u64).to_le_bytes());
            let at = 28 + dim * 8;
            buf[at..at + 8].copy_from_slice(&(self.chunk_shape[dim] as u64).to_le_bytes());
        }
        buf[44..52].copy_from_slice(&self.chunk_count.to_le_bytes());
        buf[52..60].copy_from_slice(&self.flags.to_le_bytes());
        // reserved[4] stays zero
        Ok(buf)
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking the magic.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> anyhow::Result<Self> {
        if &buf[..8] != MAGIC {
            anyhow::bail!("invalid DTARC magic bytes — not a DTARC1 file");
        }
        let rank = buf[11] as usize;
        if rank == 0 || rank > MAX_RANK {
            anyhow::bail!("unsupported dataset rank {}", rank);
        }
        let mut shape = Vec::with_capacity(rank);
        let mut chunk_shape = Vec::with_capacity(rank);
        for dim in 0..rank {
            let at = 12 + dim * 8;
            shape.push(u64::from_le_bytes(buf[at..at + 8].try_into()?) as usize);
            let at = 28 + dim * 8;
            chunk_shape.push(u64::from_le_bytes(buf[at..at + 8].try_into()?) as usize);
        }
        if chunk_shape.contains(&0) {
            anyhow::bail!("corrupt header: zero chunk extent in {:?}", chunk_shape);
        }
        Ok(Self {
            version: u16::from_le_bytes(buf[8..10].try_into()?),
            dtype: DType::from_code(buf[10])?,
            shape,
            chunk_shape,
            chunk_count: u64::from_le_bytes(buf[44..52].try_into()?),
            flags: u64::from_le_bytes(buf[52..60].try_into()?),
        })
    }

    pub fn has_flag(&self, flag: u64) -> bool {
        self.flags & flag != 0
    }
}

// ── Chunk index entry ──────────────────────────────────────────────────────

/// One entry in the chunk index — locates and describes a single stored chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkEntry {
    /// Byte offset of this chunk from the start of the file.
    pub offset: u64,
    /// Length of the filtered chunk payload in bytes.
    pub encoded_len: u32,
    /// Length of the chunk's elements before filtering, in bytes.
    pub raw_len: u32,
    /// xxhash3-64 of the encoded bytes.
    pub checksum: u64,
}

impl ChunkEntry {
    /// Serialize to exactly `CHUNK_ENTRY_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; CHUNK_ENTRY_SIZE as usize] {
        let mut buf = [0u8; CHUNK_ENTRY_SIZE as usize];
        buf[0..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..12].copy_from_slice(&self.encoded_len.to_le_bytes());
        buf[12..16].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize from `CHUNK_ENTRY_SIZE` bytes.
    pub fn from_bytes(buf: &[u8; CHUNK_ENTRY_SIZE as usize]) -> anyhow::Result<Self> {
        Ok(Self {
            offset: u64::from_le_bytes(buf[0..8].try_into()?),
            encoded_len: u32::from_le_bytes(buf[8..12].try_into()?),
            raw_len: u32::from_le_bytes(buf[12..16].try_into()?),
            checksum: u64::from_le_bytes(buf[16..24].try_into()?),
        })
    }
}

// ── Descriptor ─────────────────────────────────────────────────────────────

/// Provenance recorded alongside the dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetAttrs {
    pub frame_format: String,
    pub frame_size: u64,
    pub n_channels: u64,
    pub mode: String,
    pub delta: bool,
    pub available_frames: u64,
    pub processed_frames: u64,
}

/// Variable-length dataset description stored after the chunk payloads.
///
/// ```text
/// filter_count:u8 { id:u16 param:i32 } × filter_count
/// name_len:u16 name[name_len]
/// attrs_len:u32 attrs_json[attrs_len]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub filters: Vec<FilterSpec>,
    pub attrs: DatasetAttrs,
}

impl Descriptor {
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let filter_count = u8::try_from(self.filters.len())
            .map_err(|_| anyhow::anyhow!("too many filters ({})", self.filters.len()))?;
        let name_len = u16::try_from(self.name.len())
            .map_err(|_| anyhow::anyhow!("dataset name too long ({} bytes)", self.name.len()))?;
        let attrs = serde_json::to_vec(&self.attrs)?;

        let mut buf = Vec::with_capacity(1 + self.filters.len() * 6 + 2 + self.name.len() + 4 + attrs.len());
        buf.push(filter_count);
        for f in &self.filters {
            buf.extend_from_slice(&f.id().to_le_bytes());
            buf.extend_from_slice(&f.param().to_le_bytes());
        }
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(&(attrs.len() as u32).to_le_bytes());
        buf.extend_from_slice(&attrs);
        Ok(buf)
    }

    pub fn from_bytes(buf: &[u8]) -> anyhow::Result<Self> {
        let mut cur = ByteCursor { buf, pos: 0 };
        let filter_count = cur.take(1)?[0];
        let mut filters = Vec::with_capacity(filter_count as usize);
        for _ in 0..filter_count {
            let id = u16::from_le_bytes(cur.take(2)?.try_into()?);
            let param = i32::from_le_bytes(cur.take(4)?.try_into()?);
            filters.push(FilterSpec::from_parts(id, param)?);
        }
        let name_len = u16::from_le_bytes(cur.take(2)?.try_into()?) as usize;
        let name = std::str::from_utf8(cur.take(name_len)?)?.to_string();
        let attrs_len = u32::from_le_bytes(cur.take(4)?.try_into()?) as usize;
        let attrs = serde_json::from_slice(cur.take(attrs_len)?)?;
        Ok(Self {
            name,
            filters,
            attrs,
        })
    }
}

struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn take(&mut self, n: usize) -> anyhow::Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.buf.len() {
            anyhow::bail!(
                "descriptor truncated: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.buf.len()
            );
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }
}
