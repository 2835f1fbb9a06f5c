use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use detarc_core::{Filter, FilterSpec};

/// Deflate filter: each chunk becomes one zlib stream, as the HDF5 deflate
/// filter stores it.
pub struct DeflateFilter {
    /// Compression level (0 = store, 9 = smallest).
    level: u32,
}

impl Default for DeflateFilter {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl DeflateFilter {
    pub fn new(level: u32) -> anyhow::Result<Self> {
        if level > 9 {
            anyhow::bail!("deflate level {} out of range 0–9", level);
        }
        Ok(Self { level })
    }
}

impl Filter for DeflateFilter {
    fn spec(&self) -> FilterSpec {
        FilterSpec::Deflate { level: self.level }
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn encode(&self, raw: &[u8], _element_size: usize) -> anyhow::Result<Vec<u8>> {
        let mut enc = ZlibEncoder::new(
            Vec::with_capacity(raw.len() / 2),
            Compression::new(self.level),
        );
        enc.write_all(raw)?;
        Ok(enc.finish()?)
    }

    fn decode(&self, encoded: &[u8], _element_size: usize) -> anyhow::Result<Vec<u8>> {
        let mut raw = Vec::new();
        ZlibDecoder::new(encoded)
            .read_to_end(&mut raw)
            .map_err(|e| anyhow::anyhow!("deflate decompress error: {}", e))?;
        Ok(raw)
    }
}
