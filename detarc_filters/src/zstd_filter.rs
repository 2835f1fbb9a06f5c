use detarc_core::{Filter, FilterSpec};

/// Zstandard filter.
///
/// Each chunk is compressed independently at the configured level
/// (default: 3). Higher ratio than deflate at similar speed on shuffled
/// samples; the archive is no longer readable by stock deflate-only tools.
pub struct ZstdFilter {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdFilter {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdFilter {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Filter for ZstdFilter {
    fn spec(&self) -> FilterSpec {
        FilterSpec::Zstd { level: self.level }
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn encode(&self, raw: &[u8], _element_size: usize) -> anyhow::Result<Vec<u8>> {
        let compressed = zstd::bulk::compress(raw, self.level)?;
        Ok(compressed)
    }

    fn decode(&self, encoded: &[u8], _element_size: usize) -> anyhow::Result<Vec<u8>> {
        // The zstd frame carries its own content size.
        let raw = zstd::decode_all(encoded)?;
        Ok(raw)
    }
}
