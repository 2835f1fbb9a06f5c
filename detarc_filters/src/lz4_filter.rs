use detarc_core::{Filter, FilterSpec};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

/// LZ4 filter.
///
/// Fastest decode of the bundled compressors, at a lower ratio. Suits
/// archives that are re-read often.
pub struct Lz4Filter;

impl Filter for Lz4Filter {
    fn spec(&self) -> FilterSpec {
        FilterSpec::Lz4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn encode(&self, raw: &[u8], _element_size: usize) -> anyhow::Result<Vec<u8>> {
        Ok(compress_prepend_size(raw))
    }

    fn decode(&self, encoded: &[u8], _element_size: usize) -> anyhow::Result<Vec<u8>> {
        let raw = decompress_size_prepended(encoded)
            .map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))?;
        Ok(raw)
    }
}
