use detarc_core::{Filter, FilterSpec};

/// Byte-shuffle filter.
///
/// Regroups a chunk of fixed-width elements into byte planes: all first bytes,
/// then all second bytes, and so on. Slowly varying samples leave long runs in
/// the high-byte plane that the following compressor picks up. Bytes past the
/// last whole element are kept in place at the end.
pub struct ShuffleFilter;

impl Filter for ShuffleFilter {
    fn spec(&self) -> FilterSpec {
        FilterSpec::Shuffle
    }

    fn name(&self) -> &'static str {
        "shuffle"
    }

    fn encode(&self, raw: &[u8], element_size: usize) -> anyhow::Result<Vec<u8>> {
        if element_size <= 1 {
            return Ok(raw.to_vec());
        }
        let n = raw.len() / element_size;
        let body = n * element_size;
        let mut out = vec![0u8; raw.len()];
        for (j, element) in raw[..body].chunks_exact(element_size).enumerate() {
            for (i, &byte) in element.iter().enumerate() {
                out[i * n + j] = byte;
            }
        }
        out[body..].copy_from_slice(&raw[body..]);
        Ok(out)
    }

    fn decode(&self, encoded: &[u8], element_size: usize) -> anyhow::Result<Vec<u8>> {
        if element_size <= 1 {
            return Ok(encoded.to_vec());
        }
        let n = encoded.len() / element_size;
        let body = n * element_size;
        let mut out = vec![0u8; encoded.len()];
        for (j, element) in out[..body].chunks_exact_mut(element_size).enumerate() {
            for (i, byte) in element.iter_mut().enumerate() {
                *byte = encoded[i * n + j];
            }
        }
        out[body..].copy_from_slice(&encoded[body..]);
        Ok(out)
    }
}
