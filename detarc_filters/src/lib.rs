mod deflate;
mod lz4_filter;
mod shuffle;
mod zstd_filter;

pub use deflate::DeflateFilter;
pub use lz4_filter::Lz4Filter;
pub use shuffle::ShuffleFilter;
pub use zstd_filter::ZstdFilter;

use detarc_core::{Filter, FilterSpec};

/// Build the filter described by `spec`.
///
/// Matches [`detarc_core::FilterResolver`], so it can be handed straight to
/// `ContainerSink::new` and `Reader::open`.
pub fn resolve_filter(spec: &FilterSpec) -> anyhow::Result<Box<dyn Filter>> {
    match *spec {
        FilterSpec::Shuffle => Ok(Box::new(ShuffleFilter)),
        FilterSpec::Deflate { level } => Ok(Box::new(DeflateFilter::new(level)?)),
        FilterSpec::Zstd { level } => Ok(Box::new(ZstdFilter::new(level))),
        FilterSpec::Lz4 => Ok(Box::new(Lz4Filter)),
    }
}
