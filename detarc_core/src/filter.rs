use crate::layout::FilterSpec;

/// One reversible transform applied to every chunk before it is stored.
///
/// Each `Filter` implementation:
/// - Works on one chunk at a time with no state carried between chunks, so any
///   chunk can be decoded on its own.
/// - Receives the dataset element size, which byte-reordering filters need and
///   compressors ignore.
pub trait Filter: Send + Sync {
    /// The `FilterSpec` this filter was built from; written to the container.
    fn spec(&self) -> FilterSpec;

    /// Human-readable name for CLI display.
    fn name(&self) -> &'static str;

    fn encode(&self, raw: &[u8], element_size: usize) -> anyhow::Result<Vec<u8>>;

    fn decode(&self, encoded: &[u8], element_size: usize) -> anyhow::Result<Vec<u8>>;
}

/// Builds a filter from its recorded spec.
///
/// The container lives in this crate while the filter implementations do not,
/// so readers and sinks are handed one of these (for example
/// `detarc_filters::resolve_filter`).
pub type FilterResolver = fn(&FilterSpec) -> anyhow::Result<Box<dyn Filter>>;

/// Ordered filters: applied first-to-last on write, last-to-first on read.
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    pub fn resolve(specs: &[FilterSpec], resolver: FilterResolver) -> anyhow::Result<Self> {
        let filters = specs
            .iter()
            .map(resolver)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { filters })
    }

    pub fn specs(&self) -> Vec<FilterSpec> {
        self.filters.iter().map(|f| f.spec()).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn encode(&self, raw: &[u8], element_size: usize) -> anyhow::Result<Vec<u8>> {
        let mut buf = raw.to_vec();
        for filter in &self.filters {
            buf = filter.encode(&buf, element_size)?;
        }
        Ok(buf)
    }

    pub fn decode(&self, encoded: &[u8], element_size: usize) -> anyhow::Result<Vec<u8>> {
        let mut buf = encoded.to_vec();
        for filter in self.filters.iter().rev() {
            buf = filter.decode(&buf, element_size)?;
        }
        Ok(buf)
    }
}
