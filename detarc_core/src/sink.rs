use std::fs;
use std::path::{Path, PathBuf};

use crate::array::OutputArray;
use crate::error::SinkError;
use crate::filter::{FilterPipeline, FilterResolver};
use crate::format::DatasetAttrs;
use crate::layout::{ChunkGrid, OutputLayout};
use crate::writer::Writer;

/// Persists one assembled dataset.
///
/// The write call does not report sizes; the persisted size is asked for
/// afterwards through [`persisted_size`](ArraySink::persisted_size).
pub trait ArraySink {
    fn write_dataset(
        &mut self,
        name: &str,
        array: &OutputArray,
        layout: &OutputLayout,
        attrs: &DatasetAttrs,
    ) -> Result<(), SinkError>;

    /// Bytes the persisted artifact occupies.
    fn persisted_size(&self) -> Result<u64, SinkError>;
}

/// Check that `array` is what `layout` describes before anything is written.
pub fn check_layout(array: &OutputArray, layout: &OutputLayout) -> Result<(), SinkError> {
    if array.dtype() != layout.dtype {
        return Err(SinkError::LayoutMismatch(format!(
            "array holds {} but layout expects {}",
            array.dtype().name(),
            layout.dtype.name()
        )));
    }
    if array.shape() != layout.shape {
        return Err(SinkError::LayoutMismatch(format!(
            "array shape {:?} but layout shape {:?}",
            array.shape(),
            layout.shape
        )));
    }
    if layout.chunk_shape.len() != layout.rank() || layout.chunk_shape.contains(&0) {
        return Err(SinkError::LayoutMismatch(format!(
            "chunk shape {:?} does not tile shape {:?}",
            layout.chunk_shape, layout.shape
        )));
    }
    Ok(())
}

/// Sink writing a single DTARC1 container file.
pub struct ContainerSink {
    path: PathBuf,
    resolver: FilterResolver,
}

impl ContainerSink {
    /// The file is created (or truncated) on the first write.
    pub fn new(path: impl AsRef<Path>, resolver: FilterResolver) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            resolver,
        }
    }

    fn write_container(
        &self,
        name: &str,
        array: &OutputArray,
        layout: &OutputLayout,
        attrs: &DatasetAttrs,
    ) -> anyhow::Result<u64> {
        let pipeline = FilterPipeline::resolve(&layout.filters, self.resolver)?;
        log::info!(
            "writing dataset '{}' {:?} chunked {:?} through [{}]",
            name,
            layout.shape,
            layout.chunk_shape,
            pipeline.names().join(", ")
        );
        let writer = Writer::create(
            &self.path,
            name,
            layout.dtype,
            &layout.shape,
            &layout.chunk_shape,
            pipeline,
        )?;
        // From here on the file is ours; a failure must not leave it behind.
        fill_container(writer, array, &layout.grid(), attrs).map_err(|err| {
            if let Err(rm) = fs::remove_file(&self.path) {
                log::warn!("could not remove partial output {:?}: {}", self.path, rm);
            }
            err
        })
    }
}

fn fill_container(
    mut writer: Writer,
    array: &OutputArray,
    grid: &ChunkGrid,
    attrs: &DatasetAttrs,
) -> anyhow::Result<u64> {
    for idx in 0..grid.len() {
        writer.write_chunk(&array.region_bytes(&grid.region(idx)))?;
    }
    writer.finish(attrs.clone())
}

impl ArraySink for ContainerSink {
    fn write_dataset(
        &mut self,
        name: &str,
        array: &OutputArray,
        layout: &OutputLayout,
        attrs: &DatasetAttrs,
    ) -> Result<(), SinkError> {
        check_layout(array, layout)?;
        match self.write_container(name, array, layout, attrs) {
            Ok(chunks) => {
                log::info!("{} chunks written to {:?}", chunks, self.path);
                Ok(())
            }
            Err(err) => Err(SinkError::backend(err)),
        }
    }

    fn persisted_size(&self) -> Result<u64, SinkError> {
        Ok(fs::metadata(&self.path)?.len())
    }
}
