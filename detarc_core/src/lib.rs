pub mod array;
pub mod delta;
pub mod error;
pub mod filter;
pub mod format;
pub mod frame;
pub mod layout;
pub mod reader;
pub mod sink;
pub mod source;
pub mod transcoder;
pub mod wib;
pub mod writer;

pub use array::OutputArray;
pub use delta::DeltaEncoder;
pub use error::{SinkError, TranscodeError};
pub use filter::{Filter, FilterPipeline, FilterResolver};
pub use format::{DatasetAttrs, Descriptor, Header, HEADER_SIZE, MAGIC};
pub use frame::{Frame, FrameFormat, LinearFrameFormat};
pub use layout::{Compression, DType, FilterSpec, OutputLayout, OutputMode};
pub use reader::Reader;
pub use sink::{ArraySink, ContainerSink};
pub use source::ByteSource;
pub use transcoder::{TranscodeConfig, TranscodeReport, Transcoded, Transcoder};
pub use wib::WibFrameFormat;
pub use writer::Writer;
