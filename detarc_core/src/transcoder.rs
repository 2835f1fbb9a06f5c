use ndarray::Array2;

use crate::array::OutputArray;
use crate::delta::DeltaEncoder;
use crate::error::TranscodeError;
use crate::format::DatasetAttrs;
use crate::frame::{Frame, FrameFormat};
use crate::layout::{Compression, OutputLayout, OutputMode};
use crate::sink::ArraySink;
use crate::source::ByteSource;

/// Dataset name written when none is configured.
pub const DEFAULT_DATASET_NAME: &str = "wib_data";

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeConfig {
    pub dataset_name: String,
    /// Upper bound on frames processed; `None` takes every frame in the input.
    pub max_frames: Option<u64>,
    pub mode: OutputMode,
    pub compression: Compression,
}

impl TranscodeConfig {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            max_frames: None,
            mode,
            compression: Compression::default(),
        }
    }

    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }
}

/// Array plus the size accounting of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcoded {
    pub available_frames: u64,
    pub processed_frames: u64,
    /// `processed_frames * frame_size`, whatever the array representation.
    pub uncompressed_size: u64,
    pub array: OutputArray,
}

/// Counts and sizes reported after the sink has persisted the dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeReport {
    pub available_frames: u64,
    pub processed_frames: u64,
    pub uncompressed_size: u64,
    pub persisted_size: u64,
}

impl TranscodeReport {
    /// Uncompressed logical size over persisted size.
    pub fn ratio(&self) -> f64 {
        if self.persisted_size == 0 {
            return 1.0;
        }
        self.uncompressed_size as f64 / self.persisted_size as f64
    }
}

/// Batch conversion of a raw frame stream into one shaped array.
pub struct Transcoder<'f> {
    format: &'f dyn FrameFormat,
    config: TranscodeConfig,
}

impl<'f> Transcoder<'f> {
    pub fn new(format: &'f dyn FrameFormat, config: TranscodeConfig) -> Result<Self, TranscodeError> {
        config.mode.validate().map_err(TranscodeError::InvalidConfig)?;
        if format.frame_size() == 0 {
            return Err(TranscodeError::InvalidConfig(format!(
                "{} frames have zero size",
                format.name()
            )));
        }
        Ok(Self { format, config })
    }

    /// Read and convert frames from `source`.
    ///
    /// Input length is validated before any frame byte is read; any read
    /// failure aborts the whole run.
    pub fn transcode<S: ByteSource + ?Sized>(&self, source: &mut S) -> Result<Transcoded, TranscodeError> {
        let frame_size = self.format.frame_size();
        let length = source.byte_len().map_err(TranscodeError::Stat)?;
        if length == 0 {
            return Err(TranscodeError::EmptyFile);
        }
        if length % frame_size as u64 != 0 {
            return Err(TranscodeError::MisalignedLength { length, frame_size });
        }

        let available_frames = length / frame_size as u64;
        let processed_frames = self
            .config
            .max_frames
            .map_or(available_frames, |max| available_frames.min(max));
        log::info!(
            "{} {} frames available, processing {}",
            available_frames,
            self.format.name(),
            processed_frames
        );

        let n_frames = usize::try_from(processed_frames).map_err(|_| {
            TranscodeError::InvalidConfig(format!("{} frames do not fit in memory", processed_frames))
        })?;
        let array = match self.config.mode {
            OutputMode::Matrix { delta, .. } => {
                OutputArray::Matrix(self.decode_frames(source, n_frames, delta)?)
            }
            OutputMode::Fragment { .. } => {
                let mut bytes = vec![0u8; n_frames * frame_size];
                read_at(source, 0, &mut bytes)?;
                OutputArray::Fragment(bytes)
            }
        };

        Ok(Transcoded {
            available_frames,
            processed_frames,
            uncompressed_size: processed_frames * frame_size as u64,
            array,
        })
    }

    fn decode_frames<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        n_frames: usize,
        delta: bool,
    ) -> Result<Array2<i16>, TranscodeError> {
        let frame_size = self.format.frame_size();
        let n_channels = self.format.n_channels();
        let mut samples = Array2::<i16>::zeros((n_frames, n_channels));
        let mut encoder = DeltaEncoder::new(n_channels, delta);
        let mut buffer = vec![0u8; frame_size];

        for (i, mut row) in samples.rows_mut().into_iter().enumerate() {
            read_at(source, (i * frame_size) as u64, &mut buffer)?;
            let frame = Frame::new(self.format, &buffer);
            for (ch, slot) in row.iter_mut().enumerate() {
                *slot = encoder.encode(i as u64, ch, frame.channel(ch));
            }
        }
        Ok(samples)
    }

    /// Layout the sink receives for `transcoded`.
    pub fn layout(&self, transcoded: &Transcoded) -> OutputLayout {
        OutputLayout::for_mode(
            self.config.mode,
            transcoded.processed_frames as usize,
            self.format.n_channels(),
            self.format.frame_size(),
            self.config.compression,
        )
    }

    pub fn attrs(&self, transcoded: &Transcoded) -> DatasetAttrs {
        DatasetAttrs {
            frame_format: self.format.name().to_string(),
            frame_size: self.format.frame_size() as u64,
            n_channels: self.format.n_channels() as u64,
            mode: self.config.mode.name().to_string(),
            delta: self.config.mode.delta(),
            available_frames: transcoded.available_frames,
            processed_frames: transcoded.processed_frames,
        }
    }

    /// Transcode `source`, hand the result to `sink`, and report sizes.
    ///
    /// Nothing reaches the sink unless every frame was read successfully.
    pub fn run<S, K>(&self, source: &mut S, sink: &mut K) -> Result<TranscodeReport, TranscodeError>
    where
        S: ByteSource + ?Sized,
        K: ArraySink + ?Sized,
    {
        let transcoded = self.transcode(source)?;
        let layout = self.layout(&transcoded);
        sink.write_dataset(
            &self.config.dataset_name,
            &transcoded.array,
            &layout,
            &self.attrs(&transcoded),
        )?;
        let persisted_size = sink.persisted_size()?;

        let report = TranscodeReport {
            available_frames: transcoded.available_frames,
            processed_frames: transcoded.processed_frames,
            uncompressed_size: transcoded.uncompressed_size,
            persisted_size,
        };
        log::info!(
            "{} → {} bytes (ratio {:.3})",
            report.uncompressed_size,
            report.persisted_size,
            report.ratio()
        );
        Ok(report)
    }
}

fn read_at<S: ByteSource + ?Sized>(source: &mut S, offset: u64, buf: &mut [u8]) -> Result<(), TranscodeError> {
    source
        .read_exact_at(offset, buf)
        .map_err(|source| TranscodeError::Read {
            offset,
            len: buf.len(),
            source,
        })
}
