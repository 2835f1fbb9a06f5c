/// Decoding contract for one fixed-size detector frame layout.
///
/// The transcoder only ever talks to this trait, so swapping the frame format
/// never touches delta encoding or array assembly. Implementations must be
/// pure reinterpretations of the bytes: no allocation, no mutation.
pub trait FrameFormat: Send + Sync {
    /// Short format name recorded in dataset attributes.
    fn name(&self) -> &'static str;

    /// Bytes per frame.
    fn frame_size(&self) -> usize;

    /// Channels carried by every frame.
    fn n_channels(&self) -> usize;

    /// Sample of `channel` in `frame`.
    ///
    /// `frame` is exactly `frame_size()` bytes and `channel < n_channels()`.
    fn channel_sample(&self, frame: &[u8], channel: usize) -> i16;
}

/// Non-owning view of one raw frame.
///
/// Borrows the read buffer of the current iteration step, so it cannot be
/// retained past the next read into that buffer.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    format: &'a dyn FrameFormat,
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Wrap `bytes` as a frame of `format`.
    ///
    /// # Panics
    /// If `bytes` is shorter than `format.frame_size()`. Callers uphold this
    /// through the input-length check done before iteration starts.
    pub fn new(format: &'a dyn FrameFormat, bytes: &'a [u8]) -> Self {
        let frame_size = format.frame_size();
        assert!(
            bytes.len() >= frame_size,
            "frame buffer holds {} bytes but {} frames are {} bytes",
            bytes.len(),
            format.name(),
            frame_size
        );
        Self {
            format,
            bytes: &bytes[..frame_size],
        }
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.format.n_channels()
    }

    #[inline]
    pub fn channel(&self, channel: usize) -> i16 {
        self.format.channel_sample(self.bytes, channel)
    }

    /// All channel samples in channel order.
    pub fn channels(&self) -> impl Iterator<Item = i16> + '_ {
        (0..self.n_channels()).map(move |ch| self.channel(ch))
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Plain interleaved layout: a fixed header followed by one little-endian
/// `i16` per channel, zero padded up to `frame_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearFrameFormat {
    header_len: usize,
    n_channels: usize,
    frame_size: usize,
}

impl LinearFrameFormat {
    /// Returns `None` when the samples do not fit inside `frame_size`.
    pub fn new(header_len: usize, n_channels: usize, frame_size: usize) -> Option<Self> {
        let needed = header_len.checked_add(n_channels.checked_mul(2)?)?;
        if frame_size == 0 || needed > frame_size {
            return None;
        }
        Some(Self {
            header_len,
            n_channels,
            frame_size,
        })
    }

    /// Tightly packed frames with no header and no padding.
    pub fn packed(n_channels: usize) -> Self {
        Self {
            header_len: 0,
            n_channels,
            frame_size: n_channels * 2,
        }
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Store `value` for `channel` in `frame`.
    pub fn set_channel(&self, frame: &mut [u8], channel: usize, value: i16) {
        let at = self.header_len + channel * 2;
        frame[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }
}

impl FrameFormat for LinearFrameFormat {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn channel_sample(&self, frame: &[u8], channel: usize) -> i16 {
        let at = self.header_len + channel * 2;
        i16::from_le_bytes([frame[at], frame[at + 1]])
    }
}
