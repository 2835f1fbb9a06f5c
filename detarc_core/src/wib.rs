use crate::frame::FrameFormat;

/// Bytes in one WIB frame.
///   header[16] + 4 × (coldata header[16] + 8 segments × 12)
///   = 16 + 4 × 112 = 464
pub const WIB_FRAME_SIZE: usize = 464;

/// Channels in one WIB frame.
pub const WIB_N_CHANNELS: usize = 256;

const WIB_HEADER_SIZE: usize = 16;
const COLDATA_HEADER_SIZE: usize = 16;
const SEGMENT_SIZE: usize = 12;
const SEGMENTS_PER_BLOCK: usize = 8;
const BLOCK_SIZE: usize = COLDATA_HEADER_SIZE + SEGMENTS_PER_BLOCK * SEGMENT_SIZE;
const CHANNELS_PER_BLOCK: usize = 64;
const CHANNELS_PER_ADC: usize = 8;

/// Largest value a 12-bit ADC sample can take.
pub const WIB_SAMPLE_MAX: u16 = 0x0FFF;

// ── Segment bit layout ──────────────────────────────────────────────────────

/// A bit field inside one of a segment's three 32-bit words.
#[derive(Clone, Copy)]
struct BitField {
    word: usize,
    shift: u32,
    bits: u32,
}

impl BitField {
    const fn new(word: usize, shift: u32, bits: u32) -> Self {
        Self { word, shift, bits }
    }

    #[inline]
    fn mask(self) -> u32 {
        (1 << self.bits) - 1
    }
}

/// Low and high parts of one 12-bit sample: `value = low | high << low.bits`.
type SamplePlacement = (BitField, BitField);

/// Placement of the four channels each ADC keeps in a segment, indexed by
/// `[adc % 2][channel % 4]`. Each segment packs half of two neighbouring ADCs.
const PLACEMENTS: [[SamplePlacement; 4]; 2] = [
    [
        (BitField::new(0, 0, 8), BitField::new(0, 16, 4)),
        (BitField::new(0, 20, 4), BitField::new(1, 0, 8)),
        (BitField::new(1, 16, 8), BitField::new(2, 0, 4)),
        (BitField::new(2, 4, 4), BitField::new(2, 16, 8)),
    ],
    [
        (BitField::new(0, 8, 8), BitField::new(0, 24, 4)),
        (BitField::new(0, 28, 4), BitField::new(1, 8, 8)),
        (BitField::new(1, 24, 8), BitField::new(2, 8, 4)),
        (BitField::new(2, 12, 4), BitField::new(2, 24, 8)),
    ],
];

/// Byte offset of the segment holding `channel`, plus its placement.
fn locate(channel: usize) -> (usize, SamplePlacement) {
    let block = channel / CHANNELS_PER_BLOCK;
    let adc = channel % CHANNELS_PER_BLOCK / CHANNELS_PER_ADC;
    let rel = channel % CHANNELS_PER_ADC;
    let segment = (adc / 2) * 2 + rel / 4;
    let offset =
        WIB_HEADER_SIZE + block * BLOCK_SIZE + COLDATA_HEADER_SIZE + segment * SEGMENT_SIZE;
    (offset, PLACEMENTS[adc % 2][rel % 4])
}

#[inline]
fn read_word(frame: &[u8], segment: usize, word: usize) -> u32 {
    let at = segment + word * 4;
    u32::from_le_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]])
}

#[inline]
fn write_field(frame: &mut [u8], segment: usize, field: BitField, value: u32) {
    let at = segment + field.word * 4;
    let mut word = read_word(frame, segment, field.word);
    word &= !(field.mask() << field.shift);
    word |= (value & field.mask()) << field.shift;
    frame[at..at + 4].copy_from_slice(&word.to_le_bytes());
}

// ── Format ──────────────────────────────────────────────────────────────────

/// Readout frame produced by the Warm Interface Board: 256 channels of
/// 12-bit ADC samples packed into four COLDATA blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct WibFrameFormat;

impl WibFrameFormat {
    /// Raw 12-bit value of `channel`.
    pub fn channel_value(frame: &[u8], channel: usize) -> u16 {
        let (segment, (low, high)) = locate(channel);
        let lo = (read_word(frame, segment, low.word) >> low.shift) & low.mask();
        let hi = (read_word(frame, segment, high.word) >> high.shift) & high.mask();
        (lo | hi << low.bits) as u16
    }

    /// Store a 12-bit `value` for `channel`; bits above 12 are dropped.
    pub fn set_channel_value(frame: &mut [u8], channel: usize, value: u16) {
        let (segment, (low, high)) = locate(channel);
        let value = u32::from(value & WIB_SAMPLE_MAX);
        write_field(frame, segment, low, value);
        write_field(frame, segment, high, value >> low.bits);
    }
}

impl FrameFormat for WibFrameFormat {
    fn name(&self) -> &'static str {
        "wib"
    }

    fn frame_size(&self) -> usize {
        WIB_FRAME_SIZE
    }

    fn n_channels(&self) -> usize {
        WIB_N_CHANNELS
    }

    fn channel_sample(&self, frame: &[u8], channel: usize) -> i16 {
        // 12-bit samples always fit.
        Self::channel_value(frame, channel) as i16
    }
}

// ── Synthetic data ──────────────────────────────────────────────────────────

/// Deterministic WIB frames: each channel sits on its own pedestal and
/// wanders by a few ADC counts per frame, like a quiet detector.
/// The same `seed` always produces the same bytes.
pub fn synthetic_frames(n_frames: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    let mut next = move || {
        rng = rng
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (rng >> 33) as u32
    };

    let mut levels: Vec<i32> = (0..WIB_N_CHANNELS)
        .map(|_| 500 + (next() % 2000) as i32)
        .collect();
    let mut out = vec![0u8; n_frames * WIB_FRAME_SIZE];
    for frame in out.chunks_exact_mut(WIB_FRAME_SIZE) {
        frame[0] = 0x3C; // start-of-frame marker
        for (ch, level) in levels.iter_mut().enumerate() {
            *level = (*level + (next() % 7) as i32 - 3).clamp(0, WIB_SAMPLE_MAX as i32);
            WibFrameFormat::set_channel_value(frame, ch, *level as u16);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    #[test]
    fn synthetic_frames_are_reproducible_and_bounded() {
        let a = synthetic_frames(4, 7);
        assert_eq!(a.len(), 4 * WIB_FRAME_SIZE);
        assert_eq!(a, synthetic_frames(4, 7));
        assert_ne!(a, synthetic_frames(4, 8));
        for raw in a.chunks_exact(WIB_FRAME_SIZE) {
            let frame = Frame::new(&WibFrameFormat, raw);
            assert!(frame.channels().all(|s| (0..=WIB_SAMPLE_MAX as i16).contains(&s)));
        }
    }

    #[test]
    fn frame_geometry() {
        assert_eq!(BLOCK_SIZE, 112);
        assert_eq!(WIB_HEADER_SIZE + 4 * BLOCK_SIZE, WIB_FRAME_SIZE);
    }

    #[test]
    fn channel_zero_spans_first_word() {
        // adc0ch0 = low 8 bits at [0..8), high 4 bits at [16..20) of word 0.
        let mut frame = [0u8; WIB_FRAME_SIZE];
        let seg = WIB_HEADER_SIZE + COLDATA_HEADER_SIZE;
        frame[seg] = 0xBC;
        frame[seg + 2] = 0x0A;
        assert_eq!(WibFrameFormat::channel_value(&frame, 0), 0xABC);
    }

    #[test]
    fn odd_adc_channel_one_straddles_words() {
        // Channel 9 is adc 1, rel 1: low nibble at word0[28..32), high byte at word1[8..16).
        let mut frame = [0u8; WIB_FRAME_SIZE];
        let seg = WIB_HEADER_SIZE + COLDATA_HEADER_SIZE;
        frame[seg + 3] = 0x50;
        frame[seg + 5] = 0x7E;
        assert_eq!(WibFrameFormat::channel_value(&frame, 9), 0x7E5);
    }

    #[test]
    fn upper_channels_land_in_later_blocks() {
        let mut frame = [0u8; WIB_FRAME_SIZE];
        // Channel 196 is block 3, adc 0, rel 4 → segment 1, placement [0][0].
        let seg = WIB_HEADER_SIZE + 3 * BLOCK_SIZE + COLDATA_HEADER_SIZE + SEGMENT_SIZE;
        frame[seg] = 0x21;
        frame[seg + 2] = 0x03;
        assert_eq!(WibFrameFormat::channel_value(&frame, 196), 0x321);
    }

    #[test]
    fn every_channel_is_independent() {
        let value = |ch: usize| (ch as u16 * 37 + 11) & WIB_SAMPLE_MAX;
        let mut frame = [0u8; WIB_FRAME_SIZE];
        for ch in 0..WIB_N_CHANNELS {
            WibFrameFormat::set_channel_value(&mut frame, ch, value(ch));
        }
        let frame = Frame::new(&WibFrameFormat, &frame);
        for ch in 0..WIB_N_CHANNELS {
            assert_eq!(frame.channel(ch), value(ch) as i16, "channel {ch}");
        }
    }

    #[test]
    fn headers_are_left_untouched() {
        let mut frame = [0u8; WIB_FRAME_SIZE];
        for ch in 0..WIB_N_CHANNELS {
            WibFrameFormat::set_channel_value(&mut frame, ch, WIB_SAMPLE_MAX);
        }
        assert!(frame[..WIB_HEADER_SIZE].iter().all(|&b| b == 0));
        for block in 0..4 {
            let start = WIB_HEADER_SIZE + block * BLOCK_SIZE;
            assert!(frame[start..start + COLDATA_HEADER_SIZE].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn values_wider_than_twelve_bits_are_truncated() {
        let mut frame = [0u8; WIB_FRAME_SIZE];
        WibFrameFormat::set_channel_value(&mut frame, 5, 0xF123);
        assert_eq!(WibFrameFormat::channel_value(&frame, 5), 0x123);
        assert_eq!(WibFrameFormat::channel_value(&frame, 4), 0);
        assert_eq!(WibFrameFormat::channel_value(&frame, 6), 0);
    }
}
