use ndarray::{Array2, Axis};

/// Frame-to-frame differencing over one row of channel samples.
///
/// The carried row always holds true sample values, never deltas, so every
/// output is a first difference of the original signal and errors cannot
/// accumulate. The row is refreshed on every call even when differencing is
/// disabled.
#[derive(Debug, Clone)]
pub struct DeltaEncoder {
    enabled: bool,
    previous: Vec<i16>,
}

impl DeltaEncoder {
    pub fn new(n_channels: usize, enabled: bool) -> Self {
        Self {
            enabled,
            previous: vec![0; n_channels],
        }
    }

    /// Output sample for `channel` of frame `frame_index`.
    ///
    /// Subtraction wraps at 16 bits; downstream consumers rely on the wrapped
    /// values.
    #[inline]
    pub fn encode(&mut self, frame_index: u64, channel: usize, current: i16) -> i16 {
        let out = if self.enabled && frame_index > 0 {
            current.wrapping_sub(self.previous[channel])
        } else {
            current
        };
        self.previous[channel] = current;
        out
    }

    /// Encode a whole frame's samples into `out`.
    pub fn encode_row<I>(&mut self, frame_index: u64, samples: I, out: &mut [i16])
    where
        I: IntoIterator<Item = i16>,
    {
        for (channel, (slot, sample)) in out.iter_mut().zip(samples).enumerate() {
            *slot = self.encode(frame_index, channel, sample);
        }
    }
}

/// Undo differencing in place: running wrapping sum down the frame axis,
/// seeded by row 0.
pub fn reconstruct(deltas: &mut Array2<i16>) {
    let n_frames = deltas.len_of(Axis(0));
    for i in 1..n_frames {
        let (done, mut rest) = deltas.view_mut().split_at(Axis(0), i);
        let prev = done.row(i - 1);
        let mut row = rest.row_mut(0);
        row.zip_mut_with(&prev, |cur, &p| *cur = cur.wrapping_add(p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn disabled_passes_samples_through() {
        let mut enc = DeltaEncoder::new(2, false);
        assert_eq!(enc.encode(0, 0, 100), 100);
        assert_eq!(enc.encode(1, 0, 150), 150);
        assert_eq!(enc.encode(2, 0, -7), -7);
    }

    #[test]
    fn first_frame_is_kept_verbatim() {
        let mut enc = DeltaEncoder::new(3, true);
        let mut out = [0i16; 3];
        enc.encode_row(0, [10, 20, 30], &mut out);
        assert_eq!(out, [10, 20, 30]);
    }

    #[test]
    fn later_frames_are_first_differences_of_true_values() {
        let mut enc = DeltaEncoder::new(1, true);
        let outputs: Vec<i16> = [100, 110, 115, 112, 122]
            .iter()
            .enumerate()
            .map(|(i, &s)| enc.encode(i as u64, 0, s))
            .collect();
        assert_eq!(outputs, vec![100, 10, 5, -3, 10]);
    }

    #[test]
    fn state_tracks_true_values_while_disabled() {
        let mut enc = DeltaEncoder::new(1, false);
        enc.encode(0, 0, 40);
        enc.enabled = true;
        assert_eq!(enc.encode(1, 0, 45), 5);
    }

    #[test]
    fn subtraction_wraps() {
        let mut enc = DeltaEncoder::new(1, true);
        enc.encode(0, 0, i16::MIN);
        assert_eq!(enc.encode(1, 0, i16::MAX), -1);
        assert_eq!(enc.encode(2, 0, i16::MIN), 1);
    }

    #[test]
    fn reconstruct_inverts_encoding() {
        let original = array![[100i16, -5], [110, i16::MAX], [90, i16::MIN], [95, 0]];
        let mut enc = DeltaEncoder::new(2, true);
        let mut deltas = Array2::<i16>::zeros(original.dim());
        for (i, row) in original.rows().into_iter().enumerate() {
            let mut out = [0i16; 2];
            enc.encode_row(i as u64, row.iter().copied(), &mut out);
            deltas.row_mut(i).assign(&ndarray::arr1(&out));
        }
        assert_eq!(deltas.row(1).to_vec(), vec![10, i16::MAX.wrapping_add(5)]);
        reconstruct(&mut deltas);
        assert_eq!(deltas, original);
    }

    #[test]
    fn reconstruct_handles_empty_and_single_row() {
        let mut empty = Array2::<i16>::zeros((0, 4));
        reconstruct(&mut empty);
        let mut single = array![[1i16, 2, 3]];
        reconstruct(&mut single);
        assert_eq!(single, array![[1i16, 2, 3]]);
    }
}
