//! Channel framer, encode direction.
//!
//! Each F3 frame becomes 588 channel bits: the 24-bit sync header, then
//! 34 symbols (subcode slot plus 32 payload bytes) each preceded by 3
//! merging bits. The merging bits carry no data; they exist to keep the
//! RLL(2,10) rule intact across symbol joins and to steer the running
//! digital sum value (DSV) towards zero so the signal stays DC-free.
//!
//! Candidate merging patterns are filtered against the RLL rule, ranked
//! by smallest absolute DSV change and finally vetted against creating a
//! spurious sync header. Failing to find any legal pattern means the
//! encoder produced an impossible symbol context, which is a bug and
//! halts.

use std::collections::VecDeque;

use crate::efm::{self, CHANNEL_FRAME_BITS, FRAME_SYNC, SYNC0, SYNC1};
use crate::frame::{F3Frame, F3FrameType, Frame};
use crate::tvalues;

/// Marker for a merging-bit position that has not been chosen yet
const UNSET: u8 = 2;

/// The four candidate merging-bit patterns
const MERGE_CANDIDATES: [[u8; 3]; 4] = [[0, 0, 0], [0, 0, 1], [0, 1, 0], [1, 0, 0]];

/// Merging-bit slots per frame: subcode symbol plus 32 payload symbols
/// plus the slot in front of the subcode symbol
const MERGE_SLOTS: usize = 34;

/// DSV contribution of a bit window, starting from the given pit/land
/// polarity. Every `1` is a transition and flips the polarity; every
/// bit-cell of the runs between transitions pushes the sum one step in
/// the current direction.
pub fn dsv_delta(bits: &[u8], mut polarity: bool) -> (i32, bool) {
    let mut delta = 0i32;

    for &bit in bits {
        if bit == 1 {
            polarity = !polarity;
        } else if polarity {
            delta += 1;
        } else {
            delta -= 1;
        }
    }

    (delta, polarity)
}

/// True if every complete run of zeros between ones in `window` is 2..=10
/// long. Partial runs at the window edges are left to the neighbouring
/// windows, except that an over-long tail can never become legal and is
/// rejected here.
fn rll_ok(window: &[u8]) -> bool {
    let mut run: Option<u32> = None;

    for &bit in window {
        match bit {
            1 => {
                if let Some(r) = run {
                    if !(2..=10).contains(&r) {
                        return false;
                    }
                }
                run = Some(0);
            }
            _ => {
                if let Some(r) = run {
                    run = Some(r + 1);
                }
            }
        }
    }

    match run {
        Some(r) => r <= 10,
        None => true,
    }
}

/// Count fully-resolved occurrences of `pattern` (windows containing an
/// [`UNSET`] marker can never match)
fn count_pattern(bits: &[u8], pattern: &[u8]) -> usize {
    if bits.len() < pattern.len() {
        return 0;
    }
    bits.windows(pattern.len()).filter(|w| *w == pattern).count()
}

/// F3 frames to channel T-values.
pub struct F3FrameToChannel {
    output_buffer: VecDeque<Vec<u8>>,
    previous_frame: Vec<u8>,

    dsv: i64,
    polarity: bool,

    valid_channel_frames: u64,
    total_t_values: u64,
}

impl Default for F3FrameToChannel {
    fn default() -> F3FrameToChannel {
        F3FrameToChannel {
            output_buffer: VecDeque::new(),
            previous_frame: Vec::new(),
            dsv: 0,
            polarity: true,
            valid_channel_frames: 0,
            total_t_values: 0,
        }
    }
}

impl F3FrameToChannel {
    /// Create the framer
    pub fn new() -> F3FrameToChannel {
        F3FrameToChannel::default()
    }

    /// Push one F3 frame
    pub fn push_frame(&mut self, f3_frame: F3Frame) {
        let frame = self.build_frame(&f3_frame);

        // Sanity: the resolved frame must carry its own sync header and
        // nothing that looks like another one
        if count_pattern(&frame, &FRAME_SYNC) != 1 {
            panic!(
                "F3FrameToChannel: channel frame contains {} sync headers",
                count_pattern(&frame, &FRAME_SYNC)
            );
        }
        if !self.previous_frame.is_empty() {
            let combined = [self.previous_frame.as_slice(), frame.as_slice()].concat();
            if count_pattern(&combined, &FRAME_SYNC) != 2 {
                panic!(
                    "F3FrameToChannel: consecutive channel frames contain {} sync headers",
                    count_pattern(&combined, &FRAME_SYNC)
                );
            }
        }

        // Fold the finished frame into the running DSV
        let (delta, polarity) = dsv_delta(&frame, self.polarity);
        self.dsv += i64::from(delta);
        self.polarity = polarity;

        let t_values = tvalues::bits_to_tvalues(&frame);
        self.total_t_values += t_values.len() as u64;
        self.valid_channel_frames += 1;

        self.previous_frame = frame;
        self.output_buffer.push_back(t_values);
    }

    /// Pop the T-values of the next encoded frame
    pub fn pop_tvalues(&mut self) -> Option<Vec<u8>> {
        self.output_buffer.pop_front()
    }

    /// True if encoded frames are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    /// Assemble and resolve one 588-bit channel frame
    fn build_frame(&mut self, f3_frame: &F3Frame) -> Vec<u8> {
        let mut frame: Vec<u8> = Vec::with_capacity(CHANNEL_FRAME_BITS + FRAME_SYNC.len());

        frame.extend_from_slice(&FRAME_SYNC);
        frame.extend_from_slice(&[UNSET; 3]);

        let subcode_symbol = match f3_frame.frame_type() {
            F3FrameType::Subcode(b) => u16::from(b),
            F3FrameType::Sync0 => SYNC0,
            F3FrameType::Sync1 => SYNC1,
        };
        frame.extend_from_slice(&efm::symbol_bits(
            efm::eight_to_fourteen(subcode_symbol).unwrap(),
        ));
        frame.extend_from_slice(&[UNSET; 3]);

        for &byte in f3_frame.data() {
            frame.extend_from_slice(&efm::symbol_bits(
                efm::eight_to_fourteen(u16::from(byte)).unwrap(),
            ));
            frame.extend_from_slice(&[UNSET; 3]);
        }

        if frame.len() != CHANNEL_FRAME_BITS {
            panic!(
                "F3FrameToChannel: unresolved channel frame is {} bits instead of {}",
                frame.len(),
                CHANNEL_FRAME_BITS
            );
        }

        // The next frame's sync header bounds the final merging slot
        frame.extend_from_slice(&FRAME_SYNC);

        for slot in 0..MERGE_SLOTS {
            self.resolve_merge_slot(&mut frame, slot);
        }

        frame.truncate(CHANNEL_FRAME_BITS);
        frame
    }

    fn resolve_merge_slot(&self, frame: &mut Vec<u8>, slot: usize) {
        let start = 24 + slot * 17;
        let window_start = if slot == 0 { 0 } else { start - 14 };
        let window_end = start + 3 + 14;

        // Polarity at the window start follows from the bits already
        // resolved in front of it
        let ones = frame[..window_start].iter().filter(|&&b| b == 1).count();
        let polarity = self.polarity ^ (ones % 2 == 1);

        let mut ranked: Vec<(i32, &[u8; 3])> = Vec::with_capacity(4);
        for candidate in MERGE_CANDIDATES.iter() {
            let mut window = frame[window_start..start].to_vec();
            window.extend_from_slice(candidate);
            window.extend_from_slice(&frame[start + 3..window_end]);

            if !rll_ok(&window) {
                continue;
            }

            let (delta, _) = dsv_delta(&window, polarity);
            ranked.push((delta.abs(), candidate));
        }

        // Smallest absolute DSV change first; the stable sort keeps the
        // candidate order for ties
        ranked.sort_by_key(|&(delta, _)| delta);

        for &(_, candidate) in &ranked {
            frame[start..start + 3].copy_from_slice(candidate);

            // The frame plus the appended next sync must hold exactly two
            // sync patterns; a third is a spurious header this candidate
            // would fabricate
            if count_pattern(frame, &FRAME_SYNC) == 2 {
                return;
            }

            frame[start..start + 3].copy_from_slice(&[UNSET; 3]);
        }

        panic!("F3FrameToChannel: no legal merging bit pattern found; encode failed");
    }

    /// Current running digital sum value
    pub fn dsv(&self) -> i64 {
        self.dsv
    }

    /// Frames encoded
    pub fn valid_channel_frames(&self) -> u64 {
        self.valid_channel_frames
    }

    /// T-values produced
    pub fn total_t_values(&self) -> u64 {
        self.total_t_values
    }

    /// Log the stage statistics
    pub fn show_statistics(&self) {
        log::info!("F3 Frame to Channel statistics:");
        log::info!("  Valid channel frames: {}", self.valid_channel_frames);
        log::info!("  Total T-values: {}", self.total_t_values);
        log::info!("  Final DSV: {}", self.dsv);
    }
}

#[cfg(test)]
mod test {
    use super::{count_pattern, dsv_delta, rll_ok, F3FrameToChannel};
    use crate::decode::ChannelToF3Frame;
    use crate::efm::FRAME_SYNC;
    use crate::frame::{F3Frame, F3FrameType, Frame};
    use crate::tvalues::Tvalues;

    fn subcode_frame(subcode: u8, payload: [u8; 32]) -> F3Frame {
        let mut f3 = F3Frame::new();
        f3.set_data(&payload);
        f3.set_frame_type_as_subcode(subcode);
        f3
    }

    #[test]
    fn dsv_polarity_folding() {
        // "1000" from positive polarity: the 1 flips to negative, three
        // zero cells pull the sum down
        assert_eq!(dsv_delta(&[1, 0, 0, 0], true), (-3, false));
        // Two transitions: the runs pull in opposite directions and
        // cancel
        assert_eq!(dsv_delta(&[1, 0, 0, 1, 0, 0], true), (0, true));
    }

    #[test]
    fn rll_windows() {
        // Legal: runs of 2
        assert!(rll_ok(&[1, 0, 0, 1, 0, 0, 1]));
        // Adjacent ones
        assert!(!rll_ok(&[0, 0, 1, 1, 0, 0]));
        // Run of 1 zero
        assert!(!rll_ok(&[1, 0, 1]));
        // Leading partial run is ignored
        assert!(rll_ok(&[0, 1, 0, 0, 1]));
        // Over-long run
        let mut long = vec![1];
        long.extend(vec![0; 11]);
        long.push(1);
        assert!(!rll_ok(&long));
    }

    #[test]
    fn frames_are_588_bits_with_one_sync() {
        let mut encoder = F3FrameToChannel::new();
        let mut expander = Tvalues::new();

        encoder.push_frame(subcode_frame(0x41, core::array::from_fn(|i| i as u8)));
        let t_values = encoder.pop_tvalues().unwrap();

        let bits = expander.to_bits(&t_values);
        assert_eq!(bits.len(), 588);
        assert_eq!(count_pattern(&bits, &FRAME_SYNC), 1);
        assert!(bits.starts_with(&FRAME_SYNC));
    }

    #[test]
    fn consecutive_frames_hold_two_syncs() {
        let mut encoder = F3FrameToChannel::new();
        let mut expander = Tvalues::new();

        encoder.push_frame(subcode_frame(0x00, [0xde; 32]));
        encoder.push_frame(subcode_frame(0x01, [0xad; 32]));

        let mut bits = Vec::new();
        while let Some(t) = encoder.pop_tvalues() {
            bits.extend(expander.to_bits(&t));
        }

        assert_eq!(bits.len(), 1176);
        assert_eq!(count_pattern(&bits, &FRAME_SYNC), 2);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut encoder = F3FrameToChannel::new();
        let mut expander = Tvalues::new();
        let mut decoder = ChannelToF3Frame::new();

        let payloads: [[u8; 32]; 3] = [
            core::array::from_fn(|i| i as u8),
            [0x5a; 32],
            core::array::from_fn(|i| (255 - i) as u8),
        ];

        for (i, payload) in payloads.iter().enumerate() {
            encoder.push_frame(subcode_frame(i as u8, *payload));
        }
        while let Some(t) = encoder.pop_tvalues() {
            decoder.push_bits(&expander.to_bits(&t));
        }

        // The last frame stays unbounded until another sync arrives; the
        // first two must decode exactly
        for (i, payload) in payloads.iter().enumerate().take(2) {
            let f3 = decoder.pop_frame().unwrap();
            assert_eq!(f3.frame_type(), F3FrameType::Subcode(i as u8));
            assert_eq!(f3.data(), payload);
        }
    }

    #[test]
    fn sync_pseudo_symbols_roundtrip() {
        let mut encoder = F3FrameToChannel::new();
        let mut expander = Tvalues::new();
        let mut decoder = ChannelToF3Frame::new();

        let mut sync0 = F3Frame::new();
        sync0.set_frame_type_as_sync0();
        let mut sync1 = F3Frame::new();
        sync1.set_frame_type_as_sync1();

        encoder.push_frame(sync0);
        encoder.push_frame(sync1);
        encoder.push_frame(subcode_frame(0, [0; 32]));

        while let Some(t) = encoder.pop_tvalues() {
            decoder.push_bits(&expander.to_bits(&t));
        }

        assert_eq!(decoder.pop_frame().unwrap().frame_type(), F3FrameType::Sync0);
        assert_eq!(decoder.pop_frame().unwrap().frame_type(), F3FrameType::Sync1);
    }

    #[test]
    fn dsv_stays_bounded() {
        let mut encoder = F3FrameToChannel::new();

        for i in 0..50u32 {
            encoder.push_frame(subcode_frame(i as u8, [(i % 251) as u8; 32]));
        }

        // The merging bits keep the running sum from drifting; the exact
        // value is content-dependent but a runaway DSV means the ranking
        // is broken
        assert!(encoder.dsv().abs() < 5000);
    }
}
