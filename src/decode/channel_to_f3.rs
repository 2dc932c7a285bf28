//! Channel framer, decode direction: hunt the 24-bit frame sync, slice
//! out 588-bit frames and decode their 33 EFM symbols into F3 frames.

use std::collections::VecDeque;

use log::debug;

use crate::efm::{self, CHANNEL_FRAME_BITS, FRAME_SYNC, SYNC0, SYNC1};
use crate::frame::{F3Frame, Frame};

/// Find the first occurrence of the frame sync pattern at or after `from`
fn find_sync(bits: &[u8], from: usize) -> Option<usize> {
    if bits.len() < FRAME_SYNC.len() {
        return None;
    }

    bits[from..]
        .windows(FRAME_SYNC.len())
        .position(|w| w == FRAME_SYNC)
        .map(|p| p + from)
}

/// Channel bits to F3 frames.
///
/// The internal buffer accumulates bits until it holds a full frame plus
/// the next frame's sync header; only then is a frame considered bounded
/// on both sides and extracted. Sync spacings other than 588 bits and
/// unknown symbols fail the frame (counted, not fatal) and the hunt
/// resumes at the next sync.
#[derive(Default)]
pub struct ChannelToF3Frame {
    internal_buffer: Vec<u8>,
    output_buffer: VecDeque<F3Frame>,

    valid_channel_frames: u64,
    invalid_channel_frames: u64,
    discarded_bits: u64,
}

impl ChannelToF3Frame {
    /// Create the framer
    pub fn new() -> ChannelToF3Frame {
        ChannelToF3Frame::default()
    }

    /// Push a run of channel bits (one byte per bit)
    pub fn push_bits(&mut self, bits: &[u8]) {
        self.internal_buffer.extend_from_slice(bits);
        self.process_buffer();
    }

    /// Pop the next decoded F3 frame
    pub fn pop_frame(&mut self) -> Option<F3Frame> {
        self.output_buffer.pop_front()
    }

    /// True if decoded frames are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn process_buffer(&mut self) {
        // A frame is only extracted once the *next* sync header is also in
        // the buffer, so 588 + 24 bits minimum
        while self.internal_buffer.len() > CHANNEL_FRAME_BITS + FRAME_SYNC.len() {
            let first = match find_sync(&self.internal_buffer, 0) {
                Some(i) => i,
                None => {
                    // No sync anywhere; keep only the tail that could be
                    // the start of one
                    let keep = FRAME_SYNC.len();
                    let discard = self.internal_buffer.len() - keep;
                    self.discarded_bits += discard as u64;
                    self.internal_buffer.drain(..discard);
                    break;
                }
            };

            let second = match find_sync(&self.internal_buffer, first + 1) {
                Some(i) => i,
                None => {
                    // Wait for the closing sync; drop the garbage in front
                    // of the opening one so the buffer cannot grow without
                    // bound
                    self.discarded_bits += first as u64;
                    self.internal_buffer.drain(..first);
                    break;
                }
            };

            if second - first == CHANNEL_FRAME_BITS {
                let frame: Vec<u8> = self.internal_buffer[first..second].to_vec();
                match self.decode_frame(&frame) {
                    Some(f3) => {
                        self.valid_channel_frames += 1;
                        self.output_buffer.push_back(f3);
                    }
                    None => {
                        self.invalid_channel_frames += 1;
                        debug!("ChannelToF3Frame: dropping frame with undecodable symbols");
                    }
                }
            } else {
                self.invalid_channel_frames += 1;
                debug!(
                    "ChannelToF3Frame: dropping frame with sync spacing of {} bits",
                    second - first
                );
            }

            self.discarded_bits += first as u64;
            self.internal_buffer.drain(..second);
        }
    }

    /// Decode a bounded 588-bit frame. Returns `None` if any symbol fails
    /// the table lookup.
    fn decode_frame(&self, frame: &[u8]) -> Option<F3Frame> {
        // Layout: sync(24) merge(3) subcode(14) merge(3) 32 x (data(14) merge(3))
        let subcode_value =
            efm::fourteen_to_eight(efm::bits_to_symbol(&frame[27..41])).ok()?;

        let mut data = [0u8; 32];
        for (i, byte) in data.iter_mut().enumerate() {
            let start = 24 + 3 + 14 + 3 + 17 * i;
            let value =
                efm::fourteen_to_eight(efm::bits_to_symbol(&frame[start..start + 14])).ok()?;
            if value > 0xff {
                // A sync0/sync1 pseudo-symbol in a payload slot is channel
                // corruption
                return None;
            }
            *byte = value as u8;
        }

        let mut f3 = F3Frame::new();
        f3.set_data(&data);
        match subcode_value {
            SYNC0 => f3.set_frame_type_as_sync0(),
            SYNC1 => f3.set_frame_type_as_sync1(),
            b => f3.set_frame_type_as_subcode(b as u8),
        }

        Some(f3)
    }

    /// Frames decoded successfully
    pub fn valid_channel_frames(&self) -> u64 {
        self.valid_channel_frames
    }

    /// Frames dropped for bad spacing or unknown symbols
    pub fn invalid_channel_frames(&self) -> u64 {
        self.invalid_channel_frames
    }

    /// Bits discarded while hunting for sync
    pub fn discarded_bits(&self) -> u64 {
        self.discarded_bits
    }

    /// Log the stage statistics
    pub fn show_statistics(&self) {
        log::info!("Channel to F3 Frame statistics:");
        log::info!("  Valid channel frames: {}", self.valid_channel_frames);
        log::info!("  Invalid channel frames: {}", self.invalid_channel_frames);
        log::info!("  Discarded bits: {}", self.discarded_bits);
    }
}

#[cfg(test)]
mod test {
    use super::{find_sync, ChannelToF3Frame};
    use crate::efm::{self, CHANNEL_FRAME_BITS, FRAME_SYNC};
    use crate::frame::{F3FrameType, Frame};

    /// Build a legal-enough 588-bit frame with fixed merging bits. `000`
    /// merging bits never break RLL at the seams the test symbols have,
    /// and the framer does not re-validate runs on decode.
    fn build_frame(subcode_value: u16, payload: &[u8; 32]) -> Vec<u8> {
        let mut bits = Vec::with_capacity(CHANNEL_FRAME_BITS);
        bits.extend_from_slice(&FRAME_SYNC);
        bits.extend_from_slice(&[0, 0, 0]);
        bits.extend_from_slice(&efm::symbol_bits(
            efm::eight_to_fourteen(subcode_value).unwrap(),
        ));
        bits.extend_from_slice(&[0, 0, 0]);
        for &b in payload.iter() {
            bits.extend_from_slice(&efm::symbol_bits(
                efm::eight_to_fourteen(u16::from(b)).unwrap(),
            ));
            bits.extend_from_slice(&[0, 0, 0]);
        }
        assert_eq!(bits.len(), CHANNEL_FRAME_BITS);
        bits
    }

    #[test]
    fn sync_hunting() {
        let bits = [vec![0u8; 5], FRAME_SYNC.to_vec()].concat();
        assert_eq!(find_sync(&bits, 0), Some(5));
        assert_eq!(find_sync(&bits, 6), None);
    }

    #[test]
    fn decodes_bounded_frame() {
        let payload: [u8; 32] = core::array::from_fn(|i| i as u8);
        let mut stage = ChannelToF3Frame::new();

        // One full frame plus the opening of the next
        stage.push_bits(&build_frame(0x41, &payload));
        assert!(!stage.is_ready());
        stage.push_bits(&build_frame(256, &payload));
        assert!(stage.is_ready());

        let f3 = stage.pop_frame().unwrap();
        assert_eq!(f3.frame_type(), F3FrameType::Subcode(0x41));
        assert_eq!(f3.data(), &payload);
        assert_eq!(stage.valid_channel_frames(), 1);
    }

    #[test]
    fn sync_pseudo_symbols_tag_the_frame() {
        let payload = [0u8; 32];
        let mut stage = ChannelToF3Frame::new();

        stage.push_bits(&build_frame(256, &payload));
        stage.push_bits(&build_frame(257, &payload));
        stage.push_bits(&build_frame(0, &payload));

        let first = stage.pop_frame().unwrap();
        assert_eq!(first.frame_type(), F3FrameType::Sync0);
        let second = stage.pop_frame().unwrap();
        assert_eq!(second.frame_type(), F3FrameType::Sync1);
    }

    #[test]
    fn garbage_prefix_is_discarded() {
        let payload = [7u8; 32];
        let mut stage = ChannelToF3Frame::new();

        let mut bits = vec![0u8; 100];
        bits.extend(build_frame(0x10, &payload));
        bits.extend(build_frame(0x11, &payload));
        stage.push_bits(&bits);

        assert!(stage.is_ready());
        assert_eq!(
            stage.pop_frame().unwrap().frame_type(),
            F3FrameType::Subcode(0x10)
        );
        assert!(stage.discarded_bits() >= 100);
    }

    #[test]
    fn bad_spacing_drops_frame() {
        let payload = [3u8; 32];
        let mut stage = ChannelToF3Frame::new();

        let mut bits = build_frame(0x22, &payload);
        // Chop a few bits off the end of the first frame so the spacing
        // comes up short
        bits.truncate(CHANNEL_FRAME_BITS - 4);
        stage.push_bits(&bits);
        stage.push_bits(&build_frame(0x23, &payload));
        stage.push_bits(&build_frame(0x24, &payload));

        // First "frame" had 584-bit spacing and is dropped; the second
        // decodes fine
        assert_eq!(stage.invalid_channel_frames(), 1);
        assert_eq!(
            stage.pop_frame().unwrap().frame_type(),
            F3FrameType::Subcode(0x23)
        );
    }
}
