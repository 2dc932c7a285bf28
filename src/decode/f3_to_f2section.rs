//! F3 frame to F2 section assembly.
//!
//! Sections are bounded by the sync0/sync1 pseudo-symbols in the first
//! two frames. The assembler is a state machine that tolerates mislabelled
//! frames: a missing sync is synthesised or a stray subcode relabelled so
//! a single damaged subcode slot cannot shear off a whole section.

use std::collections::VecDeque;

use log::debug;

use crate::frame::{F3Frame, F3FrameType, Frame};
use crate::metadata::SectionMetadata;
use crate::section::F2Section;
use crate::subcode;
use crate::{frame::F2Frame, FRAMES_PER_SECTION};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum State {
    ExpectSync0,
    ExpectSync1,
    ExpectSubcode,
}

/// Groups 98 F3 frames into an F2 section and decodes the section's
/// subcode block into metadata.
pub struct F3FrameToF2Section {
    state: State,
    section_buffer: Vec<F3Frame>,
    output_buffer: VecDeque<F2Section>,

    missed_sync0s: u64,
    missed_sync1s: u64,
    missed_subcodes: u64,
    valid_sections: u64,
    invalid_sections: u64,
    input_f3_frames: u64,
}

impl Default for F3FrameToF2Section {
    fn default() -> F3FrameToF2Section {
        F3FrameToF2Section {
            state: State::ExpectSync0,
            section_buffer: Vec::with_capacity(FRAMES_PER_SECTION),
            output_buffer: VecDeque::new(),
            missed_sync0s: 0,
            missed_sync1s: 0,
            missed_subcodes: 0,
            valid_sections: 0,
            invalid_sections: 0,
            input_f3_frames: 0,
        }
    }
}

impl F3FrameToF2Section {
    /// Create the assembler
    pub fn new() -> F3FrameToF2Section {
        F3FrameToF2Section::default()
    }

    /// Push one F3 frame
    pub fn push_frame(&mut self, frame: F3Frame) {
        self.input_f3_frames += 1;

        self.state = match self.state {
            State::ExpectSync0 => self.expect_sync0(frame),
            State::ExpectSync1 => self.expect_sync1(frame),
            State::ExpectSubcode => self.expect_subcode(frame),
        };
    }

    /// Pop the next assembled F2 section
    pub fn pop_section(&mut self) -> Option<F2Section> {
        self.output_buffer.pop_front()
    }

    /// True if a section is waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn expect_sync0(&mut self, mut frame: F3Frame) -> State {
        match frame.frame_type() {
            F3FrameType::Sync0 => {
                self.section_buffer.clear();
                self.section_buffer.push(frame);
                State::ExpectSync1
            }
            F3FrameType::Sync1 => {
                self.missed_sync0s += 1;
                debug!("F3FrameToF2Section: Sync1 received when expecting Sync0");

                // Promote the most recent frame (if any) to sync0 so the
                // section survives; otherwise fabricate one
                let mut sync0 = match self.section_buffer.last() {
                    Some(f) => f.clone(),
                    None => F3Frame::new(),
                };
                sync0.set_frame_type_as_sync0();

                self.section_buffer.clear();
                self.section_buffer.push(sync0);
                self.section_buffer.push(frame);
                State::ExpectSubcode
            }
            F3FrameType::Subcode(_) => {
                self.missed_sync0s += 1;
                debug!("F3FrameToF2Section: Subcode received when expecting Sync0");

                // Assume a mislabelled sync0
                frame.set_frame_type_as_sync0();
                self.section_buffer.clear();
                self.section_buffer.push(frame);
                State::ExpectSync1
            }
        }
    }

    fn expect_sync1(&mut self, mut frame: F3Frame) -> State {
        match frame.frame_type() {
            F3FrameType::Sync1 => {
                self.section_buffer.push(frame);
                State::ExpectSubcode
            }
            F3FrameType::Sync0 => {
                self.missed_sync1s += 1;
                debug!("F3FrameToF2Section: Sync0 received when expecting Sync1");

                // Restart the section on the fresh sync0
                self.section_buffer.clear();
                self.section_buffer.push(frame);
                State::ExpectSync1
            }
            F3FrameType::Subcode(_) => {
                self.missed_sync1s += 1;
                debug!("F3FrameToF2Section: Subcode received when expecting Sync1");

                // Assume a mislabelled sync1
                frame.set_frame_type_as_sync1();
                self.section_buffer.push(frame);
                State::ExpectSubcode
            }
        }
    }

    fn expect_subcode(&mut self, mut frame: F3Frame) -> State {
        match frame.frame_type() {
            F3FrameType::Subcode(_) => {
                self.section_buffer.push(frame);
            }
            F3FrameType::Sync0 => {
                self.missed_subcodes += 1;
                self.invalid_sections += 1;
                debug!("F3FrameToF2Section: Sync0 received when expecting Subcode");

                // The section is lost; restart on this sync0
                self.section_buffer.clear();
                self.section_buffer.push(frame);
                return State::ExpectSync1;
            }
            F3FrameType::Sync1 => {
                self.missed_subcodes += 1;
                debug!("F3FrameToF2Section: Sync1 received when expecting Subcode");

                // Assume a mislabelled subcode byte
                frame.set_frame_type_as_subcode(0);
                self.section_buffer.push(frame);
            }
        }

        if self.section_buffer.len() == FRAMES_PER_SECTION {
            self.valid_sections += 1;
            self.process_section();
            State::ExpectSync0
        } else {
            State::ExpectSubcode
        }
    }

    /// Assemble the buffered 98 frames into an F2 section
    fn process_section(&mut self) {
        if self.section_buffer.len() != FRAMES_PER_SECTION {
            panic!("F3FrameToF2Section::process_section: section buffer is not full");
        }
        if self.section_buffer[0].frame_type() != F3FrameType::Sync0 {
            panic!("F3FrameToF2Section::process_section: first frame is not a Sync0");
        }
        if self.section_buffer[1].frame_type() != F3FrameType::Sync1 {
            panic!("F3FrameToF2Section::process_section: second frame is not a Sync1");
        }

        let mut subcode_data = [0u8; FRAMES_PER_SECTION];
        for (i, f3) in self.section_buffer.iter().enumerate() {
            subcode_data[i] = f3.subcode_byte();
        }
        let metadata: SectionMetadata = subcode::from_data(&subcode_data);

        let mut section = F2Section::new();
        for f3 in self.section_buffer.drain(..) {
            let mut f2 = F2Frame::new();
            f2.set_data(f3.data());
            f2.set_error_data(f3.error_data());
            section.push_frame(f2);
        }
        section.metadata = metadata;

        self.output_buffer.push_back(section);
    }

    /// Sections assembled
    pub fn valid_sections(&self) -> u64 {
        self.valid_sections
    }

    /// Sections abandoned mid-assembly
    pub fn invalid_sections(&self) -> u64 {
        self.invalid_sections
    }

    /// Sync0 frames that were missing or mislabelled
    pub fn missed_sync0s(&self) -> u64 {
        self.missed_sync0s
    }

    /// Sync1 frames that were missing or mislabelled
    pub fn missed_sync1s(&self) -> u64 {
        self.missed_sync1s
    }

    /// Subcode frames that were missing or mislabelled
    pub fn missed_subcodes(&self) -> u64 {
        self.missed_subcodes
    }

    /// Log the stage statistics
    pub fn show_statistics(&self) {
        log::info!("F3 Frame to F2 Section statistics:");
        log::info!("  F2 Sections:");
        log::info!("    Valid F2 sections: {}", self.valid_sections);
        log::info!("    Invalid F2 sections: {}", self.invalid_sections);
        log::info!("  Sync tracking:");
        log::info!("    Missed sync0s: {}", self.missed_sync0s);
        log::info!("    Missed sync1s: {}", self.missed_sync1s);
        log::info!("    Missed subcodes: {}", self.missed_subcodes);
        log::info!("  F3 Frames:");
        log::info!("    Input F3 frames: {}", self.input_f3_frames);
        log::info!(
            "    Discarded F3 frames: {}",
            self.input_f3_frames - self.valid_sections * 98
        );
    }
}

#[cfg(test)]
mod test {
    use super::F3FrameToF2Section;
    use crate::frame::F3Frame;
    use crate::metadata::SectionMetadata;
    use crate::subcode;
    use crate::FRAMES_PER_SECTION;

    fn section_frames(metadata: &SectionMetadata) -> Vec<F3Frame> {
        let subcode_data = subcode::to_data(metadata);
        (0..FRAMES_PER_SECTION)
            .map(|i| {
                let mut f3 = F3Frame::new();
                match i {
                    0 => f3.set_frame_type_as_sync0(),
                    1 => f3.set_frame_type_as_sync1(),
                    _ => f3.set_frame_type_as_subcode(subcode_data[i]),
                }
                f3
            })
            .collect()
    }

    fn valid_metadata() -> SectionMetadata {
        let mut m = SectionMetadata::new();
        m.set_track_number(3);
        m.set_valid(true);
        m
    }

    #[test]
    fn assembles_clean_section() {
        let mut stage = F3FrameToF2Section::new();

        for f3 in section_frames(&valid_metadata()) {
            stage.push_frame(f3);
        }

        assert!(stage.is_ready());
        let section = stage.pop_section().unwrap();
        assert!(section.is_complete());
        assert!(section.metadata.is_valid());
        assert_eq!(section.metadata.track_number(), 3);
        assert_eq!(stage.valid_sections(), 1);
    }

    #[test]
    fn relabels_subcode_as_sync0() {
        let mut stage = F3FrameToF2Section::new();
        let mut frames = section_frames(&valid_metadata());

        // Corrupt the sync0 label: it arrives tagged as a subcode byte
        frames[0].set_frame_type_as_subcode(0);

        for f3 in frames {
            stage.push_frame(f3);
        }

        assert!(stage.is_ready());
        assert_eq!(stage.missed_sync0s(), 1);
        assert!(stage.pop_section().unwrap().metadata.is_valid());
    }

    #[test]
    fn relabels_sync1_as_subcode() {
        let mut stage = F3FrameToF2Section::new();
        let mut frames = section_frames(&valid_metadata());

        // A mid-section frame mislabelled as sync1 gets folded back in as
        // a (zero) subcode byte
        frames[50].set_frame_type_as_sync1();

        for f3 in frames {
            stage.push_frame(f3);
        }

        assert!(stage.is_ready());
        assert_eq!(stage.missed_subcodes(), 1);
        // The zeroed subcode byte breaks the CRC but the section itself
        // survives
        let section = stage.pop_section().unwrap();
        assert!(section.is_complete());
    }

    #[test]
    fn sync0_mid_section_restarts() {
        let mut stage = F3FrameToF2Section::new();

        // 40 frames of a section, then a fresh sync0: the partial section
        // is abandoned
        let frames = section_frames(&valid_metadata());
        for f3 in frames.iter().take(40).cloned() {
            stage.push_frame(f3);
        }
        for f3 in section_frames(&valid_metadata()) {
            stage.push_frame(f3);
        }

        // The partial section was abandoned, the fresh one assembled
        assert_eq!(stage.invalid_sections(), 1);
        assert_eq!(stage.valid_sections(), 1);
        assert!(stage.is_ready());
    }

    #[test]
    fn synthesises_missing_sync0() {
        let mut stage = F3FrameToF2Section::new();
        let frames = section_frames(&valid_metadata());

        // Drop the sync0 entirely: the stream starts on sync1 and a
        // fabricated sync0 completes the section
        for f3 in frames.iter().skip(1).cloned() {
            stage.push_frame(f3);
        }

        assert!(stage.is_ready());
        assert_eq!(stage.missed_sync0s(), 1);
        assert!(stage.pop_section().unwrap().is_complete());
    }
}
