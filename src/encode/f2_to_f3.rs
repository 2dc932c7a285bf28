//! F2 sections to F3 frames: stamp the section structure onto the
//! stream by generating the subcode block and tagging the first two
//! frames with the sync0/sync1 pseudo-symbols.

use std::collections::VecDeque;

use crate::frame::{F3Frame, Frame};
use crate::section::F2Section;
use crate::subcode;

/// Section framing stage of the encoder.
#[derive(Default)]
pub struct F2SectionToF3Frames {
    input_buffer: VecDeque<F2Section>,
    output_buffer: VecDeque<Vec<F3Frame>>,

    valid_f3_frames: u64,
}

impl F2SectionToF3Frames {
    /// Create the stage
    pub fn new() -> F2SectionToF3Frames {
        F2SectionToF3Frames::default()
    }

    /// Push one F2 section. Panics on an incomplete section.
    pub fn push_section(&mut self, section: F2Section) {
        self.input_buffer.push_back(section);
        self.process_queue();
    }

    /// Pop the next group of 98 F3 frames
    pub fn pop_frames(&mut self) -> Option<Vec<F3Frame>> {
        self.output_buffer.pop_front()
    }

    /// True if frames are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn process_queue(&mut self) {
        while let Some(f2_section) = self.input_buffer.pop_front() {
            if !f2_section.is_complete() {
                panic!("F2SectionToF3Frames: F2 section is not complete");
            }

            let subcode_data = subcode::to_data(&f2_section.metadata);
            let mut f3_frames = Vec::with_capacity(98);

            for (index, subcode_byte) in subcode_data.iter().enumerate() {
                let f2_frame = f2_section.frame(index);

                let mut f3 = F3Frame::new();
                f3.set_data(f2_frame.data());
                f3.set_error_data(f2_frame.error_data());

                match index {
                    0 => f3.set_frame_type_as_sync0(),
                    1 => f3.set_frame_type_as_sync1(),
                    _ => f3.set_frame_type_as_subcode(*subcode_byte),
                }

                self.valid_f3_frames += 1;
                f3_frames.push(f3);
            }

            self.output_buffer.push_back(f3_frames);
        }
    }

    /// F3 frames generated
    pub fn valid_f3_frames(&self) -> u64 {
        self.valid_f3_frames
    }
}
