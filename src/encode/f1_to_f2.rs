//! CIRC encode: F1 sections to F2 sections.
//!
//! The mirror of the decode chain: delay line 2, interleave, C2 encode,
//! the long M delays, C1 encode, delay line 1, parity inversion. The
//! delay vectors are the decode vectors reversed lane-for-lane so that
//! encode followed by decode restores every byte to its original lane
//! position.
//!
//! Until the banks are primed the stage emits blank F2 frames; together
//! with the decoder's own priming this costs about 111 + 111 frames, so
//! callers must bracket real data with enough lead-in and lead-out.

use std::collections::VecDeque;

use crate::circ::{interleave, parity, DelayLines, ReedSolomon};
use crate::frame::{F2Frame, Frame};
use crate::section::{F1Section, F2Section};

/// Encoder-side delay vector for delay line 1 (alternating 1/0)
const DELAY_LINE_1: [usize; 32] = [
    1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0,
];

/// Encoder-side main delay bank (ascending 4-frame steps)
const DELAY_LINE_M: [usize; 28] = [
    0, 4, 8, 12, 16, 20, 24, 28, 32, 36, 40, 44, 48, 52, 56, 60, 64, 68, 72, 76, 80, 84, 88, 92,
    96, 100, 104, 108,
];

/// Encoder-side delay line 2 (2-frame groups first)
const DELAY_LINE_2: [usize; 24] = [
    2, 2, 2, 2, 0, 0, 0, 0, 2, 2, 2, 2, 0, 0, 0, 0, 2, 2, 2, 2, 0, 0, 0, 0,
];

/// The CIRC encoder stage.
pub struct F1SectionToF2Section {
    input_buffer: VecDeque<F1Section>,
    output_buffer: VecDeque<F2Section>,

    circ: ReedSolomon,
    delay_line1: DelayLines,
    delay_line_m: DelayLines,
    delay_line2: DelayLines,

    valid_sections: u64,
}

impl Default for F1SectionToF2Section {
    fn default() -> F1SectionToF2Section {
        F1SectionToF2Section {
            input_buffer: VecDeque::new(),
            output_buffer: VecDeque::new(),
            circ: ReedSolomon::new(),
            delay_line1: DelayLines::new(&DELAY_LINE_1),
            delay_line_m: DelayLines::new(&DELAY_LINE_M),
            delay_line2: DelayLines::new(&DELAY_LINE_2),
            valid_sections: 0,
        }
    }
}

impl F1SectionToF2Section {
    /// Create the encoder
    pub fn new() -> F1SectionToF2Section {
        F1SectionToF2Section::default()
    }

    /// Push one F1 section. Panics on an incomplete section.
    pub fn push_section(&mut self, section: F1Section) {
        self.input_buffer.push_back(section);
        self.process_queue();
    }

    /// Pop the next F2 section
    pub fn pop_section(&mut self) -> Option<F2Section> {
        self.output_buffer.pop_front()
    }

    /// True if F2 sections are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn process_queue(&mut self) {
        while let Some(f1_section) = self.input_buffer.pop_front() {
            if !f1_section.is_complete() {
                panic!("F1SectionToF2Section: F1 section is not complete");
            }

            let mut f2_section = F2Section::new();
            f2_section.metadata = f1_section.metadata;

            for index in 0..98 {
                let f1_frame = f1_section.frame(index);

                let pushed = self
                    .delay_line2
                    .push(f1_frame.data(), f1_frame.error_data());
                let (data, error_data) = match pushed {
                    Some(v) => v,
                    None => {
                        f2_section.push_frame(F2Frame::new());
                        continue;
                    }
                };

                let data = interleave::interleave(&data);
                let error_data = interleave::interleave(&error_data);

                let data = self.circ.c2_encode(&data);
                // The parity slots never carry input erasures
                let mut error_data28 = Vec::with_capacity(28);
                error_data28.extend_from_slice(&error_data[..12]);
                error_data28.extend_from_slice(&[0; 4]);
                error_data28.extend_from_slice(&error_data[12..]);

                let (data, error_data) = match self.delay_line_m.push(&data, &error_data28) {
                    Some(v) => v,
                    None => {
                        f2_section.push_frame(F2Frame::new());
                        continue;
                    }
                };

                let data = self.circ.c1_encode(&data);
                let mut error_data32 = error_data;
                error_data32.extend_from_slice(&[0; 4]);

                let (mut data, error_data) = match self.delay_line1.push(&data, &error_data32) {
                    Some(v) => v,
                    None => {
                        f2_section.push_frame(F2Frame::new());
                        continue;
                    }
                };

                parity::invert_parity(&mut data);

                let mut f2_frame = F2Frame::new();
                f2_frame.set_data(&data);
                f2_frame.set_error_data(&error_data);
                f2_section.push_frame(f2_frame);
            }

            self.valid_sections += 1;
            self.output_buffer.push_back(f2_section);
        }
    }

    /// Sections encoded
    pub fn valid_sections(&self) -> u64 {
        self.valid_sections
    }
}
