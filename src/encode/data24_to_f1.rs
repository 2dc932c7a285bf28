//! Data24 to F1: the byte-pair swap of ECMA-130 clause 16, encode
//! direction.

use std::collections::VecDeque;

use crate::frame::{F1Frame, Frame};
use crate::section::{Data24Section, F1Section};

/// Swaps each byte pair of the user payload.
#[derive(Default)]
pub struct Data24SectionToF1Section {
    input_buffer: VecDeque<Data24Section>,
    output_buffer: VecDeque<F1Section>,

    valid_sections: u64,
}

impl Data24SectionToF1Section {
    /// Create the stage
    pub fn new() -> Data24SectionToF1Section {
        Data24SectionToF1Section::default()
    }

    /// Push one Data24 section. Panics on an incomplete section.
    pub fn push_section(&mut self, section: Data24Section) {
        self.input_buffer.push_back(section);
        self.process_queue();
    }

    /// Pop the next F1 section
    pub fn pop_section(&mut self) -> Option<F1Section> {
        self.output_buffer.pop_front()
    }

    /// True if sections are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn process_queue(&mut self) {
        while let Some(data24_section) = self.input_buffer.pop_front() {
            if !data24_section.is_complete() {
                panic!("Data24SectionToF1Section: Data24 section is not complete");
            }

            let mut f1_section = F1Section::new();
            f1_section.metadata = data24_section.metadata;

            for index in 0..98 {
                let data24 = data24_section.frame(index);

                let mut data = [0u8; 24];
                let mut error_data = [0u8; 24];
                data.copy_from_slice(data24.data());
                error_data.copy_from_slice(data24.error_data());

                for i in (0..24).step_by(2) {
                    data.swap(i, i + 1);
                    error_data.swap(i, i + 1);
                }

                let mut f1_frame = F1Frame::new();
                f1_frame.set_data(&data);
                f1_frame.set_error_data(&error_data);
                f1_section.push_frame(f1_frame);
            }

            self.valid_sections += 1;
            self.output_buffer.push_back(f1_section);
        }
    }

    /// Sections processed
    pub fn valid_sections(&self) -> u64 {
        self.valid_sections
    }
}

#[cfg(test)]
mod test {
    use super::Data24SectionToF1Section;
    use crate::decode::F1SectionToData24Section;
    use crate::frame::{Data24, Frame};
    use crate::section::Data24Section;

    #[test]
    fn swap_is_inverted_by_decode() {
        let mut encode = Data24SectionToF1Section::new();
        let mut decode = F1SectionToData24Section::new();

        let mut section = Data24Section::new();
        for i in 0..98 {
            let mut f = Data24::new();
            let data: [u8; 24] = core::array::from_fn(|j| (i + j) as u8);
            f.set_data(&data);
            section.push_frame(f);
        }

        encode.push_section(section.clone());
        decode.push_section(encode.pop_section().unwrap());
        let out = decode.pop_section().unwrap();

        for i in 0..98 {
            assert_eq!(out.frame(i).data(), section.frame(i).data());
        }
    }

    #[test]
    fn pairs_are_swapped() {
        let mut encode = Data24SectionToF1Section::new();

        let mut section = Data24Section::new();
        for _ in 0..98 {
            let mut f = Data24::new();
            let data: [u8; 24] = core::array::from_fn(|j| j as u8);
            f.set_data(&data);
            section.push_frame(f);
        }

        encode.push_section(section);
        let out = encode.pop_section().unwrap();
        assert_eq!(&out.frame(0).data()[..4], &[1, 0, 3, 2]);
    }
}
