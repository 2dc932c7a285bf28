//! F1 to Data24: undo the byte-pair swap of ECMA-130 clause 16.

use std::collections::VecDeque;

use crate::frame::{Data24, Frame};
use crate::section::{Data24Section, F1Section};
use crate::time::SectionTime;

/// Swaps byte pairs back into user order and keeps the byte-loss
/// accounting that feeds the final data-loss figure.
pub struct F1SectionToData24Section {
    input_buffer: VecDeque<F1Section>,
    output_buffer: VecDeque<Data24Section>,

    valid_frames: u64,
    invalid_frames: u64,
    corrupt_bytes: u64,

    start_time: SectionTime,
    end_time: SectionTime,
    have_times: bool,
}

impl Default for F1SectionToData24Section {
    fn default() -> F1SectionToData24Section {
        F1SectionToData24Section {
            input_buffer: VecDeque::new(),
            output_buffer: VecDeque::new(),
            valid_frames: 0,
            invalid_frames: 0,
            corrupt_bytes: 0,
            start_time: SectionTime::MAX,
            end_time: SectionTime::ZERO,
            have_times: false,
        }
    }
}

impl F1SectionToData24Section {
    /// Create the stage
    pub fn new() -> F1SectionToData24Section {
        F1SectionToData24Section::default()
    }

    /// Push one F1 section. Panics on an incomplete section.
    pub fn push_section(&mut self, section: F1Section) {
        self.input_buffer.push_back(section);
        self.process_queue();
    }

    /// Pop the next Data24 section
    pub fn pop_section(&mut self) -> Option<Data24Section> {
        self.output_buffer.pop_front()
    }

    /// True if sections are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn process_queue(&mut self) {
        while let Some(f1_section) = self.input_buffer.pop_front() {
            if !f1_section.is_complete() {
                panic!("F1SectionToData24Section: F1 section is not complete");
            }

            let mut data24_section = Data24Section::new();
            data24_section.metadata = f1_section.metadata;

            for index in 0..98 {
                let f1_frame = f1_section.frame(index);

                let mut data = [0u8; 24];
                let mut error_data = [0u8; 24];
                data.copy_from_slice(f1_frame.data());
                error_data.copy_from_slice(f1_frame.error_data());

                // All byte pairs are swapped by the F1 frame encoder; the
                // error flags travel with their bytes
                for i in (0..24).step_by(2) {
                    data.swap(i, i + 1);
                    error_data.swap(i, i + 1);
                }

                let errors = u64::from(f1_frame.count_errors());
                self.corrupt_bytes += errors;
                if errors > 0 {
                    self.invalid_frames += 1;
                } else {
                    self.valid_frames += 1;
                }

                let mut data24 = Data24::new();
                data24.set_data(&data);
                data24.set_error_data(&error_data);
                data24_section.push_frame(data24);
            }

            let absolute = data24_section.metadata.absolute_section_time();
            if !self.have_times {
                self.start_time = absolute;
                self.end_time = absolute;
                self.have_times = true;
            } else {
                if absolute < self.start_time {
                    self.start_time = absolute;
                }
                if absolute >= self.end_time {
                    self.end_time = absolute;
                }
            }

            self.output_buffer.push_back(data24_section);
        }
    }

    /// Frames that carried no erasures
    pub fn valid_frames(&self) -> u64 {
        self.valid_frames
    }

    /// Frames that carried at least one erasure
    pub fn invalid_frames(&self) -> u64 {
        self.invalid_frames
    }

    /// Total erased bytes seen
    pub fn corrupt_bytes(&self) -> u64 {
        self.corrupt_bytes
    }

    /// Fraction of payload bytes lost, as a percentage
    pub fn data_loss_percent(&self) -> f64 {
        let total = (self.valid_frames + self.invalid_frames) * 24;
        if total == 0 {
            0.0
        } else {
            (self.corrupt_bytes as f64 * 100.0) / total as f64
        }
    }

    /// Log the stage statistics
    pub fn show_statistics(&self) {
        let total_frames = self.valid_frames + self.invalid_frames;
        let total_bytes = total_frames * 24;

        log::info!("F1 Section to Data24 Section statistics:");
        log::info!("  Frames:");
        log::info!("    Total F1 frames: {}", total_frames);
        log::info!("    Valid F1 frames: {}", self.valid_frames);
        log::info!("    Invalid F1 frames: {}", self.invalid_frames);
        log::info!("  Bytes:");
        log::info!("    Total bytes: {}", total_bytes);
        log::info!("    Corrupt bytes: {}", self.corrupt_bytes);
        log::info!("    Data loss: {:.3}%", self.data_loss_percent());
        if self.have_times {
            log::info!("  Q-Channel time information:");
            log::info!("    Start time: {}", self.start_time);
            log::info!("    End time: {}", self.end_time);
            log::info!("    Total time: {}", self.end_time - self.start_time);
        }
    }
}
