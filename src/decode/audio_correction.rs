//! Audio concealment.
//!
//! Samples the CIRC decoder could not restore are still flagged when they
//! reach this stage. A flagged sample bracketed by two good samples of
//! the same channel is replaced by their mean; anything less well
//! supported is silenced. The stage remembers the closing samples of each
//! section so concealment works across section boundaries.

use std::collections::VecDeque;

use log::debug;

use crate::frame::AudioFrame;
use crate::section::AudioSection;

/// Linear-interpolation concealment over audio sections.
pub struct AudioCorrection {
    input_buffer: VecDeque<AudioSection>,
    output_buffer: VecDeque<AudioSection>,

    valid_samples: u64,
    concealed_samples: u64,
    silenced_samples: u64,

    last_section_left_sample: i16,
    last_section_right_sample: i16,
    last_section_left_error: u8,
    last_section_right_error: u8,
}

impl Default for AudioCorrection {
    fn default() -> AudioCorrection {
        AudioCorrection {
            input_buffer: VecDeque::new(),
            output_buffer: VecDeque::new(),
            valid_samples: 0,
            concealed_samples: 0,
            silenced_samples: 0,
            last_section_left_sample: 0,
            last_section_right_sample: 0,
            last_section_left_error: 0,
            last_section_right_error: 0,
        }
    }
}

impl AudioCorrection {
    /// Create the stage
    pub fn new() -> AudioCorrection {
        AudioCorrection::default()
    }

    /// Push one audio section. Panics on an incomplete section.
    pub fn push_section(&mut self, section: AudioSection) {
        self.input_buffer.push_back(section);
        self.process_queue();
    }

    /// Pop the next concealed section
    pub fn pop_section(&mut self) -> Option<AudioSection> {
        self.output_buffer.pop_front()
    }

    /// True if sections are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn process_queue(&mut self) {
        while let Some(section_in) = self.input_buffer.pop_front() {
            if !section_in.is_complete() {
                panic!("AudioCorrection: audio section is not complete");
            }

            let mut section_out = AudioSection::new();
            section_out.metadata = section_in.metadata;

            for index in 0..98 {
                let frame_in = section_in.frame(index);
                let mut samples = *frame_in.data();
                let flags = *frame_in.error_data();

                if frame_in.count_errors() == 0 {
                    self.valid_samples += 12;
                } else {
                    debug!(
                        "AudioCorrection: frame {} in section {} contains errors",
                        index,
                        section_in.metadata.absolute_section_time()
                    );

                    for sidx in 0..12 {
                        if flags[sidx] == 0 {
                            self.valid_samples += 1;
                            continue;
                        }

                        // Preceding good sample: two back in this frame,
                        // or the remembered closer of the previous
                        // section for the first sample pair
                        let (preceding, preceding_error) = if sidx > 1 {
                            (samples[sidx - 2], flags[sidx - 2])
                        } else if sidx % 2 == 0 {
                            (self.last_section_left_sample, self.last_section_left_error)
                        } else {
                            (
                                self.last_section_right_sample,
                                self.last_section_right_error,
                            )
                        };

                        // Following good sample: two ahead, or the head of
                        // frame index + 2; at the tail of the section
                        // there is nothing to borrow
                        let (following, following_error) = if sidx < 10 {
                            (
                                section_in.frame(index).data()[sidx + 2],
                                section_in.frame(index).error_data()[sidx + 2],
                            )
                        } else if index < 96 {
                            (
                                section_in.frame(index + 2).data()[0],
                                section_in.frame(index + 2).error_data()[0],
                            )
                        } else {
                            (0, 1)
                        };

                        if preceding_error == 0 && following_error == 0 {
                            samples[sidx] =
                                ((i32::from(preceding) + i32::from(following)) / 2) as i16;
                            self.concealed_samples += 1;
                        } else {
                            samples[sidx] = 0;
                            self.silenced_samples += 1;
                        }
                    }
                }

                let mut frame_out = AudioFrame::new();
                frame_out.set_data(&samples);
                frame_out.set_error_data(&flags);
                section_out.push_frame(frame_out);
            }

            // Remember the closing stereo pair for the next section's
            // leading samples
            let last = section_out.frame(97);
            self.last_section_left_sample = last.data()[10];
            self.last_section_right_sample = last.data()[11];
            self.last_section_left_error = last.error_data()[10];
            self.last_section_right_error = last.error_data()[11];

            self.output_buffer.push_back(section_out);
        }
    }

    /// Samples passed through untouched
    pub fn valid_samples(&self) -> u64 {
        self.valid_samples
    }

    /// Samples replaced by the mean of their neighbours
    pub fn concealed_samples(&self) -> u64 {
        self.concealed_samples
    }

    /// Samples that had to be muted
    pub fn silenced_samples(&self) -> u64 {
        self.silenced_samples
    }

    /// Log the stage statistics
    pub fn show_statistics(&self) {
        log::info!("Audio correction statistics:");
        log::info!(
            "  Total samples: {}",
            self.valid_samples + self.concealed_samples + self.silenced_samples
        );
        log::info!("  Valid samples: {}", self.valid_samples);
        log::info!("  Concealed samples: {}", self.concealed_samples);
        log::info!("  Silenced samples: {}", self.silenced_samples);
    }
}
