//! Data24 to audio: split each 24-byte payload into 12 little-endian
//! signed 16-bit samples.

use std::collections::VecDeque;

use crate::frame::{AudioFrame, Frame};
use crate::section::{AudioSection, Data24Section};
use crate::time::SectionTime;

/// Sample extraction stage. A sample inherits the erasure flag of either
/// of its constituent bytes.
pub struct Data24ToAudio {
    input_buffer: VecDeque<Data24Section>,
    output_buffer: VecDeque<AudioSection>,

    valid_frames: u64,
    invalid_frames: u64,
    valid_samples: u64,
    invalid_samples: u64,

    start_time: SectionTime,
    end_time: SectionTime,
    have_times: bool,
}

impl Default for Data24ToAudio {
    fn default() -> Data24ToAudio {
        Data24ToAudio {
            input_buffer: VecDeque::new(),
            output_buffer: VecDeque::new(),
            valid_frames: 0,
            invalid_frames: 0,
            valid_samples: 0,
            invalid_samples: 0,
            start_time: SectionTime::MAX,
            end_time: SectionTime::ZERO,
            have_times: false,
        }
    }
}

impl Data24ToAudio {
    /// Create the stage
    pub fn new() -> Data24ToAudio {
        Data24ToAudio::default()
    }

    /// Push one Data24 section. Panics on an incomplete section.
    pub fn push_section(&mut self, section: Data24Section) {
        self.input_buffer.push_back(section);
        self.process_queue();
    }

    /// Pop the next audio section
    pub fn pop_section(&mut self) -> Option<AudioSection> {
        self.output_buffer.pop_front()
    }

    /// True if audio sections are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn process_queue(&mut self) {
        while let Some(data24_section) = self.input_buffer.pop_front() {
            if !data24_section.is_complete() {
                panic!("Data24ToAudio: Data24 section is not complete");
            }

            let mut audio_section = AudioSection::new();
            audio_section.metadata = data24_section.metadata;

            for index in 0..98 {
                let frame = data24_section.frame(index);
                let data = frame.data();
                let error_data = frame.error_data();

                if frame.count_errors() != 0 {
                    self.invalid_frames += 1;
                } else {
                    self.valid_frames += 1;
                }

                let mut samples = [0i16; 12];
                let mut sample_errors = [0u8; 12];

                for (s, sample) in samples.iter_mut().enumerate() {
                    let lo = data[s * 2];
                    let hi = data[s * 2 + 1];
                    // 16-bit little-endian: the low byte is transmitted
                    // first
                    *sample = i16::from_le_bytes([lo, hi]);

                    if error_data[s * 2] != 0 || error_data[s * 2 + 1] != 0 {
                        sample_errors[s] = 1;
                        self.invalid_samples += 1;
                    } else {
                        self.valid_samples += 1;
                    }
                }

                let mut audio = AudioFrame::new();
                audio.set_data(&samples);
                audio.set_error_data(&sample_errors);
                audio_section.push_frame(audio);
            }

            let absolute = audio_section.metadata.absolute_section_time();
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

            self.output_buffer.push_back(audio_section);
        }
    }

    /// Samples extracted clean
    pub fn valid_samples(&self) -> u64 {
        self.valid_samples
    }

    /// Samples flagged because a constituent byte was erased
    pub fn invalid_samples(&self) -> u64 {
        self.invalid_samples
    }

    /// Log the stage statistics
    pub fn show_statistics(&self) {
        log::info!("Data24 to Audio statistics:");
        log::info!("  Data24 Frames:");
        log::info!(
            "    Total Frames: {}",
            self.valid_frames + self.invalid_frames
        );
        log::info!("    Valid Frames: {}", self.valid_frames);
        log::info!("    Invalid Frames: {}", self.invalid_frames);
        log::info!("  Audio Samples:");
        log::info!(
            "    Total stereo samples: {}",
            (self.valid_samples + self.invalid_samples) / 2
        );
        log::info!("    Valid stereo samples: {}", self.valid_samples / 2);
        log::info!("    Corrupt stereo samples: {}", self.invalid_samples / 2);
        if self.have_times {
            log::info!("  Section time information:");
            log::info!("    Start time: {}", self.start_time);
            log::info!("    End time: {}", self.end_time);
            log::info!("    Total time: {}", self.end_time - self.start_time);
        }
    }
}
