//! Pipeline drivers.
//!
//! The converters in [`crate::decode`] and [`crate::encode`] are wired
//! here into the two common full chains. The drivers are single-threaded
//! and cooperative: every push drains each stage into the next, so no
//! stage ever holds more than its own working set and ordering is strict
//! FIFO end to end.

use crate::decode::{
    AudioCorrection, ChannelToF3Frame, Data24ToAudio, Data24ToRawSector,
    F1SectionToData24Section, F2SectionCorrection, F2SectionToF1Section, F3FrameToF2Section,
    RawSectorToSector, TvaluesToChannel,
};
use crate::encode::{
    Data24SectionToF1Section, F1SectionToF2Section, F2SectionToF3Frames, F3FrameToChannel,
};
use crate::frame::{Data24, Frame};
use crate::metadata::{QMode, SectionMetadata, SectionType};
use crate::section::{AudioSection, Data24Section};
use crate::sector::Sector;
use crate::time::SectionTime;
use crate::FRAMES_PER_SECTION;

/// Full decode chain from T-values to Data24 sections.
///
/// The audio and CD-ROM tails are separate wrappers
/// ([`AudioDecoder`], [`DataDecoder`]) since a stream is one or the
/// other.
#[derive(Default)]
pub struct EfmDecoder {
    tvalues_to_channel: TvaluesToChannel,
    channel_to_f3: ChannelToF3Frame,
    f3_to_f2section: F3FrameToF2Section,
    f2_correction: F2SectionCorrection,
    f2_to_f1: F2SectionToF1Section,
    f1_to_data24: F1SectionToData24Section,
}

impl EfmDecoder {
    /// Create the decoder chain
    pub fn new() -> EfmDecoder {
        EfmDecoder::default()
    }

    /// Push a chunk of T-values and advance every stage
    pub fn push_tvalues(&mut self, t_values: &[u8]) {
        self.tvalues_to_channel.push_tvalues(t_values);
        self.advance();
    }

    /// Flush the buffered tail (ends the stream)
    pub fn flush(&mut self) {
        self.f2_correction.flush();
        self.advance();
    }

    /// Pop the next decoded Data24 section
    pub fn pop_data24_section(&mut self) -> Option<Data24Section> {
        self.f1_to_data24.pop_section()
    }

    /// True if decoded sections are waiting
    pub fn is_ready(&self) -> bool {
        self.f1_to_data24.is_ready()
    }

    fn advance(&mut self) {
        while let Some(bits) = self.tvalues_to_channel.pop_bits() {
            self.channel_to_f3.push_bits(&bits);
        }
        while let Some(f3) = self.channel_to_f3.pop_frame() {
            self.f3_to_f2section.push_frame(f3);
        }
        while let Some(section) = self.f3_to_f2section.pop_section() {
            self.f2_correction.push_section(section);
        }
        while let Some(section) = self.f2_correction.pop_section() {
            self.f2_to_f1.push_section(section);
        }
        while let Some(section) = self.f2_to_f1.pop_section() {
            self.f1_to_data24.push_section(section);
        }
    }

    /// Log every stage's statistics
    pub fn show_statistics(&self) {
        self.tvalues_to_channel.show_statistics();
        self.channel_to_f3.show_statistics();
        self.f3_to_f2section.show_statistics();
        self.f2_correction.show_statistics();
        self.f2_to_f1.show_statistics();
        self.f1_to_data24.show_statistics();
    }

    /// Borrow the channel framer stage
    pub fn channel_statistics(&self) -> &ChannelToF3Frame {
        &self.channel_to_f3
    }

    /// Borrow the section correction stage
    pub fn correction_statistics(&self) -> &F2SectionCorrection {
        &self.f2_correction
    }

    /// Borrow the CIRC stage
    pub fn circ_statistics(&self) -> &F2SectionToF1Section {
        &self.f2_to_f1
    }

    /// Borrow the Data24 stage (byte-loss accounting)
    pub fn data24_statistics(&self) -> &F1SectionToData24Section {
        &self.f1_to_data24
    }
}

/// Decode chain ending in concealed audio sections.
pub struct AudioDecoder {
    decoder: EfmDecoder,
    data24_to_audio: Data24ToAudio,
    audio_correction: AudioCorrection,
    conceal: bool,
}

impl AudioDecoder {
    /// Create the audio decoder; `conceal` enables the interpolation
    /// stage.
    pub fn new(conceal: bool) -> AudioDecoder {
        AudioDecoder {
            decoder: EfmDecoder::new(),
            data24_to_audio: Data24ToAudio::new(),
            audio_correction: AudioCorrection::new(),
            conceal,
        }
    }

    /// Push a chunk of T-values
    pub fn push_tvalues(&mut self, t_values: &[u8]) {
        self.decoder.push_tvalues(t_values);
        self.advance();
    }

    /// Flush the buffered tail
    pub fn flush(&mut self) {
        self.decoder.flush();
        self.advance();
    }

    /// Pop the next audio section
    pub fn pop_audio_section(&mut self) -> Option<AudioSection> {
        if self.conceal {
            self.audio_correction.pop_section()
        } else {
            self.data24_to_audio.pop_section()
        }
    }

    fn advance(&mut self) {
        while let Some(section) = self.decoder.pop_data24_section() {
            self.data24_to_audio.push_section(section);
        }
        if self.conceal {
            while let Some(section) = self.data24_to_audio.pop_section() {
                self.audio_correction.push_section(section);
            }
        }
    }

    /// Borrow the inner Data24 decoder
    pub fn decoder(&self) -> &EfmDecoder {
        &self.decoder
    }

    /// Borrow the concealment stage for its statistics
    pub fn concealment_statistics(&self) -> &AudioCorrection {
        &self.audio_correction
    }

    /// Log every stage's statistics
    pub fn show_statistics(&self) {
        self.decoder.show_statistics();
        self.data24_to_audio.show_statistics();
        if self.conceal {
            self.audio_correction.show_statistics();
        }
    }
}

/// Decode chain ending in CD-ROM sectors.
#[derive(Default)]
pub struct DataDecoder {
    decoder: EfmDecoder,
    data24_to_rawsector: Data24ToRawSector,
    rawsector_to_sector: RawSectorToSector,
}

impl DataDecoder {
    /// Create the data decoder
    pub fn new() -> DataDecoder {
        DataDecoder::default()
    }

    /// Push a chunk of T-values
    pub fn push_tvalues(&mut self, t_values: &[u8]) {
        self.decoder.push_tvalues(t_values);
        self.advance();
    }

    /// Flush the buffered tail
    pub fn flush(&mut self) {
        self.decoder.flush();
        self.advance();
    }

    /// Pop the next interpreted sector
    pub fn pop_sector(&mut self) -> Option<Sector> {
        self.rawsector_to_sector.pop_sector()
    }

    fn advance(&mut self) {
        while let Some(section) = self.decoder.pop_data24_section() {
            self.data24_to_rawsector.push_section(section);
        }
        while let Some(raw) = self.data24_to_rawsector.pop_sector() {
            self.rawsector_to_sector.push_sector(raw);
        }
    }

    /// Borrow the inner Data24 decoder
    pub fn decoder(&self) -> &EfmDecoder {
        &self.decoder
    }

    /// Log every stage's statistics
    pub fn show_statistics(&self) {
        self.decoder.show_statistics();
        self.data24_to_rawsector.show_statistics();
        self.rawsector_to_sector.show_statistics();
    }
}

/// Full encode chain from user bytes to channel T-values.
///
/// The driver assembles 24-byte frames into sections, stamping each with
/// incrementing Q-channel metadata built from the configured template.
pub struct EfmEncoder {
    data24_to_f1: Data24SectionToF1Section,
    f1_to_f2: F1SectionToF2Section,
    f2_to_f3: F2SectionToF3Frames,
    f3_to_channel: F3FrameToChannel,

    frame_buffer: Vec<Data24>,
    template: SectionMetadata,
    absolute_time: SectionTime,
    section_time: SectionTime,
    data24_frames: u64,
}

impl Default for EfmEncoder {
    fn default() -> EfmEncoder {
        let mut template = SectionMetadata::new();
        template.set_section_type(SectionType::UserData);
        template.set_track_number(1);
        template.set_q_mode(QMode::Q1);
        template.set_valid(true);

        EfmEncoder {
            data24_to_f1: Data24SectionToF1Section::new(),
            f1_to_f2: F1SectionToF2Section::new(),
            f2_to_f3: F2SectionToF3Frames::new(),
            f3_to_channel: F3FrameToChannel::new(),
            frame_buffer: Vec::with_capacity(FRAMES_PER_SECTION),
            template,
            absolute_time: SectionTime::ZERO,
            section_time: SectionTime::ZERO,
            data24_frames: 0,
        }
    }
}

impl EfmEncoder {
    /// Create an encoder with the default metadata template (track 1,
    /// Q-mode 1, 2-channel audio, copy prohibited)
    pub fn new() -> EfmEncoder {
        EfmEncoder::default()
    }

    /// Replace the Q-channel metadata template (track number, control
    /// flags, Q mode, section type)
    pub fn set_metadata_template(&mut self, template: SectionMetadata) {
        self.template = template;
        self.template.set_valid(true);
    }

    /// Set the absolute timestamp of the next section
    pub fn set_start_time(&mut self, time: SectionTime) {
        self.absolute_time = time;
    }

    /// Push user bytes; they are chunked into 24-byte frames (a final
    /// partial frame waits for more data until [`EfmEncoder::flush`]).
    pub fn push_data(&mut self, data: &[u8]) {
        for chunk in data.chunks(24) {
            if chunk.len() == 24 {
                let mut frame = Data24::new();
                frame.set_data(chunk);
                self.push_frame(frame);
            } else {
                let mut padded = [0u8; 24];
                padded[..chunk.len()].copy_from_slice(chunk);
                let mut frame = Data24::new();
                frame.set_data(&padded);
                self.push_frame(frame);
            }
        }
    }

    /// Push one 24-byte frame
    pub fn push_frame(&mut self, frame: Data24) {
        self.frame_buffer.push(frame);
        self.data24_frames += 1;

        if self.frame_buffer.len() == FRAMES_PER_SECTION {
            self.emit_section();
        }
    }

    /// Pad the unfinished section with zero frames and push it through.
    pub fn flush(&mut self) {
        if !self.frame_buffer.is_empty() {
            while self.frame_buffer.len() < FRAMES_PER_SECTION {
                self.frame_buffer.push(Data24::new());
            }
            self.emit_section();
        }
    }

    /// Pop the T-values of the next encoded channel frame
    pub fn pop_tvalues(&mut self) -> Option<Vec<u8>> {
        self.f3_to_channel.pop_tvalues()
    }

    /// True if encoded T-values are waiting
    pub fn is_ready(&self) -> bool {
        self.f3_to_channel.is_ready()
    }

    fn emit_section(&mut self) {
        let mut section = Data24Section::new();

        let mut metadata = self.template;
        metadata.set_absolute_section_time(self.absolute_time);
        metadata.set_section_time(self.section_time);
        section.metadata = metadata;

        for frame in self.frame_buffer.drain(..) {
            section.push_frame(frame);
        }

        self.absolute_time = self.absolute_time + 1;
        self.section_time = self.section_time + 1;

        self.data24_to_f1.push_section(section);
        self.advance();
    }

    fn advance(&mut self) {
        while let Some(section) = self.data24_to_f1.pop_section() {
            self.f1_to_f2.push_section(section);
        }
        while let Some(section) = self.f1_to_f2.pop_section() {
            self.f2_to_f3.push_section(section);
        }
        while let Some(frames) = self.f2_to_f3.pop_frames() {
            for f3 in frames {
                self.f3_to_channel.push_frame(f3);
            }
        }
    }

    /// Data24 frames accepted so far
    pub fn data24_frames(&self) -> u64 {
        self.data24_frames
    }

    /// Borrow the channel framer for its statistics
    pub fn channel_statistics(&self) -> &F3FrameToChannel {
        &self.f3_to_channel
    }

    /// Log the encoder statistics
    pub fn show_statistics(&self) {
        log::info!("EFM encoder statistics:");
        log::info!("  Data24 frames: {}", self.data24_frames);
        self.f3_to_channel.show_statistics();
    }
}
