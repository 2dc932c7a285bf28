//! Section metadata: everything the Q channel says about a section.

use std::fmt;

use crate::time::SectionTime;

/// Region of the disc a section belongs to, per the Q-channel track byte
/// (0x00 lead-in, 0xAA lead-out, BCD track number otherwise).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectionType {
    /// Track-0 region at the disc start carrying the table of contents
    LeadIn,
    /// Track-0 region closing the disc
    LeadOut,
    /// Ordinary program-area section
    UserData,
}

impl fmt::Display for SectionType {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            SectionType::LeadIn => "LEAD_IN",
            SectionType::LeadOut => "LEAD_OUT",
            SectionType::UserData => "USER_DATA",
        };
        fmt.write_str(s)
    }
}

/// Q-channel mode nibble. Only modes 1 and 4 (position information for
/// CD-DA and LaserDisc digital audio respectively) are interpreted; modes
/// 2 and 3 are recognised on the wire but carry no decoded content here.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QMode {
    /// Mode 1: position data
    Q1,
    /// Mode 2: catalogue number (not interpreted)
    Q2,
    /// Mode 3: ISRC (not interpreted)
    Q3,
    /// Mode 4: LaserDisc position data
    Q4,
}

/// Decoded Q-channel (and P-channel) state for one section.
///
/// The control flags mirror the Q control nibble: audio/data, copy
/// permission, pre-emphasis and 2/4-channel layout. `valid` records
/// whether the CRC vouched for the block; the metadata correction stage
/// reconstructs sections whose CRC failed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionMetadata {
    section_type: SectionType,
    q_mode: QMode,
    section_time: SectionTime,
    absolute_section_time: SectionTime,
    track_number: u8,
    valid: bool,

    is_audio: bool,
    copy_prohibited: bool,
    preemphasis: bool,
    is_2_channel: bool,
    p_flag: bool,
}

impl Default for SectionMetadata {
    fn default() -> SectionMetadata {
        SectionMetadata {
            section_type: SectionType::UserData,
            q_mode: QMode::Q1,
            section_time: SectionTime::ZERO,
            absolute_section_time: SectionTime::ZERO,
            track_number: 1,
            valid: false,
            is_audio: true,
            copy_prohibited: true,
            preemphasis: false,
            is_2_channel: true,
            p_flag: true,
        }
    }
}

impl SectionMetadata {
    /// Metadata with the default flags (2-channel audio, no pre-emphasis,
    /// copy prohibited, track 1, times zero, CRC not yet validated)
    pub fn new() -> SectionMetadata {
        SectionMetadata::default()
    }

    /// Region of the disc the section belongs to
    pub fn section_type(&self) -> SectionType {
        self.section_type
    }

    /// Set the section type, keeping the track number consistent with it:
    /// lead-in/lead-out force track 0, user data forces 1..=99.
    pub fn set_section_type(&mut self, section_type: SectionType) {
        self.section_type = section_type;
        self.sanitize_track_number();
    }

    /// Track-relative timestamp
    pub fn section_time(&self) -> SectionTime {
        self.section_time
    }

    /// Set the track-relative timestamp
    pub fn set_section_time(&mut self, time: SectionTime) {
        self.section_time = time;
    }

    /// Timestamp from the disc start
    pub fn absolute_section_time(&self) -> SectionTime {
        self.absolute_section_time
    }

    /// Set the timestamp from the disc start
    pub fn set_absolute_section_time(&mut self, time: SectionTime) {
        self.absolute_section_time = time;
    }

    /// Track number: 0 in the lead-in/lead-out, 1..=99 in the program area
    pub fn track_number(&self) -> u8 {
        self.track_number
    }

    /// Set the track number, subject to the section-type consistency rule
    pub fn set_track_number(&mut self, track_number: u8) {
        self.track_number = track_number;
        self.sanitize_track_number();
    }

    fn sanitize_track_number(&mut self) {
        match self.section_type {
            SectionType::LeadIn | SectionType::LeadOut => self.track_number = 0,
            SectionType::UserData => {
                if self.track_number < 1 || self.track_number > 99 {
                    self.track_number = 1;
                }
            }
        }
    }

    /// Q-channel mode
    pub fn q_mode(&self) -> QMode {
        self.q_mode
    }

    /// Set the Q-channel mode
    pub fn set_q_mode(&mut self, q_mode: QMode) {
        self.q_mode = q_mode;
    }

    /// True if the control nibble marks the section as audio
    pub fn is_audio(&self) -> bool {
        self.is_audio
    }

    /// Mark the section as audio or digital data
    pub fn set_audio(&mut self, audio: bool) {
        self.is_audio = audio;
    }

    /// True if digital copying is prohibited
    pub fn is_copy_prohibited(&self) -> bool {
        self.copy_prohibited
    }

    /// Set the copy-prohibited flag
    pub fn set_copy_prohibited(&mut self, copy_prohibited: bool) {
        self.copy_prohibited = copy_prohibited;
    }

    /// True if 50/15us pre-emphasis applies (audio only)
    pub fn is_preemphasis(&self) -> bool {
        self.preemphasis
    }

    /// Set the pre-emphasis flag
    pub fn set_preemphasis(&mut self, preemphasis: bool) {
        self.preemphasis = preemphasis;
    }

    /// True for 2-channel audio (4-channel discs are vanishingly rare)
    pub fn is_2_channel(&self) -> bool {
        self.is_2_channel
    }

    /// Set the 2-channel flag
    pub fn set_2_channel(&mut self, is_2_channel: bool) {
        self.is_2_channel = is_2_channel;
    }

    /// P-channel flag for this section
    pub fn p_flag(&self) -> bool {
        self.p_flag
    }

    /// Set the P-channel flag
    pub fn set_p_flag(&mut self, p_flag: bool) {
        self.p_flag = p_flag;
    }

    /// True if the Q-channel CRC validated (or the metadata was
    /// reconstructed by the correction stage)
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Record the CRC / reconstruction verdict
    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }
}
