//! The decode pipeline: T-values to user data.
//!
//! Each stage is a push/pop converter; the driver pushes whole units in,
//! polls `is_ready()` and pops whole units out. Stages never block and
//! never see partial units.

pub mod audio_correction;
pub mod channel_to_f3;
pub mod data24_to_audio;
pub mod data24_to_rawsector;
pub mod f1_to_data24;
pub mod f2_correction;
pub mod f2_to_f1;
pub mod f3_to_f2section;
pub mod rawsector_to_sector;
pub mod tvalues_to_channel;

pub use audio_correction::AudioCorrection;
pub use channel_to_f3::ChannelToF3Frame;
pub use data24_to_audio::Data24ToAudio;
pub use data24_to_rawsector::Data24ToRawSector;
pub use f1_to_data24::F1SectionToData24Section;
pub use f2_correction::F2SectionCorrection;
pub use f2_to_f1::F2SectionToF1Section;
pub use f3_to_f2section::F3FrameToF2Section;
pub use rawsector_to_sector::RawSectorToSector;
pub use tvalues_to_channel::TvaluesToChannel;
