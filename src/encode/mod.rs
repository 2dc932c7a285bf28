//! The encode pipeline: user data to channel T-values.
//!
//! The mirror image of [`crate::decode`]: byte-pair swap, the CIRC
//! encoder chain, section framing with subcode generation, and the
//! channel framer that picks merging bits under DSV control.

pub mod data24_to_f1;
pub mod f1_to_f2;
pub mod f2_to_f3;
pub mod f3_to_channel;

pub use data24_to_f1::Data24SectionToF1Section;
pub use f1_to_f2::F1SectionToF2Section;
pub use f2_to_f3::F2SectionToF3Frames;
pub use f3_to_channel::F3FrameToChannel;
