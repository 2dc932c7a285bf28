//! Sections: groups of 98 frames sharing one block of subcode metadata.
//!
//! A section is only meaningful once it holds its full complement of
//! frames; stages that consume sections panic on incomplete input since an
//! incomplete section can only come from a broken producer.

use crate::frame::AudioFrame;
use crate::metadata::SectionMetadata;
use crate::{frame, FRAMES_PER_SECTION};

/// 98 frames of one type plus the section metadata decoded from (or
/// destined for) the subcode block.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Section<F> {
    /// Metadata shared by all frames of the section
    pub metadata: SectionMetadata,
    frames: Vec<F>,
}

/// Section of user-payload frames
pub type Data24Section = Section<frame::Data24>;
/// Section of byte-swapped frames
pub type F1Section = Section<frame::F1Frame>;
/// Section of CIRC-protected frames
pub type F2Section = Section<frame::F2Frame>;
/// Section of decoded audio frames
pub type AudioSection = Section<AudioFrame>;

impl<F> Section<F> {
    /// Create an empty section with default metadata
    pub fn new() -> Section<F> {
        Section {
            metadata: SectionMetadata::default(),
            frames: Vec::with_capacity(FRAMES_PER_SECTION),
        }
    }

    /// Append a frame. Panics if the section already holds 98 frames.
    pub fn push_frame(&mut self, frame: F) {
        if self.frames.len() >= FRAMES_PER_SECTION {
            panic!("Section::push_frame: section already holds 98 frames");
        }
        self.frames.push(frame);
    }

    /// Borrow frame `index`. Panics if the frame has not been pushed yet.
    pub fn frame(&self, index: usize) -> &F {
        &self.frames[index]
    }

    /// Mutably borrow frame `index`
    pub fn frame_mut(&mut self, index: usize) -> &mut F {
        &mut self.frames[index]
    }

    /// Borrow all frames pushed so far
    pub fn frames(&self) -> &[F] {
        &self.frames
    }

    /// Number of frames currently held
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True if no frame has been pushed yet
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True once the section holds its 98 frames
    pub fn is_complete(&self) -> bool {
        self.frames.len() == FRAMES_PER_SECTION
    }

    /// Drop all frames, keeping the metadata
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl<F: frame::Frame> Section<F> {
    /// Build a complete section from 98 default frames
    pub fn blank() -> Section<F> {
        let mut section = Section::new();
        for _ in 0..FRAMES_PER_SECTION {
            section.push_frame(F::default());
        }
        section
    }

    /// Build a complete section whose frames are zero-filled with every
    /// error flag set: the stand-in for sections missing from the stream.
    pub fn all_erasures() -> Section<F> {
        let mut section = Section::new();
        for _ in 0..FRAMES_PER_SECTION {
            let mut f = F::default();
            f.flag_all_errors();
            section.push_frame(f);
        }
        section
    }

    /// Total erasure flags across all frames
    pub fn count_errors(&self) -> u32 {
        self.frames.iter().map(|f| f.count_errors()).sum()
    }
}

#[cfg(test)]
mod test {
    use super::{F2Section, Section};
    use crate::frame::{F2Frame, Frame};
    use crate::FRAMES_PER_SECTION;

    #[test]
    fn completeness() {
        let mut section: F2Section = Section::new();
        assert!(!section.is_complete());

        for _ in 0..FRAMES_PER_SECTION {
            section.push_frame(F2Frame::new());
        }
        assert!(section.is_complete());
        assert_eq!(section.count_errors(), 0);
    }

    #[test]
    fn erasure_section() {
        let section: F2Section = Section::all_erasures();
        assert!(section.is_complete());
        assert_eq!(section.count_errors(), 98 * 32);
    }

    #[test]
    #[should_panic]
    fn overfill_is_fatal() {
        let mut section: F2Section = Section::blank();
        section.push_frame(F2Frame::new());
    }
}
