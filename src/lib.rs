//! Bidirectional EFM (Eight-to-Fourteen Modulation) channel codec for
//! Compact Disc and LaserDisc, covering the ECMA-130 / IEC 60908 data path
//! from surface run-lengths ("T-values") all the way to audio samples or
//! CD-ROM sectors and back.
//!
//! The crate is organised as a chain of small converters, each a state
//! machine or algebraic transform with a push/pop surface:
//!
//! ```text
//! decode:  T-values -> channel bits -> F3 frames -> F2 sections
//!          -> corrected F2 sections -> F1 sections -> Data24 sections
//!          -> { audio sections | raw sectors -> sectors }
//! encode:  Data24 sections -> F1 -> F2 -> F3 frames -> T-values
//! ```
//!
//! Every payload travels with a parallel per-byte error-flag vector. The
//! flags feed the erasure-aware Reed-Solomon decoders in [`circ`] and, on
//! the audio side, the concealment stage in [`decode`].
//!
//! [`pipeline::EfmDecoder`] and [`pipeline::EfmEncoder`] wire the stages
//! together for the common cases; the individual converters are public for
//! callers that need to tap the stream mid-way (for instance to persist F2
//! sections with [`io::f2_section`]).

#![warn(missing_docs)]

#[macro_use]
extern crate arrayref;
#[cfg(feature = "serde")]
extern crate serde;
#[cfg(feature = "serde")]
extern crate serde_big_array;
extern crate thiserror;

pub mod bcd;
pub mod circ;
pub mod decode;
pub mod efm;
pub mod encode;
pub mod frame;
pub mod io;
pub mod metadata;
pub mod pipeline;
pub mod section;
pub mod sector;
pub mod subcode;
pub mod time;
pub mod tvalues;

pub use bcd::Bcd;
pub use frame::{AudioFrame, Data24, F1Frame, F2Frame, F3Frame, F3FrameType, Frame};
pub use metadata::{QMode, SectionMetadata, SectionType};
pub use section::{AudioSection, Data24Section, F1Section, F2Section, Section};
pub use sector::{RawSector, Sector, SectorAddress};
pub use time::SectionTime;

use std::io as stdio;
use thiserror::Error;

/// Number of frames making up one section (the unit over which the subcode
/// P..W channels are transmitted).
pub const FRAMES_PER_SECTION: usize = 98;

/// Error type for codec operations.
///
/// These cover data-level failures that a caller can reasonably meet when
/// feeding the pipeline real disc captures. Violations of the format's
/// structural invariants (wrong frame sizes, mis-sized delay-line input,
/// RLL breakage produced by the encoder itself) are programming errors and
/// panic with a message naming the offending stage instead.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum EfmError {
    #[error("I/O error: {0}")]
    Io(#[from] stdio::Error),
    #[error("14-bit channel symbol not present in the EFM conversion table")]
    SymbolNotFound,
    #[error("EFM value {0} is outside the symbol table range 0..258")]
    SymbolOutOfRange(u16),
    #[error("Attempted to parse invalid BCD data")]
    BadBcd,
    #[error("Section time of {0} frames is outside the disc range")]
    BadSectionTime(i64),
    #[error("WAV header is not 44100Hz 16-bit stereo PCM")]
    BadWavHeader,
    #[error("F2 section file is truncated or corrupt")]
    BadSectionFile,
    #[error("Attempted to access an out-of-range section record")]
    BadSectionIndex,
}

/// Convenience type alias for a `Result<R, EfmError>`
pub type EfmResult<R> = std::result::Result<R, EfmError>;

#[test]
fn efmerror_display() {
    // Make sure that EfmError implements Display. This should be true if we
    // set an `#[error("...")]` for every variant
    println!("{}", EfmError::SymbolNotFound);
}
