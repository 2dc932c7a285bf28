//! Frame types for the pipeline stages.
//!
//! Every frame is a fixed-size payload accompanied by an error-flag vector
//! of the same length. A flag of 0 marks a trustworthy byte, any other
//! value an erasure; the flags travel with the data through every stage so
//! the Reed-Solomon decoders can use them as erasure locators and the
//! audio stage can conceal what could not be corrected.

/// Common surface of the byte-payload frame types.
///
/// The payload length is a compile-time constant of the implementing type;
/// `set_data`/`set_error_data` enforce it at the stage boundaries.
pub trait Frame: Clone + Default {
    /// Payload size in bytes
    const SIZE: usize;

    /// Borrow the payload
    fn data(&self) -> &[u8];

    /// Mutably borrow the payload
    fn data_mut(&mut self) -> &mut [u8];

    /// Borrow the error-flag vector
    fn error_data(&self) -> &[u8];

    /// Mutably borrow the error-flag vector
    fn error_data_mut(&mut self) -> &mut [u8];

    /// Replace the payload. Panics if `data` is not exactly `SIZE` bytes:
    /// a mis-sized frame means a broken stage, not bad disc data.
    fn set_data(&mut self, data: &[u8]) {
        if data.len() != Self::SIZE {
            panic!(
                "Frame::set_data: payload of {} bytes does not match frame size {}",
                data.len(),
                Self::SIZE
            );
        }
        self.data_mut().copy_from_slice(data);
    }

    /// Replace the error-flag vector. Panics if `error_data` is not
    /// exactly `SIZE` bytes.
    fn set_error_data(&mut self, error_data: &[u8]) {
        if error_data.len() != Self::SIZE {
            panic!(
                "Frame::set_error_data: flag vector of {} bytes does not match frame size {}",
                error_data.len(),
                Self::SIZE
            );
        }
        self.error_data_mut().copy_from_slice(error_data);
    }

    /// Number of bytes flagged as erasures
    fn count_errors(&self) -> u32 {
        self.error_data().iter().filter(|&&e| e != 0).count() as u32
    }

    /// True if any byte is flagged as an erasure
    fn has_errors(&self) -> bool {
        self.error_data().iter().any(|&e| e != 0)
    }

    /// Flag every byte of the frame as an erasure
    fn flag_all_errors(&mut self) {
        self.error_data_mut().fill(1);
    }
}

macro_rules! byte_frame {
    ($(#[$doc:meta])* $name:ident, $size:expr) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            data: [u8; $size],
            error_data: [u8; $size],
        }

        impl Default for $name {
            fn default() -> $name {
                $name {
                    data: [0; $size],
                    error_data: [0; $size],
                }
            }
        }

        impl $name {
            /// Create a zero-filled frame with no error flags set
            pub fn new() -> $name {
                $name::default()
            }
        }

        impl Frame for $name {
            const SIZE: usize = $size;

            fn data(&self) -> &[u8] {
                &self.data
            }

            fn data_mut(&mut self) -> &mut [u8] {
                &mut self.data
            }

            fn error_data(&self) -> &[u8] {
                &self.error_data
            }

            fn error_data_mut(&mut self) -> &mut [u8] {
                &mut self.error_data
            }
        }
    };
}

byte_frame!(
    /// 24 bytes of user payload: the input of the encoder and the output
    /// of the decoder. Holds 6 stereo sample pairs on an audio disc or a
    /// slice of a scrambled CD-ROM sector on a data disc.
    Data24,
    24
);

byte_frame!(
    /// 24 bytes with the byte pairs swapped relative to [`Data24`]
    /// (ECMA-130 clause 16).
    F1Frame,
    24
);

byte_frame!(
    /// 32 bytes: an F1 frame plus two sets of 4 Reed-Solomon parity
    /// bytes, interleaved and delayed by the CIRC encoder.
    F2Frame,
    32
);

/// Role of an F3 frame within its section
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum F3FrameType {
    /// Frame carrying one byte of the section's subcode block
    Subcode(u8),
    /// First frame of a section (sync0 pseudo-symbol in the subcode slot)
    Sync0,
    /// Second frame of a section (sync1 pseudo-symbol)
    Sync1,
}

/// 32-byte channel-level frame plus its subcode-slot tag.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct F3Frame {
    data: [u8; 32],
    error_data: [u8; 32],
    frame_type: F3FrameType,
}

impl Default for F3Frame {
    fn default() -> F3Frame {
        F3Frame {
            data: [0; 32],
            error_data: [0; 32],
            frame_type: F3FrameType::Subcode(0),
        }
    }
}

impl F3Frame {
    /// Create a zero-filled subcode frame
    pub fn new() -> F3Frame {
        F3Frame::default()
    }

    /// Return the frame's subcode-slot tag
    pub fn frame_type(&self) -> F3FrameType {
        self.frame_type
    }

    /// Tag the frame as carrying a subcode byte
    pub fn set_frame_type_as_subcode(&mut self, subcode: u8) {
        self.frame_type = F3FrameType::Subcode(subcode);
    }

    /// Tag the frame as the first frame of a section
    pub fn set_frame_type_as_sync0(&mut self) {
        self.frame_type = F3FrameType::Sync0;
    }

    /// Tag the frame as the second frame of a section
    pub fn set_frame_type_as_sync1(&mut self) {
        self.frame_type = F3FrameType::Sync1;
    }

    /// The subcode byte carried in this frame, 0 for sync frames (their
    /// subcode slot holds a pseudo-symbol, not data)
    pub fn subcode_byte(&self) -> u8 {
        match self.frame_type {
            F3FrameType::Subcode(b) => b,
            F3FrameType::Sync0 | F3FrameType::Sync1 => 0,
        }
    }
}

impl Frame for F3Frame {
    const SIZE: usize = 32;

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn error_data(&self) -> &[u8] {
        &self.error_data
    }

    fn error_data_mut(&mut self) -> &mut [u8] {
        &mut self.error_data
    }
}

/// 12 signed 16-bit samples (6 stereo pairs) with per-sample error flags.
///
/// Even sample indices are the left channel, odd the right.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioFrame {
    data: [i16; 12],
    error_data: [u8; 12],
}

impl Default for AudioFrame {
    fn default() -> AudioFrame {
        AudioFrame {
            data: [0; 12],
            error_data: [0; 12],
        }
    }
}

impl AudioFrame {
    /// Samples per frame
    pub const SAMPLES: usize = 12;

    /// Create a silent frame with no error flags set
    pub fn new() -> AudioFrame {
        AudioFrame::default()
    }

    /// Borrow the samples
    pub fn data(&self) -> &[i16; 12] {
        &self.data
    }

    /// Mutably borrow the samples
    pub fn data_mut(&mut self) -> &mut [i16; 12] {
        &mut self.data
    }

    /// Borrow the per-sample error flags
    pub fn error_data(&self) -> &[u8; 12] {
        &self.error_data
    }

    /// Mutably borrow the per-sample error flags
    pub fn error_data_mut(&mut self) -> &mut [u8; 12] {
        &mut self.error_data
    }

    /// Replace the samples. Panics if `data` is not 12 samples long.
    pub fn set_data(&mut self, data: &[i16]) {
        if data.len() != Self::SAMPLES {
            panic!(
                "AudioFrame::set_data: {} samples do not match frame size {}",
                data.len(),
                Self::SAMPLES
            );
        }
        self.data.copy_from_slice(data);
    }

    /// Replace the error flags. Panics if `error_data` is not 12 entries.
    pub fn set_error_data(&mut self, error_data: &[u8]) {
        if error_data.len() != Self::SAMPLES {
            panic!(
                "AudioFrame::set_error_data: {} flags do not match frame size {}",
                error_data.len(),
                Self::SAMPLES
            );
        }
        self.error_data.copy_from_slice(error_data);
    }

    /// Number of samples flagged as erasures
    pub fn count_errors(&self) -> u32 {
        self.error_data.iter().filter(|&&e| e != 0).count() as u32
    }

    /// True if any sample is flagged
    pub fn has_errors(&self) -> bool {
        self.error_data.iter().any(|&e| e != 0)
    }
}

#[cfg(test)]
mod test {
    use super::{Data24, F2Frame, F3Frame, F3FrameType, Frame};

    #[test]
    fn sizes() {
        assert_eq!(Data24::SIZE, 24);
        assert_eq!(F2Frame::SIZE, 32);
        assert_eq!(F3Frame::SIZE, 32);
    }

    #[test]
    fn error_accounting() {
        let mut f = Data24::new();
        assert!(!f.has_errors());

        f.error_data_mut()[3] = 1;
        f.error_data_mut()[7] = 1;
        assert_eq!(f.count_errors(), 2);

        f.flag_all_errors();
        assert_eq!(f.count_errors(), 24);
    }

    #[test]
    fn f3_tagging() {
        let mut f = F3Frame::new();
        assert_eq!(f.frame_type(), F3FrameType::Subcode(0));

        f.set_frame_type_as_subcode(0x41);
        assert_eq!(f.subcode_byte(), 0x41);

        f.set_frame_type_as_sync1();
        assert_eq!(f.frame_type(), F3FrameType::Sync1);
        assert_eq!(f.subcode_byte(), 0);
    }

    #[test]
    #[should_panic]
    fn wrong_size_is_fatal() {
        let mut f = Data24::new();
        f.set_data(&[0; 23]);
    }
}
