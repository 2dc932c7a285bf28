//! WAV input and output.
//!
//! Only one shape of WAV is accepted: 44-byte canonical header, PCM,
//! stereo, 44100 Hz, 16 bits per sample; that is what a CD carries and
//! anything else means the caller grabbed the wrong file. The writer
//! reserves the header up front and fills in the sizes when finalised.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::frame::Frame;
use crate::section::{AudioSection, Data24Section};
use crate::{EfmError, EfmResult};

/// Length of the canonical WAV header
pub const WAV_HEADER_SIZE: usize = 44;

/// Validate a canonical 44-byte WAV header for the CD audio format.
pub fn check_wav_header(header: &[u8; WAV_HEADER_SIZE]) -> EfmResult<()> {
    if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
        return Err(EfmError::BadWavHeader);
    }

    let audio_format = u16::from_le_bytes([header[20], header[21]]);
    let num_channels = u16::from_le_bytes([header[22], header[23]]);
    let sample_rate = u32::from_le_bytes([header[24], header[25], header[26], header[27]]);
    let bits_per_sample = u16::from_le_bytes([header[34], header[35]]);

    if audio_format != 1 || num_channels != 2 || sample_rate != 44_100 || bits_per_sample != 16 {
        return Err(EfmError::BadWavHeader);
    }

    Ok(())
}

/// Reads 24-byte user-data frames from raw PCM or a WAV file.
pub struct WavReader<R: Read> {
    inner: R,
    exhausted: bool,
}

impl<R: Read> WavReader<R> {
    /// Open a WAV stream: the header is read and validated immediately.
    pub fn new(mut inner: R) -> EfmResult<WavReader<R>> {
        let mut header = [0u8; WAV_HEADER_SIZE];
        inner.read_exact(&mut header)?;
        check_wav_header(&header)?;

        Ok(WavReader {
            inner,
            exhausted: false,
        })
    }

    /// Open a raw PCM stream (no header to validate or skip)
    pub fn new_raw(inner: R) -> WavReader<R> {
        WavReader {
            inner,
            exhausted: false,
        }
    }

    /// Read the next 24-byte frame. A final partial frame is zero
    /// padded; `None` signals end of stream.
    pub fn read_frame(&mut self) -> EfmResult<Option<[u8; 24]>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut frame = [0u8; 24];
        let mut filled = 0;

        while filled < frame.len() {
            let n = self.inner.read(&mut frame[filled..])?;
            if n == 0 {
                self.exhausted = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            Ok(None)
        } else {
            Ok(Some(frame))
        }
    }
}

/// Writes audio sections as a PCM WAV file.
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    data_bytes: u32,
}

impl<W: Write + Seek> WavWriter<W> {
    /// Start a WAV file: a blank header is written immediately and
    /// filled in by [`WavWriter::finalize`].
    pub fn new(mut inner: W) -> EfmResult<WavWriter<W>> {
        inner.write_all(&[0u8; WAV_HEADER_SIZE])?;

        Ok(WavWriter {
            inner,
            data_bytes: 0,
        })
    }

    /// Append one audio section (98 frames of 12 samples, interleaved
    /// stereo, little endian)
    pub fn write_section(&mut self, section: &AudioSection) -> EfmResult<()> {
        for index in 0..98 {
            for &sample in section.frame(index).data().iter() {
                self.inner.write_all(&sample.to_le_bytes())?;
                self.data_bytes += 2;
            }
        }
        Ok(())
    }

    /// Append one Data24 section verbatim (raw audio output path)
    pub fn write_data24_section(&mut self, section: &Data24Section) -> EfmResult<()> {
        for index in 0..98 {
            self.inner.write_all(section.frame(index).data())?;
            self.data_bytes += 24;
        }
        Ok(())
    }

    /// Seek back and fill in the header, returning the underlying
    /// writer.
    pub fn finalize(mut self) -> EfmResult<W> {
        let mut header = [0u8; WAV_HEADER_SIZE];

        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&(36 + self.data_bytes).to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        // PCM subchunk
        header[16..20].copy_from_slice(&16u32.to_le_bytes());
        header[20..22].copy_from_slice(&1u16.to_le_bytes());
        header[22..24].copy_from_slice(&2u16.to_le_bytes());
        header[24..28].copy_from_slice(&44_100u32.to_le_bytes());
        // Byte rate and block align for 2ch x 16 bit
        header[28..32].copy_from_slice(&(44_100u32 * 4).to_le_bytes());
        header[32..34].copy_from_slice(&4u16.to_le_bytes());
        header[34..36].copy_from_slice(&16u16.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_bytes.to_le_bytes());

        self.inner.seek(SeekFrom::Start(0))?;
        self.inner.write_all(&header)?;
        self.inner.flush()?;

        Ok(self.inner)
    }

    /// Payload bytes written so far
    pub fn data_bytes(&self) -> u32 {
        self.data_bytes
    }
}
