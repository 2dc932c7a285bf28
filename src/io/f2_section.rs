//! F2 section interchange files.
//!
//! F2 sections are the natural save point of the pipeline: everything
//! upstream is channel plumbing, everything downstream is error
//! correction, so stackers and re-runs operate on these files. Each
//! record is a little-endian `u32` length prefix followed by the section
//! metadata and the 98 frames with their error flags.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::frame::{F2Frame, Frame};
use crate::metadata::{QMode, SectionMetadata, SectionType};
use crate::section::F2Section;
use crate::time::SectionTime;
use crate::{EfmError, EfmResult, FRAMES_PER_SECTION};

/// Serialized metadata: type, mode, track, flags, two u32 timestamps
const METADATA_SIZE: usize = 12;

/// Serialized section payload: metadata plus 98 frames of 32 data and 32
/// flag bytes
const RECORD_SIZE: usize = METADATA_SIZE + FRAMES_PER_SECTION * 64;

const FLAG_VALID: u8 = 1 << 0;
const FLAG_AUDIO: u8 = 1 << 1;
const FLAG_COPY_PROHIBITED: u8 = 1 << 2;
const FLAG_PREEMPHASIS: u8 = 1 << 3;
const FLAG_2_CHANNEL: u8 = 1 << 4;
const FLAG_P: u8 = 1 << 5;

fn encode_metadata(metadata: &SectionMetadata) -> [u8; METADATA_SIZE] {
    let mut out = [0u8; METADATA_SIZE];

    out[0] = match metadata.section_type() {
        SectionType::LeadIn => 0,
        SectionType::LeadOut => 1,
        SectionType::UserData => 2,
    };
    out[1] = match metadata.q_mode() {
        QMode::Q1 => 1,
        QMode::Q2 => 2,
        QMode::Q3 => 3,
        QMode::Q4 => 4,
    };
    out[2] = metadata.track_number();

    let mut flags = 0u8;
    if metadata.is_valid() {
        flags |= FLAG_VALID;
    }
    if metadata.is_audio() {
        flags |= FLAG_AUDIO;
    }
    if metadata.is_copy_prohibited() {
        flags |= FLAG_COPY_PROHIBITED;
    }
    if metadata.is_preemphasis() {
        flags |= FLAG_PREEMPHASIS;
    }
    if metadata.is_2_channel() {
        flags |= FLAG_2_CHANNEL;
    }
    if metadata.p_flag() {
        flags |= FLAG_P;
    }
    out[3] = flags;

    out[4..8].copy_from_slice(&metadata.section_time().frames().to_le_bytes());
    out[8..12].copy_from_slice(&metadata.absolute_section_time().frames().to_le_bytes());

    out
}

fn decode_metadata(bytes: &[u8; METADATA_SIZE]) -> EfmResult<SectionMetadata> {
    let mut metadata = SectionMetadata::default();

    metadata.set_section_type(match bytes[0] {
        0 => SectionType::LeadIn,
        1 => SectionType::LeadOut,
        2 => SectionType::UserData,
        _ => return Err(EfmError::BadSectionFile),
    });
    metadata.set_q_mode(match bytes[1] {
        1 => QMode::Q1,
        2 => QMode::Q2,
        3 => QMode::Q3,
        4 => QMode::Q4,
        _ => return Err(EfmError::BadSectionFile),
    });
    metadata.set_track_number(bytes[2]);

    let flags = bytes[3];
    metadata.set_valid(flags & FLAG_VALID != 0);
    metadata.set_audio(flags & FLAG_AUDIO != 0);
    metadata.set_copy_prohibited(flags & FLAG_COPY_PROHIBITED != 0);
    metadata.set_preemphasis(flags & FLAG_PREEMPHASIS != 0);
    metadata.set_2_channel(flags & FLAG_2_CHANNEL != 0);
    metadata.set_p_flag(flags & FLAG_P != 0);

    let section_time = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let absolute_time = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    metadata.set_section_time(
        SectionTime::from_frames(section_time).map_err(|_| EfmError::BadSectionFile)?,
    );
    metadata.set_absolute_section_time(
        SectionTime::from_frames(absolute_time).map_err(|_| EfmError::BadSectionFile)?,
    );

    Ok(metadata)
}

/// Appends F2 sections to a stream as length-prefixed records.
pub struct F2SectionWriter<W: Write> {
    inner: W,
    sections_written: u64,
}

impl<W: Write> F2SectionWriter<W> {
    /// Create the writer
    pub fn new(inner: W) -> F2SectionWriter<W> {
        F2SectionWriter {
            inner,
            sections_written: 0,
        }
    }

    /// Append one section. Panics on an incomplete section.
    pub fn write_section(&mut self, section: &F2Section) -> EfmResult<()> {
        if !section.is_complete() {
            panic!("F2SectionWriter: F2 section is not complete");
        }

        self.inner
            .write_all(&(RECORD_SIZE as u32).to_le_bytes())?;
        self.inner.write_all(&encode_metadata(&section.metadata))?;

        for index in 0..FRAMES_PER_SECTION {
            let frame = section.frame(index);
            self.inner.write_all(frame.data())?;
            self.inner.write_all(frame.error_data())?;
        }

        self.sections_written += 1;
        Ok(())
    }

    /// Sections written so far
    pub fn sections_written(&self) -> u64 {
        self.sections_written
    }

    /// Flush and return the underlying writer
    pub fn finalize(mut self) -> EfmResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Random-access reader over an F2 section file.
pub struct F2SectionReader<R: Read + Seek> {
    inner: R,
    offsets: Vec<u64>,
    position: usize,
}

impl<R: Read + Seek> F2SectionReader<R> {
    /// Open a section file: the record index is built by scanning the
    /// length prefixes once.
    pub fn new(mut inner: R) -> EfmResult<F2SectionReader<R>> {
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;

        let mut offsets = Vec::new();
        let mut offset = 0u64;

        while offset < end {
            let mut prefix = [0u8; 4];
            inner.read_exact(&mut prefix)?;
            let length = u64::from(u32::from_le_bytes(prefix));

            if length != RECORD_SIZE as u64 || offset + 4 + length > end {
                return Err(EfmError::BadSectionFile);
            }

            offsets.push(offset);
            offset += 4 + length;
            inner.seek(SeekFrom::Start(offset))?;
        }

        inner.seek(SeekFrom::Start(0))?;

        Ok(F2SectionReader {
            inner,
            offsets,
            position: 0,
        })
    }

    /// Number of sections in the file
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True if the file holds no sections
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Position the reader on section `index`
    pub fn seek_to_section(&mut self, index: usize) -> EfmResult<()> {
        if index >= self.offsets.len() {
            return Err(EfmError::BadSectionIndex);
        }

        self.inner.seek(SeekFrom::Start(self.offsets[index]))?;
        self.position = index;
        Ok(())
    }

    /// Read the section at the current position and advance
    pub fn read_section(&mut self) -> EfmResult<F2Section> {
        if self.position >= self.offsets.len() {
            return Err(EfmError::BadSectionIndex);
        }

        let mut prefix = [0u8; 4];
        self.inner.read_exact(&mut prefix)?;
        if u32::from_le_bytes(prefix) != RECORD_SIZE as u32 {
            return Err(EfmError::BadSectionFile);
        }

        let mut metadata_bytes = [0u8; METADATA_SIZE];
        self.inner.read_exact(&mut metadata_bytes)?;

        let mut section = F2Section::new();
        section.metadata = decode_metadata(&metadata_bytes)?;

        for _ in 0..FRAMES_PER_SECTION {
            let mut data = [0u8; 32];
            let mut error_data = [0u8; 32];
            self.inner.read_exact(&mut data)?;
            self.inner.read_exact(&mut error_data)?;

            let mut frame = F2Frame::new();
            frame.set_data(&data);
            frame.set_error_data(&error_data);
            section.push_frame(frame);
        }

        self.position += 1;
        Ok(section)
    }
}

#[cfg(test)]
mod test {
    use super::{F2SectionReader, F2SectionWriter};
    use crate::frame::{F2Frame, Frame};
    use crate::metadata::{QMode, SectionMetadata, SectionType};
    use crate::section::F2Section;
    use crate::time::SectionTime;
    use std::io::Cursor;

    fn sample_section(track: u8, frames: u32) -> F2Section {
        let mut section = F2Section::new();

        let mut m = SectionMetadata::new();
        m.set_section_type(SectionType::UserData);
        m.set_track_number(track);
        m.set_q_mode(QMode::Q4);
        m.set_absolute_section_time(SectionTime::from_frames(frames).unwrap());
        m.set_valid(true);
        section.metadata = m;

        for i in 0..98 {
            let mut f = F2Frame::new();
            let data: [u8; 32] = core::array::from_fn(|j| (i + j) as u8);
            f.set_data(&data);
            if i == 0 {
                f.error_data_mut()[5] = 1;
            }
            section.push_frame(f);
        }
        section
    }

    #[test]
    fn roundtrip() {
        let mut writer = F2SectionWriter::new(Cursor::new(Vec::new()));
        writer.write_section(&sample_section(7, 1000)).unwrap();
        writer.write_section(&sample_section(8, 1001)).unwrap();
        let bytes = writer.finalize().unwrap().into_inner();

        let mut reader = F2SectionReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 2);

        let first = reader.read_section().unwrap();
        assert_eq!(first.metadata.track_number(), 7);
        assert_eq!(first.metadata.q_mode(), QMode::Q4);
        assert_eq!(first.metadata.absolute_section_time().frames(), 1000);
        assert_eq!(first.frame(0).error_data()[5], 1);
        assert_eq!(first.frame(1).data()[0], 1);

        let second = reader.read_section().unwrap();
        assert_eq!(second.metadata.track_number(), 8);
    }

    #[test]
    fn seeking() {
        let mut writer = F2SectionWriter::new(Cursor::new(Vec::new()));
        for i in 0..5 {
            writer.write_section(&sample_section(1, 2000 + i)).unwrap();
        }
        let bytes = writer.finalize().unwrap().into_inner();

        let mut reader = F2SectionReader::new(Cursor::new(bytes)).unwrap();
        reader.seek_to_section(3).unwrap();
        assert_eq!(
            reader.read_section().unwrap().metadata.absolute_section_time(),
            SectionTime::from_frames(2003).unwrap()
        );

        // Reads continue sequentially after a seek
        assert_eq!(
            reader.read_section().unwrap().metadata.absolute_section_time(),
            SectionTime::from_frames(2004).unwrap()
        );
        assert!(reader.read_section().is_err());
    }

    #[test]
    fn truncated_file_is_rejected() {
        let mut writer = F2SectionWriter::new(Cursor::new(Vec::new()));
        writer.write_section(&sample_section(1, 0)).unwrap();
        let mut bytes = writer.finalize().unwrap().into_inner();
        bytes.truncate(bytes.len() - 10);

        assert!(F2SectionReader::new(Cursor::new(bytes)).is_err());
    }
}
