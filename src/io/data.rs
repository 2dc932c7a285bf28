//! Raw data output: Data24 payloads or 2048-byte sector bodies,
//! concatenated with no framing of their own.

use std::io::Write;

use crate::frame::Frame;
use crate::section::Data24Section;
use crate::sector::Sector;
use crate::EfmResult;

/// Writer for the non-WAV output paths.
pub struct DataWriter<W: Write> {
    inner: W,
    bytes_written: u64,
}

impl<W: Write> DataWriter<W> {
    /// Create the writer
    pub fn new(inner: W) -> DataWriter<W> {
        DataWriter {
            inner,
            bytes_written: 0,
        }
    }

    /// Append the 98 payloads of a Data24 section verbatim
    pub fn write_data24_section(&mut self, section: &Data24Section) -> EfmResult<()> {
        for index in 0..98 {
            self.inner.write_all(section.frame(index).data())?;
            self.bytes_written += 24;
        }
        Ok(())
    }

    /// Append the 2048 user-data bytes of a sector
    pub fn write_sector(&mut self, sector: &Sector) -> EfmResult<()> {
        self.inner.write_all(sector.user_data())?;
        self.bytes_written += 2048;
        Ok(())
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and return the underlying writer
    pub fn finalize(mut self) -> EfmResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
