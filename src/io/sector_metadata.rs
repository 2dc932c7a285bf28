//! Sector metadata sidecar: one `address,mode,dataValid` line per
//! 2048-byte sector behind a fixed three-line header.

use std::io::Write;

use crate::sector::Sector;
use crate::EfmResult;

/// Sidecar writer for the CD-ROM data path.
pub struct SectorMetadataWriter<W: Write> {
    inner: W,
}

impl<W: Write> SectorMetadataWriter<W> {
    /// Create the writer; the header lines go out immediately.
    pub fn new(mut inner: W) -> EfmResult<SectorMetadataWriter<W>> {
        inner.write_all(b"efm-decode - Sector Metadata\n")?;
        inner.write_all(b"Format: Address, mode and data valid flag\n")?;
        inner.write_all(b"Each address represents a 2048 byte sector\n")?;

        Ok(SectorMetadataWriter { inner })
    }

    /// Record one sector
    pub fn write_sector(&mut self, sector: &Sector) -> EfmResult<()> {
        writeln!(
            self.inner,
            "{},{},{}",
            sector.address().address(),
            sector.mode(),
            sector.is_data_valid()
        )?;
        Ok(())
    }

    /// Return the underlying writer
    pub fn finalize(mut self) -> EfmResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
