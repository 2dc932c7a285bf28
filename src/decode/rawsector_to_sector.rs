//! Raw sector to sector: interpret the 16-byte CD-ROM header.

use std::collections::VecDeque;

use log::debug;

use crate::sector::{RawSector, Sector, SectorAddress};

/// Header interpretation stage.
///
/// Bytes 12..15 carry the BCD M:S:F address, byte 15 the mode. The
/// header is decoded even when its bytes are flagged (the values are
/// often still right); `metadata_valid` records whether they can be
/// trusted.
#[derive(Default)]
pub struct RawSectorToSector {
    input_buffer: VecDeque<RawSector>,
    output_buffer: VecDeque<Sector>,

    valid_sectors: u64,
    invalid_metadata_sectors: u64,
}

impl RawSectorToSector {
    /// Create the stage
    pub fn new() -> RawSectorToSector {
        RawSectorToSector::default()
    }

    /// Push one raw sector
    pub fn push_sector(&mut self, raw_sector: RawSector) {
        self.input_buffer.push_back(raw_sector);
        self.process_queue();
    }

    /// Pop the next interpreted sector
    pub fn pop_sector(&mut self) -> Option<Sector> {
        self.output_buffer.pop_front()
    }

    /// True if sectors are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn process_queue(&mut self) {
        while let Some(raw) = self.input_buffer.pop_front() {
            let error_data = raw.error_data();

            let address_error = error_data[12] != 0 || error_data[13] != 0 || error_data[14] != 0;
            let mode_error = error_data[15] != 0;

            let data = raw.data();
            let address = SectorAddress::from_bcd(data[12], data[13], data[14]);
            let mode = match data[15] {
                0 => 0,
                1 => 1,
                2 => 2,
                _ => -1,
            };

            let mut sector = Sector::new();
            sector.set_address(address);
            sector.set_mode(mode);
            sector.set_metadata_valid(!(address_error || mode_error));
            sector.set_data(*raw.data(), *raw.error_data());

            if sector.is_metadata_valid() {
                self.valid_sectors += 1;
            } else {
                self.invalid_metadata_sectors += 1;
                debug!(
                    "RawSectorToSector: metadata error, address {} mode {}",
                    sector.address(),
                    sector.mode()
                );
            }

            self.output_buffer.push_back(sector);
        }
    }

    /// Sectors whose header bytes carried no error flags
    pub fn valid_sectors(&self) -> u64 {
        self.valid_sectors
    }

    /// Sectors with untrustworthy headers
    pub fn invalid_metadata_sectors(&self) -> u64 {
        self.invalid_metadata_sectors
    }

    /// Log the stage statistics
    pub fn show_statistics(&self) {
        log::info!("Raw sector to sector statistics:");
        log::info!("  Valid metadata sectors: {}", self.valid_sectors);
        log::info!(
            "  Invalid metadata sectors: {}",
            self.invalid_metadata_sectors
        );
    }
}
