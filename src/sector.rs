//! CD-ROM sector types: the 2352-byte raw sector recovered from the
//! Data24 stream and the interpreted sector with its header fields.

use std::fmt;

#[cfg(feature = "serde")]
use serde_big_array::BigArray;

use crate::bcd::bcd_to_int_lenient;

/// Raw sector size: 12-byte sync, 4-byte header, user data and ECC
pub const RAW_SECTOR_SIZE: usize = 2352;

/// User payload carried by a mode 1 sector
pub const USER_DATA_SIZE: usize = 2048;

/// The 12-byte CD-ROM sector synchronisation pattern
pub const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00,
];

/// Generate the ECMA-130 Annex B scrambler table.
///
/// The table is the output of a 15-bit LFSR (x^15 + x + 1, preset to
/// 0x0001, least-significant bit first) and covers bytes 12..2352 of a
/// sector; the sync pattern itself is never scrambled, so the first 12
/// entries are zero and the whole sector can be XORed in one pass.
/// Scrambling and unscrambling are the same operation.
pub fn scrambler_table() -> [u8; RAW_SECTOR_SIZE] {
    let mut table = [0u8; RAW_SECTOR_SIZE];
    let mut reg: u16 = 0x0001;

    for entry in table.iter_mut().skip(12) {
        let mut byte = 0u8;

        for bit in 0..8 {
            byte |= ((reg & 1) as u8) << bit;
            let feedback = (reg & 1) ^ ((reg >> 1) & 1);
            reg = (reg >> 1) | (feedback << 14);
        }

        *entry = byte;
    }

    table
}

/// One unscrambled 2352-byte sector plus its parallel error-flag vector.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSector {
    #[cfg_attr(feature = "serde", serde(with = "BigArray"))]
    data: [u8; RAW_SECTOR_SIZE],
    #[cfg_attr(feature = "serde", serde(with = "BigArray"))]
    error_data: [u8; RAW_SECTOR_SIZE],
}

impl Default for RawSector {
    fn default() -> RawSector {
        RawSector {
            data: [0; RAW_SECTOR_SIZE],
            error_data: [0; RAW_SECTOR_SIZE],
        }
    }
}

impl RawSector {
    /// Create a zero-filled sector with no error flags set
    pub fn new() -> RawSector {
        RawSector::default()
    }

    /// Build a sector from its payload and error flags
    pub fn from_parts(
        data: [u8; RAW_SECTOR_SIZE],
        error_data: [u8; RAW_SECTOR_SIZE],
    ) -> RawSector {
        RawSector { data, error_data }
    }

    /// Borrow the sector payload
    pub fn data(&self) -> &[u8; RAW_SECTOR_SIZE] {
        &self.data
    }

    /// Borrow the error-flag vector
    pub fn error_data(&self) -> &[u8; RAW_SECTOR_SIZE] {
        &self.error_data
    }

    /// Number of bytes flagged as erasures
    pub fn count_errors(&self) -> u32 {
        self.error_data.iter().filter(|&&e| e != 0).count() as u32
    }
}

/// Sector address from the CD-ROM header: M:S:F stored as BCD on disc.
///
/// Header bytes come straight off the (possibly damaged) data stream, so
/// the fields are decoded leniently; `Sector::is_metadata_valid` carries
/// the trust verdict derived from the error flags.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorAddress {
    min: u8,
    sec: u8,
    frame: u8,
}

impl SectorAddress {
    /// Build an address from already-binary M:S:F fields
    pub fn new(min: u8, sec: u8, frame: u8) -> SectorAddress {
        SectorAddress { min, sec, frame }
    }

    /// Decode an address from the three BCD header bytes
    pub fn from_bcd(min: u8, sec: u8, frame: u8) -> SectorAddress {
        SectorAddress {
            min: bcd_to_int_lenient(min),
            sec: bcd_to_int_lenient(sec),
            frame: bcd_to_int_lenient(frame),
        }
    }

    /// Flat sector number: ((min * 60) + sec) * 75 + frame
    pub fn address(&self) -> u32 {
        (u32::from(self.min) * 60 + u32::from(self.sec)) * 75 + u32::from(self.frame)
    }

    /// Minutes field
    pub fn minutes(&self) -> u8 {
        self.min
    }

    /// Seconds field
    pub fn seconds(&self) -> u8 {
        self.sec
    }

    /// Frames field
    pub fn frame_number(&self) -> u8 {
        self.frame
    }
}

impl fmt::Display for SectorAddress {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{:02}:{:02}:{:02}", self.min, self.sec, self.frame)
    }
}

/// An interpreted CD-ROM sector: header fields plus the payload.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sector {
    address: SectorAddress,
    mode: i32,
    metadata_valid: bool,
    #[cfg_attr(feature = "serde", serde(with = "BigArray"))]
    data: [u8; RAW_SECTOR_SIZE],
    #[cfg_attr(feature = "serde", serde(with = "BigArray"))]
    error_data: [u8; RAW_SECTOR_SIZE],
}

impl Default for Sector {
    fn default() -> Sector {
        Sector {
            address: SectorAddress::new(0, 0, 0),
            mode: -1,
            metadata_valid: false,
            data: [0; RAW_SECTOR_SIZE],
            error_data: [0; RAW_SECTOR_SIZE],
        }
    }
}

impl Sector {
    /// Create an empty sector
    pub fn new() -> Sector {
        Sector::default()
    }

    /// Header address
    pub fn address(&self) -> SectorAddress {
        self.address
    }

    /// Set the header address
    pub fn set_address(&mut self, address: SectorAddress) {
        self.address = address;
    }

    /// Sector mode: 0, 1 or 2, or -1 for an unrecognised mode byte
    pub fn mode(&self) -> i32 {
        self.mode
    }

    /// Set the sector mode
    pub fn set_mode(&mut self, mode: i32) {
        self.mode = mode;
    }

    /// True if the header bytes carried no error flags
    pub fn is_metadata_valid(&self) -> bool {
        self.metadata_valid
    }

    /// Record whether the header bytes can be trusted
    pub fn set_metadata_valid(&mut self, valid: bool) {
        self.metadata_valid = valid;
    }

    /// True if no byte of the user payload is flagged as an erasure
    pub fn is_data_valid(&self) -> bool {
        self.user_error_data().iter().all(|&e| e == 0)
    }

    /// Install the full 2352-byte payload and flags
    pub fn set_data(&mut self, data: [u8; RAW_SECTOR_SIZE], error_data: [u8; RAW_SECTOR_SIZE]) {
        self.data = data;
        self.error_data = error_data;
    }

    /// Borrow the full 2352 bytes (sync, header, user data and ECC)
    pub fn data(&self) -> &[u8; RAW_SECTOR_SIZE] {
        &self.data
    }

    /// The 2048 user-data bytes of a mode 1 sector (offset 16)
    pub fn user_data(&self) -> &[u8; USER_DATA_SIZE] {
        array_ref![self.data, 16, USER_DATA_SIZE]
    }

    /// Error flags covering the 2048 user-data bytes
    pub fn user_error_data(&self) -> &[u8; USER_DATA_SIZE] {
        array_ref![self.error_data, 16, USER_DATA_SIZE]
    }
}

/// Reed-Solomon Product-like Code over a CD-ROM sector (ECMA-130 clause
/// 14).
///
/// Deliberately unimplemented: the reference tooling ships these as no-ops
/// and this crate preserves that. The P/Q parity bytes pass through
/// sectors untouched and `Sector::is_data_valid` is derived from the CIRC
/// error flags alone.
#[derive(Default)]
pub struct Rspc;

impl Rspc {
    /// Create the (stub) sector-level corrector
    pub fn new() -> Rspc {
        Rspc
    }

    /// Q-parity correction pass. Stub: leaves the sector untouched.
    pub fn q_parity_ecc(&self, _data: &mut [u8; RAW_SECTOR_SIZE], _error_data: &mut [u8; RAW_SECTOR_SIZE]) {
        // Ignore the first 12 bytes of the sector
    }

    /// P-parity correction pass. Stub: leaves the sector untouched.
    pub fn p_parity_ecc(&self, _data: &mut [u8; RAW_SECTOR_SIZE], _error_data: &mut [u8; RAW_SECTOR_SIZE]) {
        // Ignore the first 12 bytes of the sector
    }
}

#[cfg(test)]
mod test {
    use super::{scrambler_table, SectorAddress, SYNC_PATTERN};

    #[test]
    fn scrambler_starts_with_known_values() {
        let table = scrambler_table();

        // Sync pattern region untouched
        assert!(table[0..12].iter().all(|&b| b == 0));

        // First LFSR output bytes, fixed by the standard
        assert_eq!(table[12], 0x01);
        assert_eq!(table[13], 0x80);
        assert_eq!(table[14], 0x00);
        assert_eq!(table[15], 0x60);
    }

    #[test]
    fn scrambling_is_involutive() {
        let table = scrambler_table();
        let sector: Vec<u8> = (0..2352).map(|i| (i % 251) as u8).collect();

        let once: Vec<u8> = sector
            .iter()
            .zip(table.iter())
            .map(|(&b, &s)| b ^ s)
            .collect();
        let twice: Vec<u8> = once.iter().zip(table.iter()).map(|(&b, &s)| b ^ s).collect();

        assert_ne!(once[12..], sector[12..]);
        assert_eq!(twice, sector);
    }

    #[test]
    fn sync_pattern_shape() {
        assert_eq!(SYNC_PATTERN[0], 0x00);
        assert_eq!(SYNC_PATTERN[11], 0x00);
        assert!(SYNC_PATTERN[1..11].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn address_arithmetic() {
        let a = SectorAddress::from_bcd(0x12, 0x34, 0x56);
        assert_eq!(a.address(), (12 * 60 + 34) * 75 + 56);
        assert_eq!(a.to_string(), "12:34:56");
    }
}
