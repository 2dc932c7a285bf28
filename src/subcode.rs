//! Subcode (P/Q channel) codec.
//!
//! A section carries 96 bytes of subcode in frames 2..=97 (the first two
//! frame slots hold the sync0/sync1 pseudo-symbols instead). Each byte
//! packs one bit of each of the eight subchannels P..W, MSB first; only P
//! and Q are used, R..W are reserved zero.
//!
//! The Q channel is 96 bits: a control/mode byte, a track number, an
//! index, two M:S:F timestamps in BCD, a reserved zero byte and a 16-bit
//! CRC. This module is a pure codec between [`SectionMetadata`] and the
//! 98-byte subcode block; it holds no state.

use log::debug;

use crate::metadata::{QMode, SectionMetadata, SectionType};
use crate::time::SectionTime;
use crate::FRAMES_PER_SECTION;

/// Lead-out marker in the Q-channel track byte
const TRACK_LEAD_OUT: u8 = 0xaa;

/// CRC-16 used by the Q channel: polynomial 0x1021, initial value 0, MSB
/// first. The stored value is the one's complement of this.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u32 = 0;

    for &byte in data {
        crc ^= u32::from(byte) << 8;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x10000 != 0 {
                crc = (crc ^ 0x1021) & 0xffff;
            }
        }
    }

    crc as u16
}

/// True if the CRC bytes at the end of a 12-byte Q-channel block match the
/// complemented CRC of bytes 0..10.
pub fn is_crc_valid(q_channel: &[u8; 12]) -> bool {
    let computed = !crc16(&q_channel[0..10]);
    let stored = (u16::from(q_channel[10]) << 8) | u16::from(q_channel[11]);

    computed == stored
}

fn control_nibble(metadata: &SectionMetadata) -> u8 {
    if metadata.is_audio() {
        let mut nibble = 0x0;
        if metadata.is_preemphasis() {
            nibble |= 0x1;
        }
        if !metadata.is_copy_prohibited() {
            nibble |= 0x2;
        }
        nibble
    } else if metadata.is_copy_prohibited() {
        0x4
    } else {
        0x6
    }
}

fn q_mode_nibble(q_mode: QMode) -> u8 {
    match q_mode {
        QMode::Q1 => 0x1,
        QMode::Q2 => 0x2,
        QMode::Q3 => 0x3,
        QMode::Q4 => 0x4,
    }
}

/// Build the 12-byte Q-channel block for a section.
///
/// Panics if asked to encode a user-data section with track number 0;
/// that combination cannot come from [`SectionMetadata`]'s setters and
/// means the caller corrupted the metadata.
pub fn q_channel_data(metadata: &SectionMetadata) -> [u8; 12] {
    let mut q = [0u8; 12];

    let (tno, index) = match metadata.section_type() {
        SectionType::LeadIn => (0x00, 0x00),
        SectionType::LeadOut => (TRACK_LEAD_OUT, 0x01),
        SectionType::UserData => {
            let track = metadata.track_number();
            if track == 0 {
                panic!("subcode::q_channel_data: track 0 is illegal for a user-data section");
            }
            (((track / 10) << 4) | (track % 10), 0x01)
        }
    };

    q[0] = (control_nibble(metadata) << 4) | q_mode_nibble(metadata.q_mode());
    q[1] = tno;
    q[2] = index;
    q[3..6].copy_from_slice(&metadata.section_time().to_bcd());
    q[6] = 0;
    q[7..10].copy_from_slice(&metadata.absolute_section_time().to_bcd());

    let crc = !crc16(&q[0..10]);
    q[10] = (crc >> 8) as u8;
    q[11] = crc as u8;

    q
}

/// Serialize section metadata into the 98 subcode bytes of a section.
/// Indices 0 and 1 are always zero (sync frame slots).
pub fn to_data(metadata: &SectionMetadata) -> [u8; FRAMES_PER_SECTION] {
    let q = q_channel_data(metadata);
    let mut data = [0u8; FRAMES_PER_SECTION];

    for bit in 0..96 {
        let mut byte = 0u8;

        if metadata.p_flag() {
            byte |= 0x80;
        }
        if q[bit / 8] & (0x80 >> (bit % 8)) != 0 {
            byte |= 0x40;
        }

        data[bit + 2] = byte;
    }

    data
}

/// Decode the 98 subcode bytes of a section back into metadata.
///
/// A failed CRC (or a CRC-clean block whose content is not representable,
/// such as an unknown control nibble) yields default metadata with
/// `valid == false`; the metadata correction stage downstream decides what
/// to do with it.
pub fn from_data(data: &[u8; FRAMES_PER_SECTION]) -> SectionMetadata {
    let mut q = [0u8; 12];
    let mut p_bits = 0u32;

    for bit in 0..96 {
        let byte = data[bit + 2];

        if byte & 0x40 != 0 {
            q[bit / 8] |= 0x80 >> (bit % 8);
        }
        if byte & 0x80 != 0 {
            p_bits += 1;
        }
    }

    let mut metadata = SectionMetadata::default();

    // P is repeated on every bit of the section, so a majority vote rides
    // out single bit errors
    metadata.set_p_flag(p_bits > 48);

    if !is_crc_valid(&q) {
        metadata.set_valid(false);
        return metadata;
    }

    let control = q[0] >> 4;
    let mode = q[0] & 0x0f;

    match mode {
        0x1 => metadata.set_q_mode(QMode::Q1),
        0x2 => metadata.set_q_mode(QMode::Q2),
        0x3 => metadata.set_q_mode(QMode::Q3),
        0x4 => metadata.set_q_mode(QMode::Q4),
        _ => {
            debug!("subcode::from_data: unknown Q mode nibble {:#x}", mode);
            metadata.set_valid(false);
            return metadata;
        }
    }

    match control {
        0x0 | 0x1 | 0x2 | 0x3 => {
            metadata.set_audio(true);
            metadata.set_2_channel(true);
            metadata.set_preemphasis(control & 0x1 != 0);
            metadata.set_copy_prohibited(control & 0x2 == 0);
        }
        0x4 | 0x6 => {
            metadata.set_audio(false);
            metadata.set_preemphasis(false);
            metadata.set_copy_prohibited(control == 0x4);
        }
        _ => {
            debug!("subcode::from_data: unknown control nibble {:#x}", control);
            metadata.set_valid(false);
            return metadata;
        }
    }

    match q[1] {
        0x00 => metadata.set_section_type(SectionType::LeadIn),
        TRACK_LEAD_OUT => metadata.set_section_type(SectionType::LeadOut),
        tno => {
            metadata.set_section_type(SectionType::UserData);
            metadata.set_track_number((tno >> 4) * 10 + (tno & 0x0f));
        }
    }

    // q[2] is the index/pointer byte and q[6] the reserved zero byte;
    // neither is interpreted

    let section_time = SectionTime::from_bcd(q[3], q[4], q[5]);
    let absolute_time = SectionTime::from_bcd(q[7], q[8], q[9]);

    match (section_time, absolute_time) {
        (Ok(st), Ok(at)) => {
            metadata.set_section_time(st);
            metadata.set_absolute_section_time(at);
            metadata.set_valid(true);
        }
        _ => {
            debug!("subcode::from_data: CRC-clean block with malformed BCD timestamps");
            metadata.set_valid(false);
        }
    }

    metadata
}

#[cfg(test)]
mod test {
    use super::{crc16, from_data, is_crc_valid, q_channel_data, to_data};
    use crate::metadata::{QMode, SectionMetadata, SectionType};
    use crate::time::SectionTime;

    fn leadin_metadata() -> SectionMetadata {
        let mut m = SectionMetadata::new();
        m.set_section_type(SectionType::LeadIn);
        m.set_q_mode(QMode::Q1);
        m.set_audio(true);
        m.set_2_channel(true);
        m.set_preemphasis(false);
        m.set_copy_prohibited(false);
        m.set_section_time(SectionTime::ZERO);
        m.set_absolute_section_time(SectionTime::ZERO);
        m.set_valid(true);
        m
    }

    #[test]
    fn crc_is_complemented() {
        let q = q_channel_data(&leadin_metadata());

        let crc = !crc16(&q[0..10]);
        assert_eq!(q[10], (crc >> 8) as u8);
        assert_eq!(q[11], crc as u8);
        assert!(is_crc_valid(&q));
    }

    #[test]
    fn mutation_fails_validation() {
        let good = q_channel_data(&leadin_metadata());

        for i in 0..10 {
            let mut q = good;
            q[i] ^= 0x08;
            assert!(!is_crc_valid(&q), "flip in byte {} went unnoticed", i);
        }
    }

    #[test]
    fn metadata_roundtrip() {
        let mut m = SectionMetadata::new();
        m.set_section_type(SectionType::UserData);
        m.set_track_number(7);
        m.set_q_mode(QMode::Q4);
        m.set_audio(true);
        m.set_preemphasis(true);
        m.set_copy_prohibited(false);
        m.set_section_time(SectionTime::new(0, 2, 30).unwrap());
        m.set_absolute_section_time(SectionTime::new(12, 34, 56).unwrap());
        m.set_p_flag(false);
        m.set_valid(true);

        let decoded = from_data(&to_data(&m));
        assert_eq!(decoded, m);
    }

    #[test]
    fn leadout_uses_aa_marker() {
        let mut m = leadin_metadata();
        m.set_section_type(SectionType::LeadOut);

        let q = q_channel_data(&m);
        assert_eq!(q[1], 0xaa);

        let decoded = from_data(&to_data(&m));
        assert_eq!(decoded.section_type(), SectionType::LeadOut);
        assert_eq!(decoded.track_number(), 0);
    }

    #[test]
    fn control_nibble_table() {
        let mut m = leadin_metadata();

        // Audio, no preemphasis, copy prohibited
        m.set_audio(true);
        m.set_preemphasis(false);
        m.set_copy_prohibited(true);
        assert_eq!(q_channel_data(&m)[0] >> 4, 0x0);

        m.set_preemphasis(true);
        assert_eq!(q_channel_data(&m)[0] >> 4, 0x1);

        m.set_preemphasis(false);
        m.set_copy_prohibited(false);
        assert_eq!(q_channel_data(&m)[0] >> 4, 0x2);

        m.set_preemphasis(true);
        assert_eq!(q_channel_data(&m)[0] >> 4, 0x3);

        m.set_audio(false);
        m.set_copy_prohibited(true);
        assert_eq!(q_channel_data(&m)[0] >> 4, 0x4);

        m.set_copy_prohibited(false);
        assert_eq!(q_channel_data(&m)[0] >> 4, 0x6);
    }

    #[test]
    fn corrupt_q_bits_invalidate() {
        let mut data = to_data(&leadin_metadata());

        // Flip a Q bit mid-block
        data[40] ^= 0x40;

        assert!(!from_data(&data).is_valid());
    }
}
