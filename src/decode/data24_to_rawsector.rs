//! Data24 to raw CD-ROM sectors: hunt the 12-byte sector sync in the
//! byte stream, cut 2352-byte sectors and unscramble them.

use std::collections::VecDeque;

use log::debug;

use crate::frame::Frame;
use crate::section::Data24Section;
use crate::sector::{scrambler_table, RawSector, RAW_SECTOR_SIZE, SYNC_PATTERN};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum State {
    WaitingForSync,
    InSync,
    LostSync,
}

/// Sector framer over the Data24 byte stream.
///
/// Sector boundaries do not align with frames or sections, so the stage
/// keeps a flat byte buffer (with its parallel error flags) and a small
/// state machine: hunt for sync, stay locked while syncs keep appearing
/// every 2352 bytes, fall back to hunting after too many misses.
pub struct Data24ToRawSector {
    state: State,
    sector_data: Vec<u8>,
    sector_error_data: Vec<u8>,
    output_buffer: VecDeque<RawSector>,
    unscramble_table: [u8; RAW_SECTOR_SIZE],

    valid_sectors: u64,
    discarded_bytes: u64,
    good_sync_patterns: u64,
    bad_sync_patterns: u64,
    missed_sync_run: u32,
    sync_losses: u64,
}

impl Default for Data24ToRawSector {
    fn default() -> Data24ToRawSector {
        Data24ToRawSector {
            state: State::WaitingForSync,
            sector_data: Vec::new(),
            sector_error_data: Vec::new(),
            output_buffer: VecDeque::new(),
            unscramble_table: scrambler_table(),
            valid_sectors: 0,
            discarded_bytes: 0,
            good_sync_patterns: 0,
            bad_sync_patterns: 0,
            missed_sync_run: 0,
            sync_losses: 0,
        }
    }
}

impl Data24ToRawSector {
    /// Consecutive sync misses tolerated before the lock is dropped
    const MAX_MISSED_SYNCS: u32 = 4;

    /// Create the stage
    pub fn new() -> Data24ToRawSector {
        Data24ToRawSector::default()
    }

    /// Push one Data24 section. Panics on an incomplete section.
    pub fn push_section(&mut self, section: Data24Section) {
        if !section.is_complete() {
            panic!("Data24ToRawSector: Data24 section is not complete");
        }

        self.sector_data.reserve(98 * 24);
        self.sector_error_data.reserve(98 * 24);
        for index in 0..98 {
            let frame = section.frame(index);
            self.sector_data.extend_from_slice(frame.data());
            self.sector_error_data.extend_from_slice(frame.error_data());
        }

        self.process_state_machine();
    }

    /// Pop the next raw sector
    pub fn pop_sector(&mut self) -> Option<RawSector> {
        self.output_buffer.pop_front()
    }

    /// True if sectors are waiting
    pub fn is_ready(&self) -> bool {
        !self.output_buffer.is_empty()
    }

    fn process_state_machine(&mut self) {
        loop {
            let next = match self.state {
                State::WaitingForSync => self.waiting_for_sync(),
                State::InSync => self.in_sync(),
                State::LostSync => self.lost_sync(),
            };

            // Stay in the machine while transitions are still consuming
            // buffered data
            let progressed = next != self.state;
            self.state = next;

            if !progressed && !self.can_act() {
                break;
            }
            if !progressed && self.state == State::WaitingForSync {
                break;
            }
        }
    }

    /// True if the current state could consume more of the buffer
    fn can_act(&self) -> bool {
        match self.state {
            State::WaitingForSync => false,
            State::InSync => self.sector_data.len() >= RAW_SECTOR_SIZE,
            State::LostSync => true,
        }
    }

    fn waiting_for_sync(&mut self) -> State {
        match find_pattern(&self.sector_data, &SYNC_PATTERN) {
            None => {
                // Keep the tail that could be the start of a sync
                if self.sector_data.len() > 11 {
                    let discard = self.sector_data.len() - 11;
                    debug!(
                        "Data24ToRawSector: no sync pattern, discarding {} bytes",
                        discard
                    );
                    self.discarded_bytes += discard as u64;
                    self.sector_data.drain(..discard);
                    self.sector_error_data.drain(..discard);
                }
                State::WaitingForSync
            }
            Some(position) => {
                debug!(
                    "Data24ToRawSector: sync pattern found at {}, discarding {} bytes",
                    position, position
                );
                self.discarded_bytes += position as u64;
                self.sector_data.drain(..position);
                self.sector_error_data.drain(..position);
                State::InSync
            }
        }
    }

    fn in_sync(&mut self) -> State {
        if self.sector_data.len() < RAW_SECTOR_SIZE {
            return State::InSync;
        }

        if self.sector_data[..12] == SYNC_PATTERN {
            self.good_sync_patterns += 1;
            self.missed_sync_run = 0;
        } else {
            self.missed_sync_run += 1;
            self.bad_sync_patterns += 1;

            if self.missed_sync_run >= Self::MAX_MISSED_SYNCS {
                debug!(
                    "Data24ToRawSector: {} consecutive sync misses, lock lost (valid sectors: {})",
                    self.missed_sync_run, self.valid_sectors
                );
                return State::LostSync;
            }

            debug!("Data24ToRawSector: sync pattern mismatch, holding lock");
        }

        // Cut and unscramble the sector
        let mut data = [0u8; RAW_SECTOR_SIZE];
        let mut error_data = [0u8; RAW_SECTOR_SIZE];
        for (i, b) in data.iter_mut().enumerate() {
            *b = self.sector_data[i] ^ self.unscramble_table[i];
        }
        error_data.copy_from_slice(&self.sector_error_data[..RAW_SECTOR_SIZE]);

        self.sector_data.drain(..RAW_SECTOR_SIZE);
        self.sector_error_data.drain(..RAW_SECTOR_SIZE);

        self.output_buffer
            .push_back(RawSector::from_parts(data, error_data));
        self.valid_sectors += 1;

        State::InSync
    }

    fn lost_sync(&mut self) -> State {
        self.missed_sync_run = 0;
        self.sync_losses += 1;
        debug!("Data24ToRawSector: lost sync");
        State::WaitingForSync
    }

    /// Sectors emitted
    pub fn valid_sectors(&self) -> u64 {
        self.valid_sectors
    }

    /// Bytes dropped while hunting for sync
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// Sector boundaries that carried the sync pattern
    pub fn good_sync_patterns(&self) -> u64 {
        self.good_sync_patterns
    }

    /// Sector boundaries that did not
    pub fn bad_sync_patterns(&self) -> u64 {
        self.bad_sync_patterns
    }

    /// Times the lock was dropped back to hunting
    pub fn sync_losses(&self) -> u64 {
        self.sync_losses
    }

    /// Log the stage statistics
    pub fn show_statistics(&self) {
        log::info!("Data24 to Raw Sector statistics:");
        log::info!("  Valid sectors: {}", self.valid_sectors);
        log::info!("  Discarded bytes: {}", self.discarded_bytes);
        log::info!("  Good sync patterns: {}", self.good_sync_patterns);
        log::info!("  Bad sync patterns: {}", self.bad_sync_patterns);
        log::info!("  Sync lost count: {}", self.sync_losses);
    }
}

fn find_pattern(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
