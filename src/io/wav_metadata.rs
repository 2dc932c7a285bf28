//! Audio error-range sidecar.
//!
//! One line per contiguous run of damaged stereo samples, in a form
//! Audacity imports as labels:
//!
//! ```text
//! rangeStart<TAB>rangeEnd<TAB>Error: <absolute section time>
//! ```
//!
//! Timestamps are decimal seconds from the first section written, with
//! six decimal places resolving individual stereo samples.

use std::io::Write;

use crate::section::AudioSection;
use crate::time::SectionTime;
use crate::EfmResult;

/// Sidecar writer tracking error ranges across section boundaries.
pub struct WavMetadataWriter<W: Write> {
    inner: W,
    start_time: Option<SectionTime>,
    in_error_range: bool,
    range_start: String,
}

/// Seconds from the section start for a (sub)sample position, formatted
/// with six decimal places.
fn timestamp(time: SectionTime, subsection: usize, sample: usize) -> String {
    const FRAME_RATE: f64 = 75.0;
    const SUBSECTIONS_PER_FRAME: f64 = 98.0;
    const SAMPLES_PER_SUBSECTION: f64 = 6.0;

    let mut seconds = f64::from(time.minutes()) * 60.0 + f64::from(time.seconds());
    seconds += f64::from(time.frame_number()) / FRAME_RATE;
    seconds += subsection as f64 / (FRAME_RATE * SUBSECTIONS_PER_FRAME);
    seconds += (sample / 2) as f64 / (FRAME_RATE * SUBSECTIONS_PER_FRAME * SAMPLES_PER_SUBSECTION);

    format!("{:.6}", seconds)
}

impl<W: Write> WavMetadataWriter<W> {
    /// Create the sidecar writer
    pub fn new(inner: W) -> WavMetadataWriter<W> {
        WavMetadataWriter {
            inner,
            start_time: None,
            in_error_range: false,
            range_start: String::new(),
        }
    }

    /// Record the error ranges of one audio section
    pub fn write_section(&mut self, section: &AudioSection) -> EfmResult<()> {
        let absolute = section.metadata.absolute_section_time();
        let start = *self.start_time.get_or_insert(absolute);
        let relative = absolute - start;

        for subsection in 0..98 {
            let frame = section.frame(subsection);
            let errors = frame.error_data();

            for sample in (0..12).step_by(2) {
                let has_error = errors[sample] != 0 || errors[sample + 1] != 0;

                if has_error && !self.in_error_range {
                    self.range_start = timestamp(relative, subsection, sample);
                    self.in_error_range = true;
                } else if !has_error && self.in_error_range {
                    let range_end = if sample == 0 {
                        if subsection > 0 {
                            timestamp(relative, subsection - 1, 11)
                        } else {
                            timestamp(relative, subsection, sample)
                        }
                    } else {
                        timestamp(relative, subsection, sample - 1)
                    };

                    writeln!(
                        self.inner,
                        "{}\t{}\tError: {}",
                        self.range_start, range_end, absolute
                    )?;
                    self.in_error_range = false;
                }
            }
        }

        Ok(())
    }

    /// Close out a dangling error range and return the underlying
    /// writer.
    pub fn finalize(mut self) -> EfmResult<W> {
        if self.in_error_range {
            writeln!(
                self.inner,
                "{}\t{}\tError: Incomplete range",
                self.range_start, self.range_start
            )?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod test {
    use super::{timestamp, WavMetadataWriter};
    use crate::frame::AudioFrame;
    use crate::metadata::SectionMetadata;
    use crate::section::AudioSection;
    use crate::time::SectionTime;

    fn section_at(frames: u32) -> AudioSection {
        let mut section = AudioSection::new();
        let mut m = SectionMetadata::new();
        m.set_absolute_section_time(SectionTime::from_frames(frames).unwrap());
        m.set_valid(true);
        section.metadata = m;
        for _ in 0..98 {
            section.push_frame(AudioFrame::new());
        }
        section
    }

    #[test]
    fn timestamp_composition() {
        let t = SectionTime::new(1, 2, 30).unwrap();

        // 62s + 30/75 + 10/(75*98) + 2/(75*98*6)
        let expected = 62.0 + 30.0 / 75.0 + 10.0 / 7350.0 + 2.0 / 44100.0;
        assert_eq!(timestamp(t, 10, 4), format!("{:.6}", expected));
    }

    #[test]
    fn clean_sections_write_nothing() {
        let mut writer = WavMetadataWriter::new(Vec::new());
        writer.write_section(&section_at(100)).unwrap();
        let out = writer.finalize().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn error_run_becomes_one_range() {
        let mut section = section_at(200);
        // Stereo samples 2 and 3 of subsection 0 damaged
        section.frame_mut(0).error_data_mut()[4] = 1;
        section.frame_mut(0).error_data_mut()[6] = 1;

        let mut writer = WavMetadataWriter::new(Vec::new());
        writer.write_section(&section).unwrap();
        let out = String::from_utf8(writer.finalize().unwrap()).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1);

        let fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], timestamp(SectionTime::ZERO, 0, 4));
        assert_eq!(fields[1], timestamp(SectionTime::ZERO, 0, 6));
        assert_eq!(fields[2], "Error: 00:02:50");
    }

    #[test]
    fn dangling_range_is_closed_on_finalize() {
        let mut section = section_at(0);
        // Last stereo sample of the section damaged
        section.frame_mut(97).error_data_mut()[11] = 1;

        let mut writer = WavMetadataWriter::new(Vec::new());
        writer.write_section(&section).unwrap();
        let out = String::from_utf8(writer.finalize().unwrap()).unwrap();

        assert!(out.contains("Incomplete range"));
    }
}
