//! Variable-length codes for entropy coding the highpass bands.
//!
//! The master codebook is a static table of entries, each either a run of
//! zeros, an unsigned coefficient magnitude (followed on the wire by one
//! sign bit), or a special marker with a run length of zero.  Codewords are
//! assigned canonically from the entry lengths, shortest first, so the table
//! only records lengths; the per-length minimum and maximum codes drive
//! decoding.
//!
//! Two tables are derived for O(1) encoding: a magnitude table indexed by
//! absolute value and a run table ordered for greedy factoring of arbitrary
//! zero run lengths.  Magnitudes beyond the table range are carried by the
//! escape marker followed by a raw 16-bit magnitude.

use std::sync::OnceLock;

use crate::bitstream::BitstreamReader;
use crate::error::{CodecError, CodecResult};

/// Do not apply a companding curve to coefficient magnitudes.
pub const CODESET_FLAGS_COMPANDING_NONE: u32 = 0x0002;

/// Apply a cubic companding curve to coefficient magnitudes.
pub const CODESET_FLAGS_COMPANDING_CUBIC: u32 = 0x0004;

/// Largest coefficient magnitude with a dedicated codeword.
pub const MAX_TABLE_MAGNITUDE: u32 = 24;

/// Number of raw bits that follow the escape codeword.
pub const ESCAPE_MAGNITUDE_SIZE: u32 = 16;

/// Longest codeword in the codebook.
pub const MAX_CODE_SIZE: usize = 16;

/// Values carried by special codewords (entries with a run length of zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialMarker {
    /// Marks the end of an encoded highpass band.
    BandEnd = 1,
    /// Escape to a raw 16-bit magnitude.
    LargeMagnitude = 2,
}

/// What one codebook entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A run of zeros of the given length.
    Run(u32),
    /// An unsigned coefficient magnitude (sign bit follows the codeword).
    Magnitude(u32),
    /// A special marker.
    Special(SpecialMarker),
}

/// One entry of the master codebook: what it encodes and its code length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodebookEntry {
    pub kind: EntryKind,
    pub size: u8,
}

const fn mag(size: u8, value: u32) -> CodebookEntry {
    CodebookEntry {
        kind: EntryKind::Magnitude(value),
        size,
    }
}

const fn run(size: u8, count: u32) -> CodebookEntry {
    CodebookEntry {
        kind: EntryKind::Run(count),
        size,
    }
}

const fn special(size: u8, marker: SpecialMarker) -> CodebookEntry {
    CodebookEntry {
        kind: EntryKind::Special(marker),
        size,
    }
}

/// The master table for codeset 17, ordered by code length.
///
/// The entry lengths satisfy the Kraft inequality with slack, which the
/// canonical assignment in [`Codebook::build`] relies on.
pub const CODESET_17_TABLE: [CodebookEntry; 46] = [
    mag(2, 1),
    run(2, 1),
    mag(3, 2),
    mag(4, 3),
    run(4, 2),
    mag(5, 4),
    run(5, 3),
    mag(6, 5),
    mag(6, 6),
    run(6, 4),
    mag(7, 7),
    mag(7, 8),
    run(7, 6),
    mag(8, 9),
    mag(8, 10),
    run(8, 8),
    run(8, 12),
    mag(9, 11),
    mag(9, 12),
    run(9, 16),
    run(9, 24),
    mag(10, 13),
    mag(10, 14),
    mag(10, 15),
    mag(10, 16),
    run(10, 32),
    run(10, 48),
    mag(11, 17),
    mag(11, 18),
    mag(11, 19),
    mag(11, 20),
    run(11, 64),
    run(11, 96),
    mag(12, 21),
    mag(12, 22),
    mag(12, 23),
    mag(12, 24),
    run(12, 128),
    run(12, 192),
    run(13, 256),
    run(13, 384),
    run(14, 512),
    run(14, 768),
    run(15, 1024),
    special(16, SpecialMarker::LargeMagnitude),
    special(16, SpecialMarker::BandEnd),
];

/// A canonical codeword: the code bits (right aligned) and their count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodeWord {
    pub bits: u32,
    pub size: u8,
}

/// The codebook with canonical codes assigned and derived encode tables.
pub struct Codebook {
    /// Table entries paired with their canonical codewords.
    entries: Vec<(CodebookEntry, CodeWord)>,
    /// Entry indices ordered by canonical code assignment.
    values: Vec<usize>,
    min_code: [i64; MAX_CODE_SIZE],
    max_code: [i64; MAX_CODE_SIZE],
    val_ptr: [usize; MAX_CODE_SIZE],
    /// Codeword for each magnitude 1..=MAX_TABLE_MAGNITUDE (index 0 unused).
    mags_table: Vec<CodeWord>,
    /// Run codewords ordered by descending run length for greedy factoring.
    runs_table: Vec<(u32, CodeWord)>,
    band_end: CodeWord,
    escape: CodeWord,
}

impl Codebook {
    fn build(table: &[CodebookEntry]) -> Self {
        let mut entries: Vec<(CodebookEntry, CodeWord)> =
            table.iter().map(|&e| (e, CodeWord::default())).collect();
        let mut values = Vec::with_capacity(table.len());
        let mut min_code = [0i64; MAX_CODE_SIZE];
        let mut max_code = [-1i64; MAX_CODE_SIZE];
        let mut val_ptr = [0usize; MAX_CODE_SIZE];

        let mut code: u32 = 0;
        for size in 1..=MAX_CODE_SIZE as u8 {
            let slot = size as usize - 1;
            min_code[slot] = code as i64;
            val_ptr[slot] = values.len();
            let mut assigned = false;
            for (index, entry) in table.iter().enumerate() {
                if entry.size == size {
                    entries[index].1 = CodeWord { bits: code, size };
                    values.push(index);
                    code += 1;
                    assigned = true;
                }
            }
            if assigned {
                max_code[slot] = code as i64 - 1;
            }
            // The Kraft inequality guarantees the shift never overflows.
            debug_assert!(code as u64 <= 1u64 << size);
            code <<= 1;
        }

        let mut mags_table = vec![CodeWord::default(); MAX_TABLE_MAGNITUDE as usize + 1];
        let mut runs_table = Vec::new();
        let mut band_end = CodeWord::default();
        let mut escape = CodeWord::default();
        for (entry, codeword) in &entries {
            match entry.kind {
                EntryKind::Magnitude(value) => mags_table[value as usize] = *codeword,
                EntryKind::Run(count) => runs_table.push((count, *codeword)),
                EntryKind::Special(SpecialMarker::BandEnd) => band_end = *codeword,
                EntryKind::Special(SpecialMarker::LargeMagnitude) => escape = *codeword,
            }
        }
        runs_table.sort_by(|a, b| b.0.cmp(&a.0));

        Self {
            entries,
            values,
            min_code,
            max_code,
            val_ptr,
            mags_table,
            runs_table,
            band_end,
            escape,
        }
    }

    /// Codeword for a coefficient magnitude within the table range.
    pub fn magnitude_code(&self, magnitude: u32) -> Option<CodeWord> {
        if (1..=MAX_TABLE_MAGNITUDE).contains(&magnitude) {
            Some(self.mags_table[magnitude as usize])
        } else {
            None
        }
    }

    /// Run codewords ordered by descending run length.
    pub fn run_codes(&self) -> &[(u32, CodeWord)] {
        &self.runs_table
    }

    pub fn band_end_code(&self) -> CodeWord {
        self.band_end
    }

    pub fn escape_code(&self) -> CodeWord {
        self.escape
    }

    /// Read one codeword from the bitstream and return its entry.
    pub fn decode_entry(&self, reader: &mut BitstreamReader) -> CodecResult<CodebookEntry> {
        let mut code: i64 = 0;
        for size in 1..=MAX_CODE_SIZE {
            let bit = reader.get_bits(1)? as i64;
            code = (code << 1) | bit;
            let slot = size - 1;
            if code <= self.max_code[slot] && self.max_code[slot] >= 0 {
                let index = self.val_ptr[slot] + (code - self.min_code[slot]) as usize;
                return Ok(self.entries[self.values[index]].0);
            }
        }
        Err(CodecError::BitstreamSyntax)
    }
}

/// A codebook plus the flags that govern how it is used.
pub struct Codeset {
    pub title: &'static str,
    pub codebook: Codebook,
    pub flags: u32,
}

/// The codeset used by this codec ("codeset 17").
pub fn codeset_17() -> &'static Codeset {
    static CODESET: OnceLock<Codeset> = OnceLock::new();
    CODESET.get_or_init(|| Codeset {
        title: "cs17",
        codebook: Codebook::build(&CODESET_17_TABLE),
        flags: CODESET_FLAGS_COMPANDING_NONE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitstreamWriter;
    use crate::stream::MemoryStream;

    #[test]
    fn test_kraft_inequality() {
        let sum: f64 = CODESET_17_TABLE
            .iter()
            .map(|e| (0.5f64).powi(e.size as i32))
            .sum();
        assert!(sum <= 1.0, "Kraft sum {} exceeds one", sum);
    }

    #[test]
    fn test_codes_are_prefix_free() {
        let codebook = &codeset_17().codebook;
        let codes: Vec<CodeWord> = codebook.entries.iter().map(|(_, c)| *c).collect();
        for (i, a) in codes.iter().enumerate() {
            for (j, b) in codes.iter().enumerate() {
                if i == j {
                    continue;
                }
                if a.size < b.size {
                    let prefix = b.bits >> (b.size - a.size);
                    assert_ne!(prefix, a.bits, "entry {} is a prefix of entry {}", i, j);
                } else if a.size == b.size {
                    assert_ne!(a.bits, b.bits, "entries {} and {} share a codeword", i, j);
                }
            }
        }
    }

    #[test]
    fn test_decode_matches_encode() {
        let codebook = &codeset_17().codebook;

        // Write every codeword in table order and decode them back.
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            for (_, codeword) in &codebook.entries {
                writer.put_bits(codeword.bits, codeword.size as u32).unwrap();
            }
            writer.align_segment().unwrap();
        }
        let mut stream = MemoryStream::from_vec(stream.into_vec());
        let mut reader = BitstreamReader::new(&mut stream);
        for (entry, _) in &codebook.entries {
            let decoded = codebook.decode_entry(&mut reader).unwrap();
            assert_eq!(decoded, *entry);
        }
    }

    #[test]
    fn test_derived_tables() {
        let codebook = &codeset_17().codebook;
        for magnitude in 1..=MAX_TABLE_MAGNITUDE {
            let code = codebook.magnitude_code(magnitude).unwrap();
            assert!(code.size > 0);
        }
        assert!(codebook.magnitude_code(0).is_none());
        assert!(codebook.magnitude_code(MAX_TABLE_MAGNITUDE + 1).is_none());

        // Runs are ordered longest first and include a run of one.
        let runs = codebook.run_codes();
        assert_eq!(runs.first().unwrap().0, 1024);
        assert_eq!(runs.last().unwrap().0, 1);
        assert!(runs.windows(2).all(|pair| pair[0].0 > pair[1].0));

        assert!(codebook.band_end_code().size > 0);
        assert!(codebook.escape_code().size > 0);
    }

    #[test]
    fn test_codeset_flags() {
        let codeset = codeset_17();
        assert_eq!(codeset.title, "cs17");
        assert_eq!(codeset.flags & CODESET_FLAGS_COMPANDING_NONE, CODESET_FLAGS_COMPANDING_NONE);
    }
}
