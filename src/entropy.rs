//! Entropy coding of highpass subbands.
//!
//! A highpass band is encoded as a row-major traversal of alternating runs
//! of zeros and signed magnitudes.  A pending run of zeros accumulates
//! across row ends and is flushed before the next nonzero value or at the
//! end of the band.  The band is terminated by the band-end codeword and
//! padded to the next bit-word boundary.

use crate::bitstream::{BitstreamReader, BitstreamWriter};
use crate::codebook::{Codebook, EntryKind, SpecialMarker, ESCAPE_MAGNITUDE_SIZE};
use crate::error::{CodecError, CodecResult};

/// One decoded element of a band: a run of zeros, a value, or the band end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BandToken {
    Run(u32),
    Value(i32),
    End,
}

/// Write a run of zeros, greedily factored into the codebook run lengths.
fn put_zeros(writer: &mut BitstreamWriter, codebook: &Codebook, count: u32) -> CodecResult<()> {
    let mut remaining = count;
    while remaining > 0 {
        for &(length, codeword) in codebook.run_codes() {
            if length <= remaining {
                writer.put_bits(codeword.bits, codeword.size as u32)?;
                remaining -= length;
                break;
            }
        }
    }
    Ok(())
}

/// Write one signed coefficient: magnitude codeword then the sign bit.
fn put_value(writer: &mut BitstreamWriter, codebook: &Codebook, value: i32) -> CodecResult<()> {
    debug_assert!(value != 0);
    let magnitude = value.unsigned_abs();
    match codebook.magnitude_code(magnitude) {
        Some(codeword) => {
            writer.put_bits(codeword.bits, codeword.size as u32)?;
        }
        None => {
            let escape = codebook.escape_code();
            writer.put_bits(escape.bits, escape.size as u32)?;
            writer.put_bits(magnitude, ESCAPE_MAGNITUDE_SIZE)?;
        }
    }
    writer.put_bits(if value < 0 { 1 } else { 0 }, 1)
}

/// Write a special codeword.
fn put_special(
    writer: &mut BitstreamWriter,
    codebook: &Codebook,
    marker: SpecialMarker,
) -> CodecResult<()> {
    let codeword = match marker {
        SpecialMarker::BandEnd => codebook.band_end_code(),
        SpecialMarker::LargeMagnitude => codebook.escape_code(),
    };
    writer.put_bits(codeword.bits, codeword.size as u32)
}

/// Encode one highpass band with the row-runs method.
///
/// After the coefficients the band-end codeword is written and the bitstream
/// is padded to the next bit-word boundary.
pub fn encode_band_row_runs(
    writer: &mut BitstreamWriter,
    codebook: &Codebook,
    data: &[i16],
    width: usize,
    height: usize,
) -> CodecResult<()> {
    debug_assert_eq!(data.len(), width * height);

    let mut count: u32 = 0;
    for row in 0..height {
        let row_data = &data[row * width..(row + 1) * width];
        let mut index = 0;
        while index < width {
            while index < width && row_data[index] == 0 {
                count += 1;
                index += 1;
            }
            if index < width {
                let value = row_data[index] as i32;
                if count > 0 {
                    put_zeros(writer, codebook, count)?;
                    count = 0;
                }
                put_value(writer, codebook, value)?;
                index += 1;
            }
        }
    }

    // Flush a pending run that reached the end of the band.
    if count > 0 {
        put_zeros(writer, codebook, count)?;
    }

    put_special(writer, codebook, SpecialMarker::BandEnd)?;
    writer.align_word()
}

/// Read the next band element from the bitstream.
fn get_band_token(reader: &mut BitstreamReader, codebook: &Codebook) -> CodecResult<BandToken> {
    let entry = codebook.decode_entry(reader)?;
    match entry.kind {
        EntryKind::Run(count) => Ok(BandToken::Run(count)),
        EntryKind::Magnitude(magnitude) => {
            let sign = reader.get_bits(1)?;
            let value = if sign != 0 {
                -(magnitude as i32)
            } else {
                magnitude as i32
            };
            Ok(BandToken::Value(value))
        }
        EntryKind::Special(SpecialMarker::LargeMagnitude) => {
            let magnitude = reader.get_bits(ESCAPE_MAGNITUDE_SIZE)?;
            let sign = reader.get_bits(1)?;
            let value = if sign != 0 {
                -(magnitude as i32)
            } else {
                magnitude as i32
            };
            Ok(BandToken::Value(value))
        }
        EntryKind::Special(SpecialMarker::BandEnd) => Ok(BandToken::End),
    }
}

/// Decode one highpass band encoded with the run-lengths method.
///
/// Exactly `width * height` coefficients must be produced, followed by the
/// band-end codeword; finishing short or running past the end of the band is
/// a [`CodecError::BandEndMarker`] error.
pub fn decode_band_runs(
    reader: &mut BitstreamReader,
    codebook: &Codebook,
    band: &mut [i16],
    width: usize,
    height: usize,
) -> CodecResult<()> {
    let total = width * height;
    debug_assert_eq!(band.len(), total);

    let mut index = 0;
    while index < total {
        match get_band_token(reader, codebook)? {
            BandToken::Run(count) => {
                let count = count as usize;
                if count > total - index {
                    return Err(CodecError::BandEndMarker);
                }
                band[index..index + count].fill(0);
                index += count;
            }
            BandToken::Value(value) => {
                band[index] = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                index += 1;
            }
            BandToken::End => return Err(CodecError::BandEndMarker),
        }
    }

    // The codeword after the last coefficient must be the band end marker.
    match get_band_token(reader, codebook)? {
        BandToken::End => Ok(()),
        _ => Err(CodecError::BandEndMarker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::codeset_17;
    use crate::stream::MemoryStream;

    fn roundtrip(data: &[i16], width: usize, height: usize) -> Vec<i16> {
        let codebook = &codeset_17().codebook;
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            encode_band_row_runs(&mut writer, codebook, data, width, height).unwrap();
        }
        let mut stream = MemoryStream::from_vec(stream.into_vec());
        let mut reader = BitstreamReader::new(&mut stream);
        let mut band = vec![0i16; width * height];
        decode_band_runs(&mut reader, codebook, &mut band, width, height).unwrap();
        band
    }

    #[test]
    fn test_band_roundtrip_mixed() {
        let data: Vec<i16> = vec![
            0, 0, 5, -3, 0, 0, 0, 1, //
            24, 25, -24, -25, 0, 0, 0, 0, //
            0, 0, 0, 0, 0, 0, 0, 0, //
            -1, 2, 0, 0, 0, 0, 0, 7,
        ];
        assert_eq!(roundtrip(&data, 8, 4), data);
    }

    #[test]
    fn test_band_roundtrip_extremes() {
        let data: Vec<i16> = vec![i16::MAX, i16::MIN, 0, 0, 1000, -1000, 0, -1];
        assert_eq!(roundtrip(&data, 4, 2), data);
    }

    #[test]
    fn test_all_zero_band_is_one_run() {
        let codebook = &codeset_17().codebook;
        let data = vec![0i16; 16];
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            encode_band_row_runs(&mut writer, codebook, &data, 4, 4).unwrap();
        }
        // One run-of-16 codeword (9 bits) plus the band end (16 bits) fits
        // in a single padded bit word.
        let bytes = stream.into_vec();
        assert_eq!(bytes.len(), 4);
        assert_eq!(roundtrip(&data, 4, 4), data);
    }

    #[test]
    fn test_truncated_band_reports_band_end_error() {
        let codebook = &codeset_17().codebook;
        let data: Vec<i16> = (0..16).map(|v| (v % 5) as i16).collect();
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            encode_band_row_runs(&mut writer, codebook, &data, 4, 4).unwrap();
        }
        let mut bytes = stream.into_vec();
        // Zero the tail so the band-end codeword never appears; the zero
        // bits decode as valid magnitude codewords that overrun the band.
        let len = bytes.len();
        for byte in bytes[len - 4..].iter_mut() {
            *byte = 0;
        }
        let mut stream = MemoryStream::from_vec(bytes);
        let mut reader = BitstreamReader::new(&mut stream);
        let mut band = vec![0i16; 16];
        let result = decode_band_runs(&mut reader, codebook, &mut band, 4, 4);
        assert_eq!(result, Err(CodecError::BandEndMarker));
    }

    #[test]
    fn test_long_run_factoring() {
        // A run longer than the longest table entry factors into several
        // codewords and still round-trips.
        let mut data = vec![0i16; 64 * 40];
        data[0] = 3;
        let last = data.len() - 1;
        data[last] = -7;
        assert_eq!(roundtrip(&data, 64, 40), data);
    }
}
