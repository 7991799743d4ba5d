//! Unique image identifier chunk.
//!
//! The identifier is carried in an optional small chunk: a 12-byte SMPTE
//! UMID universal label, a 16-byte UUID, and a 4-byte image sequence number
//! (eight segments of payload).

use crate::bitstream::{BitstreamReader, BitstreamWriter};
use crate::error::{CodecError, CodecResult};
use crate::tag::TAG_UNIQUE_IMAGE_IDENTIFIER;

/// SMPTE universal label that prefixes the basic UMID.
pub const UMID_LABEL: [u8; 12] = [
    0x06, 0x0A, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x01, 0x01, 0x0D, 0x20,
];

/// Payload size of the identifier chunk in segments.
pub const IDENTIFIER_CHUNK_SIZE: u16 = 8;

/// The unique identifier and sequence number for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageIdentifier {
    pub uuid: [u8; 16],
    pub sequence_number: u32,
}

/// Write the unique image identifier chunk.
pub fn write_unique_image_identifier(
    writer: &mut BitstreamWriter,
    identifier: &ImageIdentifier,
) -> CodecResult<()> {
    writer.put_tag_pair_optional(TAG_UNIQUE_IMAGE_IDENTIFIER as i16, IDENTIFIER_CHUNK_SIZE)?;
    for byte in UMID_LABEL {
        writer.put_bits(byte as u32, 8)?;
    }
    for byte in identifier.uuid {
        writer.put_bits(byte as u32, 8)?;
    }
    writer.put_long(identifier.sequence_number)
}

/// Parse the payload of a unique image identifier chunk.
pub fn parse_unique_image_identifier(
    reader: &mut BitstreamReader,
    chunk_size: u32,
) -> CodecResult<ImageIdentifier> {
    if chunk_size != IDENTIFIER_CHUNK_SIZE as u32 {
        return Err(CodecError::BitstreamSyntax);
    }
    let mut label = [0u8; 12];
    reader.get_byte_array(&mut label)?;
    if label != UMID_LABEL {
        return Err(CodecError::BitstreamSyntax);
    }
    let mut identifier = ImageIdentifier::default();
    reader.get_byte_array(&mut identifier.uuid)?;
    identifier.sequence_number = reader.get_long()?;
    Ok(identifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;
    use crate::tag::{is_tag_optional, required_tag};

    #[test]
    fn test_identifier_roundtrip() {
        let identifier = ImageIdentifier {
            uuid: *b"0123456789abcdef",
            sequence_number: 42,
        };
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            write_unique_image_identifier(&mut writer, &identifier).unwrap();
        }
        let mut stream = MemoryStream::from_vec(stream.into_vec());
        let mut reader = BitstreamReader::new(&mut stream);
        let pair = reader.get_segment().unwrap();
        assert!(is_tag_optional(pair.tag));
        assert_eq!(required_tag(pair.tag) as u16, TAG_UNIQUE_IMAGE_IDENTIFIER);
        let parsed = parse_unique_image_identifier(&mut reader, pair.value as u32).unwrap();
        assert_eq!(parsed, identifier);
    }

    #[test]
    fn test_identifier_bad_label() {
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            for _ in 0..IDENTIFIER_CHUNK_SIZE {
                writer.put_long(0).unwrap();
            }
        }
        let mut stream = MemoryStream::from_vec(stream.into_vec());
        let mut reader = BitstreamReader::new(&mut stream);
        let result = parse_unique_image_identifier(&mut reader, IDENTIFIER_CHUNK_SIZE as u32);
        assert_eq!(result, Err(CodecError::BitstreamSyntax));
    }
}
