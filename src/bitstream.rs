//! Bit-level reader and writer over a byte stream.
//!
//! The writer packs fields most-significant-bit first into a small
//! accumulator and pushes completed bytes to the byte stream in big-endian
//! order; the reader mirrors this.  Alignment helpers pad (or discard) bits
//! up to the next byte, 32-bit word, or segment boundary.
//!
//! The writer also maintains the sample offset stack used to back-patch the
//! size fields of chunk elements: [`BitstreamWriter::push_size`] records the
//! offset of a placeholder size segment and [`BitstreamWriter::pop_size`]
//! rewrites it with the actual payload size once the chunk is complete.

use crate::error::{CodecError, CodecResult};
use crate::stream::ByteStream;
use crate::tag::{
    is_tag_optional, optional_tag, required_tag, TagValue, SEGMENT_SIZE, TAG_LARGE_CHUNK,
};

/// Number of bits in a bit word.
pub const BIT_WORD_COUNT: u32 = 32;

/// Depth of the sample offset stack.
pub const MAX_SAMPLE_OFFSET_COUNT: usize = 8;

/// Bit-level writer over a byte stream.
pub struct BitstreamWriter<'a> {
    stream: &'a mut dyn ByteStream,
    /// Pending bits that do not yet fill a byte (right aligned).
    buffer: u32,
    /// Number of pending bits (always less than eight).
    count: u32,
    /// Offsets of size segments awaiting back-patching.
    offset_stack: [u64; MAX_SAMPLE_OFFSET_COUNT],
    offset_count: usize,
}

impl<'a> BitstreamWriter<'a> {
    pub fn new(stream: &'a mut dyn ByteStream) -> Self {
        Self {
            stream,
            buffer: 0,
            count: 0,
            offset_stack: [0; MAX_SAMPLE_OFFSET_COUNT],
            offset_count: 0,
        }
    }

    /// Current byte offset in the stream.  Exact only at byte alignment.
    pub fn position(&self) -> u64 {
        self.stream.byte_count()
    }

    /// Shift `count` bits of `value` into the bitstream (MSB first).
    pub fn put_bits(&mut self, value: u32, count: u32) -> CodecResult<()> {
        if count == 0 {
            return Ok(());
        }
        if count > BIT_WORD_COUNT {
            return Err(CodecError::StreamOverflow);
        }
        let mask = if count == 32 { u32::MAX } else { (1u32 << count) - 1 };
        let mut total = ((self.buffer as u64) << count) | (value & mask) as u64;
        let mut bits = self.count + count;
        while bits >= 8 {
            let byte = (total >> (bits - 8)) as u8;
            self.stream.write_byte(byte)?;
            bits -= 8;
            total &= (1u64 << bits) - 1;
        }
        self.buffer = total as u32;
        self.count = bits;
        Ok(())
    }

    /// Write a 32-bit word (big-endian on the wire).
    pub fn put_long(&mut self, value: u32) -> CodecResult<()> {
        self.put_bits(value, 32)
    }

    /// Write a required tag-value pair.
    pub fn put_tag_pair(&mut self, tag: i16, value: u16) -> CodecResult<()> {
        debug_assert!(self.is_aligned_segment());
        self.put_long(TagValue::new(tag, value).segment())
    }

    /// Write an optional tag-value pair (the tag is negated on the wire).
    pub fn put_tag_pair_optional(&mut self, tag: i16, value: u16) -> CodecResult<()> {
        debug_assert!(self.is_aligned_segment());
        self.put_long(TagValue::new(optional_tag(tag), value).segment())
    }

    /// Pad with zero bits to the next byte boundary.
    pub fn align_byte(&mut self) -> CodecResult<()> {
        if self.count > 0 {
            let pad = 8 - self.count;
            self.put_bits(0, pad)?;
        }
        Ok(())
    }

    /// Pad with zero bits to the next 32-bit word boundary.
    pub fn align_word(&mut self) -> CodecResult<()> {
        self.align_byte()?;
        while self.stream.byte_count() % SEGMENT_SIZE as u64 != 0 {
            self.put_bits(0, 8)?;
        }
        Ok(())
    }

    /// Pad with zero bits to the next segment boundary.
    pub fn align_segment(&mut self) -> CodecResult<()> {
        self.align_word()
    }

    /// True if the next bit lands on a segment boundary.
    pub fn is_aligned_segment(&self) -> bool {
        self.count == 0 && self.stream.byte_count() % SEGMENT_SIZE as u64 == 0
    }

    /// Write a placeholder size segment for a chunk and remember its offset.
    ///
    /// The placeholder is an optional tag-value pair with a zero value; the
    /// actual payload size is patched in by [`BitstreamWriter::pop_size`].
    pub fn push_size(&mut self, tag: u16) -> CodecResult<()> {
        if self.offset_count >= MAX_SAMPLE_OFFSET_COUNT {
            return Err(CodecError::StackOverflow);
        }
        let position = self.position();
        self.offset_stack[self.offset_count] = position;
        self.offset_count += 1;
        self.put_tag_pair_optional(tag as i16, 0)
    }

    /// Patch the most recent size segment with the actual chunk size.
    ///
    /// The payload size is measured in segments and excludes the size segment
    /// itself.  For a large chunk the upper eight bits of the size move into
    /// the low byte of the tag.
    pub fn pop_size(&mut self) -> CodecResult<()> {
        if self.offset_count == 0 {
            return Err(CodecError::StackUnderflow);
        }
        self.align_segment()?;

        let current_offset = self.position();
        self.offset_count -= 1;
        let previous_offset = self.offset_stack[self.offset_count];
        if previous_offset >= current_offset {
            return Err(CodecError::Unexpected);
        }

        let mut block = [0u8; SEGMENT_SIZE];
        self.stream.read_block(previous_offset, &mut block)?;
        let segment = TagValue::from_segment(u32::from_be_bytes(block));

        // The placeholder must have been written as an optional pair.
        if !is_tag_optional(segment.tag) {
            return Err(CodecError::Unexpected);
        }
        let mut tag = required_tag(segment.tag) as u16;

        let byte_size = current_offset - previous_offset;
        let mut chunk_size: u32 = if byte_size >= SEGMENT_SIZE as u64 {
            if byte_size % SEGMENT_SIZE as u64 != 0 {
                return Err(CodecError::Unexpected);
            }
            (byte_size / SEGMENT_SIZE as u64 - 1) as u32
        } else {
            0
        };

        if (tag & TAG_LARGE_CHUNK) != 0 {
            // The most significant eight bits of the size go into the tag.
            tag |= ((chunk_size >> 16) & 0xFF) as u16;
        }
        chunk_size &= 0xFFFF;

        let patched = TagValue::new(optional_tag(tag as i16), chunk_size as u16);
        self.stream
            .write_block(previous_offset, &patched.segment().to_be_bytes())?;
        Ok(())
    }
}

/// Bit-level reader over a byte stream.
pub struct BitstreamReader<'a> {
    stream: &'a mut dyn ByteStream,
    /// Bits read from the stream but not yet consumed (right aligned).
    buffer: u64,
    /// Number of unconsumed bits in the buffer.
    count: u32,
}

impl<'a> BitstreamReader<'a> {
    pub fn new(stream: &'a mut dyn ByteStream) -> Self {
        Self {
            stream,
            buffer: 0,
            count: 0,
        }
    }

    /// Byte offset of the next unconsumed bit.  Exact only at byte alignment.
    pub fn position(&self) -> u64 {
        self.stream.byte_count() - (self.count / 8) as u64
    }

    /// Read `count` bits from the bitstream (MSB first).
    pub fn get_bits(&mut self, count: u32) -> CodecResult<u32> {
        if count == 0 {
            return Ok(0);
        }
        if count > BIT_WORD_COUNT {
            return Err(CodecError::StreamUnderflow);
        }
        while self.count < count {
            let byte = self.stream.read_byte()?;
            self.buffer = (self.buffer << 8) | byte as u64;
            self.count += 8;
        }
        let shift = self.count - count;
        let value = (self.buffer >> shift) as u32
            & if count == 32 { u32::MAX } else { (1u32 << count) - 1 };
        self.count = shift;
        self.buffer &= if shift == 0 { 0 } else { (1u64 << shift) - 1 };
        Ok(value)
    }

    /// Read a 32-bit word (big-endian on the wire).
    pub fn get_long(&mut self) -> CodecResult<u32> {
        self.get_bits(32)
    }

    /// Read the next tag-value pair.
    pub fn get_segment(&mut self) -> CodecResult<TagValue> {
        Ok(TagValue::from_segment(self.get_long()?))
    }

    /// Discard bits up to the next byte boundary.
    pub fn align_byte(&mut self) {
        let extra = self.count % 8;
        if extra > 0 {
            self.count -= extra;
            self.buffer &= if self.count == 0 {
                0
            } else {
                (1u64 << self.count) - 1
            };
        }
    }

    /// Discard bits up to the next 32-bit word boundary.
    pub fn align_word(&mut self) -> CodecResult<()> {
        self.align_byte();
        while self.position() % SEGMENT_SIZE as u64 != 0 {
            self.get_bits(8)?;
        }
        Ok(())
    }

    /// Discard bits up to the next segment boundary.
    pub fn align_segment(&mut self) -> CodecResult<()> {
        self.align_word()
    }

    /// Skip the payload of a chunk (size in segments).
    pub fn skip_payload(&mut self, chunk_size: u32) -> CodecResult<()> {
        self.align_byte();
        let mut remaining = chunk_size as usize * SEGMENT_SIZE;
        while self.count >= 8 && remaining > 0 {
            self.get_bits(8)?;
            remaining -= 1;
        }
        if remaining > 0 {
            self.stream.skip(remaining)?;
        }
        Ok(())
    }

    /// Read a byte array from the bitstream.
    pub fn get_byte_array(&mut self, buffer: &mut [u8]) -> CodecResult<()> {
        for byte in buffer.iter_mut() {
            *byte = self.get_bits(8)? as u8;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;
    use crate::tag::TAG_LARGE_CODEBLOCK;

    #[test]
    fn test_put_get_bits() {
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            writer.put_bits(0b101, 3).unwrap();
            writer.put_bits(0x3FF, 10).unwrap();
            writer.put_bits(0, 3).unwrap();
            writer.put_long(0xDEADBEEF).unwrap();
        }
        let mut stream = MemoryStream::from_vec(stream.into_vec());
        let mut reader = BitstreamReader::new(&mut stream);
        assert_eq!(reader.get_bits(3).unwrap(), 0b101);
        assert_eq!(reader.get_bits(10).unwrap(), 0x3FF);
        assert_eq!(reader.get_bits(3).unwrap(), 0);
        assert_eq!(reader.get_long().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.get_bits(1), Err(CodecError::StreamEof));
    }

    #[test]
    fn test_segments_are_big_endian() {
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            writer.put_tag_pair(20, 1920).unwrap();
        }
        let bytes = stream.into_vec();
        assert_eq!(bytes, [0x00, 0x14, 0x07, 0x80]);
    }

    #[test]
    fn test_alignment() {
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            writer.put_bits(1, 1).unwrap();
            writer.align_byte().unwrap();
            assert_eq!(writer.position(), 1);
            writer.align_segment().unwrap();
            assert_eq!(writer.position(), 4);
            assert!(writer.is_aligned_segment());
        }
        let mut stream = MemoryStream::from_vec(stream.into_vec());
        let mut reader = BitstreamReader::new(&mut stream);
        assert_eq!(reader.get_bits(1).unwrap(), 1);
        reader.align_segment().unwrap();
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_push_pop_size_small_payload() {
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            writer.push_size(TAG_LARGE_CODEBLOCK).unwrap();
            // Three segments of payload.
            writer.put_long(1).unwrap();
            writer.put_long(2).unwrap();
            writer.put_long(3).unwrap();
            writer.pop_size().unwrap();
        }
        let bytes = stream.into_vec();
        let segment = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let pair = TagValue::from_segment(segment);
        assert!(is_tag_optional(pair.tag));
        assert_eq!(required_tag(pair.tag) as u16, TAG_LARGE_CODEBLOCK);
        assert_eq!(pair.value, 3);
        // size * 4 equals the payload bytes written
        assert_eq!(pair.value as usize * 4, bytes.len() - 4);
    }

    #[test]
    fn test_pop_size_large_payload_extends_into_tag() {
        // A payload larger than 0xFFFF segments spills into the tag low byte.
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            writer.push_size(TAG_LARGE_CODEBLOCK).unwrap();
            for _ in 0..0x1_0002 {
                writer.put_long(0).unwrap();
            }
            writer.pop_size().unwrap();
        }
        let bytes = stream.into_vec();
        let segment = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let pair = TagValue::from_segment(segment);
        let tag = required_tag(pair.tag) as u16;
        assert_eq!(tag & 0xFF00, TAG_LARGE_CODEBLOCK);
        let size = (((tag & 0xFF) as u32) << 16) | pair.value as u32;
        assert_eq!(size, 0x1_0002);
    }

    #[test]
    fn test_pop_size_underflow() {
        let mut stream = MemoryStream::new();
        let mut writer = BitstreamWriter::new(&mut stream);
        assert_eq!(writer.pop_size(), Err(CodecError::StackUnderflow));
    }

    #[test]
    fn test_offset_stack_overflow() {
        let mut stream = MemoryStream::new();
        let mut writer = BitstreamWriter::new(&mut stream);
        for _ in 0..MAX_SAMPLE_OFFSET_COUNT {
            writer.push_size(TAG_LARGE_CODEBLOCK).unwrap();
        }
        assert_eq!(
            writer.push_size(TAG_LARGE_CODEBLOCK),
            Err(CodecError::StackOverflow)
        );
    }

    #[test]
    fn test_skip_payload() {
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            for _ in 0..10 {
                writer.put_long(0xAABBCCDD).unwrap();
            }
            writer.put_tag_pair(62, 1).unwrap();
        }
        let mut stream = MemoryStream::from_vec(stream.into_vec());
        let mut reader = BitstreamReader::new(&mut stream);
        reader.skip_payload(10).unwrap();
        let pair = reader.get_segment().unwrap();
        assert_eq!(pair.tag, 62);
        assert_eq!(pair.value, 1);
    }
}
