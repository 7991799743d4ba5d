//! Tags that define elements in the bitstream.
//!
//! Every syntax element begins with a 16-bit tag followed by a 16-bit value,
//! forming a tag-value pair that occupies one segment.  A negative tag marks
//! an optional pair that a decoder may skip; the actual tag is the negation.
//! A range of tags designates chunks whose value (possibly extended with the
//! low byte of the tag) holds the payload size in segments.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::wavelet::MAX_WAVELET_COUNT;

/// The 32-bit start marker that precedes the bitstream header ("VC-5").
pub const START_MARKER: u32 = 0x5643_2D35;

/// Size of one segment (a tag-value pair) in bytes.
pub const SEGMENT_SIZE: usize = 4;

/// Bit that marks a chunk with a 16-bit payload size.
pub const TAG_SMALL_CHUNK: u16 = 0x4000;

/// Bit that marks a chunk with a 24-bit payload size.
pub const TAG_LARGE_CHUNK: u16 = 0x2000;

/// Mask for detecting a small or large chunk (including codeblocks).
pub const TAG_CHUNK_MASK: u16 = TAG_SMALL_CHUNK | TAG_LARGE_CHUNK;

/// Large chunk that contains one entropy-coded codeblock.
pub const TAG_LARGE_CODEBLOCK: u16 = 0x6000;

/// Small chunk containing the inverse component permutation.
pub const TAG_INVERSE_PERMUTATION: u16 = 0x4001;

/// Small chunk containing the inverse component transform (8-bit form).
pub const TAG_INVERSE_TRANSFORM: u16 = 0x4002;

/// Small chunk containing the inverse component transform (16-bit form).
pub const TAG_INVERSE_TRANSFORM_16: u16 = 0x4003;

/// Small chunk containing the unique image identifier and sequence number.
pub const TAG_UNIQUE_IMAGE_IDENTIFIER: u16 = 0x4004;

/// Small chunk containing metadata tuples.
pub const TAG_SMALL_METADATA: u16 = 0x4010;

/// Large chunk containing metadata tuples.
pub const TAG_LARGE_METADATA: u16 = 0x6100;

/// Tag-value parameters defined by the bitstream syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i16)]
pub enum CodecTag {
    /// Number of channels in the transform.
    ChannelCount = 12,
    /// Number of encoded subbands.
    SubbandCount = 14,
    /// Upper bound on the width of the image.
    ImageWidth = 20,
    /// Upper bound on the height of the image.
    ImageHeight = 21,
    /// Number of bits per lowpass coefficient.
    LowpassPrecision = 35,
    /// Subband number of the next wavelet band.
    SubbandNumber = 48,
    /// Quantization applied to the band.
    Quantization = 53,
    /// Channel number.
    ChannelNumber = 62,
    /// Format of the image represented by the bitstream.
    ImageFormat = 84,
    /// Number of bits in the source component arrays.
    BitsPerComponent = 101,
    /// Upper bound on the number of bits per component.
    MaxBitsPerComponent = 102,
    /// Width of the next channel in the bitstream.
    ChannelWidth = 104,
    /// Height of the next channel in the bitstream.
    ChannelHeight = 105,
    /// Number of samples per row in each pattern element.
    PatternWidth = 106,
    /// Number of rows of samples in each pattern element.
    PatternHeight = 107,
    /// Number of components in each sample in the pattern element.
    ComponentsPerSample = 108,
    /// Packed prescale shift for each wavelet level.
    PrescaleShift = 109,
    /// Number of layers in the bitstream.
    LayerCount = 120,
    /// Number of the next layer in the bitstream.
    LayerNumber = 121,
    /// Mask indicating the use cases for layers in the bitstream.
    LayerPattern = 122,
    /// Number of image sections in the bitstream.
    ImageCount = 130,
    /// Unique number assigned to an image section.
    ImageNumber = 131,
}

/// One tag-value pair as read from or written to the bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagValue {
    pub tag: i16,
    pub value: u16,
}

impl TagValue {
    pub fn new(tag: i16, value: u16) -> Self {
        Self { tag, value }
    }

    /// Split a 32-bit segment into the tag and value fields.
    pub fn from_segment(segment: u32) -> Self {
        Self {
            tag: (segment >> 16) as i16,
            value: (segment & 0xFFFF) as u16,
        }
    }

    /// Pack the tag and value into a 32-bit segment.
    pub fn segment(&self) -> u32 {
        ((self.tag as u16 as u32) << 16) | (self.value as u32)
    }
}

/// Convert a tag to its optional (negative) form.
pub fn optional_tag(tag: i16) -> i16 {
    if tag < 0 {
        tag
    } else {
        -tag
    }
}

/// Convert a tag to its required (positive) form.
pub fn required_tag(tag: i16) -> i16 {
    if tag >= 0 {
        tag
    } else {
        -tag
    }
}

/// Return true if the tag marks an optional tag-value pair.
pub fn is_tag_optional(tag: i16) -> bool {
    tag < 0
}

/// Return true if the (required form of the) tag designates a chunk.
pub fn is_chunk_tag(tag: u16) -> bool {
    (tag & TAG_CHUNK_MASK) != 0
}

/// Pack the vector of prescale values into a single tag value.
///
/// Two bits per wavelet level, most significant bits first:
/// `value = sum(prescale[k] << (14 - 2k))`.
pub fn pack_prescale(prescale: &[u8; MAX_WAVELET_COUNT]) -> u16 {
    let mut packed: u16 = 0;
    for (index, &shift) in prescale.iter().enumerate() {
        debug_assert!(shift <= 3);
        packed |= ((shift & 0x03) as u16) << (14 - 2 * index);
    }
    packed
}

/// Unpack the prescale table from a tag value.
pub fn unpack_prescale(value: u16) -> [u8; MAX_WAVELET_COUNT] {
    let mut prescale = [0u8; MAX_WAVELET_COUNT];
    for (index, shift) in prescale.iter_mut().enumerate() {
        *shift = ((value >> (14 - 2 * index)) & 0x03) as u8;
    }
    prescale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_packing() {
        let pair = TagValue::new(CodecTag::ImageWidth.into(), 1920);
        assert_eq!(pair.segment(), (20 << 16) | 1920);
        assert_eq!(TagValue::from_segment(pair.segment()), pair);

        // Optional tags survive the round trip through a segment.
        let pair = TagValue::new(optional_tag(TAG_LARGE_CODEBLOCK as i16), 0);
        let back = TagValue::from_segment(pair.segment());
        assert!(is_tag_optional(back.tag));
    }

    #[test]
    fn test_optional_required() {
        let tag: i16 = CodecTag::ImageWidth.into();
        assert_eq!(optional_tag(tag), -20);
        assert_eq!(required_tag(-20), 20);
        assert!(is_tag_optional(-20));
        assert!(!is_tag_optional(20));
    }

    #[test]
    fn test_chunk_detection() {
        assert!(is_chunk_tag(TAG_LARGE_CODEBLOCK));
        assert!(is_chunk_tag(TAG_SMALL_METADATA));
        assert!(is_chunk_tag(TAG_LARGE_METADATA));
        assert!(!is_chunk_tag(20));
        assert!(!is_chunk_tag(109));
    }

    #[test]
    fn test_prescale_packing() {
        let prescale = [2u8, 0, 0];
        let packed = pack_prescale(&prescale);
        assert_eq!(packed, 2 << 14);
        assert_eq!(unpack_prescale(packed), prescale);

        let prescale = [1u8, 2, 3];
        assert_eq!(unpack_prescale(pack_prescale(&prescale)), prescale);
    }

    #[test]
    fn test_tag_conversion() {
        assert_eq!(CodecTag::try_from(53i16), Ok(CodecTag::Quantization));
        assert!(CodecTag::try_from(9999i16).is_err());
    }
}
