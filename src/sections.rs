//! Section elements: named bitstream regions with back-patched sizes.
//!
//! A section header is an optional large-chunk tag-value pair whose payload
//! size is patched in when the section ends.  Decoders that do not recognize
//! a section may skip it by the payload size; this decoder records the
//! section number and length and parses the content in place.

use crate::bitstream::BitstreamWriter;
use crate::error::CodecResult;

/// Section that contains a single image.
pub const IMAGE_SECTION_TAG: u16 = 0x2700;
/// Section that contains the bitstream header.
pub const HEADER_SECTION_TAG: u16 = 0x2500;
/// Section that contains a single layer.
pub const LAYER_SECTION_TAG: u16 = 0x2600;
/// Section that contains a single channel.
pub const CHANNEL_SECTION_TAG: u16 = 0x2400;
/// Section that contains all subbands for one wavelet.
pub const WAVELET_SECTION_TAG: u16 = 0x2100;
/// Section that contains a single subband.
pub const SUBBAND_SECTION_TAG: u16 = 0x2000;

/// Predefined section numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionNumber {
    Image = 1,
    Header = 2,
    Layer = 3,
    Channel = 4,
    Wavelet = 5,
    Subband = 6,
}

/// Bit mask with the bit for one section number set.
pub fn section_number_mask(section: SectionNumber) -> u32 {
    1 << (section as u32 - 1)
}

/// Mask with every section kind enabled.
pub const ALL_SECTIONS: u32 = 0b111111;

/// Return true if the section kind is enabled in the mask.
pub fn is_section_enabled(enabled_sections: u32, section: SectionNumber) -> bool {
    (enabled_sections & section_number_mask(section)) != 0
}

/// Return true if the (required form of the) tag is a section header.
pub fn is_section_header(tag: u16) -> bool {
    section_number_for_tag(tag).is_some()
}

/// Map a section header tag to its section number.
pub fn section_number_for_tag(tag: u16) -> Option<SectionNumber> {
    match tag {
        IMAGE_SECTION_TAG => Some(SectionNumber::Image),
        HEADER_SECTION_TAG => Some(SectionNumber::Header),
        LAYER_SECTION_TAG => Some(SectionNumber::Layer),
        CHANNEL_SECTION_TAG => Some(SectionNumber::Channel),
        WAVELET_SECTION_TAG => Some(SectionNumber::Wavelet),
        SUBBAND_SECTION_TAG => Some(SectionNumber::Subband),
        _ => None,
    }
}

/// Section header tag for a section number.
pub fn section_tag(section: SectionNumber) -> u16 {
    match section {
        SectionNumber::Image => IMAGE_SECTION_TAG,
        SectionNumber::Header => HEADER_SECTION_TAG,
        SectionNumber::Layer => LAYER_SECTION_TAG,
        SectionNumber::Channel => CHANNEL_SECTION_TAG,
        SectionNumber::Wavelet => WAVELET_SECTION_TAG,
        SectionNumber::Subband => SUBBAND_SECTION_TAG,
    }
}

/// Begin a section: align and write the placeholder size segment.
pub fn begin_section(writer: &mut BitstreamWriter, section: SectionNumber) -> CodecResult<()> {
    writer.align_segment()?;
    writer.push_size(section_tag(section))
}

/// End the most recently begun section, patching its payload size.
pub fn end_section(writer: &mut BitstreamWriter) -> CodecResult<()> {
    writer.align_segment()?;
    writer.pop_size()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitstreamReader;
    use crate::stream::MemoryStream;
    use crate::tag::{is_tag_optional, required_tag};

    #[test]
    fn test_section_tag_mapping() {
        for section in [
            SectionNumber::Image,
            SectionNumber::Header,
            SectionNumber::Layer,
            SectionNumber::Channel,
            SectionNumber::Wavelet,
            SectionNumber::Subband,
        ] {
            let tag = section_tag(section);
            assert!(is_section_header(tag));
            assert_eq!(section_number_for_tag(tag), Some(section));
        }
        assert!(!is_section_header(0x6000));
        assert!(!is_section_header(0x2300));
    }

    #[test]
    fn test_enabled_section_mask() {
        let mask = section_number_mask(SectionNumber::Channel);
        assert!(is_section_enabled(mask, SectionNumber::Channel));
        assert!(!is_section_enabled(mask, SectionNumber::Wavelet));
        assert!(is_section_enabled(ALL_SECTIONS, SectionNumber::Image));
    }

    #[test]
    fn test_section_size_backpatch() {
        let mut stream = MemoryStream::new();
        {
            let mut writer = BitstreamWriter::new(&mut stream);
            begin_section(&mut writer, SectionNumber::Channel).unwrap();
            writer.put_tag_pair(62, 1).unwrap();
            writer.put_tag_pair(53, 24).unwrap();
            end_section(&mut writer).unwrap();
        }
        let mut stream = MemoryStream::from_vec(stream.into_vec());
        let mut reader = BitstreamReader::new(&mut stream);
        let pair = reader.get_segment().unwrap();
        assert!(is_tag_optional(pair.tag));
        assert_eq!(required_tag(pair.tag) as u16, CHANNEL_SECTION_TAG);
        assert_eq!(pair.value, 2);
    }
}
