//! Decoder: the tag-value state machine and wavelet reconstruction.
//!
//! The main loop consumes one segment per iteration and dispatches on the
//! tag: header parameters update the codec state with duplicate and
//! required-parameter bookkeeping, channel and subband parameters steer the
//! next codeblock, and chunk elements carry codeblock payloads or optional
//! features.  Unrecognized optional chunks are skipped by their payload
//! size.  Decoding is complete once the header is finished and the level
//! one wavelet of every channel has all four bands valid.

use log::debug;

use crate::bitstream::BitstreamReader;
use crate::codebook::codeset_17;
use crate::codec::{
    is_part_enabled, parts, CodecState, LOWPASS_PRECISION_MAX, LOWPASS_PRECISION_MIN,
    MAX_CHANNEL_COUNT,
};
use crate::entropy::decode_band_runs;
use crate::error::{CodecError, CodecResult};
use crate::identifier::{parse_unique_image_identifier, ImageIdentifier};
use crate::image::{channel_dimensions, check_image_format_parameters, ImageFormat, UnpackedImage};
use crate::image::ComponentArray;
use crate::inverse::{transform_inverse_spatial_array, transform_inverse_spatial_lowpass};
use crate::stream::ByteStream;
use crate::tag::{
    is_chunk_tag, required_tag, unpack_prescale, CodecTag, TagValue, START_MARKER,
    TAG_INVERSE_PERMUTATION, TAG_INVERSE_TRANSFORM, TAG_INVERSE_TRANSFORM_16,
    TAG_LARGE_CHUNK, TAG_LARGE_CODEBLOCK, TAG_UNIQUE_IMAGE_IDENTIFIER,
};
use crate::transperm::{
    parse_component_permutation, parse_component_transform, ComponentPermutation,
    ComponentTransform,
};
use crate::wavelet::{
    subband_band_index, subband_wavelet_index, Transform, LL_BAND, MAX_SUBBAND_COUNT,
};

#[cfg(feature = "metadata")]
use crate::metadata::{parse_metadata_chunk, Tuple};
#[cfg(feature = "metadata")]
use crate::tag::{TAG_LARGE_METADATA, TAG_SMALL_METADATA};
#[cfg(feature = "sections")]
use crate::sections::{section_number_for_tag, SectionNumber, ALL_SECTIONS, HEADER_SECTION_TAG};

// Bits recording which header parameters have been seen.
const HEADER_FLAG_IMAGE_WIDTH: u16 = 1 << 0;
const HEADER_FLAG_IMAGE_HEIGHT: u16 = 1 << 1;
const HEADER_FLAG_CHANNEL_COUNT: u16 = 1 << 2;
const HEADER_FLAG_SUBBAND_COUNT: u16 = 1 << 3;
const HEADER_FLAG_IMAGE_FORMAT: u16 = 1 << 4;
const HEADER_FLAG_PATTERN_WIDTH: u16 = 1 << 5;
const HEADER_FLAG_PATTERN_HEIGHT: u16 = 1 << 6;
const HEADER_FLAG_COMPONENTS_PER_SAMPLE: u16 = 1 << 7;
const HEADER_FLAG_MAX_BITS_PER_COMPONENT: u16 = 1 << 8;

/// Parameters that control the decoding process.
#[derive(Debug, Clone)]
pub struct DecoderParameters {
    /// Parts of the standard enabled at run time.
    pub enabled_parts: u32,
    /// Section kinds the decoder recognizes.
    #[cfg(feature = "sections")]
    pub enabled_sections: u32,
    /// Prune duplicate metadata tuples within each scope.
    #[cfg(feature = "metadata")]
    pub prune_duplicate_metadata: bool,
}

impl Default for DecoderParameters {
    fn default() -> Self {
        Self {
            enabled_parts: parts::DEFAULT,
            #[cfg(feature = "sections")]
            enabled_sections: ALL_SECTIONS,
            #[cfg(feature = "metadata")]
            prune_duplicate_metadata: true,
        }
    }
}

/// Per-channel information gathered while decoding.
#[derive(Debug, Clone, Copy, Default)]
struct DecoderChannel {
    width: u32,
    height: u32,
    bits_per_component: u32,
    initialized: bool,
    found_first_codeblock: bool,
}

/// The decoder instance.
pub struct Decoder {
    state: CodecState,
    enabled_parts: u32,
    header_mask: u16,
    header_finished: bool,
    channels: [DecoderChannel; MAX_CHANNEL_COUNT],
    transforms: Vec<Transform>,
    identifier: Option<ImageIdentifier>,
    component_transform: Option<ComponentTransform>,
    component_permutation: Option<ComponentPermutation>,
    #[cfg(feature = "sections")]
    enabled_sections: u32,
    #[cfg(feature = "metadata")]
    metadata: Vec<Tuple>,
    #[cfg(feature = "metadata")]
    prune_duplicate_metadata: bool,
}

impl Decoder {
    pub fn new(parameters: &DecoderParameters) -> Self {
        Self {
            state: CodecState::prepare(),
            enabled_parts: parameters.enabled_parts,
            header_mask: 0,
            header_finished: false,
            channels: [DecoderChannel::default(); MAX_CHANNEL_COUNT],
            transforms: vec![Transform::default(); MAX_CHANNEL_COUNT],
            identifier: None,
            component_transform: None,
            component_permutation: None,
            #[cfg(feature = "sections")]
            enabled_sections: if is_part_enabled(parameters.enabled_parts, parts::SECTIONS) {
                parameters.enabled_sections
            } else {
                0
            },
            #[cfg(feature = "metadata")]
            metadata: Vec::new(),
            #[cfg(feature = "metadata")]
            prune_duplicate_metadata: parameters.prune_duplicate_metadata,
        }
    }

    /// Unique image identifier parsed from the bitstream, if present.
    pub fn identifier(&self) -> Option<&ImageIdentifier> {
        self.identifier.as_ref()
    }

    /// Inverse component transform parsed from the bitstream, if present.
    pub fn component_transform(&self) -> Option<&ComponentTransform> {
        self.component_transform.as_ref()
    }

    /// Inverse component permutation parsed from the bitstream, if present.
    pub fn component_permutation(&self) -> Option<&ComponentPermutation> {
        self.component_permutation.as_ref()
    }

    /// Metadata tuples decoded from the bitstream.
    #[cfg(feature = "metadata")]
    pub fn metadata(&self) -> &[Tuple] {
        &self.metadata
    }

    /// Decode a single image from the byte stream.
    pub fn decode(&mut self, stream: &mut dyn ByteStream) -> CodecResult<UnpackedImage> {
        let mut reader = BitstreamReader::new(stream);
        self.read_start_marker(&mut reader)?;
        self.decode_one_image(&mut reader)?;
        self.drain_metadata(&mut reader)?;
        self.reconstruct_unpacked_image()
    }

    /// Decode every layer in the byte stream, one image per layer.
    pub fn decode_layers(&mut self, stream: &mut dyn ByteStream) -> CodecResult<Vec<UnpackedImage>> {
        let mut reader = BitstreamReader::new(stream);
        self.read_start_marker(&mut reader)?;
        let mut images = Vec::new();
        loop {
            self.decode_one_image(&mut reader)?;
            images.push(self.reconstruct_unpacked_image()?);
            if is_part_enabled(self.enabled_parts, parts::LAYERS)
                && (self.state.layer_number as u32 + 1) < self.state.layer_count as u32
            {
                self.reset_for_next_layer();
            } else {
                break;
            }
        }
        self.drain_metadata(&mut reader)?;
        Ok(images)
    }

    fn read_start_marker(&mut self, reader: &mut BitstreamReader) -> CodecResult<()> {
        let marker = reader.get_long()?;
        if marker != START_MARKER {
            return Err(CodecError::MissingStartMarker);
        }
        Ok(())
    }

    /// Run the state machine until the current image is complete.
    fn decode_one_image(&mut self, reader: &mut BitstreamReader) -> CodecResult<()> {
        loop {
            let segment = reader.get_segment()?;
            self.update_codec_state(reader, segment)?;
            if self.is_decoding_complete() {
                self.state.end_of_sample = true;
                self.state.end_of_layer = true;
                return Ok(());
            }
        }
    }

    /// Consume trailing segments that may hold metadata chunk elements.
    #[cfg(feature = "metadata")]
    fn drain_metadata(&mut self, reader: &mut BitstreamReader) -> CodecResult<()> {
        if !is_part_enabled(self.enabled_parts, parts::METADATA) {
            return Ok(());
        }
        loop {
            match reader.get_segment() {
                Ok(segment) => self.update_codec_state(reader, segment)?,
                Err(CodecError::StreamEof) => return Ok(()),
                Err(error) => return Err(error),
            }
        }
    }

    #[cfg(not(feature = "metadata"))]
    fn drain_metadata(&mut self, _reader: &mut BitstreamReader) -> CodecResult<()> {
        Ok(())
    }

    fn reset_for_next_layer(&mut self) {
        for transform in &mut self.transforms {
            transform.reset_band_masks();
        }
        self.state.channel_number = 0;
        self.state.subband_number = 0;
        self.state.decoded_subband_mask = 0;
        self.state.end_of_layer = false;
        self.state.end_of_sample = false;
        // The layer header of the next layer carries the layer number; keep
        // a running value in case the tag is missing.
        self.state.layer_number += 1;
    }

    /// Process one tag-value pair.
    fn update_codec_state(
        &mut self,
        reader: &mut BitstreamReader,
        segment: TagValue,
    ) -> CodecResult<()> {
        let value = segment.value;
        let optional = segment.tag < 0;
        let tag = required_tag(segment.tag);

        self.state.header = false;
        self.state.codeblock = false;

        let mut chunk_size: u32 = 0;
        let mut optional_header_allowed = false;

        match CodecTag::try_from(tag) {
            Ok(CodecTag::ChannelCount) => {
                if value == 0 || value as usize > MAX_CHANNEL_COUNT {
                    return Err(CodecError::BitstreamSyntax);
                }
                self.state.channel_count = value as u32;
                self.state.header = true;
            }
            Ok(CodecTag::SubbandCount) => {
                if value == 0 || value as usize > MAX_SUBBAND_COUNT {
                    return Err(CodecError::BitstreamSyntax);
                }
                self.state.subband_count = value as u32;
                self.state.header = true;
            }
            Ok(CodecTag::ImageWidth) => {
                self.state.image_width = value as u32;
                // The image width is the default channel width.
                self.state.channel_width = value as u32;
                self.state.header = true;
            }
            Ok(CodecTag::ImageHeight) => {
                self.state.image_height = value as u32;
                self.state.channel_height = value as u32;
                self.state.header = true;
            }
            Ok(CodecTag::SubbandNumber) => {
                self.state.subband_number = value;
            }
            Ok(CodecTag::Quantization) => {
                self.state.band.quantization = value;
            }
            Ok(CodecTag::LowpassPrecision) => {
                if !(LOWPASS_PRECISION_MIN..=LOWPASS_PRECISION_MAX).contains(&(value as u32)) {
                    return Err(CodecError::LowpassPrecision);
                }
                self.state.lowpass_precision = value as u32;
            }
            Ok(CodecTag::ChannelNumber) => {
                if value as usize >= MAX_CHANNEL_COUNT {
                    return Err(CodecError::InvalidChannel);
                }
                self.state.channel_number = value;
            }
            Ok(CodecTag::BitsPerComponent) => {
                self.state.bits_per_component = value as u32;
            }
            Ok(CodecTag::PrescaleShift) => {
                self.state.prescale_table = unpack_prescale(value);
            }
            Ok(CodecTag::ImageFormat) => {
                if !is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
                    return Err(CodecError::BitstreamSyntax);
                }
                self.state.image_format =
                    ImageFormat::try_from(value).map_err(|_| CodecError::BadImageFormat)?;
                self.state.header = true;
            }
            Ok(CodecTag::PatternWidth) => {
                if !is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
                    return Err(CodecError::BitstreamSyntax);
                }
                self.state.pattern_width = value as u32;
                self.state.header = true;
            }
            Ok(CodecTag::PatternHeight) => {
                if !is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
                    return Err(CodecError::BitstreamSyntax);
                }
                self.state.pattern_height = value as u32;
                self.state.header = true;
            }
            Ok(CodecTag::ComponentsPerSample) => {
                if !is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
                    return Err(CodecError::BitstreamSyntax);
                }
                self.state.components_per_sample = value as u32;
                self.state.header = true;
            }
            Ok(CodecTag::MaxBitsPerComponent) => {
                if !is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
                    return Err(CodecError::BitstreamSyntax);
                }
                self.state.max_bits_per_component = value as u32;
                self.state.header = true;
            }
            Ok(CodecTag::ChannelWidth) => {
                if is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
                    // The channel width is derived, never transmitted.
                    return Err(CodecError::BitstreamSyntax);
                }
                self.state.channel_width = value as u32;
            }
            Ok(CodecTag::ChannelHeight) => {
                if is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
                    return Err(CodecError::BitstreamSyntax);
                }
                self.state.channel_height = value as u32;
            }
            Ok(CodecTag::LayerCount) => {
                if is_part_enabled(self.enabled_parts, parts::LAYERS) {
                    if value == 0 {
                        return Err(CodecError::BitstreamSyntax);
                    }
                    self.state.layer_count = value;
                    self.state.header = true;
                    optional_header_allowed = true;
                }
            }
            Ok(CodecTag::LayerNumber) => {
                if is_part_enabled(self.enabled_parts, parts::LAYERS) {
                    self.state.layer_number = value;
                }
            }
            Ok(CodecTag::LayerPattern) => {
                if is_part_enabled(self.enabled_parts, parts::LAYERS) {
                    self.state.layer_pattern = value;
                }
            }
            Ok(CodecTag::ImageCount) | Ok(CodecTag::ImageNumber) => {
                // Image section bookkeeping; nothing to record in this core.
            }
            Err(_) => {
                // Not a known parameter: a chunk element or an unknown tag.
                let raw_tag = tag as u16;
                let mut chunk_tag = raw_tag;
                if is_chunk_tag(raw_tag) {
                    if (raw_tag & TAG_LARGE_CHUNK) != 0 {
                        // The chunk size includes the low byte of the tag.
                        chunk_size = (((raw_tag & 0xFF) as u32) << 16) | value as u32;
                        chunk_tag = raw_tag & 0xFF00;
                    } else {
                        chunk_size = value as u32;
                    }
                }

                if chunk_tag == TAG_LARGE_CODEBLOCK {
                    self.state.codeblock = true;
                } else if raw_tag == TAG_UNIQUE_IMAGE_IDENTIFIER {
                    if !optional {
                        return Err(CodecError::BitstreamSyntax);
                    }
                    self.identifier = Some(parse_unique_image_identifier(reader, chunk_size)?);
                } else if raw_tag == TAG_INVERSE_TRANSFORM {
                    if optional {
                        return Err(CodecError::BitstreamSyntax);
                    }
                    self.component_transform =
                        Some(parse_component_transform(reader, chunk_size)?);
                } else if raw_tag == TAG_INVERSE_PERMUTATION {
                    if optional {
                        return Err(CodecError::BitstreamSyntax);
                    }
                    self.component_permutation =
                        Some(parse_component_permutation(reader, chunk_size)?);
                } else if raw_tag == TAG_INVERSE_TRANSFORM_16 {
                    return Err(CodecError::Unimplemented);
                } else if self.handle_section_header(chunk_tag, chunk_size, &mut optional_header_allowed) {
                    // Section content is parsed in place.
                } else if self.handle_metadata_chunk(reader, raw_tag, chunk_tag, chunk_size)? {
                    // Metadata tuples were consumed from the payload.
                } else if is_chunk_tag(raw_tag) && optional {
                    debug!(
                        "skipping optional chunk 0x{:04X} ({} segments)",
                        raw_tag, chunk_size
                    );
                    reader.skip_payload(chunk_size)?;
                } else if optional {
                    // An unknown optional tag-value pair carries no payload.
                    debug!("ignoring optional tag {} (value {})", tag, value);
                } else {
                    return Err(CodecError::BitstreamSyntax);
                }
            }
        }

        // Header parameter bookkeeping.
        if self.state.header {
            if optional {
                if !optional_header_allowed {
                    // A required header parameter must not be optional.
                    return Err(CodecError::BitstreamSyntax);
                }
            } else if self.header_finished {
                return Err(CodecError::BitstreamSyntax);
            } else {
                self.update_header_parameter(tag)?;
            }
        } else if !self.header_finished && !optional && !self.state.codeblock {
            // A non-header required parameter ends the bitstream header.
            self.finish_header()?;
        }

        if self.state.codeblock {
            if !self.header_finished {
                self.finish_header()?;
            }
            self.decode_codeblock(reader, chunk_size)?;
        }

        Ok(())
    }

    /// Record a section header.  Returns false when sections are not in use.
    #[cfg(feature = "sections")]
    fn handle_section_header(
        &mut self,
        chunk_tag: u16,
        chunk_size: u32,
        optional_header_allowed: &mut bool,
    ) -> bool {
        if self.enabled_sections == 0 {
            return false;
        }
        match section_number_for_tag(chunk_tag) {
            Some(section) => {
                if chunk_tag == HEADER_SECTION_TAG {
                    // A header section counts as a header parameter.
                    self.state.header = true;
                    *optional_header_allowed = true;
                }
                self.state.section_number = section as i32;
                self.state.section_length = chunk_size as i32;
                debug!(
                    "section {:?} with {} segments of payload",
                    section, chunk_size
                );
                true
            }
            None => false,
        }
    }

    #[cfg(not(feature = "sections"))]
    fn handle_section_header(
        &mut self,
        _chunk_tag: u16,
        _chunk_size: u32,
        _optional_header_allowed: &mut bool,
    ) -> bool {
        false
    }

    /// Parse a metadata chunk.  Returns false when the tag is not metadata.
    #[cfg(feature = "metadata")]
    fn handle_metadata_chunk(
        &mut self,
        reader: &mut BitstreamReader,
        raw_tag: u16,
        chunk_tag: u16,
        chunk_size: u32,
    ) -> CodecResult<bool> {
        // A large chunk carries size bits in the low byte of its tag.
        if raw_tag != TAG_SMALL_METADATA && chunk_tag != TAG_LARGE_METADATA {
            return Ok(false);
        }
        if !is_part_enabled(self.enabled_parts, parts::METADATA) {
            return Ok(false);
        }
        let tuples = parse_metadata_chunk(reader, chunk_size, self.prune_duplicate_metadata)?;
        self.metadata.extend(tuples);
        Ok(true)
    }

    #[cfg(not(feature = "metadata"))]
    fn handle_metadata_chunk(
        &mut self,
        _reader: &mut BitstreamReader,
        _raw_tag: u16,
        _chunk_tag: u16,
        _chunk_size: u32,
    ) -> CodecResult<bool> {
        Ok(false)
    }

    /// Record that a header parameter was seen; duplicates are an error.
    fn update_header_parameter(&mut self, tag: i16) -> CodecResult<()> {
        let mask = match CodecTag::try_from(tag) {
            Ok(CodecTag::ImageWidth) => HEADER_FLAG_IMAGE_WIDTH,
            Ok(CodecTag::ImageHeight) => HEADER_FLAG_IMAGE_HEIGHT,
            Ok(CodecTag::ChannelCount) => HEADER_FLAG_CHANNEL_COUNT,
            Ok(CodecTag::SubbandCount) => HEADER_FLAG_SUBBAND_COUNT,
            Ok(CodecTag::ImageFormat) => HEADER_FLAG_IMAGE_FORMAT,
            Ok(CodecTag::PatternWidth) => HEADER_FLAG_PATTERN_WIDTH,
            Ok(CodecTag::PatternHeight) => HEADER_FLAG_PATTERN_HEIGHT,
            Ok(CodecTag::ComponentsPerSample) => HEADER_FLAG_COMPONENTS_PER_SAMPLE,
            Ok(CodecTag::MaxBitsPerComponent) => HEADER_FLAG_MAX_BITS_PER_COMPONENT,
            _ => return Err(CodecError::Unexpected),
        };
        if (self.header_mask & mask) != 0 {
            return Err(CodecError::DuplicateHeaderParameter);
        }
        self.header_mask |= mask;
        Ok(())
    }

    /// Mask of the header parameters that must appear in the bitstream.
    fn required_header_mask(&self) -> u16 {
        let mut mask = HEADER_FLAG_IMAGE_WIDTH | HEADER_FLAG_IMAGE_HEIGHT;
        if is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
            mask |= HEADER_FLAG_IMAGE_FORMAT
                | HEADER_FLAG_PATTERN_WIDTH
                | HEADER_FLAG_PATTERN_HEIGHT
                | HEADER_FLAG_COMPONENTS_PER_SAMPLE;
        }
        mask
    }

    /// End of the bitstream header: check required parameters and derive
    /// state the encoder did not transmit.
    fn finish_header(&mut self) -> CodecResult<()> {
        self.header_finished = true;

        let required = self.required_header_mask();
        if (self.header_mask & required) != required {
            return Err(CodecError::RequiredParameter);
        }

        if is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
            if self.state.pattern_width == 0 || self.state.pattern_height == 0 {
                return Err(CodecError::PatternDimensions);
            }
            if !check_image_format_parameters(
                self.state.image_format,
                self.state.pattern_width,
                self.state.pattern_height,
                self.state.components_per_sample,
            ) {
                return Err(CodecError::BadImageFormat);
            }
            if self.state.channel_count == 0 {
                // Derive the channel count from the image format.
                self.state.channel_count = match self.state.image_format {
                    ImageFormat::Bayer | ImageFormat::Cfa => 4,
                    _ => self.state.components_per_sample,
                };
            }
        } else if self.state.channel_count == 0 {
            self.state.channel_count = 3;
        }

        if self.state.channel_count as usize > MAX_CHANNEL_COUNT {
            return Err(CodecError::BitstreamSyntax);
        }
        Ok(())
    }

    /// Decode the codeblock for the current channel and subband.
    fn decode_codeblock(&mut self, reader: &mut BitstreamReader, chunk_size: u32) -> CodecResult<()> {
        let channel_number = self.state.channel_number as usize;
        if channel_number >= MAX_CHANNEL_COUNT
            || channel_number >= self.state.channel_count as usize
        {
            return Err(CodecError::InvalidChannel);
        }

        // Initialize the channel dimensions on the first codeblock.
        if !self.channels[channel_number].initialized {
            let (width, height) = if is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
                channel_dimensions(
                    self.state.image_format,
                    self.state.image_width,
                    self.state.image_height,
                    self.state.pattern_width,
                    self.state.pattern_height,
                )?
            } else {
                (self.state.channel_width, self.state.channel_height)
            };
            if width == 0 || height == 0 {
                return Err(CodecError::ImageDimensions);
            }
            self.channels[channel_number].width = width;
            self.channels[channel_number].height = height;
            self.channels[channel_number].initialized = true;
        }
        if !self.channels[channel_number].found_first_codeblock {
            self.channels[channel_number].bits_per_component = self.state.bits_per_component;
            self.channels[channel_number].found_first_codeblock = true;
        }

        // Allocate the wavelet tree for this channel on demand.
        self.transforms[channel_number].allocate(
            self.channels[channel_number].width,
            self.channels[channel_number].height,
            self.state.wavelet_count as usize,
        );
        self.transforms[channel_number].prescale = self.state.prescale_table;

        self.decode_channel_subband(reader, chunk_size)
    }

    fn decode_channel_subband(
        &mut self,
        reader: &mut BitstreamReader,
        chunk_size: u32,
    ) -> CodecResult<()> {
        let channel_number = self.state.channel_number as usize;
        let subband_number = self.state.subband_number as usize;
        if subband_number >= MAX_SUBBAND_COUNT
            || subband_number >= self.state.subband_count as usize
        {
            return Err(CodecError::BitstreamSyntax);
        }
        if (self.state.decoded_subband_mask & (1 << subband_number)) != 0 {
            // Each subband may appear only once per channel.
            return Err(CodecError::BitstreamSyntax);
        }

        let index = subband_wavelet_index(subband_number);
        let band = subband_band_index(subband_number);
        debug!(
            "codeblock channel {} subband {} ({} segments)",
            channel_number, subband_number, chunk_size
        );

        if subband_number > 0 {
            self.decode_highpass_band(reader, channel_number, index, band)?;
        } else {
            self.decode_lowpass_band(reader, channel_number, index)?;
        }

        self.state.subband_number += 1;
        self.state.decoded_subband_mask |= 1 << subband_number;

        // Invert the wavelet once all of its bands are valid.
        if self.transforms[channel_number].wavelets[index].all_bands_valid() {
            self.reconstruct_wavelet_band(channel_number, index)?;
        }

        // Advance to the next channel after the last subband.
        if self.state.subband_number as u32 == self.state.subband_count {
            self.state.channel_number += 1;
            self.state.subband_number = 0;
            self.state.decoded_subband_mask = 0;
        }
        Ok(())
    }

    /// Read the raw lowpass coefficients of subband zero.
    fn decode_lowpass_band(
        &mut self,
        reader: &mut BitstreamReader,
        channel_number: usize,
        index: usize,
    ) -> CodecResult<()> {
        let precision = self.state.lowpass_precision;
        let wavelet = &mut self.transforms[channel_number].wavelets[index];
        let count = (wavelet.width as usize) * (wavelet.height as usize);
        {
            let band = wavelet.band_mut(LL_BAND);
            for slot in band.iter_mut().take(count) {
                let value = reader.get_bits(precision)?;
                *slot = (value & 0xFFFF) as u16 as i16;
            }
        }
        reader.align_segment()?;
        wavelet.quant[LL_BAND] = 1;
        wavelet.update_valid_band_mask(LL_BAND)
    }

    /// Decode one entropy-coded highpass band.
    fn decode_highpass_band(
        &mut self,
        reader: &mut BitstreamReader,
        channel_number: usize,
        index: usize,
        band: usize,
    ) -> CodecResult<()> {
        let quantization = if self.state.band.quantization == 0 {
            1
        } else {
            self.state.band.quantization
        };
        let wavelet = &mut self.transforms[channel_number].wavelets[index];
        let width = wavelet.width as usize;
        let height = wavelet.height as usize;
        decode_band_runs(
            reader,
            &codeset_17().codebook,
            wavelet.band_mut(band),
            width,
            height,
        )?;
        // The encoded coefficients end on a bit-word boundary; the band
        // trailer aligns to the next segment.
        reader.align_word()?;
        reader.align_segment()?;
        wavelet.quant[band] = quantization;
        wavelet.update_valid_band_mask(band)
    }

    /// Reconstruct lowpass bands downward while wavelets become complete.
    fn reconstruct_wavelet_band(&mut self, channel_number: usize, index: usize) -> CodecResult<()> {
        let mut index = index;
        while index > 0 {
            let prescale = self.state.prescale_table[index];
            let (lower, upper) = self.transforms[channel_number].wavelets.split_at_mut(index);
            let target = &mut lower[index - 1];
            if (target.valid_band_mask & 1) != 0 {
                // The lowpass band must not be reconstructed twice.
                return Err(CodecError::Unexpected);
            }
            let lowpass =
                transform_inverse_spatial_lowpass(&upper[0], target.width, target.height, prescale)?;
            target.set_band(LL_BAND, lowpass);
            target.quant[LL_BAND] = 1;
            target.update_valid_band_mask(LL_BAND)?;
            if !target.all_bands_valid() {
                break;
            }
            index -= 1;
        }
        Ok(())
    }

    /// True once the header is finished and every channel's level one
    /// wavelet has all four bands valid.
    fn is_decoding_complete(&self) -> bool {
        if !self.header_finished || self.state.channel_count == 0 {
            return false;
        }
        (0..self.state.channel_count as usize).all(|channel| {
            self.transforms[channel].is_allocated()
                && self.transforms[channel].wavelets[0].all_bands_valid()
        })
    }

    /// Invert the level one wavelets into the output component arrays.
    fn reconstruct_unpacked_image(&self) -> CodecResult<UnpackedImage> {
        let mut components = Vec::with_capacity(self.state.channel_count as usize);
        for channel in 0..self.state.channel_count as usize {
            let info = &self.channels[channel];
            let mut component =
                ComponentArray::new(info.width, info.height, info.bits_per_component);
            transform_inverse_spatial_array(
                &self.transforms[channel].wavelets[0],
                &mut component,
                self.state.prescale_table[0],
            )?;
            components.push(component);
        }
        Ok(UnpackedImage {
            format: self.state.image_format,
            width: self.state.image_width,
            height: self.state.image_height,
            components,
        })
    }
}

/// Decode a single image with one-off parameters.
pub fn decode_image(
    stream: &mut dyn ByteStream,
    parameters: &DecoderParameters,
) -> CodecResult<UnpackedImage> {
    Decoder::new(parameters).decode(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    fn segment_bytes(tag: i16, value: u16) -> [u8; 4] {
        TagValue::new(tag, value).segment().to_be_bytes()
    }

    #[test]
    fn test_missing_start_marker() {
        let mut bytes = vec![0u8; 4];
        bytes.extend_from_slice(&segment_bytes(CodecTag::ImageWidth.into(), 16));
        let mut stream = MemoryStream::from_vec(bytes);
        let mut decoder = Decoder::new(&DecoderParameters::default());
        assert_eq!(
            decoder.decode(&mut stream).err(),
            Some(CodecError::MissingStartMarker)
        );
        // No transform tree was allocated.
        assert!(decoder.transforms.iter().all(|t| !t.is_allocated()));
    }

    #[test]
    fn test_duplicate_header_parameter() {
        let mut bytes = START_MARKER.to_be_bytes().to_vec();
        bytes.extend_from_slice(&segment_bytes(CodecTag::ImageWidth.into(), 1920));
        bytes.extend_from_slice(&segment_bytes(CodecTag::ImageWidth.into(), 1920));
        let mut stream = MemoryStream::from_vec(bytes);
        let mut decoder = Decoder::new(&DecoderParameters::default());
        assert_eq!(
            decoder.decode(&mut stream).err(),
            Some(CodecError::DuplicateHeaderParameter)
        );
    }

    #[test]
    fn test_required_parameter_missing() {
        // Width and height only; the image format parameters required by the
        // image formats part never appear, so the first non-header required
        // parameter ends the header and fails the check.
        let mut bytes = START_MARKER.to_be_bytes().to_vec();
        bytes.extend_from_slice(&segment_bytes(CodecTag::ImageWidth.into(), 16));
        bytes.extend_from_slice(&segment_bytes(CodecTag::ImageHeight.into(), 16));
        bytes.extend_from_slice(&segment_bytes(CodecTag::SubbandNumber.into(), 0));
        bytes.extend_from_slice(&segment_bytes(CodecTag::Quantization.into(), 1));
        let mut stream = MemoryStream::from_vec(bytes);
        let mut decoder = Decoder::new(&DecoderParameters::default());
        assert_eq!(
            decoder.decode(&mut stream).err(),
            Some(CodecError::RequiredParameter)
        );
    }

    #[test]
    fn test_lowpass_precision_range() {
        for (precision, expected) in [
            (7u16, Some(CodecError::LowpassPrecision)),
            (33, Some(CodecError::LowpassPrecision)),
        ] {
            let mut bytes = START_MARKER.to_be_bytes().to_vec();
            bytes.extend_from_slice(&segment_bytes(CodecTag::LowpassPrecision.into(), precision));
            let mut stream = MemoryStream::from_vec(bytes);
            let mut decoder = Decoder::new(&DecoderParameters::default());
            assert_eq!(decoder.decode(&mut stream).err(), expected);
        }
    }

    #[test]
    fn test_header_parameter_after_header_finished() {
        let mut bytes = START_MARKER.to_be_bytes().to_vec();
        bytes.extend_from_slice(&segment_bytes(CodecTag::ImageWidth.into(), 16));
        bytes.extend_from_slice(&segment_bytes(CodecTag::ImageHeight.into(), 16));
        bytes.extend_from_slice(&segment_bytes(CodecTag::ImageFormat.into(), 3));
        bytes.extend_from_slice(&segment_bytes(CodecTag::PatternWidth.into(), 2));
        bytes.extend_from_slice(&segment_bytes(CodecTag::PatternHeight.into(), 2));
        bytes.extend_from_slice(&segment_bytes(CodecTag::ComponentsPerSample.into(), 1));
        // A subband parameter finishes the header...
        bytes.extend_from_slice(&segment_bytes(CodecTag::Quantization.into(), 1));
        // ...so a late header parameter is a syntax error.
        bytes.extend_from_slice(&segment_bytes(CodecTag::ImageFormat.into(), 3));
        let mut stream = MemoryStream::from_vec(bytes);
        let mut decoder = Decoder::new(&DecoderParameters::default());
        assert_eq!(
            decoder.decode(&mut stream).err(),
            Some(CodecError::BitstreamSyntax)
        );
    }
}
