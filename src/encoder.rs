//! Encoder: forward transform driver and bitstream emission.
//!
//! The encoder mirrors the decoder state machine: a parameter is written
//! into the bitstream only when it differs from what the decoder would
//! derive on its own.  Subbands are emitted in canonical order (lowpass
//! first, then the highpass bands from the highest wavelet level down) and
//! every codeblock is wrapped in a large chunk whose size is back-patched
//! through the sample offset stack.

use std::time::{Duration, Instant};

use log::debug;

use crate::bitstream::BitstreamWriter;
use crate::codebook::codeset_17;
use crate::codec::{
    is_part_enabled, parts, CodecState, DEFAULT_INTERNAL_PRECISION, DEFAULT_LOWPASS_PRECISION,
    LOWPASS_PRECISION_MAX, LOWPASS_PRECISION_MIN, MAX_CHANNEL_COUNT,
};
use crate::entropy::encode_band_row_runs;
use crate::error::{CodecError, CodecResult};
use crate::forward::transform_forward_channel;
use crate::identifier::{write_unique_image_identifier, ImageIdentifier};
use crate::image::{
    channel_count, channel_dimensions, check_image_format_parameters, set_image_format_defaults,
    validate_image_dimensions, ImageFormat, UnpackedImage,
};
use crate::quantize::DEFAULT_QUANT_TABLE;
use crate::stream::ByteStream;
use crate::tag::{pack_prescale, CodecTag, START_MARKER, TAG_LARGE_CODEBLOCK};
use crate::transperm::{
    write_component_permutation, write_component_transform, ComponentPermutation,
    ComponentTransform,
};
use crate::wavelet::{
    default_prescale, set_transform_scale, subband_band_index, subband_wavelet_index, Transform,
    LL_BAND, MAX_SUBBAND_COUNT, MAX_WAVELET_COUNT,
};

#[cfg(feature = "metadata")]
use crate::metadata::{write_metadata_chunk, Tuple};
#[cfg(feature = "sections")]
use crate::sections::{begin_section, end_section, is_section_enabled, SectionNumber};

/// Parameters that control the encoding process.
#[derive(Debug, Clone)]
pub struct EncoderParameters {
    /// Parts of the standard enabled at run time.
    pub enabled_parts: u32,
    pub image_format: ImageFormat,
    pub image_width: u32,
    pub image_height: u32,
    /// Pattern element width (zero selects the format default).
    pub pattern_width: u32,
    /// Pattern element height (zero selects the format default).
    pub pattern_height: u32,
    /// Components per sample (zero selects the format default).
    pub components_per_sample: u32,
    /// Precision of the source component arrays.
    pub bits_per_component: u32,
    /// Quantization divisor for each subband.
    pub quant_table: [u16; MAX_SUBBAND_COUNT],
    pub midpoint_prequant: u32,
    /// Number of bits per encoded lowpass coefficient.
    pub lowpass_precision: u32,
    /// Order in which channels are emitted (None for identity).
    pub channel_order: Option<Vec<u16>>,
    /// Number of layers (more than one requires the layers part).
    pub layer_count: u16,
    pub identifier: Option<ImageIdentifier>,
    pub component_transform: Option<ComponentTransform>,
    pub component_permutation: Option<ComponentPermutation>,
    /// Sections to emit, when the sections part is enabled.
    #[cfg(feature = "sections")]
    pub enabled_sections: u32,
    /// Metadata tuples appended after the encoded image.
    #[cfg(feature = "metadata")]
    pub metadata: Vec<Tuple>,
}

impl Default for EncoderParameters {
    fn default() -> Self {
        Self {
            enabled_parts: parts::DEFAULT,
            image_format: ImageFormat::Unknown,
            image_width: 0,
            image_height: 0,
            pattern_width: 0,
            pattern_height: 0,
            components_per_sample: 0,
            bits_per_component: DEFAULT_INTERNAL_PRECISION,
            quant_table: DEFAULT_QUANT_TABLE,
            midpoint_prequant: 2,
            lowpass_precision: DEFAULT_LOWPASS_PRECISION,
            channel_order: None,
            layer_count: 1,
            identifier: None,
            component_transform: None,
            component_permutation: None,
            #[cfg(feature = "sections")]
            enabled_sections: 0,
            #[cfg(feature = "metadata")]
            metadata: Vec::new(),
        }
    }
}

/// Per-channel information carried by the encoder.
#[derive(Debug, Clone, Copy)]
struct EncoderChannel {
    width: u32,
    height: u32,
    bits_per_component: u32,
    lowpass_precision: u32,
}

/// Wall-clock statistics for the encoding stages.
#[derive(Debug, Clone, Copy, Default)]
struct TimingStats {
    transform: Duration,
    encoding: Duration,
}

/// The encoder instance.
pub struct Encoder {
    state: CodecState,
    enabled_parts: u32,
    image_format: ImageFormat,
    image_width: u32,
    image_height: u32,
    pattern_width: u32,
    pattern_height: u32,
    components_per_sample: u32,
    channel_count: usize,
    channels: Vec<EncoderChannel>,
    transforms: Vec<Transform>,
    midpoint_prequant: u32,
    channel_order: Vec<u16>,
    layer_count: u16,
    identifier: Option<ImageIdentifier>,
    component_transform: Option<ComponentTransform>,
    component_permutation: Option<ComponentPermutation>,
    timing: TimingStats,
    #[cfg(feature = "sections")]
    enabled_sections: u32,
    #[cfg(feature = "metadata")]
    metadata: Vec<Tuple>,
}

impl Encoder {
    /// Validate the parameters and prepare the encoder.
    pub fn new(parameters: &EncoderParameters) -> CodecResult<Self> {
        let mut pattern_width = parameters.pattern_width;
        let mut pattern_height = parameters.pattern_height;
        let mut components_per_sample = parameters.components_per_sample;
        if !set_image_format_defaults(
            parameters.image_format,
            &mut pattern_width,
            &mut pattern_height,
            &mut components_per_sample,
        ) {
            return Err(CodecError::BadImageFormat);
        }
        if !check_image_format_parameters(
            parameters.image_format,
            pattern_width,
            pattern_height,
            components_per_sample,
        ) {
            return Err(CodecError::BadImageFormat);
        }
        validate_image_dimensions(
            parameters.image_format,
            parameters.image_width,
            parameters.image_height,
            pattern_width,
            pattern_height,
        )?;

        if !(LOWPASS_PRECISION_MIN..=LOWPASS_PRECISION_MAX).contains(&parameters.lowpass_precision)
        {
            return Err(CodecError::LowpassPrecision);
        }
        if !(8..=16).contains(&parameters.bits_per_component) {
            return Err(CodecError::UnsupportedFormat);
        }

        let channel_total = channel_count(parameters.image_format, components_per_sample) as usize;
        if channel_total == 0 || channel_total > MAX_CHANNEL_COUNT {
            return Err(CodecError::BadImageFormat);
        }

        if parameters.layer_count == 0
            || (parameters.layer_count > 1
                && !is_part_enabled(parameters.enabled_parts, parts::LAYERS))
        {
            return Err(CodecError::UnsupportedFormat);
        }

        let channel_order = match &parameters.channel_order {
            Some(order) => {
                let mut seen = vec![false; channel_total];
                if order.len() != channel_total {
                    return Err(CodecError::InvalidChannel);
                }
                for &channel in order {
                    if channel as usize >= channel_total || seen[channel as usize] {
                        return Err(CodecError::InvalidChannel);
                    }
                    seen[channel as usize] = true;
                }
                order.clone()
            }
            None => (0..channel_total as u16).collect(),
        };

        // Channel dimensions and the per-channel wavelet trees.
        let prescale = default_prescale(parameters.bits_per_component);
        let mut channels = Vec::with_capacity(channel_total);
        let mut transforms = Vec::with_capacity(channel_total);
        for _ in 0..channel_total {
            let (width, height) = channel_dimensions(
                parameters.image_format,
                parameters.image_width,
                parameters.image_height,
                pattern_width,
                pattern_height,
            )?;
            channels.push(EncoderChannel {
                width,
                height,
                bits_per_component: parameters.bits_per_component,
                lowpass_precision: parameters.lowpass_precision,
            });
            let mut transform = Transform {
                prescale,
                wavelets: Vec::new(),
            };
            transform.allocate(width, height, MAX_WAVELET_COUNT);
            set_transform_quant_table(&mut transform, &parameters.quant_table);
            set_transform_scale(&mut transform);
            transforms.push(transform);
        }

        Ok(Self {
            state: CodecState::prepare(),
            enabled_parts: parameters.enabled_parts,
            image_format: parameters.image_format,
            image_width: parameters.image_width,
            image_height: parameters.image_height,
            pattern_width,
            pattern_height,
            components_per_sample,
            channel_count: channel_total,
            channels,
            transforms,
            midpoint_prequant: parameters.midpoint_prequant,
            channel_order,
            layer_count: parameters.layer_count,
            identifier: parameters.identifier,
            component_transform: parameters.component_transform.clone(),
            component_permutation: parameters.component_permutation.clone(),
            timing: TimingStats::default(),
            #[cfg(feature = "sections")]
            enabled_sections: if is_part_enabled(parameters.enabled_parts, parts::SECTIONS) {
                parameters.enabled_sections
            } else {
                0
            },
            #[cfg(feature = "metadata")]
            metadata: parameters.metadata.clone(),
        })
    }

    /// Encode one image into the byte stream.
    pub fn encode(&mut self, image: &UnpackedImage, stream: &mut dyn ByteStream) -> CodecResult<()> {
        if self.layer_count != 1 {
            return Err(CodecError::UnsupportedFormat);
        }
        self.encoding_process(std::slice::from_ref(image), stream)
    }

    /// Encode one image per layer into the byte stream.
    pub fn encode_layers(
        &mut self,
        images: &[UnpackedImage],
        stream: &mut dyn ByteStream,
    ) -> CodecResult<()> {
        if !is_part_enabled(self.enabled_parts, parts::LAYERS)
            || images.len() != self.layer_count as usize
        {
            return Err(CodecError::UnsupportedFormat);
        }
        self.encoding_process(images, stream)
    }

    fn validate_image(&self, image: &UnpackedImage) -> CodecResult<()> {
        if image.components.len() != self.channel_count {
            return Err(CodecError::BadImageFormat);
        }
        for (component, channel) in image.components.iter().zip(&self.channels) {
            if component.width != channel.width || component.height != channel.height {
                return Err(CodecError::ImageDimensions);
            }
        }
        Ok(())
    }

    fn encoding_process(
        &mut self,
        images: &[UnpackedImage],
        stream: &mut dyn ByteStream,
    ) -> CodecResult<()> {
        for image in images {
            self.validate_image(image)?;
        }
        self.state = CodecState::prepare();

        let mut writer = BitstreamWriter::new(stream);
        writer.put_long(START_MARKER)?;

        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Image) {
            begin_section(&mut writer, SectionNumber::Image)?;
        }

        self.encode_bitstream_header(&mut writer)?;
        self.encode_extension_header(&mut writer)?;

        if is_part_enabled(self.enabled_parts, parts::LAYERS) && self.layer_count > 1 {
            for (layer_number, image) in images.iter().enumerate() {
                #[cfg(feature = "sections")]
                if is_section_enabled(self.enabled_sections, SectionNumber::Layer) {
                    begin_section(&mut writer, SectionNumber::Layer)?;
                }
                // The layer header marks the start of each layer.
                writer.put_tag_pair_optional(CodecTag::LayerNumber.into(), layer_number as u16)?;
                self.state.layer_number = layer_number as u16;
                self.encode_channels(image, &mut writer)?;
                writer.align_segment()?;
                #[cfg(feature = "sections")]
                if is_section_enabled(self.enabled_sections, SectionNumber::Layer) {
                    end_section(&mut writer)?;
                }
                // Each layer restarts the channel sequence.
                self.state.channel_number = 0;
                self.state.subband_number = 0;
            }
        } else {
            self.encode_channels(&images[0], &mut writer)?;
        }

        #[cfg(feature = "metadata")]
        if is_part_enabled(self.enabled_parts, parts::METADATA) && !self.metadata.is_empty() {
            let metadata = self.metadata.clone();
            let large = metadata.iter().map(Tuple::encoded_size).sum::<usize>() > 0xFFFF * 4;
            write_metadata_chunk(&mut writer, &metadata, large)?;
        }

        // Bitstream trailer: align to a segment boundary.
        writer.align_segment()?;

        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Image) {
            end_section(&mut writer)?;
        }

        debug!(
            "encoded {} layer(s): transform {:?}, entropy coding {:?}",
            images.len(),
            self.timing.transform,
            self.timing.encoding
        );
        Ok(())
    }

    /// Write the required header parameters.
    fn encode_bitstream_header(&mut self, writer: &mut BitstreamWriter) -> CodecResult<()> {
        writer.align_segment()?;

        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Header) {
            begin_section(writer, SectionNumber::Header)?;
        }

        if self.channel_count as u32 != self.state.channel_count {
            writer.put_tag_pair(CodecTag::ChannelCount.into(), self.channel_count as u16)?;
            self.state.channel_count = self.channel_count as u32;
        }

        writer.put_tag_pair(CodecTag::ImageWidth.into(), self.image_width as u16)?;
        writer.put_tag_pair(CodecTag::ImageHeight.into(), self.image_height as u16)?;

        if is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
            writer.put_tag_pair(CodecTag::ImageFormat.into(), self.image_format.into())?;
            writer.put_tag_pair(CodecTag::PatternWidth.into(), self.pattern_width as u16)?;
            writer.put_tag_pair(CodecTag::PatternHeight.into(), self.pattern_height as u16)?;
            writer.put_tag_pair(
                CodecTag::ComponentsPerSample.into(),
                self.components_per_sample as u16,
            )?;
            writer.put_tag_pair(
                CodecTag::MaxBitsPerComponent.into(),
                self.channels[0].bits_per_component as u16,
            )?;
            self.state.image_format = self.image_format;
            self.state.pattern_width = self.pattern_width;
            self.state.pattern_height = self.pattern_height;
            self.state.components_per_sample = self.components_per_sample;
            self.state.max_bits_per_component = self.channels[0].bits_per_component;
        }

        // The image dimensions are the default channel dimensions.
        self.state.image_width = self.image_width;
        self.state.image_height = self.image_height;
        self.state.channel_width = self.image_width;
        self.state.channel_height = self.image_height;
        self.state.bits_per_component = DEFAULT_INTERNAL_PRECISION;

        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Header) {
            end_section(writer)?;
        }
        Ok(())
    }

    /// Write the extension header that follows the required parameters.
    fn encode_extension_header(&mut self, writer: &mut BitstreamWriter) -> CodecResult<()> {
        let prescale = self.transforms[0].prescale;
        let prescale_shift = pack_prescale(&prescale);
        if prescale == default_prescale(self.channels[0].bits_per_component) {
            writer.put_tag_pair_optional(CodecTag::PrescaleShift.into(), prescale_shift)?;
        } else {
            writer.put_tag_pair(CodecTag::PrescaleShift.into(), prescale_shift)?;
        }
        self.state.prescale_table = prescale;

        if is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
            if let Some(identifier) = &self.identifier {
                write_unique_image_identifier(writer, identifier)?;
            }
            if let Some(transform) = &self.component_transform {
                if !transform.is_identity() {
                    write_component_transform(writer, transform)?;
                }
            }
            if let Some(permutation) = &self.component_permutation {
                if !permutation.is_identity() {
                    write_component_permutation(writer, permutation)?;
                }
            }
        }

        if is_part_enabled(self.enabled_parts, parts::LAYERS) && self.layer_count > 1 {
            writer.put_tag_pair_optional(CodecTag::LayerCount.into(), self.layer_count)?;
            self.state.layer_count = self.layer_count;
        }
        Ok(())
    }

    /// Transform every channel, then emit the encoded wavelet trees.
    fn encode_channels(
        &mut self,
        image: &UnpackedImage,
        writer: &mut BitstreamWriter,
    ) -> CodecResult<()> {
        let start = Instant::now();
        for channel in 0..self.channel_count {
            transform_forward_channel(
                &image.components[channel],
                &mut self.transforms[channel],
                self.midpoint_prequant,
            );
        }
        self.timing.transform += start.elapsed();

        let start = Instant::now();
        self.encode_channel_wavelets(writer)?;
        self.timing.encoding += start.elapsed();
        Ok(())
    }

    fn encode_channel_wavelets(&mut self, writer: &mut BitstreamWriter) -> CodecResult<()> {
        for index in 0..self.channel_count {
            let channel_number = self.channel_order[index] as usize;
            self.encode_channel_header(channel_number, writer)?;
            self.encode_channel_subbands(channel_number, writer)?;
            self.encode_channel_trailer(writer)?;
            // The decoder advances to the next channel after the last subband.
            self.state.channel_number = channel_number as u16 + 1;
            self.state.subband_number = 0;
        }
        Ok(())
    }

    /// Write the channel header (only parameters the decoder cannot derive).
    fn encode_channel_header(
        &mut self,
        channel_number: usize,
        writer: &mut BitstreamWriter,
    ) -> CodecResult<()> {
        writer.align_segment()?;

        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Channel) {
            begin_section(writer, SectionNumber::Channel)?;
        }

        let channel = self.channels[channel_number];
        if channel_number as u16 != self.state.channel_number {
            writer.put_tag_pair(CodecTag::ChannelNumber.into(), channel_number as u16)?;
            self.state.channel_number = channel_number as u16;
        }

        if is_part_enabled(self.enabled_parts, parts::IMAGE_FORMATS) {
            // The decoder derives the channel dimensions from the image format.
            self.state.channel_width = channel.width;
            self.state.channel_height = channel.height;
        } else {
            if channel.width != self.state.channel_width {
                writer.put_tag_pair(CodecTag::ChannelWidth.into(), channel.width as u16)?;
                self.state.channel_width = channel.width;
            }
            if channel.height != self.state.channel_height {
                writer.put_tag_pair(CodecTag::ChannelHeight.into(), channel.height as u16)?;
                self.state.channel_height = channel.height;
            }
        }

        if channel.bits_per_component != self.state.bits_per_component {
            writer.put_tag_pair(
                CodecTag::BitsPerComponent.into(),
                channel.bits_per_component as u16,
            )?;
            self.state.bits_per_component = channel.bits_per_component;
        }
        Ok(())
    }

    fn encode_channel_trailer(&mut self, writer: &mut BitstreamWriter) -> CodecResult<()> {
        writer.align_segment()?;
        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Channel) {
            end_section(writer)?;
        }
        Ok(())
    }

    /// Emit all subbands of one channel in canonical order.
    fn encode_channel_subbands(
        &mut self,
        channel_number: usize,
        writer: &mut BitstreamWriter,
    ) -> CodecResult<()> {
        debug_assert!(writer.is_aligned_segment());

        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Wavelet) {
            begin_section(writer, SectionNumber::Wavelet)?;
        }

        self.encode_lowpass_band(channel_number, writer)?;

        let mut subband = 1usize;
        let last_wavelet_index = MAX_WAVELET_COUNT - 1;
        for wavelet_index in (0..MAX_WAVELET_COUNT).rev() {
            #[cfg(feature = "sections")]
            if wavelet_index < last_wavelet_index
                && is_section_enabled(self.enabled_sections, SectionNumber::Wavelet)
            {
                begin_section(writer, SectionNumber::Wavelet)?;
            }
            let _ = last_wavelet_index;

            for band in 1..4 {
                debug_assert_eq!(subband_wavelet_index(subband), wavelet_index);
                debug_assert_eq!(subband_band_index(subband), band);
                self.encode_highpass_band(channel_number, wavelet_index, band, subband, writer)?;
                subband += 1;
            }

            #[cfg(feature = "sections")]
            if is_section_enabled(self.enabled_sections, SectionNumber::Wavelet) {
                writer.align_segment()?;
                end_section(writer)?;
            }
        }
        Ok(())
    }

    /// Write the lowpass band: header, raw coefficients, and trailer.
    fn encode_lowpass_band(
        &mut self,
        channel_number: usize,
        writer: &mut BitstreamWriter,
    ) -> CodecResult<()> {
        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Subband) {
            begin_section(writer, SectionNumber::Subband)?;
        }

        // Lowpass band header.
        if self.state.subband_number != 0 {
            writer.put_tag_pair(CodecTag::SubbandNumber.into(), 0)?;
            self.state.subband_number = 0;
        }
        let lowpass_precision = self.channels[channel_number].lowpass_precision;
        if lowpass_precision != self.state.lowpass_precision {
            writer.put_tag_pair(CodecTag::LowpassPrecision.into(), lowpass_precision as u16)?;
            self.state.lowpass_precision = lowpass_precision;
        }
        writer.push_size(TAG_LARGE_CODEBLOCK)?;

        let wavelet = &self.transforms[channel_number].wavelets[MAX_WAVELET_COUNT - 1];
        debug_assert!(writer.is_aligned_segment());
        for row in 0..wavelet.height as usize {
            for &coefficient in wavelet.row(LL_BAND, row) {
                writer.put_bits(coefficient as u16 as u32, lowpass_precision)?;
            }
        }
        writer.align_segment()?;

        // Lowpass band trailer: patch the codeblock size.
        writer.pop_size()?;
        self.state.subband_number += 1;

        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Subband) {
            end_section(writer)?;
        }
        Ok(())
    }

    /// Write one highpass band: header, entropy-coded runs, and trailer.
    fn encode_highpass_band(
        &mut self,
        channel_number: usize,
        wavelet_index: usize,
        band: usize,
        subband: usize,
        writer: &mut BitstreamWriter,
    ) -> CodecResult<()> {
        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Subband) {
            begin_section(writer, SectionNumber::Subband)?;
        }

        let quantization = self.transforms[channel_number].wavelets[wavelet_index].quant[band];

        // Subband header.
        if subband as u16 != self.state.subband_number {
            writer.put_tag_pair(CodecTag::SubbandNumber.into(), subband as u16)?;
            self.state.subband_number = subband as u16;
        }
        if quantization != self.state.band.quantization {
            writer.put_tag_pair(CodecTag::Quantization.into(), quantization)?;
            self.state.band.quantization = quantization;
        }
        writer.push_size(TAG_LARGE_CODEBLOCK)?;

        let wavelet = &self.transforms[channel_number].wavelets[wavelet_index];
        encode_band_row_runs(
            writer,
            &codeset_17().codebook,
            wavelet.band(band),
            wavelet.width as usize,
            wavelet.height as usize,
        )?;
        writer.align_segment()?;

        // Subband trailer: patch the codeblock size.
        writer.pop_size()?;
        self.state.subband_number += 1;

        #[cfg(feature = "sections")]
        if is_section_enabled(self.enabled_sections, SectionNumber::Subband) {
            end_section(writer)?;
        }
        Ok(())
    }
}

/// Distribute the subband quantization table over the wavelets of a
/// transform.  The lowpass divisor of the intermediate wavelets is one; the
/// lowpass divisor of the top wavelet comes from subband zero.
fn set_transform_quant_table(transform: &mut Transform, table: &[u16; MAX_SUBBAND_COUNT]) {
    for subband in 0..MAX_SUBBAND_COUNT {
        let wavelet_index = subband_wavelet_index(subband);
        let band = subband_band_index(subband);
        let mut quant = table[subband];
        if quant == 0 {
            quant = 1;
        }
        transform.wavelets[wavelet_index].quant[band] = quant;
    }
    for wavelet in transform.wavelets.iter_mut().take(MAX_WAVELET_COUNT - 1) {
        wavelet.quant[LL_BAND] = 1;
    }
}

/// Encode a single image with one-off parameters.
pub fn encode_image(
    image: &UnpackedImage,
    stream: &mut dyn ByteStream,
    parameters: &EncoderParameters,
) -> CodecResult<()> {
    Encoder::new(parameters)?.encode(image, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ComponentArray;
    use crate::stream::MemoryStream;

    fn bayer_parameters(width: u32, height: u32) -> EncoderParameters {
        EncoderParameters {
            image_format: ImageFormat::Bayer,
            image_width: width,
            image_height: height,
            ..EncoderParameters::default()
        }
    }

    fn bayer_image(width: u32, height: u32, value: u16) -> UnpackedImage {
        let components = (0..4)
            .map(|_| {
                ComponentArray::with_data(
                    width / 2,
                    height / 2,
                    12,
                    vec![value; (width / 2) as usize * (height / 2) as usize],
                )
            })
            .collect();
        UnpackedImage {
            format: ImageFormat::Bayer,
            width,
            height,
            components,
        }
    }

    #[test]
    fn test_bitstream_begins_with_start_marker() {
        let mut encoder = Encoder::new(&bayer_parameters(8, 8)).unwrap();
        let mut stream = MemoryStream::new();
        encoder.encode(&bayer_image(8, 8, 0x0800), &mut stream).unwrap();
        let bytes = stream.into_vec();
        assert_eq!(&bytes[0..4], &[0x56, 0x43, 0x2D, 0x35]);
        // Whole bitstream is segment aligned.
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_rejects_tiny_images() {
        assert_eq!(
            Encoder::new(&bayer_parameters(1, 1)).err(),
            Some(CodecError::PatternDimensions)
        );
        let parameters = EncoderParameters {
            image_format: ImageFormat::Rgba,
            image_width: 1,
            image_height: 1,
            ..EncoderParameters::default()
        };
        assert_eq!(
            Encoder::new(&parameters).err(),
            Some(CodecError::BadImageFormat)
        );
    }

    #[test]
    fn test_rejects_bad_lowpass_precision() {
        let mut parameters = bayer_parameters(8, 8);
        parameters.lowpass_precision = 7;
        assert_eq!(
            Encoder::new(&parameters).err(),
            Some(CodecError::LowpassPrecision)
        );
        parameters.lowpass_precision = 33;
        assert_eq!(
            Encoder::new(&parameters).err(),
            Some(CodecError::LowpassPrecision)
        );
        parameters.lowpass_precision = 8;
        assert!(Encoder::new(&parameters).is_ok());
        parameters.lowpass_precision = 32;
        assert!(Encoder::new(&parameters).is_ok());
    }

    #[test]
    fn test_rejects_bad_channel_order() {
        let mut parameters = bayer_parameters(8, 8);
        parameters.channel_order = Some(vec![0, 1, 2]);
        assert_eq!(
            Encoder::new(&parameters).err(),
            Some(CodecError::InvalidChannel)
        );
        parameters.channel_order = Some(vec![0, 1, 2, 2]);
        assert_eq!(
            Encoder::new(&parameters).err(),
            Some(CodecError::InvalidChannel)
        );
        parameters.channel_order = Some(vec![3, 2, 1, 0]);
        assert!(Encoder::new(&parameters).is_ok());
    }

    #[test]
    fn test_rejects_mismatched_image() {
        let mut encoder = Encoder::new(&bayer_parameters(8, 8)).unwrap();
        let mut stream = MemoryStream::new();
        let image = bayer_image(16, 16, 0x0800);
        assert_eq!(
            encoder.encode(&image, &mut stream).err(),
            Some(CodecError::ImageDimensions)
        );
    }
}
