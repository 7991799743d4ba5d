//! Codec state shared by the encoder and decoder state machines.
//!
//! The codec state holds the information gathered while processing a single
//! bitstream.  The encoder operates the same state machine as the decoder so
//! that parameters the decoder can derive on its own are never written into
//! the bitstream: after a codeblock both sides increment the subband number,
//! after the last subband both sides advance the channel number, and so on.

use crate::image::ImageFormat;
use crate::wavelet::MAX_WAVELET_COUNT;

/// Maximum number of channels in a transform.
pub const MAX_CHANNEL_COUNT: usize = 4;

/// Default number of bits per lowpass coefficient.
pub const DEFAULT_LOWPASS_PRECISION: u32 = 16;

/// Smallest usable lowpass precision.
pub const LOWPASS_PRECISION_MIN: u32 = 8;

/// Largest usable lowpass precision.
pub const LOWPASS_PRECISION_MAX: u32 = 32;

/// Default internal precision of the component arrays.
pub const DEFAULT_INTERNAL_PRECISION: u32 = 12;

/// Parts of the VC-5 standard that can be enabled at run time.
pub mod parts {
    /// VC-5 Part 1: elementary bitstream.
    pub const ELEMENTARY: u32 = 1 << 0;
    /// VC-5 Part 3: image formats.
    pub const IMAGE_FORMATS: u32 = 1 << 2;
    /// VC-5 Part 4: color sampling.
    pub const COLOR_SAMPLING: u32 = 1 << 3;
    /// VC-5 Part 5: layers.
    pub const LAYERS: u32 = 1 << 4;
    /// VC-5 Part 6: sections.
    pub const SECTIONS: u32 = 1 << 5;
    /// VC-5 Part 7: metadata.
    pub const METADATA: u32 = 1 << 6;

    /// Parts enabled by default.
    pub const DEFAULT: u32 = ELEMENTARY | IMAGE_FORMATS;
}

/// Return true if the part is enabled in the mask.
pub fn is_part_enabled(enabled_parts: u32, part: u32) -> bool {
    (enabled_parts & part) != 0
}

/// Parameters of the most recently processed subband.
#[derive(Debug, Clone, Copy, Default)]
pub struct BandState {
    /// Subband index of the band.
    pub subband: u16,
    /// Quantization divisor for the band.
    pub quantization: u16,
}

/// Transient state updated as a bitstream is encoded or decoded.
#[derive(Debug, Clone)]
pub struct CodecState {
    /// Index of the current channel.
    pub channel_number: u16,
    /// Width of the next channel in the bitstream.
    pub channel_width: u32,
    /// Height of the next channel in the bitstream.
    pub channel_height: u32,
    /// Precision of the component arrays (in bits).
    pub bits_per_component: u32,

    /// Index of the current subband.
    pub subband_number: u16,

    pub image_format: ImageFormat,
    /// Width of the pattern elements (in samples).
    pub pattern_width: u32,
    /// Height of the pattern elements (in rows).
    pub pattern_height: u32,
    /// Number of components per sample in the pattern element.
    pub components_per_sample: u32,
    /// Upper bound on the number of bits per component.
    pub max_bits_per_component: u32,

    /// Number of layers in the bitstream.
    pub layer_count: u16,
    /// Number of the next layer in the bitstream.
    pub layer_number: u16,
    /// Use-case mask for layers.
    pub layer_pattern: u16,

    /// Number of channels in the current layer.
    pub channel_count: u32,
    /// Number of wavelets per channel.
    pub wavelet_count: u32,
    /// Number of subbands per channel.
    pub subband_count: u32,

    /// Mask of subbands decoded in the current channel.
    pub decoded_subband_mask: u32,

    /// Enough of the bitstream has been processed to produce the image.
    pub end_of_sample: bool,
    /// The current layer has been completely decoded.
    pub end_of_layer: bool,
    /// The most recent tag-value pair was a header parameter.
    pub header: bool,
    /// The most recent syntax element was a codeblock chunk.
    pub codeblock: bool,

    /// Parameters of the current highpass band.
    pub band: BandState,

    /// Upper bound on the channel width.
    pub image_width: u32,
    /// Upper bound on the channel height.
    pub image_height: u32,

    /// Number of bits per lowpass coefficient.
    pub lowpass_precision: u32,

    /// Prescale shift applied before each wavelet level, indexed like the
    /// wavelets in the transform.
    pub prescale_table: [u8; MAX_WAVELET_COUNT],

    /// Number of the most recent section element.
    #[cfg(feature = "sections")]
    pub section_number: i32,
    /// Payload length of the most recent section element (in segments).
    #[cfg(feature = "sections")]
    pub section_length: i32,
}

impl Default for CodecState {
    fn default() -> Self {
        Self {
            channel_number: 0,
            channel_width: 0,
            channel_height: 0,
            bits_per_component: DEFAULT_INTERNAL_PRECISION,
            subband_number: 0,
            image_format: ImageFormat::Unknown,
            pattern_width: 0,
            pattern_height: 0,
            components_per_sample: 0,
            max_bits_per_component: DEFAULT_INTERNAL_PRECISION,
            layer_count: 1,
            layer_number: 0,
            layer_pattern: 0,
            channel_count: 0,
            wavelet_count: MAX_WAVELET_COUNT as u32,
            subband_count: 10,
            decoded_subband_mask: 0,
            end_of_sample: false,
            end_of_layer: false,
            header: false,
            codeblock: false,
            band: BandState::default(),
            image_width: 0,
            image_height: 0,
            lowpass_precision: DEFAULT_LOWPASS_PRECISION,
            prescale_table: [0; MAX_WAVELET_COUNT],
            #[cfg(feature = "sections")]
            section_number: 0,
            #[cfg(feature = "sections")]
            section_length: 0,
        }
    }
}

impl CodecState {
    /// Prepare the state for processing a new bitstream.
    pub fn prepare() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = CodecState::prepare();
        assert_eq!(state.lowpass_precision, 16);
        assert_eq!(state.bits_per_component, 12);
        assert_eq!(state.subband_count, 10);
        assert_eq!(state.wavelet_count, 3);
        assert!(!state.header);
        assert!(!state.codeblock);
    }

    #[test]
    fn test_part_masks() {
        assert!(is_part_enabled(parts::DEFAULT, parts::ELEMENTARY));
        assert!(is_part_enabled(parts::DEFAULT, parts::IMAGE_FORMATS));
        assert!(!is_part_enabled(parts::DEFAULT, parts::LAYERS));
    }
}
