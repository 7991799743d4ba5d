//! Image formats, component arrays, and channel dimension rules.
//!
//! A component array is the unpacked representation of one color channel:
//! a rectangular grid of unsigned samples with a known precision.  The image
//! format determines how component arrays map onto channels and how channel
//! dimensions derive from the image and pattern dimensions.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{CodecError, CodecResult};

/// Format of the image represented by the bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum ImageFormat {
    /// The image format has not been specified.
    #[default]
    Unknown = 0,
    /// RGB image with optional alpha channel.
    Rgba = 1,
    /// YCbCr image with optional alpha channel.
    YCbCrA = 2,
    /// Bayer image (special case of a color filter array).
    Bayer = 3,
    /// Generic color filter array image.
    Cfa = 4,
}

/// One unpacked color channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentArray {
    pub width: u32,
    pub height: u32,
    /// Number of bits per component value (8 to 16).
    pub bits_per_component: u32,
    /// Samples in row-major order (the pitch equals the width).
    pub data: Vec<u16>,
}

impl ComponentArray {
    /// Allocate a zeroed component array.
    pub fn new(width: u32, height: u32, bits_per_component: u32) -> Self {
        Self {
            width,
            height,
            bits_per_component,
            data: vec![0; (width as usize) * (height as usize)],
        }
    }

    pub fn with_data(width: u32, height: u32, bits_per_component: u32, data: Vec<u16>) -> Self {
        debug_assert_eq!(data.len(), (width as usize) * (height as usize));
        Self {
            width,
            height,
            bits_per_component,
            data,
        }
    }

    pub fn row(&self, row: usize) -> &[u16] {
        let width = self.width as usize;
        &self.data[row * width..(row + 1) * width]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [u16] {
        let width = self.width as usize;
        &mut self.data[row * width..(row + 1) * width]
    }
}

/// A list of component arrays plus the image description they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub components: Vec<ComponentArray>,
}

/// Fill in the default pattern parameters for an image format.
///
/// Parameters that are already nonzero are left unchanged.  Returns false
/// for a format without defaults.
pub fn set_image_format_defaults(
    format: ImageFormat,
    pattern_width: &mut u32,
    pattern_height: &mut u32,
    components_per_sample: &mut u32,
) -> bool {
    match format {
        ImageFormat::Rgba | ImageFormat::YCbCrA => {
            if *pattern_width == 0 {
                *pattern_width = 1;
            }
            if *pattern_height == 0 {
                *pattern_height = 1;
            }
            if *components_per_sample == 0 {
                *components_per_sample = 3;
            }
            true
        }
        ImageFormat::Bayer => {
            if *pattern_width == 0 {
                *pattern_width = 2;
            }
            if *pattern_height == 0 {
                *pattern_height = 2;
            }
            if *components_per_sample == 0 {
                *components_per_sample = 1;
            }
            true
        }
        ImageFormat::Cfa => {
            // The pattern dimensions of a generic CFA must be explicit.
            if *components_per_sample == 0 {
                *components_per_sample = 1;
            }
            *pattern_width > 0 && *pattern_height > 0
        }
        ImageFormat::Unknown => false,
    }
}

/// Check the image format against the pattern element parameters.
pub fn check_image_format_parameters(
    format: ImageFormat,
    pattern_width: u32,
    pattern_height: u32,
    components_per_sample: u32,
) -> bool {
    match format {
        ImageFormat::Rgba | ImageFormat::YCbCrA => {
            pattern_width == 1
                && pattern_height == 1
                && (3..=4).contains(&components_per_sample)
        }
        ImageFormat::Bayer => {
            pattern_width == 2 && pattern_height == 2 && components_per_sample == 1
        }
        ImageFormat::Cfa => {
            pattern_width > 0 && pattern_height > 0 && components_per_sample == 1
        }
        ImageFormat::Unknown => false,
    }
}

/// Number of channels encoded for an image format.
pub fn channel_count(format: ImageFormat, components_per_sample: u32) -> u32 {
    match format {
        ImageFormat::Bayer => 4,
        ImageFormat::Cfa => 4,
        ImageFormat::Rgba | ImageFormat::YCbCrA => components_per_sample,
        ImageFormat::Unknown => 0,
    }
}

/// Derive the dimensions of one channel from the image description.
///
/// The image dimensions must be consistent with the pattern dimensions;
/// Bayer and CFA channels are the image divided by the pattern.
pub fn channel_dimensions(
    format: ImageFormat,
    image_width: u32,
    image_height: u32,
    pattern_width: u32,
    pattern_height: u32,
) -> CodecResult<(u32, u32)> {
    if image_width == 0 || image_height == 0 {
        return Err(CodecError::ImageDimensions);
    }
    if pattern_width == 0 || pattern_height == 0 {
        return Err(CodecError::PatternDimensions);
    }
    match format {
        ImageFormat::Rgba | ImageFormat::YCbCrA => Ok((image_width, image_height)),
        ImageFormat::Bayer | ImageFormat::Cfa => {
            if image_width % pattern_width != 0 || image_height % pattern_height != 0 {
                return Err(CodecError::PatternDimensions);
            }
            Ok((image_width / pattern_width, image_height / pattern_height))
        }
        ImageFormat::Unknown => Err(CodecError::BadImageFormat),
    }
}

/// Reject images too small to encode.
///
/// Bayer and CFA images smaller than one pattern element fail the pattern
/// check; other formats need at least two samples in each dimension.
pub fn validate_image_dimensions(
    format: ImageFormat,
    image_width: u32,
    image_height: u32,
    pattern_width: u32,
    pattern_height: u32,
) -> CodecResult<()> {
    match format {
        ImageFormat::Bayer | ImageFormat::Cfa => {
            if image_width < pattern_width
                || image_height < pattern_height
                || image_width % pattern_width != 0
                || image_height % pattern_height != 0
            {
                return Err(CodecError::PatternDimensions);
            }
        }
        _ => {
            if image_width < 2 || image_height < 2 {
                return Err(CodecError::BadImageFormat);
            }
        }
    }
    Ok(())
}
