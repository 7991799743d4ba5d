//! Wavelet data structures and the per-channel transform tree.
//!
//! A wavelet holds the four bands produced by one level of spatial
//! decomposition.  Each band is a rectangular array of signed 16-bit
//! coefficients with its own quantization divisor and cumulative scale
//! factor.  The valid-band mask records which bands hold usable data; a
//! wavelet can be inverted only once all four bands are valid.

use crate::error::{CodecError, CodecResult};

/// Number of bands in a spatial wavelet.
pub const MAX_BAND_COUNT: usize = 4;

/// Number of wavelet levels in the spatial transform.
pub const MAX_WAVELET_COUNT: usize = 3;

/// Number of subbands in a three-level transform.
pub const MAX_SUBBAND_COUNT: usize = 10;

/// Lowpass transform of the lowpass intermediate result.
pub const LL_BAND: usize = 0;
/// Lowpass transform of the highpass intermediate result.
pub const LH_BAND: usize = 1;
/// Highpass transform of the lowpass intermediate result.
pub const HL_BAND: usize = 2;
/// Highpass transform of the highpass intermediate result.
pub const HH_BAND: usize = 3;

/// Band dimension produced by one level of decomposition.
pub fn wavelet_dimension(parent: u32) -> u32 {
    parent.div_ceil(2)
}

/// One level of spatial decomposition: four coefficient bands that share
/// their dimensions, plus per-band quantization and scale.
#[derive(Debug, Clone)]
pub struct Wavelet {
    pub width: u32,
    pub height: u32,
    pub band_count: u16,
    /// Mask indicating which bands hold valid data.
    pub valid_band_mask: u32,
    /// Cumulative scaling applied by the wavelet transforms.
    pub scale: [u16; MAX_BAND_COUNT],
    /// Quantization divisor for each band.
    pub quant: [u16; MAX_BAND_COUNT],
    bands: [Vec<i16>; MAX_BAND_COUNT],
}

impl Wavelet {
    /// Allocate a wavelet with all four bands zeroed.
    pub fn new(width: u32, height: u32) -> Self {
        let band_size = (width as usize) * (height as usize);
        Self {
            width,
            height,
            band_count: MAX_BAND_COUNT as u16,
            valid_band_mask: 0,
            scale: [0; MAX_BAND_COUNT],
            quant: [1; MAX_BAND_COUNT],
            bands: [
                vec![0; band_size],
                vec![0; band_size],
                vec![0; band_size],
                vec![0; band_size],
            ],
        }
    }

    pub fn band(&self, band: usize) -> &[i16] {
        &self.bands[band]
    }

    pub fn band_mut(&mut self, band: usize) -> &mut [i16] {
        &mut self.bands[band]
    }

    /// Replace the contents of a band.
    pub fn set_band(&mut self, band: usize, data: Vec<i16>) {
        debug_assert_eq!(data.len(), (self.width as usize) * (self.height as usize));
        self.bands[band] = data;
    }

    pub fn row(&self, band: usize, row: usize) -> &[i16] {
        let width = self.width as usize;
        &self.bands[band][row * width..(row + 1) * width]
    }

    /// Mask bit for the specified band.
    pub fn band_valid_mask(band: usize) -> u32 {
        1 << band
    }

    /// Set the bit for the specified band in the valid band mask.
    pub fn update_valid_band_mask(&mut self, band: usize) -> CodecResult<()> {
        if band >= MAX_BAND_COUNT {
            return Err(CodecError::InvalidBand);
        }
        self.valid_band_mask |= 1 << band;
        Ok(())
    }

    /// True if every band in the wavelet holds valid data.
    pub fn all_bands_valid(&self) -> bool {
        let all = (1u32 << self.band_count) - 1;
        self.valid_band_mask == all
    }

    pub fn reset_valid_band_mask(&mut self) {
        self.valid_band_mask = 0;
    }
}

/// The wavelet tree for one channel.
#[derive(Debug, Clone, Default)]
pub struct Transform {
    /// Prescale shift applied to the input of each wavelet level.
    pub prescale: [u8; MAX_WAVELET_COUNT],
    /// Wavelets ordered from level one upward (empty until allocated).
    pub wavelets: Vec<Wavelet>,
}

impl Transform {
    /// Allocate the wavelets for a channel with the given dimensions.
    pub fn allocate(&mut self, channel_width: u32, channel_height: u32, wavelet_count: usize) {
        if !self.wavelets.is_empty() {
            return;
        }
        let mut width = channel_width;
        let mut height = channel_height;
        for _ in 0..wavelet_count {
            width = wavelet_dimension(width);
            height = wavelet_dimension(height);
            self.wavelets.push(Wavelet::new(width, height));
        }
    }

    pub fn is_allocated(&self) -> bool {
        !self.wavelets.is_empty()
    }

    /// Release the wavelets (the tree can be reallocated later).
    pub fn release(&mut self) {
        self.wavelets.clear();
    }

    /// Clear the valid-band masks in every wavelet.
    pub fn reset_band_masks(&mut self) {
        for wavelet in &mut self.wavelets {
            wavelet.reset_valid_band_mask();
        }
    }
}

/// Map a subband number to the index of the wavelet that contains it.
///
/// Subbands are numbered in decode order: zero for the lowpass band of the
/// wavelet at the highest level, then the highpass bands of each wavelet
/// from the highest level down to level one.
pub fn subband_wavelet_index(subband: usize) -> usize {
    const TABLE: [usize; MAX_SUBBAND_COUNT] = [2, 2, 2, 2, 1, 1, 1, 0, 0, 0];
    TABLE[subband]
}

/// Map a subband number to the band index within its wavelet.
pub fn subband_band_index(subband: usize) -> usize {
    const TABLE: [usize; MAX_SUBBAND_COUNT] = [0, 1, 2, 3, 1, 2, 3, 1, 2, 3];
    TABLE[subband]
}

/// Default prescale table for the given source precision.
///
/// Sources up to 14 bits need no prescaling; wider sources shift the level
/// one input right by two so highpass magnitudes stay within 16-bit
/// coefficient storage.
pub fn default_prescale(bits_per_component: u32) -> [u8; MAX_WAVELET_COUNT] {
    if bits_per_component > 14 {
        [2, 0, 0]
    } else {
        [0, 0, 0]
    }
}

/// Set the cumulative scale factors in each wavelet of a transform.
///
/// With the normalized lowpass the per-level gains are one for a lowpass
/// pass and two for a highpass pass, so every wavelet carries the same band
/// scales.
pub fn set_transform_scale(transform: &mut Transform) {
    for wavelet in &mut transform.wavelets {
        wavelet.scale = [1, 2, 2, 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subband_mapping() {
        // The canonical mapping from the subband numbering.
        let expected = [
            (2, 0),
            (2, 1),
            (2, 2),
            (2, 3),
            (1, 1),
            (1, 2),
            (1, 3),
            (0, 1),
            (0, 2),
            (0, 3),
        ];
        for (subband, &(wavelet, band)) in expected.iter().enumerate() {
            assert_eq!(subband_wavelet_index(subband), wavelet);
            assert_eq!(subband_band_index(subband), band);
        }
    }

    #[test]
    fn test_valid_band_mask() {
        let mut wavelet = Wavelet::new(4, 4);
        assert!(!wavelet.all_bands_valid());
        for band in 0..MAX_BAND_COUNT {
            wavelet.update_valid_band_mask(band).unwrap();
        }
        assert_eq!(wavelet.valid_band_mask, 0b1111);
        assert!(wavelet.all_bands_valid());
        assert_eq!(
            wavelet.update_valid_band_mask(4),
            Err(CodecError::InvalidBand)
        );
    }

    #[test]
    fn test_transform_allocation() {
        let mut transform = Transform::default();
        transform.allocate(13, 7, MAX_WAVELET_COUNT);
        let dims: Vec<(u32, u32)> = transform
            .wavelets
            .iter()
            .map(|w| (w.width, w.height))
            .collect();
        // Dimensions halve with rounding up at each level.
        assert_eq!(dims, vec![(7, 4), (4, 2), (2, 1)]);
    }

    #[test]
    fn test_default_prescale() {
        assert_eq!(default_prescale(12), [0, 0, 0]);
        assert_eq!(default_prescale(16), [2, 0, 0]);
    }
}
