//! Inverse spatial wavelet transform (2-6 synthesis).
//!
//! Given the four valid bands of a wavelet, the synthesis dequantizes the
//! coefficients, inverts the vertical pass, then the horizontal pass, and
//! crops the padded result to the output dimensions.  The correction terms
//! are recomputed from the (dequantized) lowpass values exactly as in the
//! analysis, and the parity bit dropped by the normalized lowpass is
//! recovered from the highpass difference, so synthesis of an unquantized
//! wavelet reproduces the analysis input exactly.  A descale shift undoes
//! the prescale that was applied to the analysis input.

use crate::error::{CodecError, CodecResult};
use crate::forward::{column_correction, highpass_correction};
use crate::image::ComponentArray;
use crate::quantize::dequantize;
use crate::wavelet::{Wavelet, HH_BAND, HL_BAND, LH_BAND, LL_BAND};

/// Reconstruct an even/odd pair from a lowpass/highpass pair.
fn inverse_pair(low: i32, high: i32, correction: i32) -> (i32, i32) {
    let diff = high - correction;
    // parity(even + odd) == parity(even - odd)
    let sum = 2 * low + (diff & 1);
    let even = (sum + diff) >> 1;
    (even, even - diff)
}

/// Dequantize one band into a 32-bit plane.
fn dequantized_band(wavelet: &Wavelet, band: usize) -> Vec<i32> {
    let mut quant = wavelet.quant[band] as u32;
    if quant == 0 {
        quant = 1;
    }
    wavelet
        .band(band)
        .iter()
        .map(|&value| dequantize(value as i32, quant))
        .collect()
}

/// Invert one wavelet into a cropped plane of 32-bit values.
fn invert_spatial(
    wavelet: &Wavelet,
    output_width: usize,
    output_height: usize,
    descale: u8,
) -> Vec<i32> {
    let input_width = wavelet.width as usize;
    let input_height = wavelet.height as usize;
    let padded_height = 2 * input_height;

    let low_low = dequantized_band(wavelet, LL_BAND);
    let low_high = dequantized_band(wavelet, LH_BAND);
    let high_low = dequantized_band(wavelet, HL_BAND);
    let high_high = dequantized_band(wavelet, HH_BAND);

    // Vertical synthesis: rebuild the horizontal lowpass and highpass planes.
    let mut lowpass_plane = vec![0i32; padded_height * input_width];
    let mut highpass_plane = vec![0i32; padded_height * input_width];
    for row in 0..input_height {
        for column in 0..input_width {
            let index = row * input_width + column;
            let top = 2 * row * input_width + column;
            let bottom = (2 * row + 1) * input_width + column;

            let correction =
                column_correction(&low_low, input_width, input_height, row, column);
            let (even, odd) = inverse_pair(low_low[index], high_low[index], correction);
            lowpass_plane[top] = even;
            lowpass_plane[bottom] = odd;

            let correction =
                column_correction(&low_high, input_width, input_height, row, column);
            let (even, odd) = inverse_pair(low_high[index], high_high[index], correction);
            highpass_plane[top] = even;
            highpass_plane[bottom] = odd;
        }
    }

    // Horizontal synthesis with cropping to the output dimensions.
    let mut output = vec![0i32; output_width * output_height];
    for row in 0..padded_height.min(output_height) {
        let low_row = &lowpass_plane[row * input_width..(row + 1) * input_width];
        let high_row = &highpass_plane[row * input_width..(row + 1) * input_width];
        let output_row = &mut output[row * output_width..(row + 1) * output_width];
        for i in 0..input_width {
            let correction = highpass_correction(low_row, i);
            let (even, odd) = inverse_pair(low_row[i], high_row[i], correction);
            if 2 * i < output_width {
                output_row[2 * i] = even << descale;
            }
            if 2 * i + 1 < output_width {
                output_row[2 * i + 1] = odd << descale;
            }
        }
    }
    output
}

/// Reconstruct the lowpass band of the next lower wavelet.
///
/// All four bands of the input wavelet must be valid.  The descale shift
/// undoes the prescale that was applied to the input of this level during
/// encoding.
pub fn transform_inverse_spatial_lowpass(
    input: &Wavelet,
    output_width: u32,
    output_height: u32,
    prescale: u8,
) -> CodecResult<Vec<i16>> {
    if !input.all_bands_valid() {
        return Err(CodecError::Unexpected);
    }
    let plane = invert_spatial(
        input,
        output_width as usize,
        output_height as usize,
        prescale,
    );
    Ok(plane
        .into_iter()
        .map(|value| value.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
        .collect())
}

/// Reconstruct a component array from the wavelet at level one.
pub fn transform_inverse_spatial_array(
    input: &Wavelet,
    component: &mut ComponentArray,
    prescale: u8,
) -> CodecResult<()> {
    if !input.all_bands_valid() {
        return Err(CodecError::Unexpected);
    }
    let width = component.width as usize;
    let height = component.height as usize;
    let plane = invert_spatial(input, width, height, prescale);
    for (slot, value) in component.data.iter_mut().zip(plane) {
        *slot = value.clamp(0, u16::MAX as i32) as u16;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::transform_forward_channel;
    use crate::wavelet::Transform;

    fn forward_then_inverse(width: u32, height: u32, samples: Vec<u16>) -> ComponentArray {
        let component = ComponentArray::with_data(width, height, 12, samples);
        let mut transform = Transform::default();
        transform.allocate(width, height, 3);
        transform_forward_channel(&component, &mut transform, 2);

        // Cascade the inverse back down the wavelet tree.
        for level in (1..transform.wavelets.len()).rev() {
            let (lower, upper) = transform.wavelets.split_at_mut(level);
            let target = &mut lower[level - 1];
            let lowpass = transform_inverse_spatial_lowpass(
                &upper[0],
                target.width,
                target.height,
                0,
            )
            .unwrap();
            target.set_band(LL_BAND, lowpass);
        }
        let mut output = ComponentArray::new(width, height, 12);
        transform_inverse_spatial_array(&transform.wavelets[0], &mut output, 0).unwrap();
        output
    }

    #[test]
    fn test_inverse_pair_recovers_parity() {
        for even in [-7i32, -2, 0, 3, 10, 255] {
            for odd in [-9i32, -1, 0, 4, 11, 254] {
                let low = (even + odd) >> 1;
                let high = even - odd;
                assert_eq!(inverse_pair(low, high, 0), (even, odd));
            }
        }
    }

    #[test]
    fn test_roundtrip_constant_image() {
        let samples = vec![0x0800u16; 64];
        let output = forward_then_inverse(8, 8, samples.clone());
        assert_eq!(output.data, samples);
    }

    #[test]
    fn test_roundtrip_gradient_image() {
        let samples: Vec<u16> = (0..16 * 12).map(|i| (i * 17 % 4096) as u16).collect();
        let output = forward_then_inverse(16, 12, samples.clone());
        assert_eq!(output.data, samples);
    }

    #[test]
    fn test_roundtrip_odd_dimensions() {
        // Odd dimensions are padded internally but the output keeps the
        // original size.
        let samples: Vec<u16> = (0..13 * 7).map(|i| (i * 31 % 4096) as u16).collect();
        let output = forward_then_inverse(13, 7, samples.clone());
        assert_eq!(output.data, samples);
    }

    #[test]
    fn test_roundtrip_tiny_image() {
        let samples: Vec<u16> = vec![1, 4095, 2048, 7];
        let output = forward_then_inverse(2, 2, samples.clone());
        assert_eq!(output.data, samples);
    }
}
