//! Forward spatial wavelet transform (2-6 analysis).
//!
//! The transform is separable: a horizontal pass over each input row
//! produces lowpass and highpass result planes, then a vertical pass over
//! six-row neighborhoods of those planes produces the four bands of the
//! output wavelet, with per-band quantization fused into the band store.
//!
//! Each 1-D step stores the lowpass output as `(even + odd) >> 1`; the
//! matched synthesis recovers the dropped parity bit from the highpass
//! difference, so the transform is exactly invertible at quantization one.
//! The highpass output is `even - odd` plus a correction term computed from
//! the neighboring lowpass outputs, with boundary variants on the first and
//! last positions.  Inputs with odd dimensions are padded to even by
//! duplicating the last sample.

use crate::image::ComponentArray;
use crate::quantize::{quant_midpoint, quantize};
use crate::wavelet::{Transform, Wavelet, HH_BAND, HL_BAND, LH_BAND, LL_BAND};

/// Highpass correction at position `i`, a function of the lowpass outputs.
///
/// The interior term derives from the six-tap analysis filter; the first and
/// last positions use the boundary filters refactored into lowpass taps.
/// Signals with fewer than three lowpass outputs use no correction.
pub(crate) fn highpass_correction(lowpass: &[i32], i: usize) -> i32 {
    let n = lowpass.len();
    if n < 3 {
        return 0;
    }
    if i == 0 {
        (-3 * lowpass[0] + 4 * lowpass[1] - lowpass[2] + 4) >> 3
    } else if i == n - 1 {
        (3 * lowpass[n - 1] - 4 * lowpass[n - 2] + lowpass[n - 3] + 4) >> 3
    } else {
        (-lowpass[i - 1] + lowpass[i + 1] + 4) >> 3
    }
}

/// Highpass correction down a column of a row-major plane.
pub(crate) fn column_correction(
    plane: &[i32],
    width: usize,
    height: usize,
    row: usize,
    column: usize,
) -> i32 {
    if height < 3 {
        return 0;
    }
    if row == 0 {
        (-3 * plane[column] + 4 * plane[width + column] - plane[2 * width + column] + 4) >> 3
    } else if row == height - 1 {
        (3 * plane[(height - 1) * width + column] - 4 * plane[(height - 2) * width + column]
            + plane[(height - 3) * width + column]
            + 4)
            >> 3
    } else {
        (-plane[(row - 1) * width + column] + plane[(row + 1) * width + column] + 4) >> 3
    }
}

/// One-dimensional analysis of an even-length signal.
fn filter_1d(input: &[i32], lowpass: &mut [i32], highpass: &mut [i32]) {
    let n = input.len() / 2;
    for i in 0..n {
        lowpass[i] = (input[2 * i] + input[2 * i + 1]) >> 1;
    }
    for i in 0..n {
        highpass[i] = input[2 * i] - input[2 * i + 1] + highpass_correction(lowpass, i);
    }
}

fn clamp_coefficient(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Apply one level of 2-6 analysis.
///
/// `fetch_row` fills a padded row buffer with the input row (already
/// prescaled); rows past the bottom duplicate the last input row.
fn forward_spatial<F>(
    fetch_row: F,
    input_height: u32,
    wavelet: &mut Wavelet,
    midpoint_prequant: u32,
) where
    F: Fn(usize, &mut [i32]),
{
    let output_width = wavelet.width as usize;
    let output_height = wavelet.height as usize;
    let padded_width = 2 * output_width;
    let padded_height = 2 * output_height;

    // Horizontal pass over every padded input row.
    let mut lowpass_plane = vec![0i32; padded_height * output_width];
    let mut highpass_plane = vec![0i32; padded_height * output_width];
    let mut row_buffer = vec![0i32; padded_width];
    for row in 0..padded_height {
        let input_row = row.min(input_height as usize - 1);
        fetch_row(input_row, &mut row_buffer);
        let start = row * output_width;
        filter_1d(
            &row_buffer,
            &mut lowpass_plane[start..start + output_width],
            &mut highpass_plane[start..start + output_width],
        );
    }

    // Vertical lowpass planes; the vertical highpass corrections need them.
    let mut vertical_low = vec![0i32; output_height * output_width];
    let mut vertical_low_high = vec![0i32; output_height * output_width];
    for row in 0..output_height {
        for column in 0..output_width {
            let top = 2 * row * output_width + column;
            let bottom = (2 * row + 1) * output_width + column;
            vertical_low[row * output_width + column] =
                (lowpass_plane[top] + lowpass_plane[bottom]) >> 1;
            vertical_low_high[row * output_width + column] =
                (highpass_plane[top] + highpass_plane[bottom]) >> 1;
        }
    }

    // Vertical pass with fused quantization; the first and last output rows
    // use the boundary variants of the correction.
    let quant = wavelet.quant;
    let midpoints = [
        quant_midpoint(quant[LL_BAND] as u32, midpoint_prequant),
        quant_midpoint(quant[LH_BAND] as u32, midpoint_prequant),
        quant_midpoint(quant[HL_BAND] as u32, midpoint_prequant),
        quant_midpoint(quant[HH_BAND] as u32, midpoint_prequant),
    ];
    let band_size = output_width * output_height;
    let mut bands = [
        vec![0i16; band_size],
        vec![0i16; band_size],
        vec![0i16; band_size],
        vec![0i16; band_size],
    ];
    for row in 0..output_height {
        for column in 0..output_width {
            let index = row * output_width + column;
            let top = 2 * row * output_width + column;
            let bottom = (2 * row + 1) * output_width + column;

            let low_low = vertical_low[index];
            let low_high = vertical_low_high[index];
            let high_low = lowpass_plane[top] - lowpass_plane[bottom]
                + column_correction(&vertical_low, output_width, output_height, row, column);
            let high_high = highpass_plane[top] - highpass_plane[bottom]
                + column_correction(&vertical_low_high, output_width, output_height, row, column);

            bands[LL_BAND][index] = clamp_coefficient(quantize(
                low_low,
                quant[LL_BAND] as u32,
                midpoints[LL_BAND],
            ));
            bands[LH_BAND][index] = clamp_coefficient(quantize(
                low_high,
                quant[LH_BAND] as u32,
                midpoints[LH_BAND],
            ));
            bands[HL_BAND][index] = clamp_coefficient(quantize(
                high_low,
                quant[HL_BAND] as u32,
                midpoints[HL_BAND],
            ));
            bands[HH_BAND][index] = clamp_coefficient(quantize(
                high_high,
                quant[HH_BAND] as u32,
                midpoints[HH_BAND],
            ));
        }
    }
    for (band, data) in bands.into_iter().enumerate() {
        wavelet.set_band(band, data);
        wavelet.valid_band_mask |= 1 << band;
    }
}

/// Fill a padded row buffer from a component array row.
fn fetch_component_row(component: &ComponentArray, row: usize, buffer: &mut [i32], prescale: u8) {
    let width = component.width as usize;
    let samples = component.row(row);
    for (i, slot) in buffer.iter_mut().enumerate() {
        let column = i.min(width - 1);
        *slot = (samples[column] as i32) >> prescale;
    }
}

/// Fill a padded row buffer from the lowpass band of a wavelet.
fn fetch_lowpass_row(wavelet: &Wavelet, row: usize, buffer: &mut [i32], prescale: u8) {
    let width = wavelet.width as usize;
    let samples = wavelet.row(LL_BAND, row);
    for (i, slot) in buffer.iter_mut().enumerate() {
        let column = i.min(width - 1);
        *slot = (samples[column] as i32) >> prescale;
    }
}

/// Apply the full forward transform to one channel.
///
/// The component array feeds the level-one wavelet; the lowpass band of each
/// wavelet feeds the next level.  Per-band quantization divisors must be set
/// in the wavelets before the transform runs.
pub fn transform_forward_channel(
    component: &ComponentArray,
    transform: &mut Transform,
    midpoint_prequant: u32,
) {
    let wavelet_count = transform.wavelets.len();
    debug_assert!(wavelet_count > 0);

    let prescale = transform.prescale[0];
    {
        let wavelet = &mut transform.wavelets[0];
        let input_height = component.height;
        forward_spatial(
            |row, buffer| fetch_component_row(component, row, buffer, prescale),
            input_height,
            wavelet,
            midpoint_prequant,
        );
    }

    for level in 1..wavelet_count {
        let prescale = transform.prescale[level];
        let (lower, upper) = transform.wavelets.split_at_mut(level);
        let input = &lower[level - 1];
        let output = &mut upper[0];
        forward_spatial(
            |row, buffer| fetch_lowpass_row(input, row, buffer, prescale),
            input.height,
            output,
            midpoint_prequant,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_1d_lowpass_is_bounded_average() {
        let input: Vec<i32> = vec![10, 20, 30, 40, 50, 60, 70, 80];
        let mut low = vec![0i32; 4];
        let mut high = vec![0i32; 4];
        filter_1d(&input, &mut low, &mut high);
        assert_eq!(low, vec![15, 35, 55, 75]);
        // A linear ramp has small highpass output.
        assert!(high.iter().all(|&h| h.abs() <= 16));
    }

    #[test]
    fn test_constant_signal_has_zero_highpass() {
        let input = vec![100i32; 12];
        let mut low = vec![0i32; 6];
        let mut high = vec![0i32; 6];
        filter_1d(&input, &mut low, &mut high);
        assert_eq!(low, vec![100; 6]);
        assert_eq!(high, vec![0; 6]);
    }

    #[test]
    fn test_forward_constant_image() {
        // A constant channel yields constant lowpass and zero highpass at
        // every level.
        let component = ComponentArray::with_data(8, 8, 12, vec![0x0800; 64]);
        let mut transform = Transform::default();
        transform.allocate(8, 8, 3);
        transform_forward_channel(&component, &mut transform, 2);
        for wavelet in &transform.wavelets {
            assert!(wavelet.band(LL_BAND).iter().all(|&v| v == 0x0800));
            for band in 1..4 {
                assert!(wavelet.band(band).iter().all(|&v| v == 0));
            }
            assert_eq!(wavelet.valid_band_mask, 0b1111);
        }
    }

    #[test]
    fn test_forward_with_prescale() {
        let component = ComponentArray::with_data(4, 4, 16, vec![0xF000; 16]);
        let mut transform = Transform::default();
        transform.allocate(4, 4, 3);
        transform.prescale = [2, 0, 0];
        transform_forward_channel(&component, &mut transform, 2);
        // The level one lowpass carries the prescaled constant.
        assert!(transform.wavelets[0]
            .band(LL_BAND)
            .iter()
            .all(|&v| v as i32 == 0xF000 >> 2));
    }
}
