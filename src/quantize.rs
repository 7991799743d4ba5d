//! Quantization of wavelet coefficients.
//!
//! Quantization divides a coefficient magnitude by the band divisor after
//! adding a midpoint rounding term, restoring the sign afterward.  The
//! midpoint is derived from the divisor: `quant / midpoint_prequant` for
//! midpoint_prequant between 2 and 8, otherwise zero, so quantization by one
//! is always the identity.  Dequantization is a plain multiply.

/// Default midpoint prequant parameter.
pub const DEFAULT_MIDPOINT_PREQUANT: u32 = 2;

/// Default quantization divisors indexed by subband number.
pub const DEFAULT_QUANT_TABLE: [u16; 10] = [1, 24, 24, 12, 24, 24, 12, 32, 32, 48];

/// Quantization table with every divisor equal to one (lossless).
pub const IDENTITY_QUANT_TABLE: [u16; 10] = [1; 10];

/// Rounding addend for the given divisor and midpoint prequant parameter.
pub fn quant_midpoint(quant: u32, midpoint_prequant: u32) -> u32 {
    if (2..=8).contains(&midpoint_prequant) {
        quant / midpoint_prequant
    } else {
        0
    }
}

/// Quantize a coefficient with half-up-toward-zero rounding.
pub fn quantize(value: i32, quant: u32, midpoint: u32) -> i32 {
    if quant <= 1 {
        return value;
    }
    let magnitude = (value.unsigned_abs() + midpoint) / quant;
    if value < 0 {
        -(magnitude as i32)
    } else {
        magnitude as i32
    }
}

/// Reconstruct a coefficient from its quantized value.
pub fn dequantize(value: i32, quant: u32) -> i32 {
    value * quant as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_identity() {
        let midpoint = quant_midpoint(1, DEFAULT_MIDPOINT_PREQUANT);
        assert_eq!(midpoint, 0);
        for value in [-32768, -100, -1, 0, 1, 99, 32767] {
            assert_eq!(quantize(value, 1, midpoint), value);
            assert_eq!(dequantize(value, 1), value);
        }
    }

    #[test]
    fn test_quantize_rounding() {
        let quant = 12;
        let midpoint = quant_midpoint(quant, DEFAULT_MIDPOINT_PREQUANT);
        assert_eq!(midpoint, 6);
        // Half-up magnitudes, symmetric in sign.
        assert_eq!(quantize(5, quant, midpoint), 0);
        assert_eq!(quantize(6, quant, midpoint), 1);
        assert_eq!(quantize(17, quant, midpoint), 1);
        assert_eq!(quantize(18, quant, midpoint), 2);
        assert_eq!(quantize(-18, quant, midpoint), -2);
    }

    #[test]
    fn test_quantize_disabled_midpoint() {
        // Midpoint prequant of zero disables the rounding addend.
        let quant = 8;
        let midpoint = quant_midpoint(quant, 0);
        assert_eq!(midpoint, 0);
        assert_eq!(quantize(7, quant, midpoint), 0);
        assert_eq!(quantize(-15, quant, midpoint), -1);
    }

    #[test]
    fn test_dequantize_error_bound() {
        let quant = 24;
        let midpoint = quant_midpoint(quant, DEFAULT_MIDPOINT_PREQUANT);
        for value in (-3000..3000).step_by(7) {
            let reconstructed = dequantize(quantize(value, quant, midpoint), quant);
            assert!((value - reconstructed).abs() <= quant as i32);
        }
    }
}
