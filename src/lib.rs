/*!
# vc5-rs

`vc5-rs` is a pure Rust implementation of the VC-5 wavelet still-image codec
(SMPTE ST 2073).  It provides a memory-safe encoder and decoder for the
elementary bitstream with the image formats part, plus optional support for
layers, sections, and metadata.

## Features

- **Transform**: three-level 2-6 biorthogonal spatial wavelet per channel
  with per-level prescale and per-band quantization.
- **Bitstream**: tag-value pair container with big-endian segments, chunk
  elements with back-patched sizes, and optional-element skipping.
- **Entropy coding**: run-length and magnitude variable-length codes from a
  canonical codebook (codeset 17).
- **Image formats**: RGB(A), YCbCr(A), Bayer, and generic CFA component
  arrays with 8 to 16 bits per component.
- **Optional parts**: layers (run time), sections and metadata (cargo
  features `sections` and `metadata`, both on by default).

## Example

```
use vc5_rs::{encode_image, decode_image};
use vc5_rs::{ComponentArray, EncoderParameters, DecoderParameters, ImageFormat, UnpackedImage};
use vc5_rs::MemoryStream;

let components = (0..4)
    .map(|_| ComponentArray::with_data(2, 2, 12, vec![0x0800; 4]))
    .collect();
let image = UnpackedImage {
    format: ImageFormat::Bayer,
    width: 4,
    height: 4,
    components,
};

let parameters = EncoderParameters {
    image_format: ImageFormat::Bayer,
    image_width: 4,
    image_height: 4,
    quant_table: vc5_rs::IDENTITY_QUANT_TABLE,
    ..EncoderParameters::default()
};
let mut stream = MemoryStream::new();
encode_image(&image, &mut stream, &parameters).unwrap();

let mut stream = MemoryStream::from_vec(stream.into_vec());
let decoded = decode_image(&mut stream, &DecoderParameters::default()).unwrap();
assert_eq!(decoded.components, image.components);
```
*/

pub mod bitstream;
pub mod codebook;
pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod entropy;
pub mod error;
pub mod forward;
pub mod identifier;
pub mod image;
pub mod inverse;
pub mod quantize;
pub mod stream;
pub mod tag;
pub mod transperm;
pub mod wavelet;

#[cfg(feature = "metadata")]
pub mod metadata;
#[cfg(feature = "sections")]
pub mod sections;

pub use decoder::{decode_image, Decoder, DecoderParameters};
pub use encoder::{encode_image, Encoder, EncoderParameters};
pub use error::{BitstreamError, CodecError, CodecResult, StreamError};
pub use identifier::ImageIdentifier;
pub use image::{ComponentArray, ImageFormat, UnpackedImage};
pub use quantize::{DEFAULT_QUANT_TABLE, IDENTITY_QUANT_TABLE};
pub use stream::{ByteStream, FileStream, MemoryStream};
pub use transperm::{ComponentPermutation, ComponentTransform};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_test() {
        let parameters = EncoderParameters::default();
        assert_eq!(parameters.midpoint_prequant, 2);
        assert_eq!(parameters.lowpass_precision, 16);
    }
}
