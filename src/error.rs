//! Error types for the codec, the bitstream, and the byte stream.
//!
//! The byte stream and the bitstream each have their own error enumeration
//! since those modules can be reused outside the codec.  Stream and bitstream
//! errors are folded into reserved ranges of [`CodecError`] by shifting a
//! subsystem code left by [`SUBSYSTEM_SHIFT`] bits, so the numeric value of a
//! codec error identifies the subsystem that produced it.

use thiserror::Error;

/// Number of bits reserved for the error code within one subsystem.
pub const SUBSYSTEM_SHIFT: u32 = 5;

/// Errors reported by a byte stream (file or memory buffer).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    #[error("could not obtain more bytes from the stream")]
    Eof = 1,
    #[error("stream I/O failure")]
    Io = 2,
}

/// Errors reported by the bit-level reader and writer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitstreamError {
    #[error("no unread bits remaining in the bitstream")]
    Underflow = 1,
    #[error("no more bits can be written to the bitstream")]
    Overflow = 2,
    #[error("unexpected tag found in the bitstream")]
    BadTag = 3,
    #[error("unexpected bitstream error")]
    Unexpected = 4,
}

/// Error codes returned by every codec operation.
///
/// Values 1-31 are codec errors proper.  Bitstream errors occupy the range
/// `1 << SUBSYSTEM_SHIFT` and byte stream errors the range
/// `2 << SUBSYSTEM_SHIFT`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("bitstream does not begin with the start marker")]
    MissingStartMarker = 1,
    #[error("bitstream syntax error")]
    BitstreamSyntax = 2,
    #[error("header parameter occurs more than once")]
    DuplicateHeaderParameter = 3,
    #[error("required header parameter missing or misplaced")]
    RequiredParameter = 4,
    #[error("image format inconsistent with the pattern element")]
    BadImageFormat = 5,
    #[error("pattern dimensions are zero or inconsistent with the image")]
    PatternDimensions = 6,
    #[error("invalid image dimensions")]
    ImageDimensions = 7,
    #[error("lowpass precision outside the range 8 to 32")]
    LowpassPrecision = 8,
    #[error("wavelet band index outside the range 0 to 3")]
    InvalidBand = 9,
    #[error("entropy stream not terminated by the band end codeword")]
    BandEndMarker = 10,
    #[error("invalid channel number")]
    InvalidChannel = 11,
    #[error("unsupported pixel format")]
    PixelFormat = 12,
    #[error("unsupported format or feature")]
    UnsupportedFormat = 13,
    #[error("memory allocation failed")]
    OutOfMemory = 14,
    #[error("sample offset stack underflow")]
    StackUnderflow = 15,
    #[error("sample offset stack overflow")]
    StackOverflow = 16,
    #[error("feature is not implemented")]
    Unimplemented = 17,
    #[error("internal invariant violated")]
    Unexpected = 18,

    // Bitstream errors mapped into the codec error range: (1 << 5) | code
    #[error("bitstream underflow")]
    StreamUnderflow = 33,
    #[error("bitstream overflow")]
    StreamOverflow = 34,
    #[error("unexpected tag in the bitstream")]
    BadTag = 35,
    #[error("unexpected bitstream failure")]
    BitstreamFailure = 36,

    // Byte stream errors mapped into the codec error range: (2 << 5) | code
    #[error("end of byte stream")]
    StreamEof = 65,
    #[error("byte stream I/O failure")]
    StreamIo = 66,
}

impl CodecError {
    /// Numeric value of the error, suitable for a process exit code.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<StreamError> for CodecError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Eof => CodecError::StreamEof,
            StreamError::Io => CodecError::StreamIo,
        }
    }
}

impl From<BitstreamError> for CodecError {
    fn from(error: BitstreamError) -> Self {
        match error {
            BitstreamError::Underflow => CodecError::StreamUnderflow,
            BitstreamError::Overflow => CodecError::StreamOverflow,
            BitstreamError::BadTag => CodecError::BadTag,
            BitstreamError::Unexpected => CodecError::BitstreamFailure,
        }
    }
}

/// Result alias used throughout the crate.
pub type CodecResult<T> = Result<T, CodecError>;
