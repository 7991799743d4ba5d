//! Inverse component transform and permutation chunks.
//!
//! The encoder writes these small chunks only when the transform or
//! permutation is not the identity.  Both payloads begin with a channel
//! count byte so the decoder can parse them without consulting other state;
//! the 16-bit transform representation is declared but not implemented.

use crate::bitstream::{BitstreamReader, BitstreamWriter};
use crate::error::{CodecError, CodecResult};
use crate::tag::{TAG_INVERSE_PERMUTATION, TAG_INVERSE_TRANSFORM};

/// Inverse component transform (8-bit representation): a square matrix of
/// signed coefficients in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentTransform {
    pub channel_count: u8,
    pub matrix: Vec<i8>,
}

impl ComponentTransform {
    /// The identity transform for the given number of channels.
    pub fn identity(channel_count: u8) -> Self {
        let n = channel_count as usize;
        let mut matrix = vec![0i8; n * n];
        for i in 0..n {
            matrix[i * n + i] = 1;
        }
        Self {
            channel_count,
            matrix,
        }
    }

    pub fn is_identity(&self) -> bool {
        let n = self.channel_count as usize;
        self.matrix
            .iter()
            .enumerate()
            .all(|(index, &value)| value == if index / n == index % n { 1 } else { 0 })
    }
}

/// Inverse component permutation: the output order of the channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPermutation {
    pub order: Vec<u8>,
}

impl ComponentPermutation {
    pub fn identity(channel_count: u8) -> Self {
        Self {
            order: (0..channel_count).collect(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(i, &v)| v as usize == i)
    }
}

fn payload_segments(byte_count: usize) -> u16 {
    byte_count.div_ceil(4) as u16
}

fn write_padded_bytes(writer: &mut BitstreamWriter, bytes: &[u8]) -> CodecResult<()> {
    for &byte in bytes {
        writer.put_bits(byte as u32, 8)?;
    }
    let padding = bytes.len().next_multiple_of(4) - bytes.len();
    for _ in 0..padding {
        writer.put_bits(0, 8)?;
    }
    Ok(())
}

/// Write the inverse component transform chunk (required tag).
pub fn write_component_transform(
    writer: &mut BitstreamWriter,
    transform: &ComponentTransform,
) -> CodecResult<()> {
    let mut bytes = Vec::with_capacity(1 + transform.matrix.len());
    bytes.push(transform.channel_count);
    bytes.extend(transform.matrix.iter().map(|&v| v as u8));
    writer.put_tag_pair(TAG_INVERSE_TRANSFORM as i16, payload_segments(bytes.len()))?;
    write_padded_bytes(writer, &bytes)
}

/// Parse the payload of an inverse component transform chunk.
pub fn parse_component_transform(
    reader: &mut BitstreamReader,
    chunk_size: u32,
) -> CodecResult<ComponentTransform> {
    let mut payload = vec![0u8; chunk_size as usize * 4];
    reader.get_byte_array(&mut payload)?;
    let channel_count = *payload.first().ok_or(CodecError::BitstreamSyntax)?;
    let n = channel_count as usize;
    if n == 0 || payload.len() < 1 + n * n {
        return Err(CodecError::BitstreamSyntax);
    }
    let matrix = payload[1..1 + n * n].iter().map(|&v| v as i8).collect();
    Ok(ComponentTransform {
        channel_count,
        matrix,
    })
}

/// Write the inverse component permutation chunk (required tag).
pub fn write_component_permutation(
    writer: &mut BitstreamWriter,
    permutation: &ComponentPermutation,
) -> CodecResult<()> {
    let mut bytes = Vec::with_capacity(1 + permutation.order.len());
    bytes.push(permutation.order.len() as u8);
    bytes.extend_from_slice(&permutation.order);
    writer.put_tag_pair(TAG_INVERSE_PERMUTATION as i16, payload_segments(bytes.len()))?;
    write_padded_bytes(writer, &bytes)
}

/// Parse the payload of an inverse component permutation chunk.
pub fn parse_component_permutation(
    reader: &mut BitstreamReader,
    chunk_size: u32,
) -> CodecResult<ComponentPermutation> {
    let mut payload = vec![0u8; chunk_size as usize * 4];
    reader.get_byte_array(&mut payload)?;
    let count = *payload.first().ok_or(CodecError::BitstreamSyntax)? as usize;
    if count == 0 || payload.len() < 1 + count {
        return Err(CodecError::BitstreamSyntax);
    }
    Ok(ComponentPermutation {
        order: payload[1..1 + count].to_vec(),
    })
}
