//! Native-endian scalar and word encoding for the serialization format.
use std::io::{self, Read, Write};

use bit_layout::words_for_bits;

use crate::error::DeserializeError;

pub(crate) fn write_u8(writer: &mut impl Write, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

pub(crate) fn write_usize(writer: &mut impl Write, value: usize) -> io::Result<()> {
    writer.write_all(&value.to_ne_bytes())
}

pub(crate) fn write_f32(writer: &mut impl Write, value: f32) -> io::Result<()> {
    writer.write_all(&value.to_ne_bytes())
}

pub(crate) fn write_u64(writer: &mut impl Write, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_ne_bytes())
}

pub(crate) fn write_words(writer: &mut impl Write, words: &[u64]) -> io::Result<()> {
    writer.write_all(bytemuck::cast_slice(words))
}

pub(crate) fn read_u8(reader: &mut impl Read) -> io::Result<u8> {
    let mut bytes = [0; 1];
    reader.read_exact(&mut bytes)?;
    Ok(bytes[0])
}

pub(crate) fn read_usize(reader: &mut impl Read) -> io::Result<usize> {
    let mut bytes = [0; std::mem::size_of::<usize>()];
    reader.read_exact(&mut bytes)?;
    Ok(usize::from_ne_bytes(bytes))
}

pub(crate) fn read_f32(reader: &mut impl Read) -> io::Result<f32> {
    let mut bytes = [0; 4];
    reader.read_exact(&mut bytes)?;
    Ok(f32::from_ne_bytes(bytes))
}

pub(crate) fn read_u64(reader: &mut impl Read) -> io::Result<u64> {
    let mut bytes = [0; 8];
    reader.read_exact(&mut bytes)?;
    Ok(u64::from_ne_bytes(bytes))
}

/// Words read per step by [`read_words`].
const READ_CHUNK_WORDS: usize = 1 << 16;

/// Reads exactly `count` words.
///
/// The buffer grows in chunks as input arrives, so a bogus `count` fails with an I/O error at
/// the end of a short stream instead of allocating for the whole claimed length up front.
pub(crate) fn read_words(reader: &mut impl Read, count: usize) -> io::Result<Vec<u64>> {
    let mut words = Vec::with_capacity(count.min(READ_CHUNK_WORDS));
    while words.len() < count {
        let start = words.len();
        words.resize(start + (count - start).min(READ_CHUNK_WORDS), 0);
        reader.read_exact(bytemuck::cast_slice_mut(&mut words[start..]))?;
    }
    Ok(words)
}

/// Number of words holding `len` packed fields of `width` bits.
///
/// Sizes that do not fit the address space are rejected as inconsistent.
pub(crate) fn packed_words(
    len: usize,
    width: u32,
    what: &'static str,
) -> Result<usize, DeserializeError> {
    len.checked_mul(width as usize)
        .map(words_for_bits)
        .ok_or(DeserializeError::Inconsistent(what))
}

/// Reads a length prefix and rejects it if it exceeds `limit`.
pub(crate) fn read_len(
    reader: &mut impl Read,
    limit: usize,
    what: &'static str,
) -> Result<usize, DeserializeError> {
    let len = read_usize(reader)?;
    if len > limit {
        return Err(DeserializeError::Inconsistent(what));
    }
    Ok(len)
}
