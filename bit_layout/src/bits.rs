//! Reading and writing bit fields inside slices of `u64` words.

/// Number of bits in a storage word.
pub const WORD_BITS: usize = u64::BITS as usize;

/// Returns the number of bits needed to represent `value`, counting `0` as needing one bit.
///
/// # Examples
///
/// ```
/// use bit_layout::bits_for;
/// assert_eq!(bits_for(0), 1);
/// assert_eq!(bits_for(1), 1);
/// assert_eq!(bits_for(255), 8);
/// assert_eq!(bits_for(256), 9);
/// ```
#[inline(always)]
pub const fn bits_for(value: u64) -> u32 {
    if value == 0 {
        1
    } else {
        u64::BITS - value.leading_zeros()
    }
}

/// Returns the number of bits up to and including the most significant set bit of `value`.
///
/// Unlike [`bits_for`] this returns `0` for `0`, which makes it suitable for fields that may have
/// zero width.
#[inline(always)]
pub const fn significant_bits(value: u64) -> u32 {
    u64::BITS - value.leading_zeros()
}

/// Returns a mask with the low `width` bits set.
#[inline(always)]
pub const fn mask(width: u32) -> u64 {
    if width >= u64::BITS {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// Returns the number of words needed to hold `bits` bits.
#[inline(always)]
pub const fn words_for_bits(bits: usize) -> usize {
    bits.div_ceil(WORD_BITS)
}

/// Reads the `width` bit field starting at `bit_offset`.
///
/// Panics if the field extends past the end of `words`.
#[inline]
pub fn read_bits(words: &[u64], bit_offset: usize, width: u32) -> u64 {
    debug_assert!(width <= u64::BITS);
    if width == 0 {
        return 0;
    }
    let word = bit_offset / WORD_BITS;
    let shift = bit_offset % WORD_BITS;
    let mut value = words[word] >> shift;
    let taken = WORD_BITS - shift;
    if taken < width as usize {
        value |= words[word + 1] << taken;
    }
    value & mask(width)
}

/// Overwrites the `width` bit field starting at `bit_offset` with `value`.
///
/// Bits of `value` above `width` must be zero. Panics if the field extends past the end of
/// `words`.
#[inline]
pub fn write_bits(words: &mut [u64], bit_offset: usize, width: u32, value: u64) {
    debug_assert!(width <= u64::BITS);
    debug_assert!(value & !mask(width) == 0, "value {value} exceeds width {width}");
    if width == 0 {
        return;
    }
    let word = bit_offset / WORD_BITS;
    let shift = bit_offset % WORD_BITS;
    let field = mask(width);
    words[word] = (words[word] & !(field << shift)) | (value << shift);
    let taken = WORD_BITS - shift;
    if taken < width as usize {
        let high = mask(width - taken as u32);
        words[word + 1] = (words[word + 1] & !high) | (value >> taken);
    }
}
