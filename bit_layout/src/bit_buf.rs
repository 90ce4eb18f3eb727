//! Growable bit stream with Elias-gamma codes.
use crate::bits::{mask, read_bits, words_for_bits, write_bits, WORD_BITS};

/// Growable sequence of bits stored in `u64` words, least significant bit first.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct BitBuf {
    words: Vec<u64>,
    len: usize,
}

/// Returns the length in bits of the Elias-gamma code for `value`.
///
/// Panics if `value` is zero, which has no gamma code.
#[inline]
pub fn gamma_len(value: u64) -> usize {
    assert!(value != 0, "elias-gamma codes start at 1");
    let magnitude = (u64::BITS - 1 - value.leading_zeros()) as usize;
    2 * magnitude + 1
}

impl BitBuf {
    /// Creates an empty bit stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassembles a stream of `len` bits from its raw words.
    ///
    /// Returns `None` if the word count does not match or padding bits are set.
    pub fn from_words(words: Vec<u64>, len: usize) -> Option<Self> {
        if words.len() != words_for_bits(len) {
            return None;
        }
        let tail = len % WORD_BITS;
        if tail != 0 && words.last().is_some_and(|&word| word & !mask(tail as u32) != 0) {
            return None;
        }
        Some(Self { words, len })
    }

    /// Number of bits in the stream.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the stream has no bits.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The raw backing words. Bits past [`len`](BitBuf::len) are zero.
    pub fn as_words(&self) -> &[u64] {
        &self.words
    }

    /// Heap memory used by the backing buffer in bytes.
    pub fn heap_size(&self) -> usize {
        self.words.capacity() * std::mem::size_of::<u64>()
    }

    /// Reads the bit at `pos`.
    #[inline]
    pub fn bit(&self, pos: usize) -> bool {
        assert!(pos < self.len);
        self.words[pos / WORD_BITS] >> (pos % WORD_BITS) & 1 != 0
    }

    /// Reads `width` bits starting at `pos`.
    #[inline]
    pub fn read(&self, pos: usize, width: u32) -> u64 {
        assert!(pos + width as usize <= self.len);
        read_bits(&self.words, pos, width)
    }

    /// Appends the low `width` bits of `value`.
    pub fn push(&mut self, value: u64, width: u32) {
        let new_len = self.len + width as usize;
        self.words.resize(words_for_bits(new_len), 0);
        write_bits(&mut self.words, self.len, width, value & mask(width));
        self.len = new_len;
    }

    /// Appends the Elias-gamma code of `value`, which must be at least 1.
    ///
    /// The code is `n` zero bits followed by the `n + 1` bits of `value` from the most
    /// significant down, where `n = floor(log2(value))`.
    pub fn push_gamma(&mut self, value: u64) {
        let code_len = gamma_len(value);
        let magnitude = code_len / 2;
        self.push(0, magnitude as u32);
        for shift in (0..=magnitude).rev() {
            self.push(value >> shift & 1, 1);
        }
    }

    /// Decodes the Elias-gamma code starting at `pos`.
    ///
    /// Returns the decoded value and the position just after the code, or `None` if the stream
    /// ends inside the code or the code is longer than 64 significant bits.
    pub fn read_gamma(&self, pos: usize) -> Option<(u64, usize)> {
        let mut magnitude = 0;
        loop {
            if pos + magnitude >= self.len || magnitude >= u64::BITS as usize {
                return None;
            }
            if self.bit(pos + magnitude) {
                break;
            }
            magnitude += 1;
        }
        let end = pos + 2 * magnitude + 1;
        if end > self.len {
            return None;
        }
        let mut value = 0u64;
        for cursor in pos + magnitude..end {
            value = value << 1 | self.bit(cursor) as u64;
        }
        Some((value, end))
    }

    /// Replaces the bits in `start..end` with the bits of `replacement`.
    pub fn splice(&mut self, start: usize, end: usize, replacement: &BitBuf) {
        assert!(start <= end && end <= self.len);
        let mut spliced = BitBuf::new();
        spliced.words.reserve(words_for_bits(self.len - (end - start) + replacement.len));
        spliced.extend_from(self, 0, start);
        spliced.extend_from(replacement, 0, replacement.len);
        spliced.extend_from(self, end, self.len);
        *self = spliced;
    }

    fn extend_from(&mut self, other: &BitBuf, start: usize, end: usize) {
        let mut cursor = start;
        while cursor < end {
            let width = (end - cursor).min(WORD_BITS) as u32;
            self.push(other.read(cursor, width), width);
            cursor += width as usize;
        }
    }
}
