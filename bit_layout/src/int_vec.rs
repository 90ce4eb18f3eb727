//! Packed vector of unsigned integers with a runtime-chosen bit width.
use std::fmt;

use crate::bits::{mask, read_bits, significant_bits, words_for_bits, write_bits};

/// Vector of unsigned integers, each stored in exactly [`width`](IntVec::width) bits.
///
/// The width is fixed per instance. Storing a wider value requires an explicit [`widen`] which
/// rebuilds the vector into a fresh buffer.
///
/// [`widen`]: IntVec::widen
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IntVec {
    words: Vec<u64>,
    width: u32,
    len: usize,
}

impl fmt::Debug for IntVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl IntVec {
    /// Creates an empty vector with elements of `width` bits.
    pub fn new(width: u32) -> Self {
        assert!(width <= u64::BITS);
        Self {
            words: vec![],
            width,
            len: 0,
        }
    }

    /// Creates a vector of `len` elements of `width` bits, all set to `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bit_layout::IntVec;
    /// let mut vec = IntVec::filled(100, 3, 5);
    /// vec.set(7, 2);
    /// assert_eq!(vec.get(6), 5);
    /// assert_eq!(vec.get(7), 2);
    /// assert_eq!(vec.as_words().len(), 5);
    /// ```
    pub fn filled(len: usize, width: u32, value: u64) -> Self {
        let mut vec = Self::new(width);
        vec.words = vec![0; words_for_bits(len * width as usize)];
        vec.len = len;
        if value != 0 {
            for index in 0..len {
                vec.set(index, value);
            }
        }
        vec
    }

    /// Creates a vector of `len` zero elements of `width` bits.
    pub fn zeroed(len: usize, width: u32) -> Self {
        Self::filled(len, width, 0)
    }

    /// Reassembles a vector from its raw words.
    ///
    /// Returns `None` if the number of words does not match `len` and `width` or if any padding
    /// bit past the last element is set.
    pub fn from_words(words: Vec<u64>, width: u32, len: usize) -> Option<Self> {
        if width > u64::BITS {
            return None;
        }
        let bits = len.checked_mul(width as usize)?;
        if words.len() != words_for_bits(bits) {
            return None;
        }
        let tail = bits % 64;
        if tail != 0 && words.last().is_some_and(|&word| word & !mask(tail as u32) != 0) {
            return None;
        }
        Some(Self { words, width, len })
    }

    /// Number of elements.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the vector has no elements.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width of each element in bits.
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Largest value an element can hold.
    #[inline(always)]
    pub fn max_value(&self) -> u64 {
        mask(self.width)
    }

    /// Reads element `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        assert!(index < self.len, "index {index} out of bounds for length {}", self.len);
        read_bits(&self.words, index * self.width as usize, self.width)
    }

    /// Overwrites element `index`.
    ///
    /// Panics if `value` needs more than [`width`](IntVec::width) bits.
    #[inline]
    pub fn set(&mut self, index: usize, value: u64) {
        assert!(index < self.len, "index {index} out of bounds for length {}", self.len);
        assert!(
            significant_bits(value) <= self.width,
            "value {value} does not fit into {} bits",
            self.width
        );
        write_bits(&mut self.words, index * self.width as usize, self.width, value);
    }

    /// Appends an element.
    pub fn push(&mut self, value: u64) {
        let bits = (self.len + 1) * self.width as usize;
        if words_for_bits(bits) > self.words.len() {
            self.words.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, value);
    }

    /// Rebuilds the vector with elements of `new_width` bits, preserving all values.
    ///
    /// Panics if `new_width` is smaller than the current width.
    pub fn widen(&mut self, new_width: u32) {
        assert!(new_width >= self.width && new_width <= u64::BITS);
        if new_width == self.width {
            return;
        }
        let mut wider = Self::zeroed(self.len, new_width);
        for (index, value) in self.iter().enumerate() {
            wider.set(index, value);
        }
        *self = wider;
    }

    /// Iterates over all elements in order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len).map(|index| self.get(index))
    }

    /// The raw backing words.
    pub fn as_words(&self) -> &[u64] {
        &self.words
    }

    /// Heap memory used by the backing buffer in bytes.
    pub fn heap_size(&self) -> usize {
        self.words.capacity() * std::mem::size_of::<u64>()
    }
}
