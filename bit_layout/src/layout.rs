//! Planning the placement of several packed arrays inside one word allocation.
//!
//! A [`BitLayout`] is a cursor that hands out non-overlapping [`LayoutElement`] descriptors. Once
//! all fields are reserved, [`BitLayout::size_in_words`] gives the length of the backing
//! allocation and each descriptor turns into a [`PackedView`] or [`PackedViewMut`] over it.
use crate::bits::{read_bits, words_for_bits, write_bits};

/// Cursor used to reserve consecutive fields of a single allocation.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct BitLayout {
    cursor: usize,
}

/// Descriptor of an array of equally sized fields inside a layout.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct LayoutElement {
    /// Bit offset of the first field relative to the start of the allocation.
    pub bit_offset: usize,
    /// Total number of bits covered by the array.
    pub bit_size: usize,
    /// Width of every field in bits.
    pub element_width: u32,
    /// Number of fields.
    pub len: usize,
}

impl BitLayout {
    /// Creates an empty layout.
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Reserves `count` natively sized elements of `byte_size` bytes each, starting at the next
    /// multiple of `align` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use bit_layout::BitLayout;
    /// let mut layout = BitLayout::new();
    /// let packed = layout.bit_packed_elements(3, 5);
    /// let aligned = layout.aligned_elements(8, 8, 1);
    /// assert_eq!(packed.bit_offset, 0);
    /// assert_eq!(aligned.bit_offset, 64);
    /// assert_eq!(layout.size_in_words(), 2);
    /// ```
    pub fn aligned_elements(
        &mut self,
        align: usize,
        byte_size: usize,
        count: usize,
    ) -> LayoutElement {
        assert!(align.is_power_of_two());
        let align_bits = align * 8;
        self.cursor = self.cursor.next_multiple_of(align_bits);
        self.reserve((byte_size * 8) as u32, count)
    }

    /// Reserves `count` fields of `width` bits directly after the previous reservation.
    pub fn bit_packed_elements(&mut self, width: u32, count: usize) -> LayoutElement {
        self.reserve(width, count)
    }

    fn reserve(&mut self, width: u32, count: usize) -> LayoutElement {
        let element = LayoutElement {
            bit_offset: self.cursor,
            bit_size: width as usize * count,
            element_width: width,
            len: count,
        };
        self.cursor += element.bit_size;
        element
    }

    /// Number of bits reserved so far, including alignment padding.
    pub fn size_in_bits(&self) -> usize {
        self.cursor
    }

    /// Number of `u64` words needed to hold every reserved field.
    pub fn size_in_words(&self) -> usize {
        words_for_bits(self.cursor)
    }
}

impl LayoutElement {
    /// Returns a read-only view of this array inside `words`.
    ///
    /// Panics if `words` is too short to contain the array.
    #[inline]
    pub fn view<'a>(&self, words: &'a [u64]) -> PackedView<'a> {
        assert!(words_for_bits(self.bit_offset + self.bit_size) <= words.len());
        PackedView {
            words,
            element: *self,
        }
    }

    /// Returns a mutable view of this array inside `words`.
    ///
    /// Panics if `words` is too short to contain the array.
    #[inline]
    pub fn view_mut<'a>(&self, words: &'a mut [u64]) -> PackedViewMut<'a> {
        assert!(words_for_bits(self.bit_offset + self.bit_size) <= words.len());
        PackedViewMut {
            words,
            element: *self,
        }
    }

    #[inline(always)]
    fn field_offset(&self, index: usize) -> usize {
        assert!(
            index < self.len,
            "index {index} out of bounds for packed array of length {}",
            self.len
        );
        self.bit_offset + index * self.element_width as usize
    }
}

/// Read-only accessor for a packed array described by a [`LayoutElement`].
#[derive(Clone, Copy)]
pub struct PackedView<'a> {
    words: &'a [u64],
    element: LayoutElement,
}

impl<'a> PackedView<'a> {
    /// Number of fields.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.element.len
    }

    /// Returns `true` when the array has no fields.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.element.len == 0
    }

    /// Reads field `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        read_bits(self.words, self.element.field_offset(index), self.element.element_width)
    }

    /// Iterates over all fields in order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + 'a {
        let view = *self;
        (0..view.len()).map(move |index| view.get(index))
    }
}

/// Mutable accessor for a packed array described by a [`LayoutElement`].
pub struct PackedViewMut<'a> {
    words: &'a mut [u64],
    element: LayoutElement,
}

impl PackedViewMut<'_> {
    /// Number of fields.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.element.len
    }

    /// Returns `true` when the array has no fields.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.element.len == 0
    }

    /// Reads field `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u64 {
        read_bits(self.words, self.element.field_offset(index), self.element.element_width)
    }

    /// Overwrites field `index`.
    ///
    /// Panics if `value` does not fit the field width.
    #[inline]
    pub fn set(&mut self, index: usize, value: u64) {
        let width = self.element.element_width;
        assert!(
            crate::bits::significant_bits(value) <= width,
            "value {value} does not fit into {width} bits"
        );
        write_bits(self.words, self.element.field_offset(index), width, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_fields_do_not_overlap() {
        let mut layout = BitLayout::new();
        let header = layout.aligned_elements(8, 8, 1);
        let quotients = layout.bit_packed_elements(7, 10);
        let values = layout.bit_packed_elements(13, 10);
        assert_eq!(header.bit_offset, 0);
        assert_eq!(quotients.bit_offset, 64);
        assert_eq!(values.bit_offset, 64 + 70);
        assert_eq!(layout.size_in_bits(), 64 + 70 + 130);
        assert_eq!(layout.size_in_words(), 5);

        let mut words = vec![0; layout.size_in_words()];
        header.view_mut(&mut words).set(0, u64::MAX);
        for i in 0..10 {
            quotients.view_mut(&mut words).set(i, (i as u64 * 37) % 128);
            values.view_mut(&mut words).set(i, 8191 - i as u64);
        }
        assert_eq!(header.view(&words).get(0), u64::MAX);
        let stored: Vec<u64> = quotients.view(&words).iter().collect();
        assert_eq!(stored, (0..10).map(|i| (i * 37) % 128).collect::<Vec<u64>>());
        let stored: Vec<u64> = values.view(&words).iter().collect();
        assert_eq!(stored, (0..10).map(|i| 8191 - i).collect::<Vec<u64>>());
    }

    #[test]
    fn alignment_pads_the_cursor() {
        let mut layout = BitLayout::new();
        layout.bit_packed_elements(1, 3);
        let bytes = layout.aligned_elements(1, 1, 2);
        assert_eq!(bytes.bit_offset, 8);
        let words = layout.aligned_elements(8, 8, 1);
        assert_eq!(words.bit_offset, 64);
        assert_eq!(layout.size_in_words(), 2);
    }

    #[test]
    fn zero_width_arrays_take_no_space() {
        let mut layout = BitLayout::new();
        let empty = layout.bit_packed_elements(0, 100);
        assert_eq!(layout.size_in_words(), 0);
        assert_eq!(empty.view(&[]).get(99), 0);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_index_panics() {
        let mut layout = BitLayout::new();
        let element = layout.bit_packed_elements(4, 2);
        let words = [0; 1];
        element.view(&words).get(2);
    }
}
