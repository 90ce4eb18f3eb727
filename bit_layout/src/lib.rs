//! Bit-level building blocks for compact data structures.
//!
//! Everything in this crate stores its data as plain `u64` words. Fields of arbitrary bit width
//! are addressed by bit offset and may straddle word boundaries. The owning structure is always
//! the only path to the words, so accessors are bounds-checked views instead of raw pointers.
pub mod bit_buf;
pub mod bits;
pub mod int_vec;
pub mod layout;

pub use bit_buf::BitBuf;
pub use bits::{bits_for, mask, significant_bits, words_for_bits};
pub use int_vec::IntVec;
pub use layout::{BitLayout, LayoutElement, PackedView, PackedViewMut};
