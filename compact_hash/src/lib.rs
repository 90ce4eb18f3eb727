//! Compact hash tables for integer keys.
//!
//! The tables store only the quotient of each hashed key next to a bit-packed value, with
//! field widths that follow the widest key and value inserted so far. Storage of slots and
//! resolution of collisions are pluggable:
//!
//! * [`BucketedStorage`] allocates per group of 64 positions, only for occupied slots, while
//!   [`FlatStorage`] preallocates every slot and marks free ones with a sentinel value.
//! * [`CvIndex`] resolves collisions with two flag bits per position, while
//!   [`DisplacementIndex`] records per-position displacements in a fixed-width, layered or
//!   Elias-gamma coded array.
//!
//! The type aliases below name the usual combinations.
pub mod config;
pub mod error;
pub mod hash;
pub mod index;
mod io;
pub mod map;
pub mod set;
pub mod size_manager;
pub mod storage;

pub use config::TableConfig;
pub use error::{ConfigError, DeserializeError};
pub use hash::{IdentityHash, InvertibleHash, XorShiftMix};
pub use index::{
    CvIndex, DisplacementIndex, EliasGammaDisplacement, FixedDisplacement, IndexStructure,
    LayeredDisplacement,
};
pub use map::CompactHashMap;
pub use set::CompactHashSet;
pub use size_manager::SizeManager;
pub use storage::{BucketedStorage, FlatStorage, Slot, SlotWidths, Storage};

/// Bucketed storage with the flag-bit index.
pub type SparseCvHashMap<H = XorShiftMix> = CompactHashMap<BucketedStorage, CvIndex, H>;
/// Flat storage with the flag-bit index.
pub type PlainCvHashMap<H = XorShiftMix> = CompactHashMap<FlatStorage, CvIndex, H>;
/// Bucketed storage with layered displacements.
pub type SparseDisplacementHashMap<H = XorShiftMix> =
    CompactHashMap<BucketedStorage, DisplacementIndex<LayeredDisplacement>, H>;
/// Flat storage with layered displacements.
pub type PlainDisplacementHashMap<H = XorShiftMix> =
    CompactHashMap<FlatStorage, DisplacementIndex<LayeredDisplacement>, H>;
/// Bucketed storage with Elias-gamma coded displacements.
pub type SparseEliasHashMap<H = XorShiftMix> =
    CompactHashMap<BucketedStorage, DisplacementIndex<EliasGammaDisplacement>, H>;
/// Flat storage with Elias-gamma coded displacements.
pub type PlainEliasHashMap<H = XorShiftMix> =
    CompactHashMap<FlatStorage, DisplacementIndex<EliasGammaDisplacement>, H>;
/// Bucketed storage with fixed-width displacements.
pub type SparseFixedDisplacementHashMap<H = XorShiftMix> =
    CompactHashMap<BucketedStorage, DisplacementIndex<FixedDisplacement>, H>;
/// Flat storage with fixed-width displacements.
pub type PlainFixedDisplacementHashMap<H = XorShiftMix> =
    CompactHashMap<FlatStorage, DisplacementIndex<FixedDisplacement>, H>;
