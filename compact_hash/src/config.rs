//! Construction parameters shared by every table strategy.
use crate::error::ConfigError;

/// Construction parameters for a compact hash table.
///
/// Parameters that a given storage or index strategy does not use are ignored by it.
#[derive(Clone, Debug, PartialEq)]
pub struct TableConfig {
    /// Initial capacity hint, rounded up to a power of two of at least 2.
    pub capacity: usize,
    /// Fraction of slots that may be occupied before the capacity doubles.
    pub max_load_factor: f32,
    /// Initial key width in bits, widened automatically as larger keys arrive.
    pub key_width: u32,
    /// Initial value width in bits, widened automatically as larger values arrive.
    pub value_width: u32,
    /// Width of each entry of a fixed-width displacement table.
    pub fixed_displacement_width: u32,
    /// Width of the in-line part of a layered displacement table.
    pub layered_displacement_width: u32,
    /// Number of entries per Elias-gamma displacement bucket.
    pub elias_bucket_size: usize,
    /// Derive the Elias-gamma bucket size from the table size instead of using
    /// [`elias_bucket_size`](TableConfig::elias_bucket_size).
    pub elias_growing_buckets: bool,
    /// Value marking a free slot in flat storage; legitimate values must never equal it.
    pub empty_value: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            max_load_factor: 0.5,
            key_width: 1,
            value_width: 1,
            fixed_displacement_width: 32,
            layered_displacement_width: 4,
            elias_bucket_size: 1024,
            elias_growing_buckets: false,
            empty_value: 0,
        }
    }
}

impl TableConfig {
    /// Sets the initial capacity hint.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the maximum load factor.
    pub fn with_max_load_factor(mut self, max_load_factor: f32) -> Self {
        self.max_load_factor = max_load_factor;
        self
    }

    /// Sets the initial key and value widths.
    pub fn with_widths(mut self, key_width: u32, value_width: u32) -> Self {
        self.key_width = key_width;
        self.value_width = value_width;
        self
    }

    /// Sets the width of fixed-width displacement entries.
    pub fn with_fixed_displacement_width(mut self, width: u32) -> Self {
        self.fixed_displacement_width = width;
        self
    }

    /// Sets the in-line width of layered displacement entries.
    pub fn with_layered_displacement_width(mut self, width: u32) -> Self {
        self.layered_displacement_width = width;
        self
    }

    /// Sets the Elias-gamma bucket size and whether it grows with the table.
    pub fn with_elias_buckets(mut self, bucket_size: usize, growing: bool) -> Self {
        self.elias_bucket_size = bucket_size;
        self.elias_growing_buckets = growing;
        self
    }

    /// Sets the flat-storage empty value.
    pub fn with_empty_value(mut self, empty_value: u64) -> Self {
        self.empty_value = empty_value;
        self
    }

    /// Checks every parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_load_factor(self.max_load_factor)?;
        check_width("key", self.key_width, 1, 64)?;
        check_width("value", self.value_width, 0, 64)?;
        check_width("fixed displacement", self.fixed_displacement_width, 1, 63)?;
        check_width("layered displacement", self.layered_displacement_width, 1, 63)?;
        if self.elias_bucket_size == 0 {
            return Err(ConfigError::EliasBucketSize);
        }
        Ok(())
    }
}

/// Accepts load factors in `(0, 1]`, rejecting NaN.
pub fn check_load_factor(max_load_factor: f32) -> Result<f32, ConfigError> {
    if max_load_factor > 0.0 && max_load_factor <= 1.0 {
        Ok(max_load_factor)
    } else {
        Err(ConfigError::LoadFactor(max_load_factor))
    }
}

pub(crate) fn check_width(
    what: &'static str,
    width: u32,
    min: u32,
    max: u32,
) -> Result<u32, ConfigError> {
    if (min..=max).contains(&width) {
        Ok(width)
    } else {
        Err(ConfigError::Width {
            what,
            width,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(TableConfig::default().validate(), Ok(()));
    }

    #[test]
    fn load_factor_bounds() {
        assert!(check_load_factor(1.0).is_ok());
        assert!(check_load_factor(0.01).is_ok());
        assert_eq!(check_load_factor(0.0), Err(ConfigError::LoadFactor(0.0)));
        assert_eq!(check_load_factor(1.5), Err(ConfigError::LoadFactor(1.5)));
        assert!(check_load_factor(f32::NAN).is_err());
        assert!(TableConfig::default()
            .with_max_load_factor(-0.5)
            .validate()
            .is_err());
    }

    #[test]
    fn width_bounds() {
        let config = TableConfig::default().with_layered_displacement_width(64);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Width {
                what: "layered displacement",
                width: 64,
                min: 1,
                max: 63
            })
        );
        assert!(TableConfig::default().with_widths(0, 0).validate().is_err());
        assert!(TableConfig::default().with_widths(64, 0).validate().is_ok());
        assert_eq!(
            TableConfig::default().with_elias_buckets(0, false).validate(),
            Err(ConfigError::EliasBucketSize)
        );
    }
}
