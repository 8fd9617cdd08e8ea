//! BitField type for the packed flag bytes of a record payload

use serde::{Deserialize, Serialize};

/// One packed flag byte from a record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BitField(pub u8);

impl BitField {
    /// Create a new BitField from a raw byte.
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    /// Check if a specific bit is set.
    pub fn is_set(&self, bit: u8) -> bool {
        bit < 8 && (self.0 & (1 << bit)) != 0
    }

    /// Check if any bit of `mask` is set.
    pub fn has_flag(&self, mask: u8) -> bool {
        (self.0 & mask) != 0
    }

    /// Extract the sub-field selected by `mask`, shifted down to bit 0.
    pub fn field(&self, mask: u8) -> u8 {
        if mask == 0 {
            return 0;
        }
        (self.0 & mask) >> mask.trailing_zeros()
    }

    /// Get the raw byte.
    pub fn value(&self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bits() {
        let bits = BitField::new(0b1000_0101);
        assert!(bits.is_set(0));
        assert!(!bits.is_set(1));
        assert!(bits.is_set(2));
        assert!(bits.is_set(7));
        assert!(!bits.is_set(8));
    }

    #[test]
    fn multi_bit_fields() {
        let bits = BitField::new(0b1101_0100);
        assert_eq!(bits.field(0b0001_1100), 0b101);
        assert_eq!(bits.field(0b1100_0000), 0b11);
        assert_eq!(bits.field(0), 0);
    }
}
