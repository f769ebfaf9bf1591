//! `Register` is the main primitive of the model. It represents all available metadata for a given
//! register, including the bit fields needed to encode and decode register values.

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};

/// Represents a single memory-mapped I/O register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Register {
    /// Register name, prefixed with the names of any enclosing clusters, e.g., `CH0.CTRL`
    pub name: String,
    pub description: String,
    /// Offset from the base address of the peripheral, including cluster offsets
    pub offset: u64,
    /// Register bit-width
    ///
    /// Cascades from higher levels to register level.
    pub size: u32,
    pub access: Option<Access>,
    /// Register value after reset
    ///
    /// Cascades from higher levels to register level.
    pub reset_value: Option<u64>,
    pub fields: Vec<Field>,
}

impl Register {
    /// Find a field by name, ignoring ASCII case
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name))
    }
}

/// A bit field within a register
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub description: String,
    pub bit_range: BitRange,
    pub access: Option<Access>,
    /// Enumerated values in input order, empty if the field has none
    pub enumerated_values: Vec<EnumeratedValue>,
}

impl Field {
    pub fn has_enumerated_values(&self) -> bool {
        !self.enumerated_values.is_empty()
    }

    /// The entry marked with `isDefault`, covering all values not listed otherwise
    pub fn default_enumerated_value(&self) -> Option<&EnumeratedValue> {
        self.enumerated_values.iter().find(|ev| ev.is_default)
    }

    /// Find the enumerated value describing `value`, falling back to the default entry
    pub fn enumerated_value_for(&self, value: u64) -> Option<&EnumeratedValue> {
        self.enumerated_values
            .iter()
            .find(|ev| ev.value == Some(value))
            .or_else(|| self.default_enumerated_value())
    }
}

/// Position of a field within its register
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitRange {
    /// Position of the least significant bit
    pub offset: u32,
    /// Number of bits, at least one
    pub width: u32,
}

impl BitRange {
    pub const fn new(offset: u32, width: u32) -> Self {
        Self { offset, width }
    }

    /// Construct from most and least significant bit positions, both inclusive
    pub const fn from_msb_lsb(msb: u32, lsb: u32) -> Self {
        Self {
            offset: lsb,
            width: msb - lsb + 1,
        }
    }

    /// Position of the most significant bit
    pub const fn msb(&self) -> u32 {
        self.offset + self.width - 1
    }

    /// Largest value representable by the field
    pub const fn max_value(&self) -> u64 {
        if self.width >= u64::BITS {
            u64::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// Mask selecting the field's bits within the register
    pub const fn mask(&self) -> u64 {
        self.max_value() << self.offset
    }

    /// `msb:lsb`, or just `lsb` for single-bit fields
    pub fn bits_str(&self) -> String {
        if self.width > 1 {
            format!("{}:{}", self.msb(), self.offset)
        } else {
            self.offset.to_string()
        }
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.bits_str())
    }
}

/// A named value of a field, as listed under `enumeratedValues`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumeratedValue {
    pub name: String,
    pub description: Option<String>,
    /// The value as written in the input, e.g., `0x1`. Empty for the default entry.
    pub raw_value: String,
    /// Parsed value, `None` for the default entry or if the value could not be interpreted
    pub value: Option<u64>,
    /// Whether this entry applies to all values not listed otherwise
    pub is_default: bool,
}

impl EnumeratedValue {
    /// The value as written in the input, or `default` for the default entry
    pub fn label(&self) -> &str {
        if self.raw_value.is_empty() && self.is_default {
            "default"
        } else {
            &self.raw_value
        }
    }
}

impl fmt::Display for EnumeratedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{}: {desc}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Software access rights e.g., read-only or read-write, as defined by
/// CMSIS-SVD `accessType`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display, IntoStaticStr)]
pub enum Access {
    #[strum(serialize = "read-only")]
    ReadOnly,
    #[strum(serialize = "write-only")]
    WriteOnly,
    #[strum(serialize = "read-write")]
    ReadWrite,
    #[strum(serialize = "writeOnce")]
    WriteOnce,
    #[strum(serialize = "read-writeOnce")]
    ReadWriteOnce,
}

#[test]
fn bit_range_formats() {
    assert_eq!(BitRange::new(4, 3).to_string(), "[6:4]");
    assert_eq!(BitRange::new(7, 1).to_string(), "[7]");
    assert_eq!(BitRange::new(7, 1).bits_str(), "7");
    assert_eq!(BitRange::from_msb_lsb(15, 8), BitRange::new(8, 8));
}

#[test]
fn bit_range_masks() {
    assert_eq!(BitRange::new(0, 1).mask(), 0b1);
    assert_eq!(BitRange::new(4, 3).mask(), 0b111_0000);
    assert_eq!(BitRange::new(4, 3).max_value(), 7);
    assert_eq!(BitRange::new(0, 64).mask(), u64::MAX);
    assert_eq!(BitRange::new(32, 32).mask(), 0xffff_ffff_0000_0000);
}

#[test]
fn access_round_trips_svd_strings() {
    use std::str::FromStr;

    assert_eq!(Access::from_str("read-writeOnce"), Ok(Access::ReadWriteOnce));
    assert_eq!(Access::ReadOnly.to_string(), "read-only");
    assert!(Access::from_str("rw").is_err());
}

#[test]
fn enumerated_value_lookup_prefers_exact_match() {
    let ev = |name: &str, value: Option<u64>, is_default| EnumeratedValue {
        name: name.to_owned(),
        description: None,
        raw_value: value.map(|v| v.to_string()).unwrap_or_default(),
        value,
        is_default,
    };
    let field = Field {
        name: "MODE".to_owned(),
        description: String::new(),
        bit_range: BitRange::new(0, 2),
        access: None,
        enumerated_values: vec![ev("OTHER", None, true), ev("FAST", Some(1), false)],
    };
    assert_eq!(field.enumerated_value_for(1).map(|e| e.name.as_str()), Some("FAST"));
    assert_eq!(field.enumerated_value_for(3).map(|e| e.name.as_str()), Some("OTHER"));
    assert_eq!(field.enumerated_values[0].label(), "default");
    assert_eq!(field.enumerated_values[1].label(), "1");
}
