//! Bit-level encoding and decoding of register values using field definitions

use std::str::FromStr;

use itertools::Itertools;
use log::debug;

use crate::{
    error::{EncodeError, ParseIntLiteralError},
    model::{hex, BitRange, EnumeratedValue, Field, Register},
    util::{parse_int_literal, parse_signed_int_literal},
};

/// Extract the value of the field at `range` from a register value
#[must_use]
pub const fn extract(value: u64, range: BitRange) -> u64 {
    (value >> range.offset) & range.max_value()
}

/// Returns `value` with the bits at `range` replaced by `field_value`
///
/// Bits of `field_value` that do not fit in the field are discarded.
#[must_use]
pub const fn insert(value: u64, range: BitRange, field_value: u64) -> u64 {
    let mask = range.mask();
    (value & !mask) | ((field_value << range.offset) & mask)
}

/// Format `value` in binary, zero-padded to `width` digits with a `_` between every 4 bits
///
/// Values wider than `width` are printed in full.
pub fn format_binary(value: u64, width: u32) -> String {
    let digits = format!("{value:0width$b}", width = width as usize);
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 4);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 4 == 0 {
            out.push('_');
        }
        out.push(c);
    }
    out
}

/// How a field value relates to the field's enumerated values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumMatch<'a> {
    /// The field has no enumerated values
    NotEnumerated,
    Matched(&'a EnumeratedValue),
    /// The field has enumerated values but none of them describe the value
    Unmatched,
}

/// The value of a single field within a register value
#[derive(Clone, Copy, Debug)]
pub struct DecodedField<'a> {
    pub field: &'a Field,
    pub value: u64,
    pub enum_match: EnumMatch<'a>,
}

impl<'a> DecodedField<'a> {
    pub const UNMATCHED_WARNING: &'static str = "Value does not match any enumerated value";
}

/// Break `value` down into the fields of `register`, most significant field first
pub fn decode(register: &Register, value: u64) -> Vec<DecodedField<'_>> {
    register
        .fields
        .iter()
        .sorted_by_key(|field| std::cmp::Reverse(field.bit_range.offset))
        .map(|field| {
            let field_value = extract(value, field.bit_range);
            let enum_match = if field.has_enumerated_values() {
                field
                    .enumerated_value_for(field_value)
                    .map_or(EnumMatch::Unmatched, EnumMatch::Matched)
            } else {
                EnumMatch::NotEnumerated
            };
            DecodedField {
                field,
                value: field_value,
                enum_match,
            }
        })
        .collect()
}

/// Starting point for [`encode`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseValue {
    Value(u64),
    /// The register's reset value, or zero if it has none
    Reset,
}

impl Default for BaseValue {
    fn default() -> Self {
        Self::Value(0)
    }
}

impl FromStr for BaseValue {
    type Err = ParseIntLiteralError;

    /// `reset` (any case) or an integer literal
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("reset") {
            Ok(Self::Reset)
        } else {
            parse_int_literal(s).map(Self::Value)
        }
    }
}

/// A field assignment that was applied to the register value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedField<'a> {
    pub field: &'a Field,
    pub value: u64,
    /// Name of the enumerated value the assignment referred to, if any
    pub enum_used: Option<&'a str>,
}

/// Result of [`encode`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encoding<'a> {
    pub base: u64,
    pub result: u64,
    pub applied: Vec<AppliedField<'a>>,
    pub errors: Vec<EncodeError>,
    pub warnings: Vec<String>,
}

impl<'a> Encoding<'a> {
    /// Whether every assignment could be applied
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Split `FIELD=VALUE` into its trimmed parts
pub fn parse_assignment(s: &str) -> Option<(String, String)> {
    s.split_once('=')
        .map(|(field, value)| (field.trim().to_owned(), value.trim().to_owned()))
}

#[test]
fn parse_assignment_works() {
    assert_eq!(
        parse_assignment(" MODE = PERIODIC"),
        Some(("MODE".to_owned(), "PERIODIC".to_owned()))
    );
    assert_eq!(
        parse_assignment("A=b=c"),
        Some(("A".to_owned(), "b=c".to_owned()))
    );
    assert_eq!(parse_assignment("ENABLE"), None);
}

/// Interpret the text assigned to `field` as a value for it
///
/// Returns the value and the name of the enumerated value used, if any.
fn resolve_field_value<'a>(
    field: &'a Field,
    text: &str,
) -> Result<(u64, Option<&'a str>), EncodeError> {
    // Enumerated names and their literal values are accepted as they are
    for ev in &field.enumerated_values {
        let by_name = ev.name.eq_ignore_ascii_case(text);
        let by_raw_value = !ev.raw_value.is_empty() && ev.raw_value == text;
        if by_name || by_raw_value {
            if let Some(value) = ev.value {
                return Ok((value, Some(ev.name.as_str())));
            }
        }
    }

    let value = parse_signed_int_literal(text).map_err(|_| EncodeError::InvalidFormat {
        field: field.name.clone(),
        text: text.to_owned(),
    })?;

    let max = field.bit_range.max_value();
    let value = u64::try_from(value)
        .ok()
        .filter(|v| *v <= max)
        .ok_or_else(|| EncodeError::OutOfRange {
            field: field.name.clone(),
            value,
            width: field.bit_range.width,
            max,
        })?;

    if field.has_enumerated_values()
        && field.default_enumerated_value().is_none()
        && !field
            .enumerated_values
            .iter()
            .any(|ev| ev.value == Some(value))
    {
        let valid = field
            .enumerated_values
            .iter()
            .map(|ev| format!("{} ({})", ev.raw_value, ev.name))
            .join(", ");
        return Err(EncodeError::NotEnumerated {
            field: field.name.clone(),
            value,
            valid,
        });
    }

    Ok((value, None))
}

/// Compute a register value from field assignments
///
/// Field names are matched ignoring case. Assigning the same name twice keeps the last value.
/// Problems with individual assignments are collected into [`Encoding::errors`] and the remaining
/// assignments are still applied.
pub fn encode<'a>(
    register: &'a Register,
    base: BaseValue,
    assignments: &[(String, String)],
) -> Encoding<'a> {
    let base = match base {
        BaseValue::Value(value) => value,
        BaseValue::Reset => register.reset_value.unwrap_or(0),
    };

    // Later assignments replace earlier ones but keep their position
    let mut deduped: Vec<(&str, &str)> = Vec::with_capacity(assignments.len());
    for (name, value) in assignments {
        let (name, value) = (name.as_str(), value.as_str());
        match deduped.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => deduped.push((name, value)),
        }
    }

    let mut result = base;
    let mut applied: Vec<AppliedField> = Vec::new();
    let mut errors = Vec::new();

    for (name, text) in deduped {
        let Some(field) = register.field(name) else {
            errors.push(EncodeError::FieldNotFound(name.to_owned()));
            continue;
        };
        match resolve_field_value(field, text) {
            Ok((value, enum_used)) => {
                debug!("{} {} = {value:#x}", field.name, field.bit_range);
                result = insert(result, field.bit_range, value);
                applied.push(AppliedField {
                    field,
                    value,
                    enum_used,
                });
            }
            Err(e) => errors.push(e),
        }
    }

    let warnings = register
        .fields
        .iter()
        .filter(|field| {
            !applied
                .iter()
                .any(|a| a.field.name.eq_ignore_ascii_case(&field.name))
        })
        .filter_map(|field| {
            let value = extract(result, field.bit_range);
            (value != 0).then(|| {
                format!(
                    "{} not specified, using value from base: {value} ({})",
                    field.name,
                    hex(value)
                )
            })
        })
        .collect();

    Encoding {
        base,
        result,
        applied,
        errors,
        warnings,
    }
}
