//! CMSIS-SVD frontend: turns an SVD XML document into a [`Device`]
//!
//! Parsing is best-effort. Missing or malformed scalar properties fall back to defaults with a
//! warning, while structural problems such as malformed bit ranges are reported as errors with
//! their position in the input.

use std::str::FromStr;

use itertools::Itertools;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use roxmltree::Document;

use crate::{
    error::{Error, PositionalError, SvdParseError},
    model::{
        make_addr, Access, BitRange, Cpu, Device, EnumeratedValue, Field, MakeAddrError,
        Peripheral, Register,
    },
};

/// Register size used when neither the register nor any of its parents define one
const DEFAULT_REGISTER_SIZE: u32 = 32;

struct XmlNode<'a, 'input>(pub roxmltree::Node<'a, 'input>);

trait IntoXmlNode<'a, 'input> {
    fn into_xml_node(self) -> XmlNode<'a, 'input>;
}

impl<'a, 'input> IntoXmlNode<'a, 'input> for roxmltree::Node<'a, 'input> {
    fn into_xml_node(self) -> XmlNode<'a, 'input> {
        XmlNode(self)
    }
}

impl<'a, 'input> XmlNode<'a, 'input> {
    fn tag(&self) -> &str {
        self.0.tag_name().name()
    }

    /// Returns the trimmed text of the first child named `tag`, if it has any text
    fn maybe_find_text_by_tag_name(&self, tag: &str) -> Option<(&'a str, XmlNode<'a, 'input>)> {
        self.0
            .children()
            .find(|n| n.has_tag_name(tag))
            .and_then(|n| {
                n.text()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| (s, n.into_xml_node()))
            })
    }

    fn text(&self, tag: &str) -> Option<String> {
        self.maybe_find_text_by_tag_name(tag)
            .map(|(s, _)| s.to_owned())
    }

    fn text_or(&self, tag: &str, default: &str) -> String {
        self.text(tag).unwrap_or_else(|| default.to_owned())
    }

    /// Returns the integer value of the first child named `tag`
    ///
    /// Values that cannot be interpreted are reported and treated as missing.
    fn int(&self, tag: &str) -> Option<u64> {
        self.maybe_find_text_by_tag_name(tag)
            .and_then(|(s, _)| match parse_nonneg_int(s) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("{e} in <{tag}> of <{}>, ignoring the value", self.tag());
                    None
                }
            })
    }

    fn int_or(&self, tag: &str, default: u64) -> u64 {
        self.int(tag).unwrap_or(default)
    }

    fn access(&self) -> Option<Access> {
        self.maybe_find_text_by_tag_name("access")
            .and_then(|(s, _)| match Access::from_str(s) {
                Ok(access) => Some(access),
                Err(_) => {
                    warn!("invalid access type {s:?} in <{}>, ignoring the value", self.tag());
                    None
                }
            })
    }

    fn first_child(&self, tag: &str) -> Option<XmlNode<'a, 'input>> {
        self.0
            .children()
            .find(|n| n.has_tag_name(tag))
            .map(IntoXmlNode::into_xml_node)
    }

    fn children_with_tag_name(&self, tag: &str) -> Vec<XmlNode<'a, 'input>> {
        self.0
            .children()
            .filter(|n| n.has_tag_name(tag))
            .map(IntoXmlNode::into_xml_node)
            .collect_vec()
    }
}

/// Add text position information to an [`SvdParseError`] converting it into a [`PositionalError`]
fn err_with_pos(e: impl Into<SvdParseError>, node: &XmlNode) -> PositionalError<SvdParseError> {
    e.into()
        .with_byte_pos_range(node.0.range(), node.0.document())
}

/// Returns the appropriate multiplier for given character
fn binary_size_mult_from_char(c: char) -> Option<u64> {
    match c {
        'k' | 'K' => Some(1024),
        'm' | 'M' => Some(1024 * 1024),
        'g' | 'G' => Some(1024 * 1024 * 1024),
        't' | 'T' => Some(1024 * 1024 * 1024 * 1024),
        _ => None,
    }
}

#[test]
fn binary_size_mult_from_char_works() {
    assert_eq!(binary_size_mult_from_char('k'), Some(1024));
    assert_eq!(binary_size_mult_from_char('M'), Some(1024 * 1024));
    assert_eq!(binary_size_mult_from_char('g'), Some(1024 * 1024 * 1024));
    assert_eq!(
        binary_size_mult_from_char('t'),
        Some(1024 * 1024 * 1024 * 1024)
    );
    assert_eq!(binary_size_mult_from_char('x'), None);
}

lazy_static! {
    /// Regular expression to capture hexadecimal numbers, as defined in CMSIS-SVD schema
    static ref HEX_NONNEG_INT_RE: Regex = Regex::new(
        r"(?x)              # insignificant whitespace
        ^\+?                # zero or one plus sign
        (?:0x|0X|\#)        # hexadecimal prefix
        ([[:xdigit:]]+)     # one or more hexadecimal digits (captured as #1)
        [[:space:]]?        # zero or one of whitespace
        ([kmgtKMGT])?$      # zero or one of kilo, mega, giga, tera identifier (captured as #2)
    ").unwrap();

    /// Regular expression to capture binary numbers
    static ref BIN_NONNEG_INT_RE: Regex = Regex::new(
        r"(?x)
        ^\+?
        0[bB]               # binary prefix
        ([01]+)$            # one or more binary digits (captured as #1)
    ").unwrap();

    /// Regular expression to capture decimal numbers, as defined in CMSIS-SVD schema
    static ref DEC_NONNEG_INT_RE: Regex = Regex::new(
        r"(?x)
        ^\+?
        ([[:digit:]]+)      # one or more decimal digits (captured as #1)
        [[:space:]]?
        ([kmgtKMGT])?$      # zero or one of kilo, mega, giga, tera identifier (captured as #2)
    ").unwrap();

    /// Bit range in the form `[msb:lsb]`
    static ref BIT_RANGE_RE: Regex =
        Regex::new(r"^\[?\s*([[:digit:]]+)\s*:\s*([[:digit:]]+)\s*\]?$").unwrap();

    static ref DIM_INDEX_NUMBERED_RE: Regex =
        Regex::new(r"^(?P<start>[0-9]+)\s*-\s*(?P<end>[0-9]+)$").unwrap();
    static ref DIM_INDEX_LETTERED_RE: Regex =
        Regex::new(r"^(?P<start>[A-Z])\s*-\s*(?P<end>[A-Z])$").unwrap();
    static ref DIM_INDEX_LISTED_RE: Regex =
        Regex::new(r"^[_0-9a-zA-Z]+(\s*,\s*[_0-9a-zA-Z]+)*$").unwrap();
}

/// Parses a scaled non-negative integer from `text`
///
/// This implementation is format aware and uses regex to ensure correct behavior.
pub(crate) fn parse_nonneg_int(text: &str) -> Result<u64, SvdParseError> {
    let invalid = || SvdParseError::InvalidNonnegInt(text.to_owned());

    // Pick the format based on which fits
    let (number, size_mult) = if let Some(captures) = HEX_NONNEG_INT_RE.captures(text) {
        let number = u64::from_str_radix(&captures[1], 16).map_err(|_| invalid())?;
        (number, captures.get(2))
    } else if let Some(captures) = BIN_NONNEG_INT_RE.captures(text) {
        let number = u64::from_str_radix(&captures[1], 2).map_err(|_| invalid())?;
        (number, None)
    } else if let Some(captures) = DEC_NONNEG_INT_RE.captures(text) {
        let number = captures[1].parse::<u64>().map_err(|_| invalid())?;
        (number, captures.get(2))
    } else {
        return Err(invalid());
    };

    match size_mult
        .and_then(|m| m.as_str().chars().next())
        .and_then(binary_size_mult_from_char)
    {
        Some(mult) => number.checked_mul(mult).ok_or_else(invalid),
        None => Ok(number),
    }
}

#[test]
fn parse_nonneg_int_works() {
    assert_eq!(parse_nonneg_int("0xFFB00000").unwrap(), 0xFFB0_0000);
    assert_eq!(parse_nonneg_int("+0xFFB00000").unwrap(), 0xFFB0_0000);
    assert_eq!(parse_nonneg_int("#FFB00000").unwrap(), 0xFFB0_0000);
    assert_eq!(parse_nonneg_int("0b101").unwrap(), 0b101);
    assert_eq!(parse_nonneg_int("42").unwrap(), 42);
    assert_eq!(parse_nonneg_int("1 k").unwrap(), 1024);
    assert_eq!(parse_nonneg_int("0x2K").unwrap(), 2048);
    assert_eq!(parse_nonneg_int("437260288").unwrap(), 437_260_288);
    assert!(parse_nonneg_int("0x12zz").is_err());
    assert!(parse_nonneg_int("-4").is_err());
    assert!(parse_nonneg_int("0xFFFFFFFFFFFFFFFFF").is_err());
}

/// Parses the value of an `enumeratedValue`
///
/// Unlike other integers, a `#` prefix here denotes a binary number. Binary values with
/// don't-care bits (`x`) cannot be represented and are rejected.
fn parse_enumerated_value(text: &str) -> Result<u64, SvdParseError> {
    match text.strip_prefix('#') {
        Some(bits) => {
            u64::from_str_radix(bits, 2).map_err(|_| SvdParseError::InvalidNonnegInt(text.into()))
        }
        None => parse_nonneg_int(text),
    }
}

#[test]
fn parse_enumerated_value_treats_hash_as_binary() {
    assert_eq!(parse_enumerated_value("#101"), Ok(0b101));
    assert_eq!(parse_enumerated_value("0x3"), Ok(3));
    assert_eq!(parse_enumerated_value("2"), Ok(2));
    assert!(parse_enumerated_value("#1x1").is_err());
}

/// Parses a bit range of the form `[msb:lsb]`
fn parse_bit_range(text: &str) -> Result<BitRange, SvdParseError> {
    let invalid = || SvdParseError::InvalidBitRange(text.to_owned());
    let captures = BIT_RANGE_RE.captures(text).ok_or_else(invalid)?;
    let msb: u32 = captures[1].parse().map_err(|_| invalid())?;
    let lsb: u32 = captures[2].parse().map_err(|_| invalid())?;
    if msb < lsb {
        return Err(SvdParseError::ReversedBitRange { msb, lsb });
    }
    Ok(BitRange::from_msb_lsb(msb, lsb))
}

#[test]
fn parse_bit_range_works() {
    assert_eq!(parse_bit_range("[7:0]"), Ok(BitRange::new(0, 8)));
    assert_eq!(parse_bit_range("[ 3 : 3 ]"), Ok(BitRange::new(3, 1)));
    assert_eq!(parse_bit_range("31:16"), Ok(BitRange::new(16, 16)));
    assert_eq!(
        parse_bit_range("[0:7]"),
        Err(SvdParseError::ReversedBitRange { msb: 0, lsb: 7 })
    );
    assert!(parse_bit_range("[7-0]").is_err());
}

/// Largest number of elements accepted in a single `dim` array
const MAX_DIM: u64 = 1 << 16;

/// Parses a `dimIndex` into the names of the first `dim` array elements
///
/// Only `dim` names are generated, however wide a numbered range is.
fn parse_dim_index(text: &str, dim: u64) -> Result<Vec<String>, SvdParseError> {
    let invalid = || SvdParseError::InvalidDimIndex(text.to_owned());
    let take = usize::try_from(dim).map_err(|_| invalid())?;
    let indices: Vec<String> = if let Some(captures) = DIM_INDEX_NUMBERED_RE.captures(text) {
        let start: u64 = captures["start"].parse().map_err(|_| invalid())?;
        let end: u64 = captures["end"].parse().map_err(|_| invalid())?;
        (start..=end).take(take).map(|i| i.to_string()).collect()
    } else if let Some(captures) = DIM_INDEX_LETTERED_RE.captures(text) {
        // Safety: the regex captures exactly one character for both ends
        let start = captures["start"].chars().next().ok_or_else(invalid)?;
        let end = captures["end"].chars().next().ok_or_else(invalid)?;
        (start..=end).take(take).map(|c| c.to_string()).collect()
    } else if DIM_INDEX_LISTED_RE.is_match(text) {
        text.split(',')
            .take(take)
            .map(|s| s.trim().to_owned())
            .collect()
    } else {
        return Err(invalid());
    };
    if indices.len() < take {
        return Err(SvdParseError::DimIndexTooShort {
            index: text.to_owned(),
            dim,
        });
    }
    Ok(indices)
}

#[test]
fn parse_dim_index_works() {
    assert_eq!(parse_dim_index("0-3", 4).unwrap(), ["0", "1", "2", "3"]);
    assert_eq!(parse_dim_index("A-C", 3).unwrap(), ["A", "B", "C"]);
    assert_eq!(parse_dim_index("tx, rx", 2).unwrap(), ["tx", "rx"]);
    assert_eq!(parse_dim_index("solo", 1).unwrap(), ["solo"]);
    assert!(parse_dim_index("0-A", 1).is_err());
}

#[test]
fn parse_dim_index_takes_only_dim_entries() {
    assert_eq!(parse_dim_index("0-3", 2).unwrap(), ["0", "1"]);
    assert_eq!(
        parse_dim_index("0-18446744073709551615", 2).unwrap(),
        ["0", "1"]
    );
    assert_eq!(
        parse_dim_index("A-B", 3),
        Err(SvdParseError::DimIndexTooShort {
            index: "A-B".to_owned(),
            dim: 3
        })
    );
    assert!(matches!(
        parse_dim_index("5-2", 1),
        Err(SvdParseError::DimIndexTooShort { .. })
    ));
}

/// Replaces the `%s` placeholder of an array element's name with its index
fn expand_dim_name(name: &str, index: &str) -> String {
    if name.contains("[%s]") {
        name.replace("[%s]", index)
    } else if name.contains("%s") {
        name.replace("%s", index)
    } else {
        format!("{name}{index}")
    }
}

#[test]
fn expand_dim_name_works() {
    assert_eq!(expand_dim_name("CCR[%s]", "2"), "CCR2");
    assert_eq!(expand_dim_name("CH%s_CTRL", "A"), "CHA_CTRL");
    assert_eq!(expand_dim_name("BUF", "0"), "BUF0");
}

/// Array properties of a register or cluster
struct DimElement {
    increment: u64,
    /// One entry per element
    indices: Vec<String>,
}

impl DimElement {
    fn try_from_node(node: &XmlNode) -> Result<Option<Self>, PositionalError<SvdParseError>> {
        let Some(dim) = node.int("dim") else {
            return Ok(None);
        };
        if dim > MAX_DIM {
            return Err(err_with_pos(
                SvdParseError::DimTooLarge { dim, max: MAX_DIM },
                node,
            ));
        }
        let increment = node.int_or("dimIncrement", 0);
        let indices = match node.maybe_find_text_by_tag_name("dimIndex") {
            Some((text, index_node)) => {
                parse_dim_index(text, dim).map_err(|e| err_with_pos(e, &index_node))?
            }
            None => (0..dim).map(|i| i.to_string()).collect(),
        };
        Ok(Some(Self { increment, indices }))
    }

    /// Name and offset of each element, starting from `name` and `offset` of the declaration
    fn elements(&self, name: &str, offset: u64) -> Vec<(String, Option<u64>)> {
        self.indices
            .iter()
            .enumerate()
            .map(|(i, index)| {
                let offset = (i as u64)
                    .checked_mul(self.increment)
                    .and_then(|step| offset.checked_add(step));
                (expand_dim_name(name, index), offset)
            })
            .collect()
    }
}

/// Register properties that cascade from device to peripheral to cluster to register
#[derive(Clone, Default)]
struct RegPropGroupBuilder {
    /// Register bit-width.
    size: Option<u32>,
    /// Register access rights.
    access: Option<Access>,
    /// Register value after reset.
    reset_value: Option<u64>,
}

impl RegPropGroupBuilder {
    /// Returns a new [`RegPropGroupBuilder`] with applicable properties from `node`
    fn from_node(node: &XmlNode) -> Self {
        let mut properties = Self::default();
        properties.update_from_node(node);
        properties
    }

    /// Inherit properties from parent and update with current node's properties if defined.
    fn clone_and_update_from_node(&self, node: &XmlNode) -> Self {
        let mut properties = self.clone();
        properties.update_from_node(node);
        properties
    }

    /// Update properties for this [`RegPropGroupBuilder`] where present
    ///
    /// Updates the following properties from `node`:
    ///
    /// * size
    /// * access
    /// * resetValue
    fn update_from_node(&mut self, node: &XmlNode) {
        if let Some(size) = node.int("size") {
            match u32::try_from(size) {
                Ok(size) if size > 0 => self.size = Some(size),
                _ => warn!("invalid register size {size} in <{}>, ignoring", node.tag()),
            }
        }
        if let Some(access) = node.access() {
            self.access = Some(access);
        }
        if let Some(reset_value) = node.int("resetValue") {
            self.reset_value = Some(reset_value);
        }
    }
}

/// The peripheral or cluster enclosing a register
struct RegisterParent {
    /// Name prefix formed by enclosing clusters, e.g., `CH0.`
    prefix: String,
    /// Offset of the enclosing cluster from the peripheral base address
    offset: u64,
    properties: RegPropGroupBuilder,
}

impl RegisterParent {
    fn for_peripheral(properties: RegPropGroupBuilder) -> Self {
        Self {
            prefix: String::new(),
            offset: 0,
            properties,
        }
    }

    fn qualify(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    /// Resolve the offset of an item from the peripheral base address
    ///
    /// `offset` is `None` if computing the offset of an array element already overflowed.
    fn resolve_offset(
        &self,
        name: &str,
        offset: Option<u64>,
        node: &XmlNode,
    ) -> Result<u64, PositionalError<SvdParseError>> {
        let src = match offset {
            Some(offset) => vec![self.offset, offset],
            None => vec![self.offset],
        };
        let result = match offset {
            Some(_) => make_addr(&src, Some(name.to_owned())),
            None => Err(MakeAddrError {
                src,
                id: Some(name.to_owned()),
            }),
        };
        result.map_err(|inner| {
            err_with_pos(
                SvdParseError::ResolveAddr {
                    reg_name: name.to_owned(),
                    inner,
                },
                node,
            )
        })
    }
}

fn process_enumerated_value(node: &XmlNode) -> Option<EnumeratedValue> {
    let name = node.text("name")?;
    let description = node.text("description");
    let is_default = node
        .text("isDefault")
        .is_some_and(|s| s == "true" || s == "1");
    match node.text("value") {
        Some(raw_value) => {
            let value = match parse_enumerated_value(&raw_value) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("{e} for enumerated value {name:?}, it can only be matched by name");
                    None
                }
            };
            Some(EnumeratedValue {
                name,
                description,
                raw_value,
                value,
                is_default,
            })
        }
        None if is_default => Some(EnumeratedValue {
            name,
            description,
            raw_value: String::new(),
            value: None,
            is_default,
        }),
        None => {
            debug!("enumerated value {name:?} has no value, skipping");
            None
        }
    }
}

fn bit_range_from_node(
    node: &XmlNode,
    name: &str,
) -> Result<BitRange, PositionalError<SvdParseError>> {
    let (offset, width) = if let Some((text, range_node)) =
        node.maybe_find_text_by_tag_name("bitRange")
    {
        let range = parse_bit_range(text).map_err(|e| err_with_pos(e, &range_node))?;
        (u64::from(range.offset), u64::from(range.width))
    } else if let (Some(lsb), Some(msb)) = (node.int("lsb"), node.int("msb")) {
        if msb < lsb {
            return Err(err_with_pos(
                SvdParseError::ReversedBitRange {
                    msb: u32::try_from(msb).unwrap_or(u32::MAX),
                    lsb: u32::try_from(lsb).unwrap_or(u32::MAX),
                },
                node,
            ));
        }
        (lsb, msb - lsb + 1)
    } else {
        (node.int_or("bitOffset", 0), node.int_or("bitWidth", 1))
    };

    if width == 0 {
        return Err(err_with_pos(
            SvdParseError::ZeroWidthField(name.to_owned()),
            node,
        ));
    }
    if offset.saturating_add(width) > u64::from(u64::BITS) {
        return Err(err_with_pos(
            SvdParseError::FieldTooWide {
                name: name.to_owned(),
                offset: u32::try_from(offset).unwrap_or(u32::MAX),
                width: u32::try_from(width).unwrap_or(u32::MAX),
            },
            node,
        ));
    }
    // Both fit in 64 bits as checked above
    Ok(BitRange::new(offset as u32, width as u32))
}

fn process_field(node: &XmlNode) -> Result<Field, PositionalError<SvdParseError>> {
    let name = node.text_or("name", "");
    let bit_range = bit_range_from_node(node, &name)?;
    let enumerated_values = node
        .children_with_tag_name("enumeratedValues")
        .iter()
        .flat_map(|values| values.children_with_tag_name("enumeratedValue"))
        .filter_map(|value| process_enumerated_value(&value))
        .collect_vec();
    Ok(Field {
        description: node.text_or("description", ""),
        bit_range,
        access: node.access(),
        enumerated_values,
        name,
    })
}

fn process_register(
    parent: &RegisterParent,
    register_node: &XmlNode,
) -> Result<Vec<Register>, PositionalError<SvdParseError>> {
    let name = register_node.text_or("name", "");
    let description = register_node.text_or("description", "");
    let address_offset = register_node.int_or("addressOffset", 0);
    let properties = parent.properties.clone_and_update_from_node(register_node);
    let fields = match register_node.first_child("fields") {
        Some(fields_node) => fields_node
            .children_with_tag_name("field")
            .iter()
            .map(process_field)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let elements = match DimElement::try_from_node(register_node)? {
        // Found a list or an array of registers
        Some(dim) => dim.elements(&name, address_offset),
        // Found a single register
        None => vec![(name, Some(address_offset))],
    };

    elements
        .into_iter()
        .map(|(name, offset)| {
            let name = parent.qualify(&name);
            let offset = parent.resolve_offset(&name, offset, register_node)?;
            Ok(Register {
                name,
                description: description.clone(),
                offset,
                size: properties.size.unwrap_or(DEFAULT_REGISTER_SIZE),
                access: properties.access,
                reset_value: properties.reset_value,
                fields: fields.clone(),
            })
        })
        .collect()
}

fn process_cluster(
    parent: &RegisterParent,
    cluster_node: &XmlNode,
) -> Result<Vec<Register>, PositionalError<SvdParseError>> {
    let name = cluster_node.text_or("name", "");
    let address_offset = cluster_node.int_or("addressOffset", 0);
    let properties = parent.properties.clone_and_update_from_node(cluster_node);

    let elements = match DimElement::try_from_node(cluster_node)? {
        Some(dim) => dim.elements(&name, address_offset),
        None => vec![(name, Some(address_offset))],
    };

    let mut registers = Vec::new();
    for (name, offset) in elements {
        let name = parent.qualify(&name);
        let current_parent = RegisterParent {
            offset: parent.resolve_offset(&name, offset, cluster_node)?,
            prefix: format!("{name}."),
            properties: properties.clone(),
        };
        registers.extend(process_register_block(&current_parent, cluster_node)?);
    }
    Ok(registers)
}

/// Process the `register` and `cluster` children of a `registers` or `cluster` node in input
/// order
fn process_register_block(
    parent: &RegisterParent,
    block_node: &XmlNode,
) -> Result<Vec<Register>, PositionalError<SvdParseError>> {
    let mut registers = Vec::new();
    for child in block_node.0.children().filter(roxmltree::Node::is_element) {
        let child = child.into_xml_node();
        match child.tag() {
            "register" => registers.extend(process_register(parent, &child)?),
            "cluster" => registers.extend(process_cluster(parent, &child)?),
            _ => {}
        }
    }
    Ok(registers)
}

fn process_peripheral(
    periph_node: &XmlNode,
    device_properties: &RegPropGroupBuilder,
    preceding: &[Peripheral],
) -> Result<Peripheral, PositionalError<SvdParseError>> {
    let name = periph_node.text_or("name", "");
    let properties = device_properties.clone_and_update_from_node(periph_node);
    let registers = match periph_node.first_child("registers") {
        Some(registers_node) => process_register_block(
            &RegisterParent::for_peripheral(properties),
            &registers_node,
        )?,
        None => Vec::new(),
    };

    let mut periph = Peripheral {
        description: periph_node.text_or("description", ""),
        base_address: periph_node.int_or("baseAddress", 0),
        group_name: periph_node.text("groupName"),
        derived_from: periph_node
            .0
            .attribute("derivedFrom")
            .map(|s| s.trim().to_owned()),
        registers,
        name,
    };

    if let Some(base_name) = &periph.derived_from {
        match preceding.iter().find(|p| &p.name == base_name) {
            Some(base) => {
                if periph.registers.is_empty() {
                    periph.registers = base.registers.clone();
                }
                if periph.description.is_empty() {
                    periph.description = base.description.clone();
                }
                if periph.group_name.is_none() {
                    periph.group_name = base.group_name.clone();
                }
            }
            None => warn!(
                "peripheral {} is derived from unknown peripheral {base_name}, no registers were inherited",
                periph.name
            ),
        }
    }

    // Every register must have a representable absolute address
    for reg in &periph.registers {
        let id = format!("{}.{}", periph.name, reg.name);
        make_addr(&[periph.base_address, reg.offset], Some(id.clone())).map_err(|inner| {
            err_with_pos(
                SvdParseError::ResolveAddr {
                    reg_name: id,
                    inner,
                },
                periph_node,
            )
        })?;
    }

    Ok(periph)
}

fn process_cpu(cpu_node: &XmlNode) -> Cpu {
    Cpu {
        name: cpu_node.text_or("name", ""),
        revision: cpu_node.text_or("revision", ""),
        endian: cpu_node.text_or("endian", ""),
        mpu_present: cpu_node.text_or("mpuPresent", ""),
        fpu_present: cpu_node.text_or("fpuPresent", ""),
        nvic_prio_bits: cpu_node.text_or("nvicPrioBits", ""),
        vendor_systick: cpu_node.text_or("vendorSystickConfig", ""),
    }
}

fn process_device(device_node: &XmlNode) -> Result<Device, PositionalError<SvdParseError>> {
    let properties = RegPropGroupBuilder::from_node(device_node);

    let mut peripherals: Vec<Peripheral> = Vec::new();
    if let Some(peripherals_node) = device_node.first_child("peripherals") {
        for periph_node in peripherals_node.children_with_tag_name("peripheral") {
            let periph = process_peripheral(&periph_node, &properties, &peripherals)?;
            peripherals.push(periph);
        }
    } else {
        warn!("device has no <peripherals> element");
    }

    let device = Device {
        name: device_node.text_or("name", "Unknown"),
        vendor: device_node.text_or("vendor", ""),
        version: device_node.text_or("version", ""),
        description: device_node.text_or("description", ""),
        cpu: device_node.first_child("cpu").map(|cpu| process_cpu(&cpu)),
        address_unit_bits: device_node.int_or("addressUnitBits", 8),
        width: device_node.int_or("width", 32),
        peripherals,
    };
    info!(
        "Found {} peripherals with {} registers in device {}",
        device.peripherals.len(),
        device
            .peripherals
            .iter()
            .map(|p| p.registers.len())
            .sum::<usize>(),
        device.name
    );
    Ok(device)
}

/// Parse an SVD document held in memory
pub(crate) fn parse_svd(svd_xml: &str) -> Result<Device, Error> {
    let parsed = Document::parse(svd_xml)?;
    let root = parsed.root_element().into_xml_node();
    if root.tag() != "device" {
        warn!(
            "expected <device> as the root element, found <{}>; continuing anyway",
            root.tag()
        );
    }
    Ok(process_device(&root)?)
}

#[cfg(test)]
mod tests {
    use indoc::{formatdoc, indoc};

    use super::*;
    use crate::{error::Position, test_data};

    fn parse_err(svd: &str) -> PositionalError<SvdParseError> {
        match parse_svd(svd) {
            Err(Error::SvdParse(e)) => e,
            other => panic!("expected a positional parse error, got {other:?}"),
        }
    }

    #[test]
    fn device_info_is_read() {
        let device = test_data::device();
        assert_eq!(device.name, "ACME1");
        assert_eq!(device.vendor, "Acme");
        assert_eq!(device.version, "1.2");
        assert_eq!(device.address_unit_bits, 8);
        assert_eq!(device.width, 32);
        let cpu = device.cpu.as_ref().unwrap();
        assert_eq!(cpu.name, "CM4");
        assert_eq!(cpu.vendor_systick, "false");
        assert_eq!(
            device.peripherals.iter().map(|p| p.name.as_str()).collect_vec(),
            ["TIMER0", "TIMER1", "UART0", "GPIO"]
        );
    }

    #[test]
    fn missing_device_properties_get_defaults() {
        let device = parse_svd("<device><peripherals/></device>").unwrap();
        assert_eq!(device.name, "Unknown");
        assert_eq!(device.vendor, "");
        assert_eq!(device.address_unit_bits, 8);
        assert_eq!(device.width, 32);
        assert!(device.cpu.is_none());
        assert!(device.peripherals.is_empty());
    }

    #[test]
    fn register_properties_cascade() {
        let device = test_data::device();
        let ctrl = device.find_register("TIMER0", "CTRL").unwrap().register;
        assert_eq!(ctrl.size, 32);
        assert_eq!(ctrl.access, Some(Access::ReadWrite));
        assert_eq!(ctrl.reset_value, Some(0x10));

        let status = device.find_register("TIMER0", "STATUS").unwrap().register;
        assert_eq!(status.access, Some(Access::ReadOnly));
        assert_eq!(status.reset_value, None);

        // Peripheral size applies unless the register overrides it
        let uart = device.peripheral("UART0").unwrap();
        assert_eq!(uart.register("DATA").unwrap().size, 8);
        assert_eq!(uart.register("TX_FIFO").unwrap().size, 16);

        let gpio = device.find_register("GPIO", "OUT").unwrap().register;
        assert_eq!(gpio.reset_value, Some(0xFFFF));
    }

    #[test]
    fn fields_accept_every_bit_range_style() {
        let device = test_data::device();
        let ctrl = device.find_register("TIMER0", "CTRL").unwrap().register;
        assert_eq!(ctrl.field("ENABLE").unwrap().bit_range, BitRange::new(0, 1));
        assert_eq!(ctrl.field("MODE").unwrap().bit_range, BitRange::new(1, 2));
        assert_eq!(ctrl.field("PRESCALE").unwrap().bit_range, BitRange::new(4, 4));

        let mode = ctrl.field("MODE").unwrap();
        assert_eq!(mode.enumerated_values.len(), 3);
        assert_eq!(mode.enumerated_values[2].raw_value, "0x2");
        assert_eq!(mode.enumerated_values[2].value, Some(2));
        assert_eq!(
            mode.enumerated_values[0].description.as_deref(),
            Some("Stop at zero")
        );
    }

    #[test]
    fn derived_peripheral_inherits_registers() {
        let device = test_data::device();
        let timer1 = device.peripheral("TIMER1").unwrap();
        assert_eq!(timer1.derived_from.as_deref(), Some("TIMER0"));
        assert_eq!(timer1.description, "Timer 0");
        assert_eq!(timer1.group_name.as_deref(), Some("TIMER"));
        assert_eq!(
            timer1.registers.iter().map(|r| r.name.as_str()).collect_vec(),
            ["CTRL", "STATUS", "COUNT"]
        );
        assert_eq!(
            device.find_register("TIMER1", "COUNT").unwrap().address(),
            0x4000_1008
        );
    }

    #[test]
    fn clusters_and_arrays_are_expanded_in_order() {
        let device = test_data::device();
        let uart = device.peripheral("UART0").unwrap();
        assert_eq!(
            uart.registers
                .iter()
                .map(|r| (r.name.as_str(), r.offset))
                .collect_vec(),
            [
                ("DATA", 0x0),
                ("CH0.CFG", 0x24),
                ("CH1.CFG", 0x34),
                ("TX_FIFO", 0x8),
                ("RX_FIFO", 0xc)
            ]
        );
    }

    #[test]
    fn invalid_integers_fall_back_to_defaults() {
        let device = parse_svd(indoc! {"
            <device>
              <width>wide</width>
              <peripherals>
                <peripheral>
                  <name>P</name>
                  <baseAddress>0x1000</baseAddress>
                  <registers>
                    <register>
                      <name>R</name>
                      <addressOffset>bogus</addressOffset>
                      <access>sometimes</access>
                    </register>
                  </registers>
                </peripheral>
              </peripherals>
            </device>
        "})
        .unwrap();
        assert_eq!(device.width, 32);
        let reg = device.find_register("P", "R").unwrap();
        assert_eq!(reg.address(), 0x1000);
        assert_eq!(reg.register.access, None);
    }

    #[test]
    fn reversed_bit_range_reports_position() {
        let err = parse_err(indoc! {"
            <device>
              <peripherals>
                <peripheral>
                  <name>P</name>
                  <registers>
                    <register>
                      <name>R</name>
                      <fields>
                        <field>
                          <name>F</name>
                          <bitRange>[0:3]</bitRange>
                        </field>
                      </fields>
                    </register>
                  </registers>
                </peripheral>
              </peripherals>
            </device>
        "});
        assert_eq!(
            err.inner(),
            &SvdParseError::ReversedBitRange { msb: 0, lsb: 3 }
        );
        assert!(matches!(err.position(), Position::Line { line: 11, .. }));
    }

    #[test]
    fn oversized_field_is_rejected() {
        let err = parse_err(indoc! {"
            <device>
              <peripherals>
                <peripheral>
                  <name>P</name>
                  <registers>
                    <register>
                      <name>R</name>
                      <fields>
                        <field>
                          <name>F</name>
                          <bitOffset>60</bitOffset>
                          <bitWidth>8</bitWidth>
                        </field>
                      </fields>
                    </register>
                  </registers>
                </peripheral>
              </peripherals>
            </device>
        "});
        assert_eq!(
            err.inner(),
            &SvdParseError::FieldTooWide {
                name: "F".to_owned(),
                offset: 60,
                width: 8
            }
        );
    }

    #[test]
    fn address_overflow_is_rejected() {
        let err = parse_err(indoc! {"
            <device>
              <peripherals>
                <peripheral>
                  <name>P</name>
                  <baseAddress>0xFFFFFFFFFFFFFFFF</baseAddress>
                  <registers>
                    <register>
                      <name>R</name>
                      <addressOffset>0x4</addressOffset>
                    </register>
                  </registers>
                </peripheral>
              </peripherals>
            </device>
        "});
        assert!(matches!(
            err.inner(),
            SvdParseError::ResolveAddr { reg_name, .. } if reg_name == "P.R"
        ));
    }

    fn register_array(dim: &str, dim_index: &str) -> String {
        formatdoc! {"
            <device>
              <peripherals>
                <peripheral>
                  <name>P</name>
                  <baseAddress>0x1000</baseAddress>
                  <registers>
                    <register>
                      <name>R%s</name>
                      <addressOffset>0x0</addressOffset>
                      <dim>{dim}</dim>
                      <dimIncrement>4</dimIncrement>
                      {dim_index}
                    </register>
                  </registers>
                </peripheral>
              </peripherals>
            </device>
        "}
    }

    #[test]
    fn wide_dim_index_range_expands_only_dim_elements() {
        let svd = register_array("2", "<dimIndex>0-18446744073709551615</dimIndex>");
        let device = parse_svd(&svd).unwrap();
        let names = device
            .registers()
            .map(|r| (r.path(), r.address()))
            .collect_vec();
        assert_eq!(
            names,
            [("P.R0".to_owned(), 0x1000), ("P.R1".to_owned(), 0x1004)]
        );
    }

    #[test]
    fn huge_dim_is_rejected() {
        let err = parse_err(&register_array("0x100000000", ""));
        assert_eq!(
            err.inner(),
            &SvdParseError::DimTooLarge {
                dim: 0x1_0000_0000,
                max: MAX_DIM
            }
        );
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_svd("<device><name>X</device>"),
            Err(Error::Xml(_))
        ));
    }
}
