use std::{fmt, ops, path};

use thiserror::Error;

use crate::model::MakeAddrError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SVD file not found: {}", .0.display())]
    NotFound(path::PathBuf),
    #[error("could not read SVD file")]
    Io(#[from] std::io::Error),
    #[error("could not decompress {}: {source}", .path.display())]
    Decompress {
        path: path::PathBuf,
        source: lzma_rs::error::Error,
    },
    #[error("{} does not contain valid UTF-8", .0.display())]
    Utf8(path::PathBuf, #[source] std::string::FromUtf8Error),
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("error while parsing SVD: {0}")]
    SvdParse(#[from] PositionalError<SvdParseError>),
    #[error("error while parsing SVD: {0}")]
    SvdParseFile(#[from] ParseFileError<SvdParseError>),
}

#[derive(Error, Debug)]
#[error("CMSIS-SVD parse error --> {fname}:{err}")]
pub struct ParseFileError<T> {
    fname: String,
    err: PositionalError<T>,
}

impl<T> ParseFileError<T> {
    pub fn inner(&self) -> &T {
        &self.err.err
    }
}

/// Representation of a file position in an error
///
/// Indexes start from 1:1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    Point {
        line: u32,
        col: u32,
    },
    Line {
        line: u32,
        start_col: u32,
        end_col: u32,
    },
    MultiLine {
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    },
}

impl From<ops::Range<roxmltree::TextPos>> for Position {
    fn from(value: ops::Range<roxmltree::TextPos>) -> Self {
        if value.start.row == value.end.row {
            // Same line, same column --> Point
            if value.start.col == value.end.col {
                Position::Point {
                    line: value.start.row,
                    col: value.start.col,
                }
            }
            // Same line but different column --> Line
            else {
                Position::Line {
                    line: value.start.row,
                    start_col: value.start.col,
                    end_col: value.end.col,
                }
            }
        }
        // Starts and ends on different lines --> MultiLine
        else {
            Position::MultiLine {
                start_line: value.start.row,
                start_col: value.start.col,
                end_line: value.end.row,
                end_col: value.end.col,
            }
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Point { line, col } => write!(f, "{line}:{col}"),
            Position::Line {
                line,
                start_col,
                end_col,
            } => write!(f, "{line}:{start_col}-{end_col}"),
            Position::MultiLine {
                start_line,
                start_col,
                end_line,
                end_col,
            } => write!(f, "{start_line}:{start_col}..{end_line}:{end_col}"),
        }
    }
}

#[derive(Error, Debug)]
#[error("{pos}\n{err}")]
pub struct PositionalError<T> {
    pos: Position,
    err: T,
}

impl<T> PositionalError<T> {
    pub(crate) fn with_fname(self, fname: String) -> ParseFileError<T> {
        ParseFileError { fname, err: self }
    }

    pub fn position(&self) -> &Position {
        &self.pos
    }

    pub fn inner(&self) -> &T {
        &self.err
    }
}

/// Error that happened during parsing 'CMSIS-SVD'
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SvdParseError {
    #[error("could not parse nonneg int from {0:?}")]
    InvalidNonnegInt(String),
    #[error("invalid bit range {0:?}, expected the form [msb:lsb]")]
    InvalidBitRange(String),
    #[error("most significant bit {msb} is below least significant bit {lsb}")]
    ReversedBitRange { msb: u32, lsb: u32 },
    #[error("field {name:?} at offset {offset} with width {width} does not fit in 64 bits")]
    FieldTooWide {
        name: String,
        offset: u32,
        width: u32,
    },
    #[error("field {0:?} has zero width")]
    ZeroWidthField(String),
    #[error("invalid dimIndex {0:?}")]
    InvalidDimIndex(String),
    #[error("dim {dim} exceeds the maximum of {max} array elements")]
    DimTooLarge { dim: u64, max: u64 },
    #[error("dimIndex {index:?} has fewer than {dim} entries")]
    DimIndexTooShort { index: String, dim: u64 },
    #[error("could not resolve address of register {reg_name:?}\n{inner}")]
    ResolveAddr {
        reg_name: String,
        inner: MakeAddrError,
    },
}

impl SvdParseError {
    /// Convert into positional error, adding row and column information
    pub(crate) fn with_text_pos_range(
        self,
        pos: ops::Range<roxmltree::TextPos>,
    ) -> PositionalError<SvdParseError> {
        PositionalError {
            pos: pos.into(),
            err: self,
        }
    }

    pub(crate) fn with_byte_pos_range(
        self,
        byte_pos: ops::Range<usize>,
        doc: &roxmltree::Document,
    ) -> PositionalError<SvdParseError> {
        let text_pos = ops::Range {
            start: doc.text_pos_at(byte_pos.start),
            end: doc.text_pos_at(byte_pos.end),
        };
        self.with_text_pos_range(text_pos)
    }
}

/// Error from parsing an integer literal typed by a user
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseIntLiteralError {
    #[error("invalid integer literal {0:?}")]
    Invalid(String),
    #[error(transparent)]
    Int(#[from] std::num::ParseIntError),
}

/// Error from a lookup on a parsed device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("start address {start:#x} must be less than or equal to end address {end:#x}")]
    InvertedRange { start: u64, end: u64 },
    #[error("invalid register {0:?}, expected PERIPHERAL.REGISTER or an address")]
    InvalidRegisterId(String),
}

/// Error from an individual field assignment while encoding a register value
///
/// Collected rather than returned early, so that all problems in an assignment list can be
/// reported together.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Field '{0}' not found in register")]
    FieldNotFound(String),
    #[error("{field}: Value {value} out of range for {width}-bit field (max: {max})")]
    OutOfRange {
        field: String,
        value: i128,
        width: u32,
        max: u64,
    },
    #[error("{field}: Value {value} not in enumerated values. Valid: {valid}")]
    NotEnumerated {
        field: String,
        value: u64,
        valid: String,
    },
    #[error("{field}: Invalid value format: '{text}'")]
    InvalidFormat { field: String, text: String },
}

#[test]
fn position_from_text_range() {
    use roxmltree::TextPos;

    let pos = |r0, c0, r1, c1| Position::from(TextPos::new(r0, c0)..TextPos::new(r1, c1));
    assert_eq!(pos(3, 5, 3, 5).to_string(), "3:5");
    assert_eq!(pos(3, 5, 3, 9).to_string(), "3:5-9");
    assert_eq!(pos(3, 5, 4, 1).to_string(), "3:5..4:1");
}

#[test]
fn encode_errors_render_like_field_diagnostics() {
    assert_eq!(
        EncodeError::FieldNotFound("FOO".to_owned()).to_string(),
        "Field 'FOO' not found in register"
    );
    assert_eq!(
        EncodeError::OutOfRange {
            field: "MODE".to_owned(),
            value: 4,
            width: 2,
            max: 3,
        }
        .to_string(),
        "MODE: Value 4 out of range for 2-bit field (max: 3)"
    );
}
