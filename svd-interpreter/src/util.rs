//! Methods for reading files and interpreting user input

use std::{io, path};

use fs_err as fs;
use log::debug;

use crate::error::{Error, ParseIntLiteralError};

/// Magic bytes at the start of an `.xz` container
const XZ_MAGIC: [u8; 6] = [0xFD, b'7', b'z', b'X', b'Z', 0x00];

fn is_compressed(path: &path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("lzma") || ext.eq_ignore_ascii_case("xz"))
}

/// Decompress an `.xz` or legacy `.lzma` stream, picking the format by its magic bytes
pub(crate) fn decompress(bytes: &[u8]) -> Result<Vec<u8>, lzma_rs::error::Error> {
    let mut input = io::BufReader::new(bytes);
    let mut output = Vec::new();
    if bytes.starts_with(&XZ_MAGIC) {
        lzma_rs::xz_decompress(&mut input, &mut output)?;
    } else {
        lzma_rs::lzma_decompress(&mut input, &mut output)?;
    }
    Ok(output)
}

/// Returns the text contents of an SVD file at `path`
///
/// Files with an `.lzma` or `.xz` extension are decompressed first.
pub fn read_svd_source(path: &path::Path) -> Result<String, Error> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.to_owned()),
        _ => Error::Io(e),
    })?;
    let bytes = if is_compressed(path) {
        let decompressed = decompress(&bytes).map_err(|source| Error::Decompress {
            path: path.to_owned(),
            source,
        })?;
        debug!(
            "decompressed {} bytes into {} bytes from {}",
            bytes.len(),
            decompressed.len(),
            path.display()
        );
        decompressed
    } else {
        bytes
    };
    String::from_utf8(bytes).map_err(|e| Error::Utf8(path.to_owned(), e))
}

/// Splits an unsigned literal into its radix and bare digits
///
/// `_` may separate digits and may follow a radix prefix, but never twice in a row. Decimal
/// literals other than zero cannot have leading zeros.
fn split_literal(text: &str) -> Option<(u32, String)> {
    let (radix, body) = match text.get(..2).map(str::to_ascii_lowercase).as_deref() {
        Some("0x") => (16, &text[2..]),
        Some("0o") => (8, &text[2..]),
        Some("0b") => (2, &text[2..]),
        _ => (10, text),
    };
    let body = if radix == 10 {
        body
    } else {
        body.strip_prefix('_').unwrap_or(body)
    };
    let well_formed = !body.is_empty()
        && !body.starts_with('_')
        && !body.ends_with('_')
        && !body.contains("__")
        && body.chars().all(|c| c == '_' || c.is_digit(radix));
    if !well_formed {
        return None;
    }
    let digits: String = body.chars().filter(|c| *c != '_').collect();
    if radix == 10 && digits.starts_with('0') && digits.chars().any(|c| c != '0') {
        return None;
    }
    Some((radix, digits))
}

/// Parses an integer literal the way a user would type it on the command line
///
/// Accepts decimal, or hexadecimal, octal and binary with a `0x`, `0o` or `0b` prefix
/// respectively. Prefixes are case-insensitive and `_` may be used to separate digits.
pub fn parse_int_literal(text: &str) -> Result<u64, ParseIntLiteralError> {
    let text = text.trim();
    let (radix, digits) = split_literal(text.strip_prefix('+').unwrap_or(text))
        .ok_or_else(|| ParseIntLiteralError::Invalid(text.to_owned()))?;
    Ok(u64::from_str_radix(&digits, radix)?)
}

/// Like [`parse_int_literal`], but also accepts a leading `-`
pub fn parse_signed_int_literal(text: &str) -> Result<i128, ParseIntLiteralError> {
    let text = text.trim();
    let (negative, magnitude) = match text.strip_prefix('-') {
        Some(magnitude) => (true, magnitude),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) =
        split_literal(magnitude).ok_or_else(|| ParseIntLiteralError::Invalid(text.to_owned()))?;
    let value = i128::from_str_radix(&digits, radix)?;
    Ok(if negative { -value } else { value })
}

#[test]
fn parse_int_literal_works() {
    assert_eq!(parse_int_literal("42"), Ok(42));
    assert_eq!(parse_int_literal(" +7 "), Ok(7));
    assert_eq!(parse_int_literal("0"), Ok(0));
    assert_eq!(parse_int_literal("00"), Ok(0));
    assert_eq!(parse_int_literal("0x40000000"), Ok(0x4000_0000));
    assert_eq!(parse_int_literal("0XFF"), Ok(0xFF));
    assert_eq!(parse_int_literal("0b1010"), Ok(0b1010));
    assert_eq!(parse_int_literal("0o17"), Ok(0o17));
    assert_eq!(parse_int_literal("0x4000_0004"), Ok(0x4000_0004));
    assert_eq!(parse_int_literal("0x_ff"), Ok(0xff));
    assert_eq!(parse_int_literal("1_000"), Ok(1000));
    assert!(parse_int_literal("TIMER0.CTRL").is_err());
    assert!(parse_int_literal("0x").is_err());
    assert!(parse_int_literal("").is_err());
    assert!(parse_int_literal("-1").is_err());
}

#[test]
fn parse_int_literal_rejects_malformed_literals() {
    for text in ["0x+5", "0x-5", "+-1", "010", "1__0", "_1", "1_", "0x__1", "0b102", "1 0"] {
        assert_eq!(
            parse_int_literal(text),
            Err(ParseIntLiteralError::Invalid(text.to_owned())),
            "{text:?}"
        );
    }
    assert!(matches!(
        parse_int_literal("0x1_0000_0000_0000_0000"),
        Err(ParseIntLiteralError::Int(_))
    ));
}

#[test]
fn parse_signed_int_literal_works() {
    assert_eq!(parse_signed_int_literal("-1"), Ok(-1));
    assert_eq!(parse_signed_int_literal("-0x10"), Ok(-16));
    assert_eq!(parse_signed_int_literal("+3"), Ok(3));
    assert_eq!(
        parse_signed_int_literal("0x1_0000_0000_0000_0000"),
        Ok(1 << 64)
    );
    assert!(parse_signed_int_literal("--1").is_err());
    assert!(parse_signed_int_literal("-+1").is_err());
}

#[test]
fn decompress_handles_both_containers() {
    let text = b"<device><name>X</name></device>";

    let mut lzma = Vec::new();
    lzma_rs::lzma_compress(&mut io::BufReader::new(&text[..]), &mut lzma).unwrap();
    assert_eq!(decompress(&lzma).unwrap(), text);

    let mut xz = Vec::new();
    lzma_rs::xz_compress(&mut io::BufReader::new(&text[..]), &mut xz).unwrap();
    assert!(xz.starts_with(&XZ_MAGIC));
    assert_eq!(decompress(&xz).unwrap(), text);
}

#[test]
fn compressed_extensions_are_detected() {
    assert!(is_compressed(path::Path::new("dev.svd.lzma")));
    assert!(is_compressed(path::Path::new("dev.svd.XZ")));
    assert!(!is_compressed(path::Path::new("dev.svd")));
}
