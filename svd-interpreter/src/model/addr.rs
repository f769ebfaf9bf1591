use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("overflow: could not make components {src:#x?} into a 64-bit address, id: {id:?}")]
pub struct MakeAddrError {
    /// Source offsets for the address
    pub(crate) src: Vec<u64>,
    /// Optional identifier
    pub(crate) id: Option<String>,
}

/// Construct an address from given offsets
///
/// Validates that the components can be added together without overflowing the 64-bit address
/// space.
///
/// # Arguments
///
/// * `offsets` - List of offsets to use to form the address, e.g., base, cluster, register
/// * `id`  - Optional address identifier for debug and tracing purposes
pub(crate) fn make_addr(offsets: &[u64], id: Option<String>) -> Result<u64, MakeAddrError> {
    offsets
        .iter()
        .try_fold(0u64, |acc, x| acc.checked_add(*x))
        .ok_or_else(|| MakeAddrError {
            src: offsets.to_vec(),
            id,
        })
}

/// Format an address or offset the way it is shown to users, e.g., `0x40000004`
#[must_use]
pub fn hex(value: u64) -> String {
    format!("{value:#x}")
}

#[test]
fn make_addr_works() {
    assert_eq!(make_addr(&[0x4000_0000, 0x10, 0x4], None), Ok(0x4000_0014));
    assert_eq!(make_addr(&[], None), Ok(0));
    assert_eq!(
        make_addr(&[u64::MAX, 1], Some("P.R".to_owned())),
        Err(MakeAddrError {
            src: vec![u64::MAX, 1],
            id: Some("P.R".to_owned())
        })
    );
}

#[test]
fn hex_matches_lowercase_prefixed_form() {
    assert_eq!(hex(0), "0x0");
    assert_eq!(hex(0x4000_1C00), "0x40001c00");
}
