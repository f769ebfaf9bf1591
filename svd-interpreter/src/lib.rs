//! svd-interpreter --- Query CMSIS-SVD device descriptions and encode or decode register values
//! using their bit field definitions.

mod api;
mod codec;
mod error;
mod frontend;
mod lookup;
mod model;
pub mod to_json;
mod util;

#[cfg(test)]
mod test_data;

pub use codec::*;
pub use error::*;
pub use lookup::*;
pub use model::*;
pub use util::{parse_int_literal, read_svd_source};
