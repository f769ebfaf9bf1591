//! In-memory representation of a CMSIS-SVD device: peripherals, registers and their bit fields.

mod addr;
mod device;
mod register;

// Anything that's part of the public API of the submodules is also part of the public API of model
pub use addr::*;
pub use device::*;
pub use register::*;
