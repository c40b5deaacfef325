//! Defines the fixed-width integer, field and share types the online phase
//! computes over

mod composite;
mod macros;
mod modulus;
mod share;

pub use composite::*;
pub use modulus::*;
pub use share::*;
