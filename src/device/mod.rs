//! Small drivers for specific chips, built only on the [`Connection`]
//! read/write contract.
//!
//! [`Connection`]: crate::Connection

pub mod bmp;
pub mod s35390a;
