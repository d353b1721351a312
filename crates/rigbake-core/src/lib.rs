//! rigbake core library
//!
//! Common error handling, matrix math and logging setup shared by the
//! scene, export and parser crates.

pub mod error;
pub mod logging;
pub mod math;

pub use error::{Error, Result, ResultExt};
pub use math::{format_float, quantize, safe_inverse, Inverse};
