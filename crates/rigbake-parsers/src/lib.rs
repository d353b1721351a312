//! rigbake-parsers
//!
//! Readers for the files rigbake writes.
//!
//! | Format | Extension | Description |
//! |--------|-----------|-------------|
//! | ANIM   | `.anim`   | Skeleton, skinned mesh and sampled clips |
//!
//! # Example
//!
//! ```rust,ignore
//! use rigbake_parsers::{AnimParser, Parser};
//!
//! let asset = AnimParser::new().parse_file("hero.anim".as_ref())?;
//! for issue in asset.validate() {
//!     println!("{issue}");
//! }
//! ```

pub mod anim;
pub mod traits;

pub use anim::{AnimAsset, AnimClip, AnimNode, AnimParser, AnimSummary, AnimTrack, AnimVertex, ValidationIssue};
pub use traits::{ParseError, ParseResult, Parser};
