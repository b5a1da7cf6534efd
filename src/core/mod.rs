//! # Core Wire Components
//!
//! Low-level frame handling for the Votifier v2 wire format.
//!
//! ## Wire Format
//! ```text
//! [Magic(2)] [Length(2), optional] [Envelope JSON(N)]
//! ```
//!
//! ## Security
//! - Frames under 10 bytes are rejected before any parsing
//! - The magic must select protocol 2; no other versions are parsed

pub mod frame;
