//! Pinforge-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across pinforge:
//!
//! - **Content addresses**: The opaque identifier a pinning backend returns
//! - **Path Utilities**: Asset base-name derivation and entry filtering
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use pinforge_common::{ContentAddress, Error, Result};
//! use pinforge_common::paths::base_name;
//!
//! let cid = ContentAddress::new("bafybeigdyrzt");
//! assert_eq!(cid.uri_for("a.png"), "ipfs://bafybeigdyrzt/a.png");
//! assert_eq!(base_name("a.png"), "a");
//!
//! fn example() -> Result<()> {
//!     Err(Error::config("missing api key"))
//! }
//! ```

pub mod error;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
