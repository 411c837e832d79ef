//! Dropbatch Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the dropbatch workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Types**: The discount record model and its normalization
//!
//! # Example
//!
//! ```no_run
//! use dropbatch_common::{Result, types::{transform, RawDiscount}};
//!
//! fn normalize() -> Result<()> {
//!     let raw = RawDiscount::new("spring", "10.5");
//!     let discount = transform(&raw)?;
//!     assert_eq!(discount.name, "SPRING");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{DropbatchError, Result};
