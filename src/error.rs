//! Error handling for firmware decoding operations
//!
//! This module re-exports the error types defined in [`crate::common`] so
//! callers can import them from a conventional location.

pub use crate::common::FwError;
pub use crate::common::Result;
