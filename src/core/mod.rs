//! Core types shared across the resolution pipeline.
//!
//! This module is the foundation of the crate's type system. It currently
//! hosts the error taxonomy; the re-exports here are the stable way to name
//! these types from outside the crate.

pub mod error;

pub use error::{ResolveError, Result};
