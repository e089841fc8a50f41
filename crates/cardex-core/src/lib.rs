//! Core types and trait definitions for the cardex catalog pipeline.
//!
//! This crate has no HTTP or database dependencies.
//! The store backend, the upstream client, and the engines all depend on it.

pub mod card;
pub mod enrichment;
pub mod error;
pub mod language;
pub mod merge;
pub mod pricing;
pub mod set;
pub mod source;
pub mod store;

pub use error::{Error, Result};
pub use language::Language;
