//! termite-toolkit - client library for the TERMite annotation and DOCStore
//! search services.
//!
//! TERMite tags text and documents with recognized biomedical entities; this
//! crate builds the requests, submits them, and reshapes the returned JSON
//! (any of the three wire shapes TERMite produces) into flat hit records,
//! per-entity summaries, and simple tabular views.

pub mod aggregate;
pub mod docstore;
pub mod error;
pub mod lookup;
pub mod payload;
pub mod table;
pub mod termite;

pub use error::{Result, TermiteError};
