//! Offline retrieval over marker-delimited bibliographic collections.
//!
//! The pipeline is: [`document`] parses records, [`analyzer`] normalizes their
//! text, [`build`] funnels analyzed records into an [`index::IndexWriter`],
//! [`query::QueryEngine`] ranks documents with a [`scoring::ScoringModel`], and
//! [`eval`] scores the rankings against relevance judgments.

pub mod analyzer;
pub mod build;
pub mod config;
pub mod document;
pub mod error;
pub mod eval;
pub mod index;
pub mod persist;
pub mod query;
pub mod run;
pub mod scoring;

pub use analyzer::{Analyzer, AnalyzerConfig};
pub use document::{Document, Field, ParseError};
pub use error::{IrError, Result};
pub use index::*;
pub use query::{Query, QueryEngine, QuerySyntaxError, RankedResult};
pub use scoring::ScoringModel;
