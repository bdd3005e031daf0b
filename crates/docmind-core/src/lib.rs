//! docmind-core - Core types and traits for the docmind engine
//!
//! This crate provides the domain model, component traits, error taxonomy,
//! and configuration shared by the ingestion and query pipelines.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{DocmindError, Result};
pub use traits::*;
pub use types::*;
