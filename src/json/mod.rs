//! JSON Staging Module
//!
//! Turns arbitrary JSON documents into relational tables.
//!
//! # Architecture
//!
//! - `adapter.rs` - Main facade (StagingEngine)
//! - `entity.rs` - Entity detection and type naming rules
//! - `traversal.rs` - Shared document walk (entity arena, relationships)
//! - `flatten.rs` - Object to column flattening
//! - `classifier.rs` - SQL type classification of fields
//! - `schema_inference.rs` - Table schemas from a document
//! - `converter.rs` - Value coercion and statement builders
//! - `insertion.rs` - Three-phase row insertion

mod adapter;
pub mod classifier;
pub mod converter;
pub mod entity;
pub mod flatten;
pub mod insertion;
pub mod schema_inference;
pub mod traversal;

pub use adapter::{ProcessingSummary, StagingEngine, TableSummary};
pub use converter::{quote_ident, CoercionError, JsonToValueConverter};
pub use insertion::{DataInsertionEngine, InsertionReport};
pub use schema_inference::{SchemaInferenceEngine, FALLBACK_TABLE};
pub use traversal::DocumentGraph;
