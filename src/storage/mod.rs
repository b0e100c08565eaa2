//! Embedded database layer.
//!
//! The container's primary entry is a serialized SQLite database holding
//! the `notes` and `cards` tables. [`collection::CollectionDb`] wraps a
//! connection with typed row operations; [`schema`] owns the DDL.

pub mod collection;
pub mod schema;

pub use collection::CollectionDb;
