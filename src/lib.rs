//! wordpack - flashcard container construction and update engine
//!
//! Builds and incrementally updates a portable flashcard container: a
//! zip archive holding a compressed embedded SQLite database (notes and
//! cards), a JSON media index, and numbered compressed media payloads.
//!
//! # Architecture
//!
//! - [`codec`] - block compression and atomic archive read/write
//! - [`storage`] - embedded database schema and typed row operations
//! - [`factory`] - validated flashcard content -> note/card rows
//! - [`media`] - media key allocation and the filename index
//! - [`merge`] - duplicate-safe, study-state-preserving reconciliation
//! - [`pack`] - create/update orchestration and archive assembly
//! - [`cli`] - command-line surface over the engine
//! - [`error`] - error types and handling
//!
//! The engine is a pure function from (existing container or none, batch
//! of validated flashcards) to (new container, batch report). It holds
//! no configuration and performs no network I/O.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod codec;
pub mod error;
pub mod factory;
pub mod media;
pub mod merge;
pub mod model;
pub mod pack;
pub mod storage;

pub use error::{Error, Result};
pub use factory::WordEntry;
pub use merge::BatchReport;
pub use pack::Packager;
