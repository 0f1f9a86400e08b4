//! # petcare-rag core
//!
//! Runtime-free logic for the pet-care retrieval-augmented generation
//! pipeline: data models, the error taxonomy, chunking, the embedding and
//! generation capability traits, the [`store::VectorIndex`] abstraction with
//! its in-memory backend, and prompt assembly.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Concrete providers,
//! persistent index backends, and the orchestrating pipeline live in the
//! `petcare-rag` application crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod prompt;
pub mod store;

pub use error::{Capability, ErrorKind, RagError, Result};
