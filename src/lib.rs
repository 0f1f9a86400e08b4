//! # petcare-rag
//!
//! A retrieval-augmented pet-care assistant. Plain-text knowledge-base files
//! are chunked, embedded, and stored in a vector index; each question is
//! embedded, matched against the index, and answered by a generative model
//! instructed to stay within the retrieved context.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  knowledge  │──▶│  Indexer    │──▶│ VectorIndex  │
//! │  base *.txt │   │ Chunk+Embed │   │ SQLite/JSON  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                   ┌─────────────┐   ┌──────▼───────┐
//!   question ──────▶│  Retriever  │◀──│  top-k query │
//!                   └──────┬──────┘   └──────────────┘
//!                          ▼
//!                   ┌─────────────┐
//!                   │  Composer   │──▶ answer
//!                   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GOOGLE_API_KEY=...
//! petcare build                  # index ./knowledge_base
//! petcare ask "How often should I walk my dog?"
//! petcare serve                  # POST /answer on 127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`ingest`] | Knowledge-base scanning |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Generation providers |
//! | [`store`] | Index backend selection |
//! | [`index`] | Full build and incremental sync |
//! | [`retrieve`] | Query-time retrieval |
//! | [`compose`] | Prompt assembly and generation |
//! | [`pipeline`] | The orchestrator |
//! | [`server`] | HTTP server |
//!
//! Data types, chunking, the index trait, and prompt assembly live in the
//! runtime-free `petcare-rag-core` crate.

pub mod capability;
pub mod compose;
pub mod config;
pub mod db;
pub mod embedding;
pub mod flatfile_store;
pub mod generation;
pub mod http;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod pipeline;
pub mod retrieve;
pub mod server;
pub mod sqlite_store;
pub mod store;
