//! # Grounding
//!
//! A contribution ingestion and retrieval engine for grounding LLM
//! persona generation.
//!
//! Contributed text is persisted as a system-of-record document, split
//! into overlapping chunks, embedded, and stored in a vector index
//! alongside denormalized metadata. Retrieval runs metadata-filtered
//! similarity search over the chunk rows to supply ranked context to a
//! generation workflow.
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────────┐
//! │ Contribution │──▶│ Ingestion pipeline │──▶│    SQLite     │
//! │   service    │   │ split·attach·embed │   │ docs + chunks │
//! └──────┬───────┘   └───────────────────┘   └──────┬───────┘
//!        │                                          │
//!        ▼                                          ▼
//!   ownership CRUD                      filtered similarity search
//! ```
//!
//! The pure logic (models, splitter, metadata, traits, ranking) lives in
//! `grounding-core`; this crate supplies the SQLite store, the OpenAI
//! embedding client, the pipeline, the service, and the `gnd` CLI.

pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod service;
pub mod sqlite_store;
