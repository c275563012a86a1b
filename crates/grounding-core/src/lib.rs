//! # Grounding Core
//!
//! Shared logic for the Grounding contribution engine: data models, the
//! overlapping text splitter, chunk-metadata assembly, storage traits,
//! and the retrieval ranking algorithm.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies; the application crate supplies the SQLite
//! and HTTP implementations of the traits defined here.

pub mod embedding;
pub mod error;
pub mod metadata;
pub mod models;
pub mod retrieval;
pub mod splitter;
pub mod store;

pub use error::{Error, Result};
