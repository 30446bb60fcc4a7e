//! Core types and trait definitions for Curio's engagement subsystem.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends, the counter cache, and object storage are expressed as
//! traits here and implemented elsewhere.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod engagement;
pub mod error;
pub mod lifecycle;
pub mod objects;
pub mod refs;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
