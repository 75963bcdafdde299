//! Fixed-order Markov chain over token sequences.
//!
//! This crate provides:
//! - A state pool interning n-gram keys and tokens to dense indices
//! - A sparse transition-count table with deterministic entry ordering
//! - A thread-safe `Chain` supporting training, probability queries and sampling
//! - A snapshot codec (JSON or postcard) for persisting trained chains
//!
//! Tokenization is left to the caller: the chain only sees pre-split tokens.
//! Randomness is supplied by the caller through the [`model::prng::Prng`] trait.

/// Error type shared by every fallible operation.
pub mod error;

/// Chain, pool, table, sampling and snapshot logic.
pub mod model;

pub use error::ChainError;
pub use model::chain::{Chain, MAX_ORDER};
pub use model::ngram::{END_TOKEN, START_TOKEN};
pub use model::prng::Prng;
pub use model::sampler::Sampler;
pub use model::snapshot::Snapshot;
pub use model::train::train_parallel;
