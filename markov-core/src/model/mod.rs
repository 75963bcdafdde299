//! Top-level module for the Markov chain.
//!
//! Components, leaf-first:
//! - N-gram helpers and sentinel tokens (`ngram`)
//! - Key/index interning (`pool`)
//! - Sparse transition counts (`sparse`)
//! - The thread-safe orchestrator (`Chain`)
//! - Randomness capability and sequence sampling (`prng`, `sampler`)
//! - Snapshot codec and parallel training helpers

/// Thread-safe fixed-order chain.
///
/// Owns the pool and the table behind a single reader/writer lock.
pub mod chain;

/// N-gram keys, sentinel tokens and sliding-window pairs.
pub mod ngram;

/// Bidirectional interning between state keys and dense indices.
pub mod pool;

/// Randomness capability consumed by generation.
pub mod prng;

/// Caller-owned generator walking a chain until the end sentinel.
pub mod sampler;

/// Serializable snapshot of a chain.
pub mod snapshot;

/// Sparse rows and the transition frequency table.
pub mod sparse;

/// Parallel training from a batch of sequences.
pub mod train;
