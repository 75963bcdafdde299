use std::collections::HashMap;

use crate::error::ChainError;

/// Bidirectional interning table between state keys and dense indices.
///
/// N-gram keys and plain next-token strings share one index space: with
/// order 1 the n-gram `["the"]` and the token `"the"` are the same state.
///
/// ## Invariants
/// - Indices are assigned densely from 0 in first-encounter order
/// - An index is never reused or reassigned
/// - `by_index[i]` is the key whose entry in `by_key` is `i`
#[derive(Clone, Debug, Default)]
pub struct StatePool {
	by_key: HashMap<String, usize>,
	by_index: Vec<String>,
}

impl StatePool {
	/// Creates an empty pool.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the index of `key`, interning it first if needed.
	pub fn add(&mut self, key: &str) -> usize {
		if let Some(&index) = self.by_key.get(key) {
			return index;
		}
		let index = self.by_index.len();
		self.by_key.insert(key.to_owned(), index);
		self.by_index.push(key.to_owned());
		index
	}

	/// Pure lookup of `key`. Never inserts.
	pub fn get(&self, key: &str) -> Option<usize> {
		self.by_key.get(key).copied()
	}

	/// Reverse lookup of an index.
	pub fn lookup(&self, index: usize) -> Option<&str> {
		self.by_index.get(index).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.by_index.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_index.is_empty()
	}

	/// Iterates `(index, key)` in index order.
	pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
		self.by_index.iter().map(String::as_str).enumerate()
	}

	/// Rebuilds a pool from its forward mapping.
	///
	/// # Errors
	/// Returns `MalformedSnapshot` if two keys share an index or if the
	/// indices are not exactly `0..len`.
	pub fn from_forward(by_key: HashMap<String, usize>) -> Result<Self, ChainError> {
		let len = by_key.len();
		let mut slots: Vec<Option<String>> = vec![None; len];

		for (key, &index) in &by_key {
			let slot = slots.get_mut(index).ok_or_else(|| {
				ChainError::MalformedSnapshot(format!(
					"pool index {index} for {key:?} is outside 0..{len}"
				))
			})?;
			if let Some(previous) = slot {
				return Err(ChainError::MalformedSnapshot(format!(
					"pool index {index} is shared by {previous:?} and {key:?}"
				)));
			}
			*slot = Some(key.clone());
		}

		// Injective and bounded by len, so every slot is filled.
		let by_index = slots.into_iter().flatten().collect();
		Ok(Self { by_key, by_index })
	}

	/// Forward mapping, for serialization.
	pub(crate) fn forward(&self) -> &HashMap<String, usize> {
		&self.by_key
	}
}
