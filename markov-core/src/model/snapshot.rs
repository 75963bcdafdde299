use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::chain::{Chain, ChainState, check_order_bound};
use super::pool::StatePool;
use super::sparse::FrequencyTable;
use crate::error::ChainError;

/// Serializable image of a chain.
///
/// Field names are part of the persisted format and must not change:
/// - `int`: chain order
/// - `spool_map`: state key → pool index
/// - `freq_mat`: row index → (column index → count)
///
/// A snapshot never carries the chain's lock; restoring creates a fresh one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Snapshot {
	#[serde(rename = "int")]
	pub order: usize,

	#[serde(rename = "spool_map", serialize_with = "serialize_pool")]
	pub pool: HashMap<String, usize>,

	#[serde(rename = "freq_mat")]
	pub table: FrequencyTable,
}

/// Writes the pool in index order so identical chains give identical bytes.
fn serialize_pool<S: Serializer>(pool: &HashMap<String, usize>, serializer: S) -> Result<S::Ok, S::Error> {
	let mut entries: Vec<(&String, &usize)> = pool.iter().collect();
	entries.sort_unstable_by_key(|(_, index)| **index);

	let mut map = serializer.serialize_map(Some(entries.len()))?;
	for (key, index) in entries {
		map.serialize_entry(key, index)?;
	}
	map.end()
}

impl Snapshot {
	pub(crate) fn new(order: usize, pool: &StatePool, table: FrequencyTable) -> Self {
		Self {
			order,
			pool: pool.forward().clone(),
			table,
		}
	}

	/// Validates the snapshot and turns it into live chain state.
	///
	/// # Errors
	/// Returns `MalformedSnapshot` if the order exceeds `MAX_ORDER`, the pool
	/// cannot be inverted, the table references an index outside the pool, or
	/// a row total does not fit in a `usize`.
	pub(crate) fn into_parts(self) -> Result<(usize, ChainState), ChainError> {
		check_order_bound(self.order).map_err(|e| ChainError::MalformedSnapshot(e.to_string()))?;
		let pool = StatePool::from_forward(self.pool)?;

		for (row, entries) in self.table.iter_ordered() {
			if pool.lookup(row).is_none() {
				return Err(ChainError::MalformedSnapshot(format!("row {row} is not a pool index")));
			}
			if let Some(column) = entries.columns().find(|&c| pool.lookup(c).is_none()) {
				return Err(ChainError::MalformedSnapshot(format!(
					"column {column} of row {row} is not a pool index"
				)));
			}
			if entries.checked_sum().is_none() {
				return Err(ChainError::MalformedSnapshot(format!("counts of row {row} overflow")));
			}
		}

		Ok((self.order, ChainState { pool, table: self.table }))
	}
}

impl TryFrom<Snapshot> for Chain {
	type Error = ChainError;

	fn try_from(snapshot: Snapshot) -> Result<Self, Self::Error> {
		Chain::from_snapshot(snapshot)
	}
}

impl From<&Chain> for Snapshot {
	fn from(chain: &Chain) -> Self {
		chain.snapshot()
	}
}
