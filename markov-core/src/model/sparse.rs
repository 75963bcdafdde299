use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Sparse row of transition counts: next-token index → occurrences.
///
/// An absent column is defined to have a count of zero.
///
/// ## Invariants
/// - Stored counts are never decremented
/// - Serialization emits entries in `ordered_pairs` order
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(from = "HashMap<usize, usize>")]
pub struct SparseRow {
	counts: HashMap<usize, usize>,
}

impl From<HashMap<usize, usize>> for SparseRow {
	fn from(counts: HashMap<usize, usize>) -> Self {
		Self { counts }
	}
}

impl SparseRow {
	/// Count for `column`, zero when absent.
	pub fn get(&self, column: usize) -> usize {
		self.counts.get(&column).copied().unwrap_or(0)
	}

	/// Records one more occurrence of `column`.
	pub fn increment(&mut self, column: usize) {
		self.add(column, 1);
	}

	/// Adds `count` occurrences of `column`, saturating at `usize::MAX`.
	pub fn add(&mut self, column: usize, count: usize) {
		let entry = self.counts.entry(column).or_insert(0);
		*entry = entry.saturating_add(count);
	}

	/// Total of all counts in the row, saturating at `usize::MAX`.
	///
	/// A saturated total still keeps every draw in `[0, total)` covered by
	/// the cumulative counts, so sampling stays in bounds.
	pub fn sum(&self) -> usize {
		self.counts.values().fold(0, |acc, &n| acc.saturating_add(n))
	}

	/// Exact total, or `None` if it does not fit in a `usize`.
	pub fn checked_sum(&self) -> Option<usize> {
		self.counts.values().try_fold(0usize, |acc, &n| acc.checked_add(n))
	}

	pub fn len(&self) -> usize {
		self.counts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.counts.is_empty()
	}

	/// Iterates the column indices present in the row, in no particular order.
	pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
		self.counts.keys().copied()
	}

	/// Returns the row entries sorted by count descending, then column ascending.
	///
	/// Sampling and serialization both go through this ordering so their
	/// results never depend on hash map iteration order.
	pub fn ordered_pairs(&self) -> Vec<(usize, usize)> {
		let mut pairs: Vec<(usize, usize)> = self.counts.iter().map(|(&c, &n)| (c, n)).collect();
		pairs.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
		pairs
	}
}

impl Serialize for SparseRow {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let pairs = self.ordered_pairs();
		let mut map = serializer.serialize_map(Some(pairs.len()))?;
		for (column, count) in &pairs {
			map.serialize_entry(column, count)?;
		}
		map.end()
	}
}

/// Transition frequency table: from-state index → sparse row.
///
/// A missing row behaves like an empty one for every read.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(from = "HashMap<usize, SparseRow>")]
pub struct FrequencyTable {
	rows: HashMap<usize, SparseRow>,
}

impl From<HashMap<usize, SparseRow>> for FrequencyTable {
	fn from(rows: HashMap<usize, SparseRow>) -> Self {
		Self { rows }
	}
}

impl FrequencyTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn row(&self, row: usize) -> Option<&SparseRow> {
		self.rows.get(&row)
	}

	/// Records one transition `row → column`.
	pub fn increment(&mut self, row: usize, column: usize) {
		self.add(row, column, 1);
	}

	/// Adds `count` transitions `row → column`.
	pub fn add(&mut self, row: usize, column: usize, count: usize) {
		self.rows.entry(row).or_default().add(column, count);
	}

	/// Count of `row → column`, zero when either side is absent.
	pub fn count(&self, row: usize, column: usize) -> usize {
		self.rows.get(&row).map_or(0, |r| r.get(column))
	}

	/// Total of a row, zero when the row is absent.
	pub fn sum(&self, row: usize) -> usize {
		self.rows.get(&row).map_or(0, SparseRow::sum)
	}

	/// Number of rows (states with at least one recorded transition).
	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// Iterates rows in ascending row index.
	pub fn iter_ordered(&self) -> impl Iterator<Item = (usize, &SparseRow)> {
		let mut rows: Vec<(usize, &SparseRow)> = self.rows.iter().map(|(&i, r)| (i, r)).collect();
		rows.sort_unstable_by_key(|(i, _)| *i);
		rows.into_iter()
	}
}

impl Serialize for FrequencyTable {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.rows.len()))?;
		for (row, entries) in self.iter_ordered() {
			map.serialize_entry(&row, entries)?;
		}
		map.end()
	}
}
