use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ngram::{self, START_TOKEN};
use super::pool::StatePool;
use super::prng::Prng;
use super::snapshot::Snapshot;
use super::sparse::FrequencyTable;
use crate::error::ChainError;

/// Largest order a chain accepts.
///
/// Padding allocates `2 * order` sentinels per sequence, so the order is
/// bounded well below anything that could overflow.
pub const MAX_ORDER: usize = 1024;

/// Pool and table, always locked together.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChainState {
	pub(crate) pool: StatePool,
	pub(crate) table: FrequencyTable,
}

/// Fixed-order Markov chain over string tokens.
///
/// A `Chain` counts, for every window of `order` consecutive tokens, which
/// token followed it. Training (`add`) and queries (`transition_probability`,
/// `generate`) can be called from many threads at once through a shared
/// reference.
///
/// # Responsibilities
/// - Pad and split training sequences into (current n-gram, next token) pairs
/// - Intern states and count transitions
/// - Answer probability queries and sample next tokens
/// - Export and restore snapshots
///
/// # Invariants
/// - `order` never changes after construction
/// - Every queried n-gram has exactly `order` tokens
/// - Interning a pair's states and incrementing its count happen under one
///   write lock, so readers never see an index without its count
#[derive(Debug)]
pub struct Chain {
	order: usize,
	state: RwLock<ChainState>,
}

impl Chain {
	/// Creates an empty chain of the given order.
	///
	/// An order of 0 gives a unigram model whose only state is the empty n-gram.
	///
	/// # Panics
	/// Panics if `order` exceeds [`MAX_ORDER`]. Use [`Chain::try_new`] for
	/// orders coming from user input.
	pub fn new(order: usize) -> Self {
		match Self::try_new(order) {
			Ok(chain) => chain,
			Err(e) => panic!("{e}"),
		}
	}

	/// Creates an empty chain, rejecting orders above [`MAX_ORDER`].
	pub fn try_new(order: usize) -> Result<Self, ChainError> {
		check_order_bound(order)?;
		Ok(Self::from_parts(order, ChainState::default()))
	}

	pub(crate) fn from_parts(order: usize, state: ChainState) -> Self {
		Self {
			order,
			state: RwLock::new(state),
		}
	}

	/// The fixed n-gram length of this chain.
	pub fn order(&self) -> usize {
		self.order
	}

	/// The n-gram every generated sentence starts from: `order` start sentinels.
	pub fn start_ngram(&self) -> Vec<String> {
		vec![START_TOKEN.to_owned(); self.order]
	}

	/// Number of interned states (n-gram keys and tokens).
	pub fn state_count(&self) -> usize {
		self.read().pool.len()
	}

	/// Number of states with at least one recorded transition.
	pub fn row_count(&self) -> usize {
		self.read().table.len()
	}

	fn read(&self) -> RwLockReadGuard<'_, ChainState> {
		self.state.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> RwLockWriteGuard<'_, ChainState> {
		self.state.write().unwrap_or_else(PoisonError::into_inner)
	}

	fn check_order<S: AsRef<str>>(&self, ngram: &[S]) -> Result<(), ChainError> {
		if ngram.len() != self.order {
			return Err(ChainError::OrderMismatch {
				expected: self.order,
				actual: ngram.len(),
			});
		}
		Ok(())
	}

	/// Records the transitions of one token sequence.
	///
	/// The sequence is padded with `order` start sentinels and `order` end
	/// sentinels, then every window of `order + 1` tokens counts one
	/// transition. The whole sequence is applied under a single write lock.
	///
	/// # Notes
	/// - Callers must not pass the sentinel tokens themselves.
	/// - An empty sequence still records the start → end path.
	pub fn add<S: AsRef<str>>(&self, tokens: &[S]) {
		let padded = ngram::pad(tokens, self.order);

		let mut guard = self.write();
		let state = &mut *guard;
		for pair in ngram::make_pairs(&padded, self.order) {
			let current = state.pool.add(&ngram::key(pair.current));
			let next = state.pool.add(pair.next);
			state.table.increment(current, next);
		}
		log::trace!("added sequence of {} tokens, pool size {}", tokens.len(), state.pool.len());
	}

	/// Returns the probability of observing `next` right after `current`.
	///
	/// # Returns
	/// - `Ok(0.0)` if `current` or `next` was never interned
	/// - `Ok(count / row total)` otherwise
	///
	/// # Errors
	/// Returns `OrderMismatch` if `current` does not hold exactly `order` tokens.
	pub fn transition_probability<S: AsRef<str>>(&self, next: &str, current: &[S]) -> Result<f64, ChainError> {
		self.check_order(current)?;

		let state = self.read();
		let (Some(current_index), Some(next_index)) = (state.pool.get(&ngram::key(current)), state.pool.get(next)) else {
			return Ok(0.0);
		};

		let total = state.table.sum(current_index);
		if total == 0 {
			// Interned only as a next token, never as a current state.
			return Ok(0.0);
		}
		Ok(state.table.count(current_index, next_index) as f64 / total as f64)
	}

	/// Samples the token following `current`, drawing from a fresh thread-local generator.
	///
	/// See [`Chain::generate_deterministic`] for the exact semantics.
	pub fn generate<S: AsRef<str>>(&self, current: &[S]) -> Result<String, ChainError> {
		self.generate_deterministic(current, &mut rand::rng())
	}

	/// Samples the token following `current` using the supplied generator.
	///
	/// Tokens are drawn proportionally to their counts: with `total` the row
	/// sum and `r` drawn in `[0, total)`, the row entries are walked in
	/// count-descending, index-ascending order subtracting each count from
	/// `r`; the first entry bringing the remainder to zero or below wins.
	/// Identical generators against identical chains give identical results.
	///
	/// # Returns
	/// - `Ok("")` if `current` ends with the end sentinel, seen or not
	/// - `Ok(token)` otherwise (possibly the end sentinel itself)
	///
	/// # Errors
	/// - `OrderMismatch` if `current` does not hold exactly `order` tokens
	/// - `UnknownNGram` if `current` has no recorded transitions
	/// - `EmptyState` if its row sums to zero (only possible from a hand-built snapshot)
	pub fn generate_deterministic<S, P>(&self, current: &[S], prng: &mut P) -> Result<String, ChainError>
	where
		S: AsRef<str>,
		P: Prng + ?Sized,
	{
		self.check_order(current)?;
		if ngram::is_terminal(current) {
			return Ok(String::new());
		}

		let state = self.read();
		let row = state
			.pool
			.get(&ngram::key(current))
			.and_then(|index| state.table.row(index))
			.ok_or_else(|| ChainError::UnknownNGram(ChainError::owned_ngram(current)))?;

		let total = row.sum();
		if total == 0 {
			return Err(ChainError::EmptyState(ChainError::owned_ngram(current)));
		}

		let mut remainder = prng.intn(total);
		for (column, count) in row.ordered_pairs() {
			if remainder <= count {
				return state.pool.lookup(column).map(str::to_owned).ok_or_else(|| {
					ChainError::MalformedSnapshot(format!("column {column} has no pool entry"))
				});
			}
			remainder -= count;
		}

		// Unreachable: the counts add up to `total`, which exceeds any draw.
		Ok(String::new())
	}

	/// Merges another chain of the same order into this one.
	///
	/// The other chain's states are interned in its own index order, then
	/// every count is added. Merging is additive only.
	///
	/// # Errors
	/// Returns `OrderMismatch` if the orders differ.
	pub fn merge(&self, other: &Chain) -> Result<(), ChainError> {
		if self.order != other.order {
			return Err(ChainError::OrderMismatch {
				expected: self.order,
				actual: other.order,
			});
		}

		// Copy first so merging a chain with itself does not deadlock.
		let incoming = other.read().clone();

		let mut guard = self.write();
		let state = &mut *guard;
		let remap: Vec<usize> = incoming.pool.iter().map(|(_, key)| state.pool.add(key)).collect();
		for (row, entries) in incoming.table.iter_ordered() {
			for (column, count) in entries.ordered_pairs() {
				state.table.add(remap[row], remap[column], count);
			}
		}
		Ok(())
	}

	/// Copies the chain into a serializable snapshot.
	pub fn snapshot(&self) -> Snapshot {
		let state = self.read();
		Snapshot::new(self.order, &state.pool, state.table.clone())
	}

	/// Rebuilds a chain from a snapshot.
	///
	/// # Errors
	/// Returns `MalformedSnapshot` if the pool is not a dense one-to-one mapping
	/// or if the table references indices the pool never issued.
	pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, ChainError> {
		let (order, state) = snapshot.into_parts()?;
		log::debug!(
			"restored chain of order {} with {} states and {} rows",
			order,
			state.pool.len(),
			state.table.len()
		);
		Ok(Self::from_parts(order, state))
	}

	/// Encodes the chain as a JSON snapshot.
	pub fn to_json(&self) -> Result<String, ChainError> {
		serde_json::to_string(&self.snapshot()).map_err(|e| ChainError::Encode(e.to_string()))
	}

	/// Decodes a chain from a JSON snapshot.
	pub fn from_json(json: &str) -> Result<Self, ChainError> {
		let snapshot: Snapshot = serde_json::from_str(json)?;
		Self::from_snapshot(snapshot)
	}

	/// Encodes the chain as a compact postcard snapshot.
	pub fn to_bytes(&self) -> Result<Vec<u8>, ChainError> {
		postcard::to_stdvec(&self.snapshot()).map_err(|e| ChainError::Encode(e.to_string()))
	}

	/// Decodes a chain from a postcard snapshot.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
		let snapshot: Snapshot =
			postcard::from_bytes(bytes).map_err(|e| ChainError::MalformedSnapshot(e.to_string()))?;
		Self::from_snapshot(snapshot)
	}
}

pub(crate) fn check_order_bound(order: usize) -> Result<(), ChainError> {
	if order > MAX_ORDER {
		return Err(ChainError::InvalidOrder { order, max: MAX_ORDER });
	}
	Ok(())
}

impl Clone for Chain {
	fn clone(&self) -> Self {
		Self::from_parts(self.order, self.read().clone())
	}
}

impl Serialize for Chain {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.snapshot().serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Chain {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let snapshot = Snapshot::deserialize(deserializer)?;
		Chain::from_snapshot(snapshot).map_err(D::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::ngram::END_TOKEN;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	/// Replays a fixed list of draws.
	struct Scripted(Vec<usize>);

	impl Prng for Scripted {
		fn intn(&mut self, n: usize) -> usize {
			let draw = self.0.remove(0);
			assert!(draw < n);
			draw
		}
	}

	fn cat_chain() -> Chain {
		let chain = Chain::new(1);
		chain.add(&["the", "cat", "sat"]);
		chain
	}

	#[test]
	fn records_padded_transitions() {
		let chain = cat_chain();
		let state = chain.read();
		let index = |k: &str| state.pool.get(k).unwrap();
		assert_eq!(state.table.count(index("^"), index("the")), 1);
		assert_eq!(state.table.count(index("the"), index("cat")), 1);
		assert_eq!(state.table.count(index("cat"), index("sat")), 1);
		assert_eq!(state.table.count(index("sat"), index("$")), 1);
		assert_eq!(state.table.len(), 4);
	}

	#[test]
	fn pool_assigns_in_first_encounter_order() {
		let chain = cat_chain();
		let state = chain.read();
		let keys: Vec<&str> = state.pool.iter().map(|(_, k)| k).collect();
		assert_eq!(keys, vec!["^", "the", "cat", "sat", "$"]);
	}

	#[test]
	fn order_two_keys_are_joined() {
		let chain = Chain::new(2);
		chain.add(&["a", "b"]);
		let state = chain.read();
		let keys: Vec<&str> = state.pool.iter().map(|(_, k)| k).collect();
		assert_eq!(keys, vec!["^_^", "a", "^_a", "b", "a_b", "$", "b_$"]);
	}

	#[test]
	fn probability_of_known_and_unknown() {
		let chain = cat_chain();
		assert_eq!(chain.transition_probability("cat", &["the"]).unwrap(), 1.0);
		assert_eq!(chain.transition_probability("dog", &["the"]).unwrap(), 0.0);
		assert_eq!(chain.transition_probability("cat", &["dog"]).unwrap(), 0.0);
	}

	#[test]
	fn probability_from_end_state_is_zero() {
		let chain = cat_chain();
		assert_eq!(chain.transition_probability("the", &[END_TOKEN]).unwrap(), 0.0);
	}

	#[test]
	fn probability_rejects_wrong_order() {
		let chain = cat_chain();
		assert!(matches!(
			chain.transition_probability("cat", &["the", "cat"]),
			Err(ChainError::OrderMismatch { expected: 1, actual: 2 })
		));
	}

	#[test]
	fn generate_follows_single_transition() {
		let chain = cat_chain();
		assert_eq!(chain.generate(&["sat"]).unwrap(), END_TOKEN);
		assert_eq!(chain.generate(&["the"]).unwrap(), "cat");
		assert_eq!(chain.generate(&[END_TOKEN]).unwrap(), "");
	}

	#[test]
	fn generate_unknown_ngram_fails() {
		let chain = cat_chain();
		assert!(matches!(chain.generate(&["dog"]), Err(ChainError::UnknownNGram(ngram)) if ngram == vec!["dog"]));
	}

	#[test]
	fn generate_end_state_is_terminal_even_unseen() {
		let chain = Chain::new(2);
		assert_eq!(chain.generate(&["never", END_TOKEN]).unwrap(), "");
	}

	#[test]
	fn generate_rejects_wrong_order() {
		let chain = cat_chain();
		assert!(matches!(
			chain.generate::<&str>(&[]),
			Err(ChainError::OrderMismatch { expected: 1, actual: 0 })
		));
	}

	#[test]
	fn sampling_stops_when_remainder_reaches_zero() {
		let chain = Chain::new(1);
		// Row for "a": b×3, c×1, d×1
		for _ in 0..3 {
			chain.add(&["a", "b"]);
		}
		chain.add(&["a", "c"]);
		chain.add(&["a", "d"]);

		// total = 5; ordered: b(3), c(1), d(1) with c interned before d
		let mut prng = Scripted(vec![0, 3, 4]);
		assert_eq!(chain.generate_deterministic(&["a"], &mut prng).unwrap(), "b");
		assert_eq!(chain.generate_deterministic(&["a"], &mut prng).unwrap(), "b");
		assert_eq!(chain.generate_deterministic(&["a"], &mut prng).unwrap(), "c");
	}

	#[test]
	fn seeded_generation_is_reproducible() {
		let chain = Chain::new(1);
		chain.add(&["a", "b", "a", "c", "a", "d"]);
		let draw = |seed| {
			let mut rng = StdRng::seed_from_u64(seed);
			(0..30)
				.map(|_| chain.generate_deterministic(&["a"], &mut rng).unwrap())
				.collect::<Vec<_>>()
		};
		assert_eq!(draw(9), draw(9));
	}

	#[test]
	fn merge_adds_counts() {
		let left = Chain::new(1);
		left.add(&["x", "y"]);
		let right = Chain::new(1);
		right.add(&["x", "z"]);
		right.add(&["x", "y"]);

		left.merge(&right).unwrap();
		assert!((left.transition_probability("y", &["x"]).unwrap() - 2.0 / 3.0).abs() < 1e-12);
		assert!((left.transition_probability("z", &["x"]).unwrap() - 1.0 / 3.0).abs() < 1e-12);
	}

	#[test]
	fn merge_with_itself_doubles_counts() {
		let chain = cat_chain();
		chain.merge(&chain).unwrap();
		let state = chain.read();
		let the = state.pool.get("the").unwrap();
		let cat = state.pool.get("cat").unwrap();
		assert_eq!(state.table.count(the, cat), 2);
	}

	#[test]
	fn merge_rejects_order_mismatch() {
		assert!(matches!(
			Chain::new(1).merge(&Chain::new(2)),
			Err(ChainError::OrderMismatch { expected: 1, actual: 2 })
		));
	}

	#[test]
	fn order_above_limit_is_rejected() {
		assert!(matches!(
			Chain::try_new(MAX_ORDER + 1),
			Err(ChainError::InvalidOrder { order, max: MAX_ORDER }) if order == MAX_ORDER + 1
		));
		assert_eq!(Chain::try_new(MAX_ORDER).unwrap().order(), MAX_ORDER);
	}

	#[test]
	#[should_panic(expected = "exceeds the maximum")]
	fn new_panics_above_limit() {
		Chain::new(usize::MAX);
	}

	#[test]
	fn saturated_row_still_samples() {
		let chain = Chain::new(1);
		chain.add(&["a", "b"]);
		{
			let mut state = chain.write();
			let a = state.pool.get("a").unwrap();
			let b = state.pool.get("b").unwrap();
			state.table.add(a, b, usize::MAX);
		}
		let mut prng = Scripted(vec![usize::MAX - 1]);
		assert_eq!(chain.generate_deterministic(&["a"], &mut prng).unwrap(), "b");
		assert_eq!(chain.transition_probability("b", &["a"]).unwrap(), 1.0);
	}

	#[test]
	fn unigram_chain_samples_tokens() {
		let chain = Chain::new(0);
		chain.add(&["only"]);
		let empty: [&str; 0] = [];
		// No end padding at order 0, so the only transition is "" → "only".
		assert_eq!(chain.generate(&empty).unwrap(), "only");
	}
}
