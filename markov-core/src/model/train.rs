use std::sync::mpsc;
use std::thread;

use super::chain::Chain;

/// Number of partial chains built per CPU.
const CHUNKS_PER_CPU: usize = 4;

/// Trains `chain` on a batch of sequences using every CPU.
///
/// # Behavior
/// - Splits `sequences` into chunks (CPU count × `CHUNKS_PER_CPU`)
/// - Builds one partial chain per chunk on a scoped thread
/// - Merges the partial chains into `chain` as they complete
///
/// # Notes
/// - Counts are exactly those sequential `add` calls would produce.
/// - Pool indices follow the merge order, which depends on thread scheduling.
///   Use sequential `add` calls when index numbering must be reproducible.
///
/// Returns the number of sequences trained.
pub fn train_parallel<T, S>(chain: &Chain, sequences: &[T]) -> usize
where
	T: AsRef<[S]> + Sync,
	S: AsRef<str>,
{
	if sequences.is_empty() {
		return 0;
	}

	let chunks = num_cpus::get() * CHUNKS_PER_CPU;
	let chunk_size = sequences.len().div_ceil(chunks);
	let order = chain.order();

	thread::scope(|scope| {
		let (tx, rx) = mpsc::channel();
		for chunk in sequences.chunks(chunk_size) {
			let tx = tx.clone();
			scope.spawn(move || {
				let partial = Chain::new(order);
				for sequence in chunk {
					partial.add(sequence.as_ref());
				}
				// The receiver outlives every sender inside this scope.
				let _ = tx.send(partial);
			});
		}
		drop(tx);

		for partial in rx.iter() {
			// Same order by construction.
			let _ = chain.merge(&partial);
		}
	});

	log::debug!("trained {} sequences in chunks of {}", sequences.len(), chunk_size);
	sequences.len()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parallel_counts_match_sequential() {
		let sequences: Vec<Vec<String>> = (0..500)
			.map(|i| vec![format!("w{}", i % 7), format!("w{}", i % 3), "tail".to_owned()])
			.collect();

		let sequential = Chain::new(1);
		for sequence in &sequences {
			sequential.add(sequence);
		}
		let parallel = Chain::new(1);
		assert_eq!(train_parallel(&parallel, &sequences), 500);

		for from in ["^", "w0", "w1", "w2", "w3", "tail"] {
			for to in ["w0", "w1", "w2", "w5", "tail", "$"] {
				assert_eq!(
					parallel.transition_probability(to, &[from]).unwrap(),
					sequential.transition_probability(to, &[from]).unwrap(),
					"{from} -> {to}"
				);
			}
		}
		assert_eq!(parallel.state_count(), sequential.state_count());
	}

	#[test]
	fn empty_batch_is_noop() {
		let chain = Chain::new(2);
		assert_eq!(train_parallel::<Vec<&str>, &str>(&chain, &[]), 0);
		assert_eq!(chain.state_count(), 0);
	}
}
