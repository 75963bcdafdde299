use rand::SeedableRng;
use rand::rngs::StdRng;

use super::chain::Chain;
use super::ngram::{self, END_TOKEN};
use super::prng::Prng;
use crate::error::ChainError;

/// Length cap applied when the caller does not set one.
///
/// Chains that never reach the end sentinel (order 0, or a cyclic snapshot)
/// would otherwise sample forever.
pub const DEFAULT_MAX_LEN: usize = 1000;

/// Caller-owned generator producing whole token sequences from a chain.
///
/// The sampler owns its randomness source: build it from a seed for
/// reproducible output, or from OS entropy otherwise. It never touches any
/// process-wide generator.
///
/// # Example
/// ```
/// use markov_core::{Chain, Sampler};
///
/// let chain = Chain::new(1);
/// chain.add(&["hello", "world"]);
///
/// let mut sampler = Sampler::from_seed(7);
/// assert_eq!(sampler.sentence(&chain).unwrap(), vec!["hello", "world"]);
/// ```
#[derive(Debug, Clone)]
pub struct Sampler<P = StdRng> {
	prng: P,
	max_len: usize,
}

impl Sampler<StdRng> {
	/// Creates a sampler whose output is fully determined by `seed`.
	pub fn from_seed(seed: u64) -> Self {
		Self::new(StdRng::seed_from_u64(seed))
	}

	/// Creates a sampler seeded from operating system entropy.
	pub fn from_entropy() -> Self {
		Self::new(StdRng::from_os_rng())
	}
}

impl<P: Prng> Sampler<P> {
	pub fn new(prng: P) -> Self {
		Self {
			prng,
			max_len: DEFAULT_MAX_LEN,
		}
	}

	/// Caps the number of tokens a single sentence may contain.
	pub fn with_max_len(mut self, max_len: usize) -> Self {
		self.max_len = max_len;
		self
	}

	/// Samples one token following `current`.
	pub fn next<S: AsRef<str>>(&mut self, chain: &Chain, current: &[S]) -> Result<String, ChainError> {
		chain.generate_deterministic(current, &mut self.prng)
	}

	/// Generates a sentence starting from the all-start n-gram.
	///
	/// Sentinels are not included in the result.
	pub fn sentence(&mut self, chain: &Chain) -> Result<Vec<String>, ChainError> {
		self.continue_from(chain, &chain.start_ngram())
	}

	/// Generates the tokens following `seed` until the end sentinel is drawn
	/// or the length cap is reached.
	///
	/// A seed ending with the end sentinel yields no tokens. Empty-string
	/// tokens are ordinary tokens and do not stop the walk.
	///
	/// # Errors
	/// - `OrderMismatch` if `seed` does not hold exactly `order` tokens
	/// - `UnknownNGram` if the walk reaches a state without transitions
	pub fn continue_from<S: AsRef<str>>(&mut self, chain: &Chain, seed: &[S]) -> Result<Vec<String>, ChainError> {
		let mut current: Vec<String> = seed.iter().map(|t| t.as_ref().to_owned()).collect();
		let mut tokens = Vec::new();
		if ngram::is_terminal(&current) {
			// Still reports an order mismatch.
			chain.generate_deterministic(&current, &mut self.prng)?;
			return Ok(tokens);
		}

		while tokens.len() < self.max_len {
			let next = chain.generate_deterministic(&current, &mut self.prng)?;
			if next == END_TOKEN {
				break;
			}
			if !current.is_empty() {
				current.remove(0);
				current.push(next.clone());
			}
			tokens.push(next);
		}

		Ok(tokens)
	}
}
