use rand::{Rng, RngCore};

/// Source of uniformly distributed integers used by generation.
///
/// Any `rand` generator satisfies it, so callers can pass a seeded
/// `StdRng` for reproducible output or a `ThreadRng` otherwise.
pub trait Prng {
	/// Returns an integer uniformly distributed in `[0, n)`.
	///
	/// Callers never pass `n == 0`.
	fn intn(&mut self, n: usize) -> usize;
}

impl<R: RngCore> Prng for R {
	fn intn(&mut self, n: usize) -> usize {
		self.random_range(0..n)
	}
}
