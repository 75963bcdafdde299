use thiserror::Error;

/// Errors returned by chain queries and snapshot decoding.
///
/// Every variant is a deterministic input-validation failure: retrying the
/// same call against the same chain yields the same error.
#[derive(Debug, Error)]
pub enum ChainError {
	/// The requested order exceeds what a chain supports.
	#[error("order {order} exceeds the maximum of {max}")]
	InvalidOrder { order: usize, max: usize },

	/// The supplied n-gram does not have exactly `order` tokens.
	#[error("n-gram length {actual} does not match chain order {expected}")]
	OrderMismatch { expected: usize, actual: usize },

	/// Generation was asked to continue from an n-gram never seen in training.
	#[error("unknown n-gram {0:?}")]
	UnknownNGram(Vec<String>),

	/// The n-gram is known but its row sums to zero, so there is nothing to sample.
	#[error("n-gram {0:?} has no recorded transitions")]
	EmptyState(Vec<String>),

	/// The snapshot shape is invalid or its pool cannot be inverted.
	#[error("malformed snapshot: {0}")]
	MalformedSnapshot(String),

	/// The snapshot could not be encoded.
	#[error("snapshot encoding failed: {0}")]
	Encode(String),
}

impl ChainError {
	pub(crate) fn owned_ngram<S: AsRef<str>>(ngram: &[S]) -> Vec<String> {
		ngram.iter().map(|t| t.as_ref().to_owned()).collect()
	}
}

impl From<serde_json::Error> for ChainError {
	fn from(e: serde_json::Error) -> Self {
		if e.is_io() {
			Self::Encode(e.to_string())
		} else {
			Self::MalformedSnapshot(e.to_string())
		}
	}
}
