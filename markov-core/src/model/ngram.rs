/// Sentinel padding the front of every trained sequence.
pub const START_TOKEN: &str = "^";

/// Sentinel padding the back of every trained sequence.
///
/// Generation stops once the current n-gram ends with this token.
pub const END_TOKEN: &str = "$";

/// Separator used to build the canonical key of an n-gram.
///
/// Tokens containing this separator can make distinct n-grams share a key.
/// That collision is a known limitation and is not corrected.
pub const KEY_DELIMITER: &str = "_";

/// A pair of consecutive states in a padded sequence.
///
/// `current` always holds exactly `order` tokens, `next` is the token that
/// followed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair<'a, S> {
	pub current: &'a [S],
	pub next: &'a S,
}

/// Returns the canonical pool key of an n-gram.
pub fn key<S: AsRef<str>>(ngram: &[S]) -> String {
	let mut key = String::new();
	for (i, token) in ngram.iter().enumerate() {
		if i > 0 {
			key.push_str(KEY_DELIMITER);
		}
		key.push_str(token.as_ref());
	}
	key
}

/// Pads `tokens` with `order` start sentinels and `order` end sentinels.
pub fn pad<S: AsRef<str>>(tokens: &[S], order: usize) -> Vec<&str> {
	let mut padded = Vec::with_capacity(tokens.len().saturating_add(order.saturating_mul(2)));
	padded.extend(std::iter::repeat_n(START_TOKEN, order));
	padded.extend(tokens.iter().map(AsRef::as_ref));
	padded.extend(std::iter::repeat_n(END_TOKEN, order));
	padded
}

/// Generates the pairs of consecutive states in a sequence.
///
/// Every window of `order + 1` tokens yields one pair: the first `order`
/// tokens form the current state, the last one is the next token.
/// A sequence shorter than `order + 1` yields nothing.
pub fn make_pairs<S>(tokens: &[S], order: usize) -> impl Iterator<Item = Pair<'_, S>> {
	tokens.windows(order + 1).map(move |window| Pair {
		current: &window[..order],
		next: &window[order],
	})
}

/// Returns `true` if the n-gram ends with the end sentinel.
pub fn is_terminal<S: AsRef<str>>(ngram: &[S]) -> bool {
	ngram.last().is_some_and(|t| t.as_ref() == END_TOKEN)
}
