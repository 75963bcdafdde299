use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use markov_core::Chain;

/// On-disk encoding of a chain snapshot, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
	/// `.bin`: compact postcard encoding
	Postcard,
	/// anything else: JSON
	Json,
}

impl SnapshotFormat {
	pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
		match path.as_ref().extension().and_then(|e| e.to_str()) {
			Some("bin") => Self::Postcard,
			_ => Self::Json,
		}
	}
}

/// Reads a text file and splits every non-blank line into whitespace-separated tokens.
///
/// One line is one training sequence.
pub fn read_sequences<P: AsRef<Path>>(filename: P) -> io::Result<Vec<Vec<String>>> {
	let contents = fs::read_to_string(filename)?;
	Ok(tokenize(&contents))
}

pub fn tokenize(contents: &str) -> Vec<Vec<String>> {
	contents
		.lines()
		.map(|line| line.split_whitespace().map(str::to_owned).collect::<Vec<_>>())
		.filter(|tokens| !tokens.is_empty())
		.collect()
}

/// Snapshot path used when `train` gets no `--output`: the corpus path with a `.json` extension.
pub fn default_snapshot_path(corpus: &Path) -> Result<PathBuf> {
	if corpus.file_stem().is_none() {
		bail!("{} has no file name to derive a snapshot path from", corpus.display());
	}
	Ok(corpus.with_extension("json"))
}

/// Writes a chain snapshot, encoded according to the path's extension.
pub fn save_chain<P: AsRef<Path>>(chain: &Chain, path: P) -> Result<()> {
	let path = path.as_ref();
	let bytes = match SnapshotFormat::from_path(path) {
		SnapshotFormat::Postcard => chain.to_bytes()?,
		SnapshotFormat::Json => chain.to_json()?.into_bytes(),
	};
	fs::write(path, bytes).with_context(|| format!("unable to write snapshot {}", path.display()))?;
	log::info!("wrote {} ({} states)", path.display(), chain.state_count());
	Ok(())
}

/// Reads a chain snapshot, decoded according to the path's extension.
pub fn load_chain<P: AsRef<Path>>(path: P) -> Result<Chain> {
	let path = path.as_ref();
	let bytes = fs::read(path).with_context(|| format!("unable to read snapshot {}", path.display()))?;
	let chain = match SnapshotFormat::from_path(path) {
		SnapshotFormat::Postcard => Chain::from_bytes(&bytes),
		SnapshotFormat::Json => {
			let json = std::str::from_utf8(&bytes).context("snapshot is not valid UTF-8")?;
			Chain::from_json(json)
		}
	}
	.with_context(|| format!("unable to decode snapshot {}", path.display()))?;
	Ok(chain)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn format_follows_extension() {
		assert_eq!(SnapshotFormat::from_path("a/model.bin"), SnapshotFormat::Postcard);
		assert_eq!(SnapshotFormat::from_path("a/model.json"), SnapshotFormat::Json);
		assert_eq!(SnapshotFormat::from_path("model"), SnapshotFormat::Json);
	}

	#[test]
	fn default_snapshot_path_swaps_extension() {
		let out = default_snapshot_path(Path::new("data/input.txt")).unwrap();
		assert_eq!(out, PathBuf::from("data/input.json"));
		assert_eq!(default_snapshot_path(Path::new("corpus")).unwrap(), PathBuf::from("corpus.json"));
		assert!(default_snapshot_path(Path::new("/")).is_err());
	}

	#[test]
	fn tokenize_skips_blank_lines() {
		let sequences = tokenize("the cat\n\n   \n  sat   down \n");
		assert_eq!(sequences, vec![vec!["the", "cat"], vec!["sat", "down"]]);
	}

	#[test]
	fn snapshots_survive_disk_in_both_formats() {
		let dir = TempDir::new().unwrap();
		let chain = Chain::new(1);
		chain.add(&["x", "y"]);

		for name in ["chain.json", "chain.bin"] {
			let path = dir.path().join(name);
			save_chain(&chain, &path).unwrap();
			let loaded = load_chain(&path).unwrap();
			assert_eq!(loaded.snapshot(), chain.snapshot());
		}
	}

	#[test]
	fn corrupt_snapshot_is_an_error() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("broken.json");
		fs::write(&path, "{\"int\": 1}").unwrap();
		assert!(load_chain(&path).is_err());
	}

	#[test]
	fn reads_sequences_from_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("corpus.txt");
		fs::write(&path, "a b\nc\n").unwrap();
		assert_eq!(read_sequences(&path).unwrap(), vec![vec!["a", "b"], vec!["c"]]);
	}
}
