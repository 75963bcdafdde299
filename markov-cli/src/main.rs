use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use log::info;
use markov_core::{Chain, Sampler, train_parallel};

mod io;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train and sample fixed-order Markov chains", long_about = None)]
struct Cli {
	/// Increase verbosity (-v, -vv)
	#[arg(short = 'v', long, global = true, action = ArgAction::Count)]
	verbose: u8,

	/// Decrease verbosity (-q, -qq)
	#[arg(short = 'q', long, global = true, action = ArgAction::Count)]
	quiet: u8,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Train a chain from text files, one sequence per line
	Train(TrainArgs),
	/// Generate sentences from a trained chain
	Generate(GenerateArgs),
	/// Print the probability of a transition
	Probability(ProbabilityArgs),
	/// Inspect snapshot metadata
	Info(InfoArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
	/// Text files to learn from
	#[arg(required = true)]
	inputs: Vec<PathBuf>,

	/// Number of tokens in a state
	#[arg(short = 'n', long, default_value_t = 1)]
	order: usize,

	/// Output snapshot (.json or .bin). Defaults to the first input with a .json extension
	#[arg(short, long, value_name = "PATH")]
	output: Option<PathBuf>,

	/// Extend an existing snapshot instead of starting from scratch
	#[arg(long, value_name = "PATH")]
	resume: Option<PathBuf>,

	/// Train on all CPUs (pool numbering then depends on scheduling)
	#[arg(long)]
	parallel: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
	/// Snapshot to sample from
	snapshot: PathBuf,

	/// Number of sentences
	#[arg(short, long, default_value_t = 1)]
	count: usize,

	/// Seed for reproducible output
	#[arg(short, long)]
	seed: Option<u64>,

	/// Maximum tokens per sentence
	#[arg(long, default_value_t = 100)]
	max_len: usize,

	/// Continue from these tokens instead of the sentence start (exactly `order` tokens)
	#[arg(long, num_args = 1..)]
	start: Vec<String>,
}

#[derive(Args, Debug)]
struct ProbabilityArgs {
	/// Snapshot to query
	snapshot: PathBuf,

	/// Token whose probability is requested
	next: String,

	/// Current state (exactly `order` tokens)
	#[arg(required = true)]
	current: Vec<String>,
}

#[derive(Args, Debug)]
struct InfoArgs {
	/// Snapshot to inspect
	snapshot: PathBuf,
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose, cli.quiet);

	match cli.command {
		Commands::Train(args) => run_train(args),
		Commands::Generate(args) => run_generate(args),
		Commands::Probability(args) => run_probability(args),
		Commands::Info(args) => run_info(args),
	}
}

fn init_logging(verbose: u8, quiet: u8) {
	use log::LevelFilter;

	let level = match (quiet, verbose) {
		(0, 0) => LevelFilter::Info,
		(0, 1) => LevelFilter::Debug,
		(0, _) => LevelFilter::Trace,
		(1, _) => LevelFilter::Warn,
		_ => LevelFilter::Error,
	};

	let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
	builder.format_timestamp_millis();
	builder.filter_level(level);
	let _ = builder.try_init();
}

fn run_train(args: TrainArgs) -> Result<()> {
	let chain = match &args.resume {
		Some(path) => {
			let chain = io::load_chain(path)?;
			if chain.order() != args.order {
				bail!(
					"snapshot {} has order {}, requested {}",
					path.display(),
					chain.order(),
					args.order
				);
			}
			chain
		}
		None => Chain::try_new(args.order)?,
	};

	let mut trained = 0;
	for input in &args.inputs {
		let sequences = io::read_sequences(input).with_context(|| format!("unable to read {}", input.display()))?;
		if args.parallel {
			trained += train_parallel(&chain, &sequences);
		} else {
			for sequence in &sequences {
				chain.add(sequence);
			}
			trained += sequences.len();
		}
		info!("{}: {} sequences", input.display(), sequences.len());
	}

	let output = match args.output {
		Some(path) => path,
		None => io::default_snapshot_path(&args.inputs[0])?,
	};
	info!(
		"trained {} sequences, {} states, {} rows",
		trained,
		chain.state_count(),
		chain.row_count()
	);
	io::save_chain(&chain, output)
}

fn run_generate(args: GenerateArgs) -> Result<()> {
	let chain = io::load_chain(&args.snapshot)?;
	let mut sampler = match args.seed {
		Some(seed) => Sampler::from_seed(seed),
		None => Sampler::from_entropy(),
	}
	.with_max_len(args.max_len);

	for _ in 0..args.count {
		let tokens = if args.start.is_empty() {
			sampler.sentence(&chain)?
		} else {
			let mut tokens = args.start.clone();
			tokens.extend(sampler.continue_from(&chain, &args.start)?);
			tokens
		};
		println!("{}", tokens.join(" "));
	}
	Ok(())
}

fn run_probability(args: ProbabilityArgs) -> Result<()> {
	let chain = io::load_chain(&args.snapshot)?;
	let probability = chain.transition_probability(&args.next, &args.current)?;
	println!("{probability}");
	Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
	let chain = io::load_chain(&args.snapshot)?;
	println!("order:  {}", chain.order());
	println!("states: {}", chain.state_count());
	println!("rows:   {}", chain.row_count());
	Ok(())
}
