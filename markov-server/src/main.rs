use std::path::{Path, PathBuf};

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use clap::Parser;
use env_logger::Env;
use markov_core::Chain;

mod api;

use api::SharedData;

/// Server configuration, from flags or `MARKOV_*` environment variables.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "HTTP front end for a fixed-order Markov chain", long_about = None)]
struct ServerConfig {
	/// Address to bind
	#[arg(long, env = "MARKOV_HOST", default_value = "127.0.0.1")]
	host: String,

	/// Port to bind
	#[arg(long, env = "MARKOV_PORT", default_value_t = 5000)]
	port: u16,

	/// Order of the chain created when no snapshot is given
	#[arg(short = 'n', long, env = "MARKOV_ORDER", default_value_t = 1)]
	order: usize,

	/// Snapshot to serve at startup (.json or .bin)
	#[arg(long, env = "MARKOV_SNAPSHOT", value_name = "PATH")]
	snapshot: Option<PathBuf>,

	/// Largest accepted JSON body, in bytes
	#[arg(long, env = "MARKOV_JSON_LIMIT", default_value_t = 16 * 1024 * 1024)]
	json_limit: usize,
}

/// Loads the startup chain, or creates an empty one.
fn initial_chain(config: &ServerConfig) -> std::io::Result<Chain> {
	let Some(path) = &config.snapshot else {
		return Chain::try_new(config.order).map_err(std::io::Error::other);
	};
	let chain = load_snapshot(path)?;
	log::info!(
		"loaded {}: order {}, {} states",
		path.display(),
		chain.order(),
		chain.state_count()
	);
	Ok(chain)
}

fn load_snapshot(path: &Path) -> std::io::Result<Chain> {
	let bytes = std::fs::read(path)?;
	let chain = if path.extension().is_some_and(|e| e == "bin") {
		Chain::from_bytes(&bytes)
	} else {
		let json = std::str::from_utf8(&bytes).map_err(std::io::Error::other)?;
		Chain::from_json(json)
	};
	chain.map_err(std::io::Error::other)
}

/// Main entry point for the server.
///
/// The chain is internally synchronized, so it is shared across workers
/// without an outer mutex.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
	let config = ServerConfig::parse();

	let shared_data = web::Data::new(SharedData::new(initial_chain(&config)?));
	let json_limit = config.json_limit;

	log::info!("listening on {}:{}", config.host, config.port);
	HttpServer::new(move || {
		App::new()
			.wrap(Logger::default())
			.wrap(Cors::permissive())
			.app_data(shared_data.clone())
			.app_data(web::JsonConfig::default().limit(json_limit))
			.configure(api::configure)
	})
		.bind((config.host.as_str(), config.port))?
		.run()
		.await
}
