use std::sync::{Arc, PoisonError, RwLock};

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, get, post, put, web};
use markov_core::{Chain, ChainError, END_TOKEN, START_TOKEN, Sampler, Snapshot, train_parallel};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Default cap on tokens per generated sentence.
const DEFAULT_MAX_LEN: usize = 100;

/// Chain shared by every worker.
///
/// The chain synchronizes its own reads and writes; the outer lock only
/// guards swapping in a whole new chain from `PUT /v1/snapshot`.
pub struct SharedData {
	chain: RwLock<Arc<Chain>>,
}

impl SharedData {
	pub fn new(chain: Chain) -> Self {
		Self {
			chain: RwLock::new(Arc::new(chain)),
		}
	}

	fn chain(&self) -> Arc<Chain> {
		self.chain.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	fn replace(&self, chain: Chain) {
		*self.chain.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(chain);
	}
}

#[derive(Deserialize)]
struct AddBody {
	tokens: Vec<String>,
}

#[derive(Deserialize)]
struct BatchBody {
	sequences: Vec<Vec<String>>,
}

/// Query parameters of `/v1/probability`.
#[derive(Deserialize)]
struct ProbabilityParams {
	next: String,
	/// Comma-separated n-gram
	current: String,
}

/// Query parameters of `/v1/generate`.
#[derive(Deserialize)]
struct GenerateParams {
	/// Comma-separated n-gram, defaults to the sentence start
	current: Option<String>,
	seed: Option<u64>,
}

/// Query parameters of `/v1/sentence`.
#[derive(Deserialize)]
struct SentenceParams {
	seed: Option<u64>,
	max_len: Option<usize>,
}

#[derive(Serialize)]
struct Info {
	order: usize,
	states: usize,
	rows: usize,
}

/// Splits a comma-separated n-gram. The empty string is the empty n-gram.
fn parse_ngram(s: &str) -> Vec<String> {
	if s.is_empty() {
		Vec::new()
	} else {
		s.split(',').map(str::to_owned).collect()
	}
}

fn error_body(status: StatusCode, message: String) -> HttpResponse {
	HttpResponse::build(status).json(json!({ "error": message }))
}

fn chain_error(e: ChainError) -> HttpResponse {
	let status = match &e {
		ChainError::OrderMismatch { .. } | ChainError::InvalidOrder { .. } => StatusCode::BAD_REQUEST,
		ChainError::UnknownNGram(_) | ChainError::EmptyState(_) => StatusCode::NOT_FOUND,
		ChainError::MalformedSnapshot(_) => StatusCode::UNPROCESSABLE_ENTITY,
		ChainError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
	};
	log::debug!("request failed: {e}");
	error_body(status, e.to_string())
}

fn reject_sentinels<'a, I: IntoIterator<Item = &'a String>>(tokens: I) -> Result<(), HttpResponse> {
	match tokens.into_iter().find(|t| *t == START_TOKEN || *t == END_TOKEN) {
		Some(t) => Err(error_body(StatusCode::BAD_REQUEST, format!("token {t:?} is reserved"))),
		None => Ok(()),
	}
}

/// HTTP POST endpoint `/v1/add`
///
/// Trains the chain on one token sequence.
#[post("/v1/add")]
async fn post_add(data: web::Data<SharedData>, body: web::Json<AddBody>) -> impl Responder {
	if let Err(response) = reject_sentinels(&body.tokens) {
		return response;
	}
	data.chain().add(&body.tokens);
	HttpResponse::Ok().json(json!({ "trained": 1 }))
}

/// HTTP POST endpoint `/v1/add_batch`
///
/// Trains the chain on many sequences in parallel.
#[post("/v1/add_batch")]
async fn post_add_batch(data: web::Data<SharedData>, body: web::Json<BatchBody>) -> impl Responder {
	if let Err(response) = reject_sentinels(body.sequences.iter().flatten()) {
		return response;
	}
	let chain = data.chain();
	let body = body.into_inner();
	let trained = match web::block(move || train_parallel(&chain, &body.sequences)).await {
		Ok(n) => n,
		Err(e) => return error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
	};
	HttpResponse::Ok().json(json!({ "trained": trained }))
}

/// HTTP GET endpoint `/v1/probability`
#[get("/v1/probability")]
async fn get_probability(data: web::Data<SharedData>, query: web::Query<ProbabilityParams>) -> impl Responder {
	let current = parse_ngram(&query.current);
	match data.chain().transition_probability(&query.next, &current) {
		Ok(probability) => HttpResponse::Ok().json(json!({ "probability": probability })),
		Err(e) => chain_error(e),
	}
}

/// HTTP GET endpoint `/v1/generate`
///
/// Samples the token following `current`. With `seed`, the draw is reproducible.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<SharedData>, query: web::Query<GenerateParams>) -> impl Responder {
	let chain = data.chain();
	let current = match &query.current {
		Some(s) => parse_ngram(s),
		None => chain.start_ngram(),
	};

	let result = match query.seed {
		Some(seed) => chain.generate_deterministic(&current, &mut StdRng::seed_from_u64(seed)),
		None => chain.generate(&current),
	};
	match result {
		Ok(next) => HttpResponse::Ok().json(json!({ "next": next })),
		Err(e) => chain_error(e),
	}
}

/// HTTP GET endpoint `/v1/sentence`
///
/// Walks the chain from the sentence start to the end sentinel.
#[get("/v1/sentence")]
async fn get_sentence(data: web::Data<SharedData>, query: web::Query<SentenceParams>) -> impl Responder {
	let sampler = match query.seed {
		Some(seed) => Sampler::from_seed(seed),
		None => Sampler::from_entropy(),
	};
	let mut sampler = sampler.with_max_len(query.max_len.unwrap_or(DEFAULT_MAX_LEN));

	match sampler.sentence(&data.chain()) {
		Ok(tokens) => HttpResponse::Ok().json(json!({ "tokens": tokens })),
		Err(e) => chain_error(e),
	}
}

#[get("/v1/snapshot")]
async fn get_snapshot(data: web::Data<SharedData>) -> impl Responder {
	HttpResponse::Ok().json(data.chain().snapshot())
}

/// HTTP PUT endpoint `/v1/snapshot`
///
/// Replaces the served chain. The order may differ from the previous one.
#[put("/v1/snapshot")]
async fn put_snapshot(data: web::Data<SharedData>, body: web::Json<Snapshot>) -> impl Responder {
	match Chain::from_snapshot(body.into_inner()) {
		Ok(chain) => {
			log::info!("snapshot loaded: order {}, {} states", chain.order(), chain.state_count());
			data.replace(chain);
			HttpResponse::Ok().json(json!({ "loaded": true }))
		}
		Err(e) => chain_error(e),
	}
}

#[get("/v1/info")]
async fn get_info(data: web::Data<SharedData>) -> impl Responder {
	let chain = data.chain();
	HttpResponse::Ok().json(Info {
		order: chain.order(),
		states: chain.state_count(),
		rows: chain.row_count(),
	})
}

/// Registers every endpoint.
pub fn configure(cfg: &mut web::ServiceConfig) {
	cfg.service(post_add)
		.service(post_add_batch)
		.service(get_probability)
		.service(get_generated)
		.service(get_sentence)
		.service(get_snapshot)
		.service(put_snapshot)
		.service(get_info);
}
