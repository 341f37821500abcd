//! HTTP server for the tracker API.
//!
//! Exposes submission, watch removal, cached and live receipt reads,
//! progress snapshots, sender history and a server-sent event stream of
//! tracker events.

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::{
		sse::{Event, KeepAlive, Sse},
		IntoResponse, Json, Response,
	},
	routing::{delete, get, post},
	Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracker_config::ApiConfig;
use tracker_core::{RecentTransactionFilter, ResolvedTransaction, TrackerError, TransactionTracker};
use tracker_types::{
	Address, ChainId, JsonRpcPayload, ProgressEvent, ProgressId, StateEvent, TrackerEvent,
	TransactionHash, TransactionProgress, TransactionReceipt, WatcherEvent,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub tracker: Arc<TransactionTracker>,
	/// Upper bound for handlers that reach the chain.
	pub request_timeout: Duration,
}

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
	#[error("{0}")]
	NotFound(String),
	#[error("Request timed out")]
	Timeout,
	#[error(transparent)]
	Tracker(#[from] TrackerError),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = match &self {
			ApiError::NotFound(_) => StatusCode::NOT_FOUND,
			ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
			ApiError::Tracker(TrackerError::UnsupportedChain(_)) => StatusCode::BAD_REQUEST,
			ApiError::Tracker(TrackerError::Rpc(_)) => StatusCode::BAD_GATEWAY,
			ApiError::Tracker(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		(
			status,
			Json(serde_json::json!({ "error": self.to_string() })),
		)
			.into_response()
	}
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
	pub chain_id: ChainId,
	pub hash: TransactionHash,
	pub payload: JsonRpcPayload,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
	/// `None` when the payload carries no transaction to derive an id from.
	pub progress_id: Option<ProgressId>,
}

#[derive(Debug, Serialize)]
pub struct UnwatchResponse {
	pub removed: bool,
}

/// State of the watcher's receipt lookup for a hash.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CachedReceiptResponse {
	Pending,
	Resolved { receipt: Option<TransactionReceipt> },
}

#[derive(Debug, Serialize)]
pub struct LiveReceiptResponse {
	pub receipt: Option<TransactionReceipt>,
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	tracker: Arc<TransactionTracker>,
) -> Result<(), Box<dyn std::error::Error>> {
	let state = AppState {
		tracker,
		request_timeout: Duration::from_secs(api_config.timeout_seconds),
	};

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Tracker API server starting on {}", bind_address);

	axum::serve(listener, router(state)).await?;

	Ok(())
}

/// Builds the router with every route under `/api`.
pub fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/transactions", post(handle_submit))
				.route(
					"/transactions/{chain_id}/{hash}",
					delete(handle_unwatch),
				)
				.route(
					"/transactions/{chain_id}/{hash}/receipt",
					get(handle_cached_receipt),
				)
				.route(
					"/transactions/{chain_id}/{hash}/live-receipt",
					get(handle_live_receipt),
				)
				.route("/progress/{progress_id}", get(handle_get_progress))
				.route(
					"/accounts/{chain_id}/{account}/transactions",
					get(handle_recent_transactions),
				)
				.route(
					"/accounts/{chain_id}/{account}/transactions/{hash}",
					get(handle_recent_transaction),
				)
				.route("/events", get(handle_events)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(state)
}

/// Handles POST /api/transactions requests.
async fn handle_submit(
	State(state): State<AppState>,
	Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
	let progress_id = state
		.tracker
		.submit(request.chain_id, request.hash, request.payload)
		.await?;
	Ok(Json(SubmitResponse { progress_id }))
}

/// Handles DELETE /api/transactions/{chain_id}/{hash} requests.
async fn handle_unwatch(
	Path((chain_id, hash)): Path<(ChainId, TransactionHash)>,
	State(state): State<AppState>,
) -> Json<UnwatchResponse> {
	Json(UnwatchResponse {
		removed: state.tracker.unwatch(chain_id, &hash),
	})
}

/// Handles GET /api/transactions/{chain_id}/{hash}/receipt requests.
///
/// Reports the watcher's lookup without waiting for it or starting one.
async fn handle_cached_receipt(
	Path((chain_id, hash)): Path<(ChainId, TransactionHash)>,
	State(state): State<AppState>,
) -> Result<Json<CachedReceiptResponse>, ApiError> {
	let pending = state
		.tracker
		.receipt_from_cache(chain_id, &hash)
		.ok_or_else(|| ApiError::NotFound(format!("No receipt lookup for {}", hash)))?;

	let response = match pending.peek() {
		Some(receipt) => CachedReceiptResponse::Resolved {
			receipt: receipt.clone(),
		},
		None => CachedReceiptResponse::Pending,
	};
	Ok(Json(response))
}

/// Handles GET /api/transactions/{chain_id}/{hash}/live-receipt requests.
async fn handle_live_receipt(
	Path((chain_id, hash)): Path<(ChainId, TransactionHash)>,
	State(state): State<AppState>,
) -> Result<Json<LiveReceiptResponse>, ApiError> {
	let receipt = tokio::time::timeout(
		state.request_timeout,
		state.tracker.receipt_from_chain(chain_id, &hash),
	)
	.await
	.map_err(|_| ApiError::Timeout)??;
	Ok(Json(LiveReceiptResponse { receipt }))
}

/// Handles GET /api/progress/{progress_id} requests.
async fn handle_get_progress(
	Path(progress_id): Path<ProgressId>,
	State(state): State<AppState>,
) -> Result<Json<TransactionProgress>, ApiError> {
	state
		.tracker
		.progress(&progress_id)
		.map(Json)
		.ok_or_else(|| ApiError::NotFound(format!("No progress tracked for {}", progress_id)))
}

/// Handles GET /api/accounts/{chain_id}/{account}/transactions requests.
///
/// Accepts an optional `status` query parameter.
async fn handle_recent_transactions(
	Path((chain_id, account)): Path<(ChainId, Address)>,
	Query(filter): Query<RecentTransactionFilter>,
	State(state): State<AppState>,
) -> Result<Json<Vec<ResolvedTransaction>>, ApiError> {
	let rows = tokio::time::timeout(
		state.request_timeout,
		state.tracker.recent_transactions(chain_id, account, filter),
	)
	.await
	.map_err(|_| ApiError::Timeout)??;
	Ok(Json(rows))
}

/// Handles GET /api/accounts/{chain_id}/{account}/transactions/{hash} requests.
async fn handle_recent_transaction(
	Path((chain_id, account, hash)): Path<(ChainId, Address, TransactionHash)>,
	Query(filter): Query<RecentTransactionFilter>,
	State(state): State<AppState>,
) -> Result<Json<ResolvedTransaction>, ApiError> {
	tokio::time::timeout(
		state.request_timeout,
		state.tracker.recent_transaction(chain_id, account, &hash, filter),
	)
	.await
	.map_err(|_| ApiError::Timeout)??
	.map(Json)
	.ok_or_else(|| ApiError::NotFound(format!("No history entry for {}", hash)))
}

/// Handles GET /api/events requests with a server-sent event stream.
///
/// A subscriber that falls behind skips the events it missed.
async fn handle_events(
	State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
	let stream = BroadcastStream::new(state.tracker.subscribe())
		.filter_map(|event| event.ok())
		.map(|event| Event::default().event(event_name(&event)).json_data(&event));

	Sse::new(stream).keep_alive(KeepAlive::default())
}

fn event_name(event: &TrackerEvent) -> &'static str {
	match event {
		TrackerEvent::Progress(ProgressEvent::Updated { .. }) => "progressUpdated",
		TrackerEvent::State(StateEvent::Updated { .. }) => "stateUpdated",
		TrackerEvent::Watcher(WatcherEvent::TransactionReplaced { .. }) => "transactionReplaced",
		TrackerEvent::Watcher(WatcherEvent::WatchExpired { .. }) => "watchExpired",
	}
}
