//! REST API for the coin ledger
//!
//! Wallet, transfer, NFT and maintenance endpoints over a shared
//! [`Blockchain`]. The ledger sits behind an async `RwLock`, so readers wait
//! without tying up runtime workers. Proofs are mined on the blocking pool
//! with no lock held; the write lock is only taken to queue a transaction
//! and to append the finished block.

use axum::{
    extract::{Path, Query, State},
    http::{self, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::amount::{parse_amount, Amount};
use crate::blockchain::{Blockchain, SubmitOutcome};
use crate::crypto::Token;
use crate::error::ChainError;
use crate::miner::proof_of_work;
use crate::nft::NftAsset;
use crate::transaction::Transaction;
use crate::wallet::WalletRecord;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<RwLock<Blockchain>>,
    /// Held from queueing a transaction until its block is appended, so only
    /// one submission mines at a time and the tail cannot move under it.
    seal_gate: Arc<Mutex<()>>,
    secret: Arc<str>,
}

impl AppState {
    pub fn new(ledger: Arc<RwLock<Blockchain>>, secret: impl Into<Arc<str>>) -> Self {
        Self {
            ledger,
            seal_gate: Arc::new(Mutex::new(())),
            secret: secret.into(),
        }
    }

    fn authorize(&self, key: &str) -> Result<(), ApiError> {
        if key != &*self.secret {
            return Err(ApiError::from(ChainError::AuthenticationError(
                "Invalid key".to_string(),
            )));
        }
        Ok(())
    }

    /// Runs `f` under the write lock on the blocking pool, since ledger
    /// writes end in a snapshot on disk.
    async fn write<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Blockchain) -> Result<T, ChainError> + Send + 'static,
        T: Send + 'static,
    {
        let mut ledger = self.ledger.clone().write_owned().await;
        tokio::task::spawn_blocking(move || f(&mut ledger))
            .await
            .map_err(|e| ApiError::Internal(format!("ledger task failed: {}", e)))?
            .map_err(ApiError::from)
    }

    /// Queues `tx` and, when that completes a batch, mines and appends the
    /// block. Returns the transaction's position in the queue (and therefore
    /// in its block) together with the outcome.
    async fn submit(&self, tx: Transaction) -> Result<(usize, SubmitOutcome), ApiError> {
        let _gate = self.seal_gate.lock().await;

        let (position, due, queued) = self
            .write(move |ledger| {
                let due = ledger.enqueue(tx)?;
                Ok((ledger.pending().len() - 1, due, ledger.queued_outcome()))
            })
            .await?;
        if !due {
            return Ok((position, queued));
        }

        let (last_proof, difficulty) = {
            let ledger = self.ledger.read().await;
            (ledger.last_proof()?, ledger.difficulty)
        };
        let proof = tokio::task::spawn_blocking(move || proof_of_work(last_proof, difficulty))
            .await
            .map_err(|e| ApiError::Internal(format!("mining task failed: {}", e)))?;

        let (block, report) = self.write(move |ledger| ledger.seal_with_proof(proof)).await?;
        Ok((
            position,
            SubmitOutcome::Sealed {
                block: Box::new(block),
                report,
            },
        ))
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Ledger(ChainError),
    InvalidInput(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Ledger(e) => {
                let status = match &e {
                    ChainError::UnresolvedWallet(_) | ChainError::UnresolvedAsset(_) => {
                        StatusCode::NOT_FOUND
                    }
                    ChainError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
                    ChainError::BlockRejected(_) => StatusCode::CONFLICT,
                    ChainError::InvalidTransaction(_)
                    | ChainError::NegativeAmount(_)
                    | ChainError::SelfTransfer(_)
                    | ChainError::InsufficientFunds { .. }
                    | ChainError::InsufficientTransactions { .. } => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Ledger(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct WalletQuery {
    pub private_key: Token,
    pub public_key: Token,
}

#[derive(Deserialize)]
pub struct PrivateKeyQuery {
    pub private_key: Token,
}

#[derive(Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    /// Sender's private token.
    pub from: Token,
    /// Recipient's public token.
    pub to: Token,
    pub amount: String,
}

#[derive(Deserialize)]
pub struct CreditRequest {
    pub public_key: Token,
    pub amount: String,
    pub key: String,
}

#[derive(Deserialize)]
pub struct MintRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    pub owner: Token,
}

#[derive(Deserialize)]
pub struct NftTransferRequest {
    pub nft: Token,
    pub from: Token,
    pub to: Token,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub public_key: Token,
    pub balance: Amount,
}

#[derive(Serialize)]
pub struct PublicKeyResponse {
    pub public_key: Token,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    Pending,
    Sealed,
}

/// What happened to a submitted transaction.
#[derive(Serialize)]
pub struct SubmitResponse {
    pub status: SubmitStatus,
    pub tx_hash: String,
    /// Set once the transaction is in a sealed block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", with = "crate::nft::with_hash")]
    pub minted: Vec<NftAsset>,
    pub pending: usize,
}

impl SubmitResponse {
    fn new(tx_hash: String, position: usize, outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Pending { queued, .. } => SubmitResponse {
                status: SubmitStatus::Pending,
                tx_hash,
                block_hash: None,
                applied: None,
                rejection: None,
                minted: Vec::new(),
                pending: queued,
            },
            SubmitOutcome::Sealed { block, report } => {
                let included = position < block.transactions.len();
                let applied = included.then(|| report.was_applied(position));
                let rejection = report.rejection_at(position).map(ToString::to_string);
                SubmitResponse {
                    status: SubmitStatus::Sealed,
                    tx_hash,
                    block_hash: Some(block.hash_str()),
                    applied,
                    rejection,
                    minted: block.nft,
                    pending: 0,
                }
            }
        }
    }
}

#[derive(Serialize)]
pub struct ChainSummary {
    pub name: String,
    pub length: usize,
    pub difficulty: u32,
    pub min_transactions: usize,
    pub pending: usize,
    pub wallets: usize,
    pub last_hash: Option<String>,
    pub valid: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        // Wallet endpoints
        .route("/wallet", post(create_wallet).get(get_balance))
        .route("/wallet/transfer", post(transfer))
        .route("/wallet/credit", post(credit))
        .route("/wallet/public-key", get(get_public_key))
        .route("/wallet/validate", get(validate_address))
        // NFT endpoints
        .route("/nft/mint", post(mint_nft))
        .route("/nft/transfer", post(transfer_nft))
        .route("/nft/:id", get(get_nft))
        // Chain endpoints
        .route("/chain", get(chain_summary))
        .route("/sync", post(sync).get(sync))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serves the API on `addr` until `shutdown` resolves.
pub async fn run_api_server<F>(
    state: AppState,
    addr: SocketAddr,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn create_wallet(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let record: WalletRecord = state.write(|ledger| ledger.create_wallet()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_balance(
    State(state): State<AppState>,
    Query(q): Query<WalletQuery>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let ledger = state.ledger.read().await;
    let balance = ledger
        .wallets()
        .get_balance(&q.private_key, &q.public_key)
        .ok_or_else(|| ApiError::NotFound("Wallet not found".to_string()))?;
    Ok(Json(BalanceResponse {
        public_key: q.public_key,
        balance,
    }))
}

async fn submit(state: &AppState, tx: Transaction) -> Result<Json<SubmitResponse>, ApiError> {
    tx.validate_fields()?;
    let tx_hash = tx.hash_str();
    let (position, outcome) = state.submit(tx).await?;
    Ok(Json(SubmitResponse::new(tx_hash, position, outcome)))
}

fn amount_field(raw: &str) -> Result<Amount, ApiError> {
    parse_amount(raw).map_err(|e| ApiError::InvalidInput(e.to_string()))
}

async fn transfer(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let amount = amount_field(&req.amount)?;
    submit(&state, Transaction::token_transfer(req.from, req.to, amount)).await
}

async fn credit(
    State(state): State<AppState>,
    Json(req): Json<CreditRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    state.authorize(&req.key)?;
    let amount = amount_field(&req.amount)?;
    let known = state.ledger.read().await.wallets().balance_of(&req.public_key).is_some();
    if !known {
        return Err(ChainError::UnresolvedWallet(req.public_key.to_string()).into());
    }
    submit(&state, Transaction::credit(req.public_key, amount)).await
}

async fn get_public_key(
    State(state): State<AppState>,
    Query(q): Query<PrivateKeyQuery>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let public_key = state
        .ledger
        .read()
        .await
        .wallets()
        .get_public_key(&q.private_key)
        .ok_or_else(|| ApiError::NotFound("Wallet not found".to_string()))?;
    Ok(Json(PublicKeyResponse { public_key }))
}

async fn validate_address(
    State(state): State<AppState>,
    Query(q): Query<WalletQuery>,
) -> Json<ValidateResponse> {
    let valid = state
        .ledger
        .read()
        .await
        .wallets()
        .validate_address(&q.private_key, &q.public_key);
    Json(ValidateResponse { valid })
}

async fn mint_nft(
    State(state): State<AppState>,
    Json(req): Json<MintRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    submit(
        &state,
        Transaction::nft_mint(req.name, req.description, req.url, req.owner),
    )
    .await
}

async fn transfer_nft(
    State(state): State<AppState>,
    Json(req): Json<NftTransferRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    submit(&state, Transaction::nft_transfer(req.nft, req.from, req.to)).await
}

async fn get_nft(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let ledger = state.ledger.read().await;
    let nft = ledger
        .wallets()
        .get_nft(&Token::from(id.as_str()))
        .ok_or_else(|| ApiError::NotFound(format!("NFT {} not found", id)))?;
    let json = serde_json::json!({
        "id": nft.id,
        "name": nft.name,
        "description": nft.description,
        "url": nft.url,
        "owner": nft.owner,
        "timestamp": nft.timestamp,
        "hash": nft.hash_str(),
    });
    Ok(Json(json).into_response())
}

async fn chain_summary(State(state): State<AppState>) -> Json<ChainSummary> {
    let ledger = state.ledger.read().await;
    Json(ChainSummary {
        name: ledger.name.clone(),
        length: ledger.len(),
        difficulty: ledger.difficulty,
        min_transactions: ledger.min_transactions,
        pending: ledger.pending().len(),
        wallets: ledger.wallets().len(),
        last_hash: ledger.last_block().map(|b| b.hash_str()),
        valid: ledger.validate(),
    })
}

async fn sync(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&q.key)?;
    let ledger = state.ledger.clone().read_owned().await;
    tokio::task::spawn_blocking(move || ledger.sync())
        .await
        .map_err(|e| ApiError::Internal(format!("sync task failed: {}", e)))??;
    Ok(Json(StatusResponse { status: "success" }))
}
