use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Json;
use kchain_ledger::{
    AddressState, AssetState, Balance, ChainLog, EncodingError, LedgerEngine, OwnershipProjection,
    Transaction, TxPage,
};
use kchain_types::{Address, AssetId, TxHash};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ServerError, ServerResult};

/// Shared state of the HTTP handlers.
pub struct AppState<C, P> {
    pub engine: Arc<LedgerEngine<C, P>>,
    pub max_per_page: u64,
}

impl<C, P> Clone for AppState<C, P> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            max_per_page: self.max_per_page,
        }
    }
}

/// Health check handler.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /kitty/:asset_id`
pub async fn kitty<C, P>(
    State(state): State<AppState<C, P>>,
    Path(asset_id): Path<u64>,
) -> ServerResult<Json<AssetState>>
where
    C: ChainLog + 'static,
    P: OwnershipProjection + 'static,
{
    let asset_id = AssetId::new(asset_id);
    state
        .engine
        .asset_state(asset_id)?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("asset {asset_id}")))
}

/// `GET /address/:address`
pub async fn address<C, P>(
    State(state): State<AppState<C, P>>,
    Path(address): Path<String>,
) -> ServerResult<Json<AddressState>>
where
    C: ChainLog + 'static,
    P: OwnershipProjection + 'static,
{
    let address = parse_address(&address)?;
    Ok(Json(state.engine.address_state(&address)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKey {
    #[default]
    Seq,
    Hash,
}

#[derive(Debug, Deserialize)]
pub struct TxQuery {
    #[serde(default)]
    pub request: TxKey,
}

/// `GET /tx/:id?request=seq|hash`
pub async fn tx<C, P>(
    State(state): State<AppState<C, P>>,
    Path(id): Path<String>,
    Query(query): Query<TxQuery>,
) -> ServerResult<Json<Transaction>>
where
    C: ChainLog + 'static,
    P: OwnershipProjection + 'static,
{
    let tx = match query.request {
        TxKey::Seq => {
            let seq = id
                .parse::<u64>()
                .map_err(|_| ServerError::InvalidRequest(format!("invalid sequence number {id:?}")))?;
            state.engine.get_by_sequence(seq)?
        }
        TxKey::Hash => {
            let hash = TxHash::from_hex(&id)
                .map_err(|e| ServerError::InvalidRequest(format!("invalid hash: {e}")))?;
            state.engine.get_by_hash(&hash)?
        }
    };
    Ok(Json(tx))
}

/// `GET /head_tx`
pub async fn head_tx<C, P>(State(state): State<AppState<C, P>>) -> ServerResult<Json<Transaction>>
where
    C: ChainLog + 'static,
    P: OwnershipProjection + 'static,
{
    state
        .engine
        .head()?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("the ledger is empty".into()))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub current_page: u64,
    pub per_page: Option<u64>,
}

/// `GET /txs?current_page=&per_page=`
///
/// `per_page` defaults to, and is capped at, the configured maximum.
pub async fn txs<C, P>(
    State(state): State<AppState<C, P>>,
    Query(query): Query<PageQuery>,
) -> ServerResult<Json<TxPage>>
where
    C: ChainLog + 'static,
    P: OwnershipProjection + 'static,
{
    let per_page = query
        .per_page
        .unwrap_or(state.max_per_page)
        .min(state.max_per_page);
    Ok(Json(state.engine.page(query.current_page, per_page)?))
}

/// `POST /inject_tx`
///
/// The body is either the binary encoding (`application/octet-stream`) or
/// its hex string.
pub async fn inject_tx<C, P>(
    State(state): State<AppState<C, P>>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Json<Transaction>>
where
    C: ChainLog + 'static,
    P: OwnershipProjection + 'static,
{
    let candidate = decode_body(&headers, &body)?;
    debug!(hash = %candidate.hash, asset = %candidate.asset_id, "inject request");
    // Inject holds the write lock and may fsync; keep it off the async workers.
    let engine = Arc::clone(&state.engine);
    let committed = tokio::task::spawn_blocking(move || engine.inject(candidate))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;
    Ok(Json(committed))
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub addrs: String,
}

/// `GET /balance?addrs=<hex>,<hex>`
pub async fn balance<C, P>(
    State(state): State<AppState<C, P>>,
    Query(query): Query<BalanceQuery>,
) -> ServerResult<Json<Vec<Balance>>>
where
    C: ChainLog + 'static,
    P: OwnershipProjection + 'static,
{
    let addresses = query
        .addrs
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_address)
        .collect::<ServerResult<Vec<_>>>()?;
    Ok(Json(state.engine.balances(&addresses)?))
}

fn parse_address(s: &str) -> ServerResult<Address> {
    Address::from_hex(s).map_err(|e| ServerError::InvalidRequest(format!("invalid address: {e}")))
}

fn decode_body(headers: &HeaderMap, body: &[u8]) -> ServerResult<Transaction> {
    let binary = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/octet-stream"));

    if binary {
        return Ok(Transaction::from_bytes(body)?);
    }

    let text = std::str::from_utf8(body)
        .map_err(|_| EncodingError::Hex("body is neither binary nor UTF-8 hex".into()))?;
    Ok(Transaction::from_hex(text.trim())?)
}
