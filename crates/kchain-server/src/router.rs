use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use kchain_ledger::{ChainLog, LedgerEngine, OwnershipProjection};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all ledger endpoints.
pub fn build_router<C, P>(engine: Arc<LedgerEngine<C, P>>, max_per_page: u64) -> Router
where
    C: ChainLog + 'static,
    P: OwnershipProjection + 'static,
{
    let state = AppState {
        engine,
        max_per_page,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handler::health))
        .route("/kitty/:asset_id", get(handler::kitty::<C, P>))
        .route("/address/:address", get(handler::address::<C, P>))
        .route("/tx/:id", get(handler::tx::<C, P>))
        .route("/head_tx", get(handler::head_tx::<C, P>))
        .route("/txs", get(handler::txs::<C, P>))
        .route("/inject_tx", post(handler::inject_tx::<C, P>))
        .route("/balance", get(handler::balance::<C, P>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
