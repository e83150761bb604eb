use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

use super::models::*;
use crate::blockchain::Transaction;
use crate::config::ConfirmationConfig;
use crate::error::AppResult;
use crate::ledger::TransactionStore;
use crate::reconciliation::{HeightCursor, Registry, Submitter};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TransactionStore>,
    pub registry: Arc<Registry>,
    pub cursor: Arc<HeightCursor>,
    pub submitter: Arc<Submitter>,
    pub confirmation: ConfirmationConfig,
}

/// Submit a transfer in the background
/// GET /SendEth?from=&to=&amount=
pub async fn send_eth(
    State(state): State<AppState>,
    Query(query): Query<SendEthQuery>,
) -> AppResult<Json<MessageResponse>> {
    query.validate()?;
    let transaction = Transaction::create(&query.from, &query.to, &query.amount)?;

    info!("💸 Sending {} from {} to {}", query.amount, query.from, query.to);

    let submitter = state.submitter.clone();
    tokio::spawn(async move {
        if let Err(e) = submitter.submit(transaction).await {
            error!("❌ Transaction submission failed: {}", e);
        }
    });

    Ok(Json(MessageResponse::new("transaction sent for processing")))
}

/// Recent incoming transfers, flagged as shown once returned
/// GET /GetLast
///
/// Rows are marked on a spawned task after the response is built, so the
/// request never waits on the write and a failed load never flags anything.
pub async fn get_last(State(state): State<AppState>) -> AppResult<Json<Vec<LastTransaction>>> {
    let records = state
        .store
        .load_recent(state.confirmation.for_last_confirmations_amount)
        .await?;

    let ids: Vec<i64> = records.iter().map(|record| record.id).collect();
    let response: Vec<LastTransaction> = records.into_iter().map(LastTransaction::from).collect();

    if !ids.is_empty() {
        let store = state.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.mark_shown(&ids).await {
                error!("❌ Can't mark transactions as shown: {}", e);
            }
        });
    }

    Ok(Json(response))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        height: state.cursor.get().to_string(),
        pending_transactions: state.registry.len(),
    })
}
