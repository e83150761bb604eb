use std::sync::Arc;
use tracing::info;

use crate::{
    api::handler::AppState,
    blockchain::{EthRpcClient, LedgerGateway},
    config::Config,
    error::AppResult,
    ledger::{PgStore, TransactionStore},
    reconciliation::{
        BalanceReconciler, HeightCursor, Reconciler, ReconcilerConfig, Registry, Submitter,
    },
};

/// Everything `main` needs to run the service
pub struct Application {
    pub state: AppState,
    pub reconciler: Arc<Reconciler>,
    pub store: Arc<PgStore>,
}

pub async fn initialize_app(config: &Config) -> AppResult<Application> {
    info!("Initializing application components ...");

    let store = Arc::new(PgStore::connect(&config.storage).await?);
    let gateway: Arc<dyn LedgerGateway> = Arc::new(EthRpcClient::new(&config.blockchain)?);
    info!("✅ Ledger client ready for {}", config.blockchain.rpc_url);

    let dyn_store: Arc<dyn TransactionStore> = store.clone();
    let registry = Arc::new(Registry::new());
    let cursor = Arc::new(HeightCursor::default());
    let balances = Arc::new(BalanceReconciler::new(gateway.clone(), dyn_store.clone()));

    let reconciler = Arc::new(Reconciler::new(
        ReconcilerConfig::from_config(config),
        gateway.clone(),
        dyn_store.clone(),
        registry.clone(),
        cursor.clone(),
        balances.clone(),
    ));

    // Serving starts only with a valid cursor and the pending set loaded
    reconciler.initialize().await?;

    let submitter = Arc::new(Submitter::new(
        gateway,
        dyn_store.clone(),
        registry.clone(),
        balances,
        config.confirmation.reconcile_balances_on_submit,
    ));

    let state = AppState {
        store: dyn_store,
        registry,
        cursor,
        submitter,
        confirmation: config.confirmation.clone(),
    };

    info!("✓ Application components initialized");
    Ok(Application {
        state,
        reconciler,
        store,
    })
}
