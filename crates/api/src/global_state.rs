use std::sync::Arc;

use anyhow::Result;

use aula_clients::{ExchangeRateClient, PostgresClient};
use aula_settlement::store::{run_migrations, PgNotificationSink, PgSettlementStore};
use aula_settlement::RefundService;

#[derive(Clone)]
pub struct GlobalState {
    pub db: PostgresClient,
    pub store: Arc<PgSettlementStore>,
    pub refunds: Arc<RefundService<PgSettlementStore, PgNotificationSink>>,
    pub rates: Arc<ExchangeRateClient>,
}

impl GlobalState {
    pub async fn new() -> Result<Self> {
        let db = PostgresClient::setup_connection().await?;
        run_migrations(db.get_client()).await?;

        let store = Arc::new(PgSettlementStore::new(db.get_client().clone()));
        let notifier = Arc::new(PgNotificationSink::new(db.get_client().clone()));
        let refunds = Arc::new(RefundService::new(store.clone(), notifier));
        let rates = Arc::new(ExchangeRateClient::new());

        Ok(Self { db, store, refunds, rates })
    }
}
