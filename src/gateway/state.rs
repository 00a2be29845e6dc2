use std::sync::Arc;

use crate::account::AccountService;
use crate::store::LedgerStore;
use crate::transfer::{ProcessorStats, TransferService};

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub transfers: Arc<TransferService>,
    /// Counters of the running processor, if any (reported by /health)
    pub processor_stats: Option<Arc<ProcessorStats>>,
}

impl AppState {
    /// Build both services over the same store
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(Arc::clone(&store))),
            transfers: Arc::new(TransferService::new(store)),
            processor_stats: None,
        }
    }

    pub fn with_processor_stats(mut self, stats: Arc<ProcessorStats>) -> Self {
        self.processor_stats = Some(stats);
        self
    }
}
