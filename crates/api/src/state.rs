//! Shared application state.

use std::sync::Arc;

use inventory::{AllocationEngine, InventoryConfig, InventoryItemStore, InventoryRepository};
use reporting::ReportingAggregator;
use transfer::TransferCoordinator;

/// Services shared by all handlers, built over one repository.
pub struct AppState<R> {
    pub store: InventoryItemStore<R>,
    pub allocations: AllocationEngine<R>,
    pub transfers: TransferCoordinator<R>,
    pub reports: ReportingAggregator<R>,
}

impl<R: InventoryRepository> AppState<R> {
    pub fn new(repo: Arc<R>, config: InventoryConfig) -> Self {
        let store = InventoryItemStore::new(Arc::clone(&repo), config);
        Self {
            allocations: AllocationEngine::new(store.clone()),
            transfers: TransferCoordinator::new(store.clone()),
            reports: ReportingAggregator::new(repo),
            store,
        }
    }
}
