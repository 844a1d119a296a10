//! Application state shared across request handlers.

use std::collections::HashMap;

use cadre_engine::{
    DefinitionService, LedgerService, LifecycleEngine, Principal, ProjectionService,
    SummaryService,
};
use cadre_storage::MemoryStorage;

pub(crate) struct AppState {
    /// Bearer token -> authenticated identity, from the serve config.
    pub(crate) tokens: HashMap<String, Principal>,
    pub(crate) definitions: DefinitionService<MemoryStorage>,
    pub(crate) lifecycle: LifecycleEngine<MemoryStorage>,
    pub(crate) ledger: LedgerService<MemoryStorage>,
    pub(crate) projection: ProjectionService<MemoryStorage>,
    pub(crate) summary: SummaryService<MemoryStorage>,
}
