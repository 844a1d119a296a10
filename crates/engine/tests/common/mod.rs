use std::sync::Arc;

use cadre_core::ThresholdRule;
use cadre_engine::{
    DefinitionService, LedgerService, LifecycleEngine, Principal, ProjectionService, StepInput,
};
use cadre_storage::{DefinitionRecord, MemoryStorage, StepRecord};

pub struct Stack {
    pub storage: Arc<MemoryStorage>,
    pub definitions: DefinitionService<MemoryStorage>,
    pub lifecycle: LifecycleEngine<MemoryStorage>,
    pub ledger: LedgerService<MemoryStorage>,
    pub projection: ProjectionService<MemoryStorage>,
}

pub fn stack() -> Stack {
    let storage = Arc::new(MemoryStorage::new());
    Stack {
        definitions: DefinitionService::new(storage.clone()),
        lifecycle: LifecycleEngine::new(storage.clone()),
        ledger: LedgerService::new(storage.clone()),
        projection: ProjectionService::new(storage.clone()),
        storage,
    }
}

pub fn principal(org: &str) -> Principal {
    Principal {
        user_id: "user-1".to_string(),
        email: "user-1@example.com".to_string(),
        organization_id: org.to_string(),
        role: "admin".to_string(),
    }
}

pub fn steps(names: &[&str]) -> Vec<StepInput> {
    names
        .iter()
        .map(|n| StepInput {
            name: n.to_string(),
            description: None,
        })
        .collect()
}

/// Create a definition with `count` steps named "Step 1".."Step N".
pub async fn seed_process(
    stack: &Stack,
    principal: &Principal,
    count: usize,
    rule: Option<ThresholdRule>,
) -> (DefinitionRecord, Vec<StepRecord>) {
    let names: Vec<String> = (1..=count).map(|i| format!("Step {}", i)).collect();
    let inputs = steps(&names.iter().map(|s| s.as_str()).collect::<Vec<_>>());
    stack
        .definitions
        .create(principal, "Expense approval", None, rule, inputs)
        .await
        .expect("seed definition")
}
