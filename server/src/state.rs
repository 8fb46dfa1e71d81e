use std::sync::Arc;

use repkit_core::program::{ProgramIdSource, RandomProgramIds};
use repkit_core::providers::Providers;
use repkit_mcp_runtime::SessionRegistry;

/// Shared application state. The registry is the only mutable piece; the
/// providers and id source are read-only collaborators injected at startup.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub providers: Providers,
    pub ids: Arc<dyn ProgramIdSource>,
}

impl AppState {
    pub fn new(providers: Providers, ids: Arc<dyn ProgramIdSource>) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            providers,
            ids,
        }
    }

    /// Fixture-backed state for the demo deployment and tests.
    pub fn demo() -> Self {
        Self::new(Providers::demo(), Arc::new(RandomProgramIds))
    }
}
