use std::sync::Arc;

use crate::model::{Exercise, UserProfile, WorkoutSession};

/// Identity every unresolvable credential falls back to. Resolution failures
/// are absorbed, never surfaced as errors.
pub const DEFAULT_IDENTITY: &str = "demo_user";

/// Read-only access to user training profiles.
pub trait ProfileProvider: Send + Sync {
    fn profile(&self, user_id: &str) -> Option<UserProfile>;
}

/// Read-only access to logged workout history, most recent first or not —
/// callers re-sort as needed.
pub trait HistoryProvider: Send + Sync {
    fn sessions(&self, user_id: &str) -> Vec<WorkoutSession>;
}

/// Read-only access to the static exercise catalog.
pub trait ExerciseCatalog: Send + Sync {
    fn all(&self) -> Vec<Exercise>;
    fn by_key(&self, key: &str) -> Option<Exercise>;
    fn by_id(&self, id: i64) -> Option<Exercise>;
}

/// Read-only access to recorded one-rep-max values. `Some(0.0)` means
/// "tracked but bodyweight/unknown load" and must not drive percentage work.
pub trait RmProvider: Send + Sync {
    fn one_rm(&self, user_id: &str, exercise_id: i64) -> Option<f64>;
}

/// Bundle of the four read providers a handler set consumes. Cheap to clone;
/// all fields are shared.
#[derive(Clone)]
pub struct Providers {
    pub profiles: Arc<dyn ProfileProvider>,
    pub history: Arc<dyn HistoryProvider>,
    pub catalog: Arc<dyn ExerciseCatalog>,
    pub rm: Arc<dyn RmProvider>,
}

impl Providers {
    /// Fixture-backed providers mirroring the demo data set.
    pub fn demo() -> Self {
        Self {
            profiles: Arc::new(crate::fixtures::DemoProfiles),
            history: Arc::new(crate::fixtures::DemoHistory),
            catalog: Arc::new(crate::fixtures::DemoCatalog::new()),
            rm: Arc::new(crate::fixtures::DemoRms),
        }
    }
}

/// Resolve a bearer credential to an identity. A token is an identity only
/// when the profile provider knows it; everything else maps to the demo
/// identity.
pub fn resolve_identity(token: Option<&str>, profiles: &dyn ProfileProvider) -> String {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) if profiles.profile(token).is_some() => token.to_string(),
        _ => DEFAULT_IDENTITY.to_string(),
    }
}
