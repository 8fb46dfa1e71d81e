use thiserror::Error;

/// Failures surfaced by the core domain logic. Provider reads are infallible
/// (missing data is `None`/empty), so this covers synthesis preconditions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The exercise catalog lacks an entry the weekly template depends on.
    #[error("exercise catalog is missing required entry '{key}'")]
    MissingExercise { key: &'static str },
}
