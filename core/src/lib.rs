pub mod error;
pub mod fixtures;
pub mod history;
pub mod model;
pub mod program;
pub mod providers;

pub use error::CoreError;
