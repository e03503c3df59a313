//! Data structures used throughout the application.

mod error;
pub mod options;
pub mod queue;
mod state;

pub use self::error::{BoardError, BoardResult};
pub use self::state::ApplicationState;
