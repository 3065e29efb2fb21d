//! Assessment grade matrix: load, edit, diff, gate, persist.

pub mod coordinator;
pub mod diff;
pub mod editor;
pub mod error;
pub mod gate;
pub mod loader;
pub mod model;
pub mod snapshot;

pub use coordinator::{MatrixSession, Phase};
pub use error::MatrixError;
pub use loader::load_matrix;
