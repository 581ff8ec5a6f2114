//! Backend abstraction layer
//!
//! Provides the trait the graph executes against, the shared descriptor and
//! command types, and an in-memory recording backend.

pub mod recording;
pub mod traits;
pub mod types;

pub use recording::*;
pub use traits::*;
pub use types::*;
