//! API request handlers

mod decisions;
mod events;
mod health;
mod predict;
mod stream;
mod workflows;

pub use decisions::*;
pub use events::*;
pub use health::*;
pub use predict::*;
pub use stream::*;
pub use workflows::*;

use serde::Serialize;

/// Collection envelope
#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}
