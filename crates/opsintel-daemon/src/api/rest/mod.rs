//! REST and SSE endpoints

pub mod handlers;
pub mod router;
pub mod state;
