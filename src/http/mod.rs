//! axum integration: response marshaling and view handlers.

mod handler;
mod response;

pub use handler::{SharedViews, router, view};
pub use response::ViewResponse;
