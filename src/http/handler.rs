//! Route handlers.

use std::collections::HashMap;
use std::path::{Component, Path as FsPath};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use serde_json::json;

use super::response::ViewResponse;
use crate::views::{ViewOverrides, Views};

/// Views shared across handlers as axum state.
pub type SharedViews = Arc<Views>;

impl Views {
    /// Render `template` into an HTTP response.
    pub fn reply(&self, template: &str, context: serde_json::Value) -> ViewResponse {
        self.render(template, context).into()
    }

    /// Like [`reply`](Self::reply), with per-call option overrides.
    pub fn reply_with(
        &self,
        template: &str,
        context: serde_json::Value,
        overrides: &ViewOverrides,
    ) -> ViewResponse {
        self.render_with(template, context, overrides).into()
    }
}

/// GET handler rendering `template`.
///
/// The template sees the request's path parameters as `params` and its query
/// string as `query`.
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::Router;
/// use hotview::{ViewConfig, Views, view};
///
/// # fn main() -> Result<(), hotview::ViewError> {
/// let views = Arc::new(Views::new(ViewConfig::new("templates"))?);
/// let app: Router = Router::new()
///     .route("/", view("index"))
///     .route("/users/{id}", view("users/show"))
///     .with_state(views);
/// # Ok(())
/// # }
/// ```
pub fn view(template: impl Into<String>) -> MethodRouter<SharedViews> {
    let template: Arc<str> = Arc::from(template.into());
    get(
        move |State(views): State<SharedViews>,
              Path(params): Path<HashMap<String, String>>,
              Query(query): Query<HashMap<String, String>>| {
            let template = template.clone();
            async move {
                views.reply(&template, json!({ "params": params, "query": query }))
            }
        },
    )
}

/// Catch-all router serving every template under the templates directory.
///
/// `/` renders `index`; any other path renders the template it names.
pub fn router(views: SharedViews) -> Router {
    Router::new()
        .route("/", get(preview_index))
        .route("/{*path}", get(preview_path))
        .with_state(views)
}

async fn preview_index(
    State(views): State<SharedViews>,
    Query(query): Query<HashMap<String, String>>,
) -> ViewResponse {
    views.reply("index", json!({ "query": query }))
}

async fn preview_path(
    State(views): State<SharedViews>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    // Only plain relative names; no escaping the templates directory
    let safe = FsPath::new(&path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return StatusCode::NOT_FOUND.into_response();
    }

    views
        .reply(&path, json!({ "query": query }))
        .into_response()
}
