//! Response marshaling.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{ViewError, ViewResult};
use crate::views::Rendered;

/// Outcome of a view render, ready to be returned from an axum handler.
///
/// Success is served with status 200 and the view's content type. Any
/// failure becomes a generic 500; the underlying message is only logged.
#[derive(Debug)]
pub struct ViewResponse(ViewResult<Rendered>);

impl ViewResponse {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Ok(_) => StatusCode::OK,
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_result(self) -> ViewResult<Rendered> {
        self.0
    }
}

impl From<ViewResult<Rendered>> for ViewResponse {
    fn from(result: ViewResult<Rendered>) -> Self {
        ViewResponse(result)
    }
}

impl IntoResponse for ViewResponse {
    fn into_response(self) -> Response {
        match self.0 {
            Ok(rendered) => rendered.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        let Ok(content_type) = HeaderValue::from_str(&self.content_type_header()) else {
            tracing::error!(
                "[http] invalid content type: {}",
                self.content_type_header()
            );
            return internal_error();
        };

        let mut res = self.body.into_response();
        res.headers_mut().insert(header::CONTENT_TYPE, content_type);
        res
    }
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        tracing::error!("[http] render failed: {self}");
        internal_error()
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "statusCode": 500,
            "error": "Internal Server Error",
            "message": "An internal server error occurred",
        })),
    )
        .into_response()
}
