//! Response rendering for handler output.
//!
//! Strings are sent as HTML, unit as an empty 200, anything else as JSON.
//! Handler failures arrive here already rendered as `{"message": ...}`.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::dispatch::HandlerOutput;

impl IntoResponse for HandlerOutput {
    fn into_response(self) -> Response {
        match self {
            HandlerOutput::Text(text) => Html(text).into_response(),
            HandlerOutput::Json(value) => Json(value).into_response(),
            HandlerOutput::Empty => StatusCode::OK.into_response(),
        }
    }
}
