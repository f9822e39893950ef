//! Request extraction for handler scripts.
//!
//! # Responsibilities
//! - Buffer the body up to the configured limit
//! - Collect method, path, query, headers and route params
//! - Parse JSON bodies for convenience
//!
//! # Design Decisions
//! - Non-UTF-8 header values are skipped; bodies are decoded lossily
//! - Malformed JSON is not an error: `json` is simply absent

use std::collections::{BTreeMap, HashMap};

use axum::{
    body::Body,
    extract::Query,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::dispatch::ScriptRequest;
use crate::routing::Params;

/// Build the script-facing request. Fails only when the body exceeds `limit`.
pub async fn script_request(
    request: Request<Body>,
    params: Params,
    limit: usize,
) -> Result<ScriptRequest, Response> {
    let (parts, body) = request.into_parts();

    let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, "Failed to read request body");
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
    })?;

    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .unwrap_or_default();

    let headers: BTreeMap<String, String> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let json = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };

    Ok(ScriptRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        params,
        query,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
        json,
    })
}
