//! Static file handler
//!
//! Serves a collection file by filename from its remote download URL.
//! Requests from the internal client (matched by User-Agent) get an empty 200
//! so metadata-only reads never pull the full file from the delivery network.

use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

const OCTET_STREAM: &str = "application/octet-stream";

#[tracing::instrument(skip(state, headers), fields(operation = "serve_file"))]
pub async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path((collection, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    match try_serve_file(&state, &collection, &filename, &headers).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, filename = %filename, "Unexpected error in static file handler");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn try_serve_file(
    state: &AppState,
    collection: &str,
    filename: &str,
    headers: &HeaderMap,
) -> anyhow::Result<Response> {
    let Some(adapter) = state.plugin.adapter(collection) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let download_url = adapter
        .download_url_for(filename)
        .await?
        .filter(|url| !url.trim().is_empty());
    let Some(download_url) = download_url else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());
    if user_agent == Some(state.config.internal_client_user_agent.as_str()) {
        tracing::debug!("File request from internal client, returning an empty file");
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, 0)
            .header(header::CONTENT_TYPE, OCTET_STREAM)
            .body(Body::empty())?);
    }

    let upstream = state.http_client.get(&download_url).send().await?;
    if !upstream.status().is_success() {
        tracing::debug!(status = %upstream.status(), url = %download_url, "Remote file unavailable");
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let etag = upstream.headers().get(header::ETAG).cloned();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(OCTET_STREAM));
    let body = upstream.bytes().await?;

    let client_etag = headers
        .get(header::ETAG)
        .or_else(|| headers.get(header::IF_NONE_MATCH));

    let mut response = Response::builder().header(header::CONTENT_TYPE, content_type);
    if let Some(etag) = &etag {
        response = response.header(header::ETAG, etag.clone());
    }

    if client_etag.is_some() && client_etag == etag.as_ref() {
        return Ok(response.status(StatusCode::NOT_MODIFIED).body(Body::empty())?);
    }

    Ok(response
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))?)
}
