//! Fallback handler: every request not claimed by another route goes through the dispatcher.

use crate::dispatch::TransportRequest;
use crate::error::AppError;
use crate::extractors::SessionCookie;
use crate::session::{is_expired, SessionHandle};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub async fn dispatch(
    State(state): State<AppState>,
    SessionCookie(session_id): SessionCookie,
    request: Request,
) -> Result<Response, AppError> {
    let session = open_session(&state, session_id).await?;
    let transport = transport_request(&state, request, session.clone()).await?;

    let mut response = state.dispatcher.dispatch(transport).await.into_response();
    if session.needs_cookie() {
        let cookie = session.set_cookie_header(state.session_config());
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::BadRequest(format!("session cookie: {}", e)))?;
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(response)
}

/// Resume the cookie's session, or start a new one when it is missing, unknown or expired.
async fn open_session(state: &AppState, id: Option<String>) -> Result<SessionHandle, AppError> {
    if let Some(id) = id {
        match state.sessions.load(&id).await? {
            Some(data) if is_expired(&data, Utc::now()) => {
                tracing::debug!(session = %id, "session expired; starting a new session");
                state.sessions.destroy(&id).await?;
            }
            Some(data) => return Ok(SessionHandle::resume(state.sessions.clone(), id, data)),
            None => tracing::debug!(session = %id, "unknown session id; starting a new session"),
        }
    }
    Ok(SessionHandle::create(state.sessions.clone(), state.session_config()))
}

async fn transport_request(
    state: &AppState,
    request: Request,
    session: SessionHandle,
) -> Result<TransportRequest, AppError> {
    let (parts, body) = request.into_parts();
    let query = parts.uri.query().map(parse_form).unwrap_or_default();
    let limit = state.dispatcher.config().dispatcher.body_limit_bytes;
    let body = read_body(&parts.headers, body, limit).await?;

    let mut transport = TransportRequest::new(parts.method, parts.uri.path()).with_body(body);
    transport.query = query;
    transport.headers = parts.headers;
    Ok(transport.with_session(session))
}

/// Form and JSON bodies become a JSON value; anything else is ignored.
async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Value, AppError> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| AppError::BadRequest(format!("request body: {}", e)))?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        let fields: Map<String, Value> = url::form_urlencoded::parse(&bytes)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        return Ok(Value::Object(fields));
    }
    if content_type.starts_with("application/json") {
        return serde_json::from_slice(&bytes).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)));
    }
    tracing::debug!(content_type, "unsupported body type; ignoring body");
    Ok(Value::Null)
}

fn parse_form(raw: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}
