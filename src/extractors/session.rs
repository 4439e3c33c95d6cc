//! Extract the session id from the request's `Cookie` header.

use crate::session::parse_cookie;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

/// Session id carried by the configured session cookie, if any.
#[derive(Clone, Debug)]
pub struct SessionCookie(pub Option<String>);

#[async_trait]
impl FromRequestParts<AppState> for SessionCookie {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let name = &state.session_config().cookie_name;
        let value = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|raw| parse_cookie(raw, name));
        Ok(SessionCookie(value))
    }
}
