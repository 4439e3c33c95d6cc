//! Conversion of dispatcher output into axum responses.

use crate::dispatch::DispatchResponse;
use axum::{
    body::Body,
    response::{IntoResponse, Response},
};

impl IntoResponse for DispatchResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => Response::new(Body::from(body)),
            None => Response::new(Body::empty()),
        };
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

    #[tokio::test]
    async fn redirect_has_location_and_empty_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, HeaderValue::from_static("/admin"));
        let response = DispatchResponse {
            status: StatusCode::FOUND,
            headers,
            body: None,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/admin");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}
