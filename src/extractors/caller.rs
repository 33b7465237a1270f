//! Extract the caller id resolved by the upstream auth layer (X-Caller-Id header).

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};

/// Header carrying the authenticated user id. Absent for anonymous calls.
pub const CALLER_ID_HEADER: &str = "X-Caller-Id";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallerId(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CallerId(caller_from_headers(&parts.headers)))
    }
}

pub fn caller_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(CALLER_ID_HEADER)
        .and_then(|v: &axum::http::HeaderValue| v.to_str().ok())
        .map(|s: &str| s.trim().to_string())
        .filter(|s: &String| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn blank_header_is_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(caller_from_headers(&headers), None);
        headers.insert(CALLER_ID_HEADER, HeaderValue::from_static("   "));
        assert_eq!(caller_from_headers(&headers), None);
        headers.insert(CALLER_ID_HEADER, HeaderValue::from_static(" 9f2c41d07a5be613 "));
        assert_eq!(caller_from_headers(&headers).as_deref(), Some("9f2c41d07a5be613"));
    }
}
