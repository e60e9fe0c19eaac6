//! Request extractors with error bodies in the API's envelope.

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::error::Category;

/// A JSON request body. Unknown fields are rejected by the target type's
/// `deny_unknown_fields`, not here.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T> FromRequest<AppState> for JsonBody<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let limit = state.config().server.max_body_bytes;
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::BadRequest(format!("body must not be larger than {limit} bytes"))
            } else {
                ApiError::BadRequest(rejection.body_text())
            }
        })?;
        decode(&bytes).map(JsonBody)
    }
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("body must not be empty".to_string()));
    }
    serde_json::from_slice(bytes).map_err(|e| {
        let message = match e.classify() {
            Category::Syntax => format!(
                "body contains badly-formed JSON (at line {}, column {})",
                e.line(),
                e.column()
            ),
            Category::Eof => "body contains badly-formed JSON".to_string(),
            Category::Data => format!("body contains invalid data: {e}"),
            Category::Io => e.to_string(),
        };
        ApiError::BadRequest(message)
    })
}

/// Record ids are positive; anything else names no record.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::not_found()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Probe {
        #[allow(dead_code)]
        email: String,
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::BadRequest(msg) => msg,
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            message(decode::<Probe>(b"  ").unwrap_err()),
            "body must not be empty"
        );
        assert!(message(decode::<Probe>(b"{\"email\": ").unwrap_err()).contains("badly-formed"));
        assert!(
            message(decode::<Probe>(b"{\"email\": \"a@b.c\", \"x\": 1}").unwrap_err())
                .contains("unknown field")
        );
        assert!(message(decode::<Probe>(b"{\"email\": 7}").unwrap_err()).contains("invalid data"));
        assert!(decode::<Probe>(b"{\"email\": \"a@b.c\"}").is_ok());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("0").is_err());
        assert!(parse_id("-3").is_err());
        assert!(parse_id("abc").is_err());
    }
}
