//! Admin response envelope.
//!
//! Every admin operation answers `{"Meta": {"TotalCount", "Error"}, "Objects"}`:
//! 200 with the objects on success, 500 with the error text and no objects on failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Meta {
    #[serde(rename = "TotalCount")]
    pub total_count: u64,
    #[serde(rename = "Error")]
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "Meta")]
    pub meta: Meta,
    #[serde(rename = "Objects")]
    pub objects: Value,
}

impl Envelope {
    pub fn success<T: Serialize>(objects: &[T]) -> Self {
        Self {
            meta: Meta {
                total_count: objects.len() as u64,
                error: String::new(),
            },
            objects: serde_json::to_value(objects).unwrap_or_else(|_| Value::Array(Vec::new())),
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            meta: Meta {
                total_count: 0,
                error: error.to_string(),
            },
            objects: Value::Array(Vec::new()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.meta.error.is_empty()
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = if self.is_success() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let ok = serde_json::to_value(Envelope::success(&["a", "b"])).unwrap();
        assert_eq!(
            ok,
            serde_json::json!({"Meta": {"TotalCount": 2, "Error": ""}, "Objects": ["a", "b"]})
        );

        let err = serde_json::to_value(Envelope::failure("route 'x' was not found")).unwrap();
        assert_eq!(
            err,
            serde_json::json!({"Meta": {"TotalCount": 0, "Error": "route 'x' was not found"}, "Objects": []})
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Envelope::success::<u8>(&[]).into_response().status(), StatusCode::OK);
        assert_eq!(Envelope::failure("boom").into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
