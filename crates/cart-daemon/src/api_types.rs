//! Request and response types for all cart-daemon HTTP endpoints.
//!
//! Every response, success or failure, is an [`Envelope`]:
//! `{"status": <http code>, "message": <text>, "data": <payload>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cart_core::CartRecord;
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Payload of an [`Envelope`].
///
/// `Empty` serializes as `""`, `One` as a cart object, `Many` as an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    One(CartRecord),
    Many(Vec<CartRecord>),
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Empty => s.serialize_str(""),
            Payload::One(rec) => rec.serialize(s),
            Payload::Many(recs) => recs.serialize(s),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub status: u16,
    pub message: String,
    pub data: Payload,
}

impl Envelope {
    pub fn new(status: StatusCode, message: impl Into<String>, data: Payload) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
            data,
        }
    }

    pub fn ok(message: impl Into<String>, data: Payload) -> Self {
        Self::new(StatusCode::OK, message, data)
    }
}

impl IntoResponse for Envelope {
    /// The HTTP status line always mirrors `status`.
    fn into_response(self) -> Response {
        let code = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (code, Json(self)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// POST /cart/
///
/// Unknown fields (including any owner id) are ignored; the owner is the
/// session's user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCartRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// PATCH /cart/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cart_core::CartStatus;
    use serde_json::json;

    fn rec() -> CartRecord {
        CartRecord {
            id: 7,
            user_id: 1,
            product_id: 42,
            quantity: 3,
            status: CartStatus::Active,
        }
    }

    #[test]
    fn empty_payload_is_empty_string() {
        let v = serde_json::to_value(Envelope::ok("Cart Deleted", Payload::Empty)).unwrap();
        assert_eq!(v, json!({"status": 200, "message": "Cart Deleted", "data": ""}));
    }

    #[test]
    fn single_payload_uses_wire_field_names() {
        let v = serde_json::to_value(Envelope::ok("Success", Payload::One(rec()))).unwrap();
        assert_eq!(
            v["data"],
            json!({"id": 7, "userId": 1, "productId": 42, "quantity": 3, "status": "active"})
        );
    }

    #[test]
    fn many_payload_is_array_even_when_empty() {
        let v = serde_json::to_value(Envelope::ok("Success", Payload::Many(vec![]))).unwrap();
        assert_eq!(v["data"], json!([]));
    }

    #[test]
    fn response_status_mirrors_envelope() {
        let resp = Envelope::new(StatusCode::NOT_FOUND, "Cart not found", Payload::Empty)
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
