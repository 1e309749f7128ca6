//! Cart row types.

use serde::{Deserialize, Serialize};

use crate::status::CartStatus;

/// Authenticated caller. Produced by a session verifier, never by request
/// bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    pub id: i64,
}

/// One row of `cart.cart`.
///
/// Wire shape: `{"id", "userId", "productId", "quantity", "status"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRecord {
    pub id: i64,
    /// Owner; fixed at creation.
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub status: CartStatus,
}

impl CartRecord {
    pub fn is_owned_by(&self, caller: Identity) -> bool {
        self.user_id == caller.id
    }
}

/// Insert payload. The owner is always the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewCart {
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i32,
}

impl NewCart {
    pub fn for_caller(caller: Identity, product_id: i64, quantity: i32) -> Self {
        Self {
            user_id: caller.id,
            product_id,
            quantity,
        }
    }
}
