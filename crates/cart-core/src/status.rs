//! Cart record lifecycle.
//!
//! ```text
//!          create
//!   [none] ------> active ──(set quantity: self-loop)
//!                    │
//!          ┌─────────┴─────────┐
//!        delete             checkout
//!          ▼                   ▼
//!       deleted            purchased
//! ```
//!
//! `deleted` and `purchased` are terminal. Every status change in the crate
//! goes through [`CartStatus::transition`].

use serde::{Deserialize, Serialize};

/// Lifecycle status of a single cart record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    /// Sitting in the cart; quantity may change.
    Active,
    /// Bought at checkout. **Terminal.**
    Purchased,
    /// Soft-deleted by the owner. **Terminal.**
    Deleted,
}

impl CartStatus {
    /// Column value stored in `cart.cart.status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "active",
            CartStatus::Purchased => "purchased",
            CartStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "active" => Ok(CartStatus::Active),
            "purchased" => Ok(CartStatus::Purchased),
            "deleted" => Ok(CartStatus::Deleted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }

    /// Apply a status change, refusing anything outside
    /// `active -> purchased` and `active -> deleted`.
    pub fn transition(self, to: CartStatus) -> Result<CartStatus, TransitionError> {
        match (self, to) {
            (CartStatus::Active, CartStatus::Purchased)
            | (CartStatus::Active, CartStatus::Deleted) => Ok(to),
            (from, to) => Err(TransitionError { from, to }),
        }
    }
}

impl std::fmt::Display for CartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status column held a value outside the enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown cart status: {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// Returned when a status change is not an edge of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: CartStatus,
    pub to: CartStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal cart transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}
