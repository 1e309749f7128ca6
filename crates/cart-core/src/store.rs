//! Record store boundary.
//!
//! This module defines only the trait and its error type. The Postgres
//! implementation lives in `cart-db`; the in-memory one in `cart-testkit`.

use std::fmt;

use async_trait::async_trait;

use crate::guard::{GuardError, Mutation};
use crate::record::{CartRecord, Identity, NewCart};
use crate::status::CartStatus;

/// Which store operation failed. Drives the HTTP mapping of statement
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOp {
    Insert,
    Fetch,
    Update,
    List,
    BulkTransition,
    Ping,
}

impl CartOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartOp::Insert => "insert",
            CartOp::Fetch => "fetch",
            CartOp::Update => "update",
            CartOp::List => "list",
            CartOp::BulkTransition => "bulk_transition",
            CartOp::Ping => "ping",
        }
    }
}

/// Errors a [`CartStore`] implementation may return.
#[derive(Debug)]
pub enum StoreError {
    /// No connection could be obtained (pool exhausted/closed, network, TLS).
    Unavailable(String),
    /// A statement ran and failed, or its row could not be mapped.
    Statement { op: CartOp, detail: String },
}

impl StoreError {
    pub fn statement(op: CartOp, detail: impl fmt::Display) -> Self {
        StoreError::Statement {
            op,
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Statement { op, detail } => {
                write!(f, "store {} failed: {detail}", op.as_str())
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence for cart rows.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Insert an active row and return it with its generated id.
    async fn insert(&self, new: NewCart) -> Result<CartRecord, StoreError>;

    /// Point lookup. `Ok(None)` when the id does not exist.
    async fn fetch(&self, id: i64) -> Result<Option<CartRecord>, StoreError>;

    /// Run a single-record mutation atomically.
    ///
    /// Implementations must lock the row, decide with
    /// [`crate::guard::apply_mutation`], write the returned row image and
    /// release the lock as one unit, so no concurrent writer can change the
    /// row between the decision and the write. Absent rows yield
    /// [`GuardError::NotFound`].
    async fn apply_guarded(
        &self,
        caller: Identity,
        id: i64,
        mutation: Mutation,
    ) -> Result<CartRecord, GuardError>;

    /// All rows of `user_id` in `status`, ordered by id.
    async fn list_by_status(
        &self,
        user_id: i64,
        status: CartStatus,
    ) -> Result<Vec<CartRecord>, StoreError>;

    /// Move every row of `user_id` in `from` to `to` in one statement.
    /// Returns the number of rows changed (zero is not an error).
    async fn transition_all(
        &self,
        user_id: i64,
        from: CartStatus,
        to: CartStatus,
    ) -> Result<u64, StoreError>;

    /// Connectivity probe.
    async fn ping(&self) -> Result<(), StoreError>;
}
