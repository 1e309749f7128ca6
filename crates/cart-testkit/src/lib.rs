//! Test doubles for the cart service.
//!
//! - [`MemoryCartStore`]: a [`CartStore`] over an in-process map, with the
//!   same locking contract as the Postgres store (one mutex held across the
//!   guard decision and the write).
//! - [`TestSessions`]: mints session tokens the daemon will accept.
//! - [`FailingCartStore`]: every call fails, for error-path tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use cart_auth::HmacSessionVerifier;
use cart_core::guard::{self, GuardError, Mutation};
use cart_core::{CartOp, CartRecord, CartStatus, CartStore, Identity, NewCart, StoreError};
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// MemoryCartStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, CartRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryCartStore {
    table: Mutex<Table>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ids at `first_id` instead of 1.
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            table: Mutex::new(Table {
                next_id: first_id - 1,
                rows: BTreeMap::new(),
            }),
        }
    }

    /// Raw row, bypassing every guard.
    pub async fn peek(&self, id: i64) -> Option<CartRecord> {
        self.table.lock().await.rows.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn insert(&self, new: NewCart) -> Result<CartRecord, StoreError> {
        let mut t = self.table.lock().await;
        t.next_id += 1;
        let rec = CartRecord {
            id: t.next_id,
            user_id: new.user_id,
            product_id: new.product_id,
            quantity: new.quantity,
            status: CartStatus::Active,
        };
        t.rows.insert(rec.id, rec.clone());
        Ok(rec)
    }

    async fn fetch(&self, id: i64) -> Result<Option<CartRecord>, StoreError> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn apply_guarded(
        &self,
        caller: Identity,
        id: i64,
        mutation: Mutation,
    ) -> Result<CartRecord, GuardError> {
        let mut t = self.table.lock().await;
        let current = t.rows.get(&id).ok_or(GuardError::NotFound)?;
        let next = guard::apply_mutation(caller, current, mutation)?;
        t.rows.insert(id, next.clone());
        Ok(next)
    }

    async fn list_by_status(
        &self,
        user_id: i64,
        status: CartStatus,
    ) -> Result<Vec<CartRecord>, StoreError> {
        let t = self.table.lock().await;
        Ok(t.rows
            .values()
            .filter(|r| r.user_id == user_id && r.status == status)
            .cloned()
            .collect())
    }

    async fn transition_all(
        &self,
        user_id: i64,
        from: CartStatus,
        to: CartStatus,
    ) -> Result<u64, StoreError> {
        let mut t = self.table.lock().await;
        let mut n = 0;
        for r in t.rows.values_mut() {
            if r.user_id == user_id && r.status == from {
                r.status = to;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingCartStore
// ---------------------------------------------------------------------------

/// How [`FailingCartStore`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// As if the pool could not hand out a connection.
    Unavailable,
    /// As if each statement ran and errored.
    Statement,
}

#[derive(Debug, Clone, Copy)]
pub struct FailingCartStore {
    pub mode: FailureMode,
}

impl FailingCartStore {
    pub fn new(mode: FailureMode) -> Self {
        Self { mode }
    }

    fn err(&self, op: CartOp) -> StoreError {
        match self.mode {
            FailureMode::Unavailable => StoreError::Unavailable("pool timed out".to_string()),
            FailureMode::Statement => StoreError::statement(op, "injected failure"),
        }
    }
}

#[async_trait]
impl CartStore for FailingCartStore {
    async fn insert(&self, _new: NewCart) -> Result<CartRecord, StoreError> {
        Err(self.err(CartOp::Insert))
    }

    async fn fetch(&self, _id: i64) -> Result<Option<CartRecord>, StoreError> {
        Err(self.err(CartOp::Fetch))
    }

    async fn apply_guarded(
        &self,
        _caller: Identity,
        _id: i64,
        _mutation: Mutation,
    ) -> Result<CartRecord, GuardError> {
        Err(GuardError::Store(self.err(CartOp::Fetch)))
    }

    async fn list_by_status(
        &self,
        _user_id: i64,
        _status: CartStatus,
    ) -> Result<Vec<CartRecord>, StoreError> {
        Err(self.err(CartOp::List))
    }

    async fn transition_all(
        &self,
        _user_id: i64,
        _from: CartStatus,
        _to: CartStatus,
    ) -> Result<u64, StoreError> {
        Err(self.err(CartOp::BulkTransition))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(self.err(CartOp::Ping))
    }
}

// ---------------------------------------------------------------------------
// TestSessions
// ---------------------------------------------------------------------------

pub const TEST_SESSION_SECRET: &str = "cart-testkit-session-secret";

/// Mints tokens signed with [`TEST_SESSION_SECRET`].
#[derive(Debug, Clone)]
pub struct TestSessions {
    verifier: HmacSessionVerifier,
}

impl Default for TestSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSessions {
    pub fn new() -> Self {
        Self {
            verifier: HmacSessionVerifier::new(TEST_SESSION_SECRET),
        }
    }

    /// Verifier the daemon under test should be built with.
    pub fn verifier(&self) -> HmacSessionVerifier {
        self.verifier.clone()
    }

    /// A token for `user_id`, valid for an hour.
    pub fn token_for(&self, user_id: i64) -> String {
        self.verifier
            .mint(Identity { id: user_id }, chrono::Duration::hours(1))
            .unwrap_or_default()
    }

    /// A token for `user_id` that expired a minute ago.
    pub fn expired_token_for(&self, user_id: i64) -> String {
        self.verifier
            .mint(Identity { id: user_id }, chrono::Duration::minutes(-1))
            .unwrap_or_default()
    }
}
