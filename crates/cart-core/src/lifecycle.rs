//! Guarded cart operations.
//!
//! [`LifecycleGuard`] is the single entry point the HTTP layer uses. It
//! reads or locks the target row through the [`CartStore`] and applies the
//! checks in [`crate::guard`].

use std::sync::Arc;

use crate::guard::{self, GuardError, Mutation};
use crate::record::{CartRecord, Identity, NewCart};
use crate::status::CartStatus;
use crate::store::{CartStore, StoreError};

/// Cheap to clone; shares the underlying store.
#[derive(Clone)]
pub struct LifecycleGuard {
    store: Arc<dyn CartStore>,
}

impl std::fmt::Debug for LifecycleGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleGuard").finish_non_exhaustive()
    }
}

impl LifecycleGuard {
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        Self { store }
    }

    /// New active record owned by `caller`.
    pub async fn create(
        &self,
        caller: Identity,
        product_id: i64,
        quantity: i32,
    ) -> Result<CartRecord, GuardError> {
        let record = self
            .store
            .insert(NewCart::for_caller(caller, product_id, quantity))
            .await?;
        Ok(record)
    }

    /// Existence is reported before ownership: a missing id is `NotFound`
    /// for every caller, an existing foreign id is `Denied(NotOwner)`.
    pub async fn get(&self, caller: Identity, id: i64) -> Result<CartRecord, GuardError> {
        let record = self.store.fetch(id).await?.ok_or(GuardError::NotFound)?;
        guard::authorize_read(caller, &record)?;
        Ok(record)
    }

    pub async fn update_quantity(
        &self,
        caller: Identity,
        id: i64,
        quantity: i32,
    ) -> Result<CartRecord, GuardError> {
        self.store
            .apply_guarded(caller, id, Mutation::SetQuantity(quantity))
            .await
    }

    /// Soft delete. Returns the row image after the change.
    pub async fn delete(&self, caller: Identity, id: i64) -> Result<CartRecord, GuardError> {
        self.store
            .apply_guarded(caller, id, Mutation::SoftDelete)
            .await
    }

    /// Active records of `caller`; empty when there are none.
    pub async fn list_active(&self, caller: Identity) -> Result<Vec<CartRecord>, GuardError> {
        let rows = self
            .store
            .list_by_status(caller.id, CartStatus::Active)
            .await?;
        Ok(rows)
    }

    /// Every active record of `caller` becomes purchased.
    pub async fn checkout(&self, caller: Identity) -> Result<u64, GuardError> {
        self.bulk(caller, CartStatus::Purchased).await
    }

    /// Every active record of `caller` becomes deleted.
    pub async fn clear_active(&self, caller: Identity) -> Result<u64, GuardError> {
        self.bulk(caller, CartStatus::Deleted).await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    async fn bulk(&self, caller: Identity, to: CartStatus) -> Result<u64, GuardError> {
        let from = CartStatus::Active;
        from.transition(to)
            .map_err(|e| GuardError::Denied(guard::Denial::IllegalTransition(e)))?;
        let n = self.store.transition_all(caller.id, from, to).await?;
        Ok(n)
    }
}
