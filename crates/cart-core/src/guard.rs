//! Ownership and status guard.
//!
//! Pure decision functions: no IO, no clock. Stores call
//! [`apply_mutation`] while holding the row lock so the decision and the
//! write see the same row image.
//!
//! # Check order
//!
//! 1. existence (`NotFound`), decided by the caller of these functions
//! 2. ownership (`Denial::NotOwner`)
//! 3. status (`Denial::NotActive` / `Denial::AlreadyDeleted` /
//!    `Denial::IllegalTransition`)

use crate::record::{CartRecord, Identity};
use crate::status::{CartStatus, TransitionError};
use crate::store::StoreError;

/// Why a caller may not touch a record. Every variant surfaces as
/// `401 Unauthorized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Record belongs to another user.
    NotOwner,
    /// Quantity change on a purchased or deleted record.
    NotActive(CartStatus),
    /// Delete on a record that is already deleted.
    AlreadyDeleted,
    /// Any other status change outside the lifecycle (e.g. deleting a
    /// purchased record).
    IllegalTransition(TransitionError),
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::NotOwner => f.write_str("caller does not own cart record"),
            Denial::NotActive(s) => write!(f, "cart record is {s}, not active"),
            Denial::AlreadyDeleted => f.write_str("cart record already deleted"),
            Denial::IllegalTransition(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Denial {}

/// Failure of a guarded cart operation.
#[derive(Debug)]
pub enum GuardError {
    /// No record with that id.
    NotFound,
    /// Record exists but the caller may not perform the operation.
    Denied(Denial),
    /// The store could not execute the operation.
    Store(StoreError),
}

impl std::fmt::Display for GuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardError::NotFound => f.write_str("cart record not found"),
            GuardError::Denied(d) => write!(f, "denied: {d}"),
            GuardError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GuardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GuardError::Denied(d) => Some(d),
            GuardError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Denial> for GuardError {
    fn from(d: Denial) -> Self {
        GuardError::Denied(d)
    }
}

impl From<StoreError> for GuardError {
    fn from(e: StoreError) -> Self {
        GuardError::Store(e)
    }
}

/// A single-record change requested by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    SetQuantity(i32),
    SoftDelete,
}

/// Read check: owner only.
pub fn authorize_read(caller: Identity, record: &CartRecord) -> Result<(), Denial> {
    if !record.is_owned_by(caller) {
        return Err(Denial::NotOwner);
    }
    Ok(())
}

/// Decide a mutation against the current row image and return the row
/// image to persist.
pub fn apply_mutation(
    caller: Identity,
    current: &CartRecord,
    mutation: Mutation,
) -> Result<CartRecord, Denial> {
    authorize_read(caller, current)?;

    let mut next = current.clone();
    match mutation {
        Mutation::SetQuantity(quantity) => {
            if current.status != CartStatus::Active {
                return Err(Denial::NotActive(current.status));
            }
            next.quantity = quantity;
        }
        Mutation::SoftDelete => {
            if current.status == CartStatus::Deleted {
                return Err(Denial::AlreadyDeleted);
            }
            next.status = current
                .status
                .transition(CartStatus::Deleted)
                .map_err(Denial::IllegalTransition)?;
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Identity = Identity { id: 1 };
    const OTHER: Identity = Identity { id: 2 };

    fn record(status: CartStatus) -> CartRecord {
        CartRecord {
            id: 7,
            user_id: OWNER.id,
            product_id: 42,
            quantity: 3,
            status,
        }
    }

    #[test]
    fn owner_may_read_in_any_status() {
        for s in [CartStatus::Active, CartStatus::Purchased, CartStatus::Deleted] {
            assert_eq!(authorize_read(OWNER, &record(s)), Ok(()));
        }
    }

    #[test]
    fn stranger_is_denied_before_status_is_considered() {
        for s in [CartStatus::Active, CartStatus::Purchased, CartStatus::Deleted] {
            let r = record(s);
            assert_eq!(authorize_read(OTHER, &r), Err(Denial::NotOwner));
            assert_eq!(
                apply_mutation(OTHER, &r, Mutation::SetQuantity(5)),
                Err(Denial::NotOwner)
            );
            assert_eq!(
                apply_mutation(OTHER, &r, Mutation::SoftDelete),
                Err(Denial::NotOwner)
            );
        }
    }

    #[test]
    fn set_quantity_only_while_active() {
        let next = apply_mutation(OWNER, &record(CartStatus::Active), Mutation::SetQuantity(5))
            .unwrap();
        assert_eq!(next.quantity, 5);
        assert_eq!(next.status, CartStatus::Active);

        for s in [CartStatus::Purchased, CartStatus::Deleted] {
            assert_eq!(
                apply_mutation(OWNER, &record(s), Mutation::SetQuantity(5)),
                Err(Denial::NotActive(s))
            );
        }
    }

    #[test]
    fn soft_delete_is_not_idempotent() {
        let next = apply_mutation(OWNER, &record(CartStatus::Active), Mutation::SoftDelete)
            .unwrap();
        assert_eq!(next.status, CartStatus::Deleted);
        assert_eq!(
            apply_mutation(OWNER, &next, Mutation::SoftDelete),
            Err(Denial::AlreadyDeleted)
        );
    }

    #[test]
    fn purchased_record_cannot_be_deleted() {
        let err = apply_mutation(OWNER, &record(CartStatus::Purchased), Mutation::SoftDelete)
            .unwrap_err();
        assert!(matches!(err, Denial::IllegalTransition(_)));
    }

    #[test]
    fn mutation_keeps_identity_fields() {
        let before = record(CartStatus::Active);
        let after = apply_mutation(OWNER, &before, Mutation::SetQuantity(9)).unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.user_id, before.user_id);
        assert_eq!(after.product_id, before.product_id);
    }
}
