//! Cart domain: records, lifecycle, ownership guard and the store boundary.
//!
//! Everything here is IO-free except the [`store::CartStore`] trait, which
//! concrete stores implement.

pub mod guard;
pub mod lifecycle;
pub mod record;
pub mod status;
pub mod store;

pub use guard::{Denial, GuardError, Mutation};
pub use lifecycle::LifecycleGuard;
pub use record::{CartRecord, Identity, NewCart};
pub use status::{CartStatus, TransitionError};
pub use store::{CartOp, CartStore, StoreError};
