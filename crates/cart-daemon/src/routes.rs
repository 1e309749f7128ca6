//! Axum router and all HTTP handlers for cart-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are thin: authenticate ([`Caller`]), parse,
//! call the [`cart_core::LifecycleGuard`], wrap the result in an
//! [`Envelope`].

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::request::Parts,
    routing::{get, MethodRouter},
    Json, Router,
};
use cart_core::{GuardError, Identity};
use tracing::{error, info, warn};

use crate::{
    api_types::{CreateCartRequest, Envelope, Payload, UpdateQuantityRequest},
    auth::Caller,
    error::ApiError,
    state::AppState,
};

type ApiResult = Result<Envelope, ApiError>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root).fallback(method_not_allowed))
        .route("/healthz", get(healthz).fallback(method_not_allowed))
        .route("/cart", cart_collection())
        .route("/cart/", cart_collection())
        .route(
            "/cart/:id",
            get(get_cart)
                .patch(update_cart)
                .delete(delete_cart)
                .fallback(method_not_allowed),
        )
        .route(
            "/cart/user/:id",
            get(list_for_user)
                .put(checkout_for_user)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state)
}

fn cart_collection() -> MethodRouter<Arc<AppState>> {
    get(list_cart)
        .post(create_cart)
        .patch(checkout)
        .delete(clear_cart)
        .fallback(method_not_allowed)
}

// ---------------------------------------------------------------------------
// Service routes
// ---------------------------------------------------------------------------

pub(crate) async fn root() -> Envelope {
    Envelope::ok("Conazon Cart API", Payload::Empty)
}

pub(crate) async fn healthz(State(st): State<Arc<AppState>>) -> ApiResult {
    st.guard.ping().await.map_err(|e| {
        error!(error = %e, "health probe failed");
        ApiError::internal()
    })?;
    Ok(Envelope::ok("ok", Payload::Empty))
}

pub(crate) async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

pub(crate) async fn not_found() -> ApiError {
    ApiError::not_found("Not Found")
}

// ---------------------------------------------------------------------------
// /cart/
// ---------------------------------------------------------------------------

/// GET /cart/: the caller's active records.
pub(crate) async fn list_cart(
    State(st): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> ApiResult {
    list_active(&st, caller).await
}

/// POST /cart/: add a product to the caller's cart.
pub(crate) async fn create_cart(
    State(st): State<Arc<AppState>>,
    Caller(caller): Caller,
    body: Result<Json<CreateCartRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body.map_err(bad_body)?;

    let rec = st
        .guard
        .create(caller, req.product_id, req.quantity)
        .await
        .map_err(|e| refuse(caller, None, "create", e))?;

    info!(caller = caller.id, cart_id = rec.id, product_id = rec.product_id, "cart/create");
    Ok(Envelope::ok("Success", Payload::One(rec)))
}

/// PATCH /cart/ (checkout): every active record becomes purchased.
pub(crate) async fn checkout(
    State(st): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> ApiResult {
    checkout_caller(&st, caller).await
}

/// DELETE /cart/: soft-delete every active record.
pub(crate) async fn clear_cart(
    State(st): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> ApiResult {
    let n = st
        .guard
        .clear_active(caller)
        .await
        .map_err(|e| refuse(caller, None, "clear", e))?;

    info!(caller = caller.id, rows = n, "cart/clear");
    Ok(Envelope::ok("Cart cleared", Payload::Empty))
}

// ---------------------------------------------------------------------------
// /cart/{id}
// ---------------------------------------------------------------------------

pub(crate) async fn get_cart(
    State(st): State<Arc<AppState>>,
    PathId(id): PathId,
    Caller(caller): Caller,
) -> ApiResult {
    let rec = st
        .guard
        .get(caller, id)
        .await
        .map_err(|e| refuse(caller, Some(id), "get", e))?;
    Ok(Envelope::ok("Success", Payload::One(rec)))
}

/// PATCH /cart/{id}: change quantity (owner only, active only).
pub(crate) async fn update_cart(
    State(st): State<Arc<AppState>>,
    PathId(id): PathId,
    Caller(caller): Caller,
    body: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body.map_err(bad_body)?;

    let rec = st
        .guard
        .update_quantity(caller, id, req.quantity)
        .await
        .map_err(|e| refuse(caller, Some(id), "update_quantity", e))?;

    info!(caller = caller.id, cart_id = id, quantity = rec.quantity, "cart/update");
    Ok(Envelope::ok("Success", Payload::One(rec)))
}

/// DELETE /cart/{id}: soft delete (owner only, not already deleted).
pub(crate) async fn delete_cart(
    State(st): State<Arc<AppState>>,
    PathId(id): PathId,
    Caller(caller): Caller,
) -> ApiResult {
    st.guard
        .delete(caller, id)
        .await
        .map_err(|e| refuse(caller, Some(id), "delete", e))?;

    info!(caller = caller.id, cart_id = id, "cart/delete");
    Ok(Envelope::ok("Cart Deleted", Payload::Empty))
}

// ---------------------------------------------------------------------------
// /cart/user/{id} (legacy per-user routes)
// ---------------------------------------------------------------------------

pub(crate) async fn list_for_user(
    State(st): State<Arc<AppState>>,
    PathId(id): PathId,
    Caller(caller): Caller,
) -> ApiResult {
    require_self(caller, id, "You are not authorized to get this users cart")?;
    list_active(&st, caller).await
}

pub(crate) async fn checkout_for_user(
    State(st): State<Arc<AppState>>,
    PathId(id): PathId,
    Caller(caller): Caller,
) -> ApiResult {
    require_self(caller, id, "You are not authorized to update this user")?;
    checkout_caller(&st, caller).await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn list_active(st: &AppState, caller: Identity) -> ApiResult {
    let rows = st
        .guard
        .list_active(caller)
        .await
        .map_err(|e| refuse(caller, None, "list", e))?;

    let message = if rows.is_empty() {
        "No cart found for user"
    } else {
        "Success"
    };
    Ok(Envelope::ok(message, Payload::Many(rows)))
}

async fn checkout_caller(st: &AppState, caller: Identity) -> ApiResult {
    let n = st
        .guard
        .checkout(caller)
        .await
        .map_err(|e| refuse(caller, None, "checkout", e))?;

    info!(caller = caller.id, rows = n, "cart/checkout");
    Ok(Envelope::ok("cart purchase completed", Payload::Empty))
}

/// Numeric `:id` path segment. Listed before [`Caller`] in handler
/// arguments so an unparseable id is a 400 whether or not a session is
/// present.
pub(crate) struct PathId(pub i64);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PathId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        raw.parse::<i64>().map(PathId).map_err(|_| {
            warn!(raw_id = %raw, "unparseable path id");
            ApiError::bad_request("invalid id")
        })
    }
}

fn require_self(caller: Identity, user_id: i64, message: &'static str) -> Result<(), ApiError> {
    if user_id != caller.id {
        warn!(caller = caller.id, user_id, "per-user route for another user");
        return Err(ApiError::unauthorized(message));
    }
    Ok(())
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// Log a guard failure at the right level and convert it.
fn refuse(caller: Identity, cart_id: Option<i64>, op: &'static str, err: GuardError) -> ApiError {
    match &err {
        GuardError::Store(e) => {
            error!(caller = caller.id, ?cart_id, op, error = %e, "store failure")
        }
        GuardError::Denied(_) | GuardError::NotFound => {
            warn!(caller = caller.id, ?cart_id, op, error = %err, "cart request refused")
        }
    }
    ApiError::from(err)
}
