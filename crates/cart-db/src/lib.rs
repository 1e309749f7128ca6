//! Postgres access for the cart service.
//!
//! - [`connect`] builds the shared pool from [`cart_config::DbSettings`].
//! - [`migrate`] applies the embedded migrations under `./migrations`.
//! - [`PgCartStore`] implements [`cart_core::CartStore`] on `cart.cart`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cart_config::DbSettings;
use cart_core::guard::{self, GuardError, Mutation};
use cart_core::{CartOp, CartRecord, CartStatus, CartStore, Identity, NewCart, StoreError};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

/// Env var read by the DB-backed tests. Unset means "skip".
pub const ENV_TEST_DB_URL: &str = "CART_TEST_DATABASE_URL";

const CART_COLUMNS: &str = "id, user_id, product_id, quantity, status";

/// Build the shared connection pool.
pub async fn connect(settings: &DbSettings) -> Result<PgPool> {
    connect_url(
        settings.url.expose(),
        settings.max_connections,
        settings.acquire_timeout,
    )
    .await
}

pub async fn connect_url(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_cart_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'cart' and table_name = 'cart'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_cart_table: exists,
    })
}

// ---------------------------------------------------------------------------
// PgCartStore
// ---------------------------------------------------------------------------

/// [`CartStore`] over a shared [`PgPool`]. Clones share the pool.
#[derive(Clone, Debug)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn insert(&self, new: NewCart) -> Result<CartRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            insert into cart.cart (user_id, product_id, quantity, status)
            values ($1, $2, $3, $4)
            returning {CART_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.product_id)
        .bind(new.quantity)
        .bind(CartStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(CartOp::Insert, e))?;

        map_row(CartOp::Insert, &row)
    }

    async fn fetch(&self, id: i64) -> Result<Option<CartRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "select {CART_COLUMNS} from cart.cart where id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(CartOp::Fetch, e))?;

        row.as_ref().map(|r| map_row(CartOp::Fetch, r)).transpose()
    }

    async fn apply_guarded(
        &self,
        caller: Identity,
        id: i64,
        mutation: Mutation,
    ) -> Result<CartRecord, GuardError> {
        // Every early return drops `tx`, which rolls back and releases the
        // row lock.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify(CartOp::Update, e))?;

        let row = sqlx::query(&format!(
            "select {CART_COLUMNS} from cart.cart where id = $1 for update"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| classify(CartOp::Fetch, e))?;

        let Some(row) = row else {
            return Err(GuardError::NotFound);
        };
        let current = map_row(CartOp::Fetch, &row)?;

        let next = guard::apply_mutation(caller, &current, mutation)?;

        let row = sqlx::query(&format!(
            r#"
            update cart.cart
            set quantity = $2, status = $3
            where id = $1
            returning {CART_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(next.quantity)
        .bind(next.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify(CartOp::Update, e))?;
        let updated = map_row(CartOp::Update, &row)?;

        tx.commit()
            .await
            .map_err(|e| classify(CartOp::Update, e))?;

        Ok(updated)
    }

    async fn list_by_status(
        &self,
        user_id: i64,
        status: CartStatus,
    ) -> Result<Vec<CartRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            select {CART_COLUMNS}
            from cart.cart
            where user_id = $1 and status = $2
            order by id
            "#
        ))
        .bind(user_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(CartOp::List, e))?;

        rows.iter().map(|r| map_row(CartOp::List, r)).collect()
    }

    async fn transition_all(
        &self,
        user_id: i64,
        from: CartStatus,
        to: CartStatus,
    ) -> Result<u64, StoreError> {
        let res = sqlx::query(
            r#"
            update cart.cart
            set status = $3
            where user_id = $1 and status = $2
            "#,
        )
        .bind(user_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| classify(CartOp::BulkTransition, e))?;

        Ok(res.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("select 1")
            .execute(&self.pool)
            .await
            .map_err(|e| classify(CartOp::Ping, e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn map_row(op: CartOp, row: &PgRow) -> Result<CartRecord, StoreError> {
    let status: String = row
        .try_get("status")
        .map_err(|e| StoreError::statement(op, e))?;
    let status = CartStatus::parse(&status).map_err(|e| StoreError::statement(op, e))?;

    Ok(CartRecord {
        id: row.try_get("id").map_err(|e| StoreError::statement(op, e))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| StoreError::statement(op, e))?,
        product_id: row
            .try_get("product_id")
            .map_err(|e| StoreError::statement(op, e))?,
        quantity: row
            .try_get("quantity")
            .map_err(|e| StoreError::statement(op, e))?,
        status,
    })
}

/// Connection-level failures are `Unavailable`; everything else is a
/// statement failure of `op`.
fn classify(op: CartOp, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        _ => StoreError::statement(op, err),
    }
}
