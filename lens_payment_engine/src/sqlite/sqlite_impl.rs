//! `SqliteDatabase` is a concrete implementation of a Lens payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{db_url, new_pool, orders, plans, subscriptions};
use crate::{
    db_types::{
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PaymentDetails,
        Subscription,
        SubscriptionId,
        SubscriptionPlan,
    },
    traits::{BillingDatabase, BillingError, CatalogError, Entitlement, PlanCatalog, SettlementResult},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PlanCatalog for SqliteDatabase {
    async fn fetch_plan(&self, plan_id: &str) -> Result<Option<SubscriptionPlan>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let plan = plans::fetch_plan(plan_id, &mut conn).await?;
        Ok(plan)
    }

    async fn active_plans_for_lens(&self, lens_view_id: &str) -> Result<Vec<SubscriptionPlan>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let plans = plans::fetch_active_plans_for_lens(lens_view_id, &mut conn).await?;
        Ok(plans)
    }
}

impl BillingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, BillingError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::insert_order(order, &mut conn).await?;
        debug!("🗃️ Order [{}] has been saved in the DB with id {}", order.order_id, order.id);
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, BillingError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Order>, BillingError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_subscription(subscription_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_pending_renewal(&self, subscription_id: &SubscriptionId) -> Result<Option<Order>, BillingError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_pending_renewal(subscription_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_subscription(&self, subscription_id: &SubscriptionId) -> Result<Option<Subscription>, BillingError> {
        let mut conn = self.pool.acquire().await?;
        let subscription = subscriptions::fetch_subscription(subscription_id, &mut conn).await?;
        Ok(subscription)
    }

    async fn fetch_subscriptions_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, BillingError> {
        let mut conn = self.pool.acquire().await?;
        let subscriptions = subscriptions::fetch_subscriptions_for_user(user_id, &mut conn).await?;
        Ok(subscriptions)
    }

    /// The conditional status update is the first statement of the transaction, so the write lock is taken before
    /// anything is read. Concurrent deliveries of the same notification queue up behind it and then find the order
    /// already settled.
    async fn settle_paid_order(
        &self,
        order_id: &OrderId,
        details: &PaymentDetails,
        entitlement: Entitlement,
        now: DateTime<Utc>,
    ) -> Result<SettlementResult, BillingError> {
        let mut tx = self.pool.begin().await?;
        let details = details.to_json();
        if !orders::transition_from_pending(order_id, OrderStatusType::Paid, &details, now, &mut tx).await? {
            debug!("🗃️ Order [{order_id}] has already been settled. Nothing to do");
            return Ok(SettlementResult::AlreadySettled);
        }
        let subscription = match entitlement {
            Entitlement::New(new_subscription) => {
                let subscription = subscriptions::insert_subscription(new_subscription, now, &mut tx).await?;
                orders::link_subscription(order_id, &subscription.subscription_id, &mut tx).await?;
                subscription
            },
            Entitlement::Extend { subscription_id, end_date } => {
                let current = subscriptions::fetch_subscription(&subscription_id, &mut tx)
                    .await?
                    .ok_or_else(|| BillingError::SubscriptionNotFound(subscription_id.clone()))?;
                if end_date <= current.end_date {
                    warn!(
                        "🗃️ Renewal order [{order_id}] would not extend subscription {subscription_id} (ends {}). \
                         End date left unchanged",
                        current.end_date
                    );
                }
                let end_date = end_date.max(current.end_date);
                subscriptions::update_end_date(&subscription_id, end_date, now, &mut tx)
                    .await?
                    .ok_or_else(|| BillingError::SubscriptionNotFound(subscription_id.clone()))?
            },
        };
        tx.commit().await?;
        debug!(
            "🗃️ Order [{order_id}] settled. Subscription {} ends {}",
            subscription.subscription_id, subscription.end_date
        );
        Ok(SettlementResult::Settled(subscription))
    }

    async fn settle_failed_order(
        &self,
        order_id: &OrderId,
        details: &PaymentDetails,
        now: DateTime<Utc>,
    ) -> Result<bool, BillingError> {
        let mut conn = self.pool.acquire().await?;
        let details = details.to_json();
        let changed =
            orders::transition_from_pending(order_id, OrderStatusType::Failed, &details, now, &mut conn).await?;
        Ok(changed)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &SubscriptionId,
        now: DateTime<Utc>,
    ) -> Result<Subscription, BillingError> {
        let mut tx = self.pool.begin().await?;
        let subscription = match subscriptions::cancel_subscription(subscription_id, now, &mut tx).await? {
            Some(s) => s,
            None => return Err(not_active_or_missing(subscription_id, &mut tx).await),
        };
        tx.commit().await?;
        debug!("🗃️ Subscription {subscription_id} cancelled. Access continues until {}", subscription.end_date);
        Ok(subscription)
    }

    async fn set_auto_renew(
        &self,
        subscription_id: &SubscriptionId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Subscription, BillingError> {
        let mut tx = self.pool.begin().await?;
        let subscription = match subscriptions::set_auto_renew(subscription_id, enabled, now, &mut tx).await? {
            Some(s) => s,
            None => return Err(not_active_or_missing(subscription_id, &mut tx).await),
        };
        tx.commit().await?;
        debug!("🗃️ Subscription {subscription_id} auto-renew set to {enabled}");
        Ok(subscription)
    }

    async fn close(&mut self) -> Result<(), BillingError> {
        self.pool.close().await;
        Ok(())
    }
}

async fn not_active_or_missing(subscription_id: &SubscriptionId, conn: &mut sqlx::SqliteConnection) -> BillingError {
    match subscriptions::fetch_subscription(subscription_id, conn).await {
        Ok(Some(_)) => BillingError::SubscriptionNotActive(subscription_id.clone()),
        Ok(None) => BillingError::SubscriptionNotFound(subscription_id.clone()),
        Err(e) => e.into(),
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    /// Adds or replaces a plan in the catalog. The engine itself never calls this; it is for seeding and tests.
    pub async fn upsert_plan(&self, plan: &SubscriptionPlan) -> Result<(), CatalogError> {
        let mut conn = self.pool.acquire().await?;
        plans::upsert_plan(plan, &mut conn).await?;
        debug!("🗃️ Plan {} saved", plan.plan_id);
        Ok(())
    }

    /// Fetches the subscription created by the given purchase order, if any.
    pub async fn fetch_subscription_for_origin_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<Subscription>, BillingError> {
        let mut conn = self.pool.acquire().await?;
        let subscription = subscriptions::fetch_subscription_for_origin_order(order_id, &mut conn).await?;
        Ok(subscription)
    }
}
