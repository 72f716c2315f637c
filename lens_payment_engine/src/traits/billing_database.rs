use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewSubscription, Order, OrderId, PaymentDetails, Subscription, SubscriptionId},
    traits::{CatalogError, PlanCatalog},
};

/// What a paid order grants its owner.
#[derive(Debug, Clone)]
pub enum Entitlement {
    /// A first purchase. A brand-new subscription is created and the order is linked to it.
    New(NewSubscription),
    /// A renewal. The existing subscription's end date is moved to `end_date`, but never backwards.
    Extend { subscription_id: SubscriptionId, end_date: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub enum SettlementResult {
    /// The order had already left the `Pending` state. Nothing was changed.
    AlreadySettled,
    /// The order is now paid, and this is the subscription it created or extended.
    Settled(Subscription),
}

/// This trait defines the behaviour for backends that store orders and subscriptions.
///
/// Every state-changing method must be atomic. In particular, [`BillingDatabase::settle_paid_order`] is called
/// concurrently when the gateway delivers the same notification more than once, and exactly one caller may win.
#[allow(async_fn_in_trait)]
pub trait BillingDatabase: Clone + PlanCatalog {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order in the `Pending` state.
    ///
    /// A renewal order (one with a `subscription_id`) is rejected with [`BillingError::RenewalAlreadyPending`] if
    /// another pending renewal for the same subscription exists.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, BillingError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, BillingError>;

    /// Fetches all orders linked to the subscription (the original purchase and every renewal), oldest first.
    async fn fetch_orders_for_subscription(&self, subscription_id: &SubscriptionId)
        -> Result<Vec<Order>, BillingError>;

    /// Returns the pending renewal order for the subscription, if there is one.
    async fn fetch_pending_renewal(&self, subscription_id: &SubscriptionId) -> Result<Option<Order>, BillingError>;

    async fn fetch_subscription(&self, subscription_id: &SubscriptionId) -> Result<Option<Subscription>, BillingError>;

    /// Fetches every subscription belonging to the user, regardless of status, ordered by end date, latest first.
    async fn fetch_subscriptions_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, BillingError>;

    /// In a single atomic transaction:
    /// * moves the order from `Pending` to `Paid`, replacing its payment details with `details`. If the order is not
    ///   `Pending`, nothing further happens and [`SettlementResult::AlreadySettled`] is returned.
    /// * creates or extends the subscription, as described by `entitlement`, and links the order to it.
    async fn settle_paid_order(
        &self,
        order_id: &OrderId,
        details: &PaymentDetails,
        entitlement: Entitlement,
        now: DateTime<Utc>,
    ) -> Result<SettlementResult, BillingError>;

    /// Moves the order from `Pending` to `Failed`, replacing its payment details with `details`.
    /// Returns `false` if the order was not `Pending`, in which case nothing was changed.
    async fn settle_failed_order(
        &self,
        order_id: &OrderId,
        details: &PaymentDetails,
        now: DateTime<Utc>,
    ) -> Result<bool, BillingError>;

    /// Marks an active subscription as cancelled and switches off auto-renewal. The end date is untouched.
    /// Fails with [`BillingError::SubscriptionNotActive`] if the subscription is not active.
    async fn cancel_subscription(
        &self,
        subscription_id: &SubscriptionId,
        now: DateTime<Utc>,
    ) -> Result<Subscription, BillingError>;

    /// Sets the auto-renew flag on an active subscription.
    /// Fails with [`BillingError::SubscriptionNotActive`] if the subscription is not active.
    async fn set_auto_renew(
        &self,
        subscription_id: &SubscriptionId,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Subscription, BillingError>;

    /// Closes the database connection pool.
    async fn close(&mut self) -> Result<(), BillingError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum BillingError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists: {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested subscription {0} does not exist")]
    SubscriptionNotFound(SubscriptionId),
    #[error("Subscription {0} is not active")]
    SubscriptionNotActive(SubscriptionId),
    #[error("A renewal payment for subscription {0} is already pending")]
    RenewalAlreadyPending(SubscriptionId),
    #[error("The stored payment details for order {0} are invalid. {1}")]
    InvalidPaymentDetails(OrderId, String),
    #[error("{0}")]
    CatalogError(#[from] CatalogError),
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        BillingError::DatabaseError(e.to_string())
    }
}

/// True if the error was raised by a unique index or constraint.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false)
}
