use chrono::{DateTime, Utc};
use lens_payment_engine::{
    db_types::{NewOrder, Order, OrderId, PaymentDetails, Subscription, SubscriptionId, SubscriptionPlan},
    traits::{BillingDatabase, BillingError, CatalogError, Entitlement, PlanCatalog, SettlementResult},
};
use mockall::mock;

mock! {
    pub BillingDb {}
    impl Clone for BillingDb {
        fn clone(&self) -> Self;
    }
    impl PlanCatalog for BillingDb {
        async fn fetch_plan(&self, plan_id: &str) -> Result<Option<SubscriptionPlan>, CatalogError>;
        async fn active_plans_for_lens(&self, lens_view_id: &str) -> Result<Vec<SubscriptionPlan>, CatalogError>;
    }
    impl BillingDatabase for BillingDb {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, BillingError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, BillingError>;
        async fn fetch_orders_for_subscription(
            &self,
            subscription_id: &SubscriptionId,
        ) -> Result<Vec<Order>, BillingError>;
        async fn fetch_pending_renewal(&self, subscription_id: &SubscriptionId) -> Result<Option<Order>, BillingError>;
        async fn fetch_subscription(
            &self,
            subscription_id: &SubscriptionId,
        ) -> Result<Option<Subscription>, BillingError>;
        async fn fetch_subscriptions_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, BillingError>;
        async fn settle_paid_order(
            &self,
            order_id: &OrderId,
            details: &PaymentDetails,
            entitlement: Entitlement,
            now: DateTime<Utc>,
        ) -> Result<SettlementResult, BillingError>;
        async fn settle_failed_order(
            &self,
            order_id: &OrderId,
            details: &PaymentDetails,
            now: DateTime<Utc>,
        ) -> Result<bool, BillingError>;
        async fn cancel_subscription(
            &self,
            subscription_id: &SubscriptionId,
            now: DateTime<Utc>,
        ) -> Result<Subscription, BillingError>;
        async fn set_auto_renew(
            &self,
            subscription_id: &SubscriptionId,
            enabled: bool,
            now: DateTime<Utc>,
        ) -> Result<Subscription, BillingError>;
    }
}
