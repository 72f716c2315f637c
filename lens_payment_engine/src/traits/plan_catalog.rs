use thiserror::Error;

use crate::db_types::SubscriptionPlan;

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::DatabaseError(e.to_string())
    }
}

/// Read-only access to the plans on sale. The engine never modifies plans.
#[allow(async_fn_in_trait)]
pub trait PlanCatalog {
    /// Fetches the plan with the given id, whether or not it is still on sale.
    async fn fetch_plan(&self, plan_id: &str) -> Result<Option<SubscriptionPlan>, CatalogError>;

    /// Fetches the active plans for the given lens view, cheapest first.
    async fn active_plans_for_lens(&self, lens_view_id: &str) -> Result<Vec<SubscriptionPlan>, CatalogError>;
}
