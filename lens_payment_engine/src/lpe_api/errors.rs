use thiserror::Error;

use crate::{
    gateway::GatewayError,
    traits::{BillingError, CatalogError},
};

/// Errors returned by the engine's public APIs.
#[derive(Debug, Clone, Error)]
pub enum BillingApiError {
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("Subscription plan {0} does not exist")]
    PlanNotFound(String),
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("{0} belongs to another user")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("Could not build the payment form. {0}")]
    Gateway(#[from] GatewayError),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<BillingError> for BillingApiError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::OrderNotFound(id) => Self::NotFound(format!("Order {id}")),
            BillingError::SubscriptionNotFound(id) => Self::NotFound(format!("Subscription {id}")),
            BillingError::SubscriptionNotActive(id) => Self::InvalidState(format!("Subscription {id} is not active")),
            BillingError::RenewalAlreadyPending(id) => {
                Self::InvalidState(format!("A renewal payment for subscription {id} is already pending"))
            },
            BillingError::DatabaseError(s) => Self::Database(s),
            e @ (BillingError::OrderAlreadyExists(_) | BillingError::InvalidPaymentDetails(..)) => {
                Self::Database(e.to_string())
            },
            BillingError::CatalogError(e) => e.into(),
        }
    }
}

impl From<CatalogError> for BillingApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::DatabaseError(s) => Self::Database(s),
        }
    }
}

/// Reasons for refusing a gateway notification.
///
/// Every rejection is answered with `0|{reason}`, which asks the gateway to try again later. The reason strings are
/// deliberately generic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookRejection {
    #[error("ErrorMessage")]
    InvalidSignature,
    #[error("Missing Order ID")]
    MissingOrderId,
    #[error("Order Not Found")]
    OrderNotFound,
    #[error("Invalid Payment Details")]
    InvalidPaymentDetails,
    #[error("Missing Plan ID in Payment Details")]
    MissingPlanId,
    #[error("Subscription Plan Not Found")]
    PlanNotFound,
    /// The inner message is for the logs only. It never reaches the gateway.
    #[error("Error")]
    Persistence(String),
}

impl WebhookRejection {
    /// The plain-text body returned to the gateway.
    pub fn response_text(&self) -> String {
        format!("0|{self}")
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::OrderNotFound | Self::PlanNotFound => 404,
            Self::Persistence(_) => 500,
            _ => 400,
        }
    }
}
