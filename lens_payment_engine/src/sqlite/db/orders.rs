use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, SubscriptionId},
    traits::{is_unique_violation, BillingError},
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// The order always starts out as `Pending`.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, BillingError> {
    let order_id = order.order_id.clone();
    let subscription_id = order.subscription_id.clone();
    let result = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                subscription_id,
                total_amount,
                original_amount,
                currency,
                status,
                payment_details,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, 'Pending', $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.user_id)
    .bind(order.subscription_id)
    .bind(order.total_amount)
    .bind(order.original_amount)
    .bind(order.currency)
    .bind(order.payment_details.to_json())
    .bind(order.created_at)
    .bind(order.created_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => Ok(order),
        Err(e) if is_unique_violation(&e) => match subscription_id {
            Some(sid) => Err(BillingError::RenewalAlreadyPending(sid)),
            None => Err(BillingError::OrderAlreadyExists(order_id)),
        },
        Err(e) => Err(e.into()),
    }
}

/// Returns the entry in the orders table for the corresponding `order_id`
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches every order linked to the subscription, oldest first.
pub async fn fetch_orders_for_subscription(
    subscription_id: &SubscriptionId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE subscription_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(subscription_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

pub async fn fetch_pending_renewal(
    subscription_id: &SubscriptionId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE subscription_id = $1 AND status = 'Pending' LIMIT 1")
        .bind(subscription_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Moves an order out of `Pending` into `status`, replacing its payment details.
///
/// This is a conditional write: if the order is no longer `Pending` (because another notification got there first),
/// no rows change and `false` is returned.
pub async fn transition_from_pending(
    order_id: &OrderId,
    status: OrderStatusType,
    payment_details: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET status = $1, payment_details = $2, updated_at = $3
            WHERE order_id = $4 AND status = 'Pending'
        "#,
    )
    .bind(status)
    .bind(payment_details)
    .bind(now)
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    let changed = result.rows_affected() == 1;
    if changed {
        debug!("🗃️ Order [{order_id}] is now {status}");
    } else {
        trace!("🗃️ Order [{order_id}] was not pending. Status left unchanged");
    }
    Ok(changed)
}

/// Links the order to the given subscription.
pub async fn link_subscription(
    order_id: &OrderId,
    subscription_id: &SubscriptionId,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET subscription_id = $1 WHERE order_id = $2")
        .bind(subscription_id.as_str())
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    trace!("🗃️ Order [{order_id}] linked to subscription {subscription_id}");
    Ok(())
}
