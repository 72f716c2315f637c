use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{NewSubscription, OrderId, Subscription, SubscriptionId};

/// Inserts a new, active subscription with auto-renewal switched off.
///
/// The `origin_order_id` column is unique, so a second subscription for the same order fails with a unique-constraint
/// violation.
pub async fn insert_subscription(
    subscription: NewSubscription,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Subscription, sqlx::Error> {
    let subscription: Subscription = sqlx::query_as(
        r#"
            INSERT INTO subscriptions (
                subscription_id,
                user_id,
                plan_id,
                lens_view_id,
                status,
                start_date,
                end_date,
                auto_renew,
                origin_order_id,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, 'Active', $5, $6, 0, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(subscription.subscription_id)
    .bind(subscription.user_id)
    .bind(subscription.plan_id)
    .bind(subscription.lens_view_id)
    .bind(subscription.start_date)
    .bind(subscription.end_date)
    .bind(subscription.origin_order_id)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ Subscription {} created for user {} until {}",
        subscription.subscription_id, subscription.user_id, subscription.end_date
    );
    Ok(subscription)
}

pub async fn fetch_subscription(
    subscription_id: &SubscriptionId,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    let subscription = sqlx::query_as("SELECT * FROM subscriptions WHERE subscription_id = $1")
        .bind(subscription_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(subscription)
}

pub async fn fetch_subscription_for_origin_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    let subscription = sqlx::query_as("SELECT * FROM subscriptions WHERE origin_order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(subscription)
}

pub async fn fetch_subscriptions_for_user(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Subscription>, sqlx::Error> {
    let mut subscriptions: Vec<Subscription> =
        sqlx::query_as("SELECT * FROM subscriptions WHERE user_id = $1").bind(user_id).fetch_all(conn).await?;
    // Timestamps are stored as text, so sort on the decoded values
    subscriptions.sort_by(|a, b| b.end_date.cmp(&a.end_date));
    Ok(subscriptions)
}

/// Sets the subscription's end date. The caller is responsible for never moving it backwards.
pub async fn update_end_date(
    subscription_id: &SubscriptionId,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    let subscription = sqlx::query_as(
        "UPDATE subscriptions SET end_date = $1, updated_at = $2 WHERE subscription_id = $3 RETURNING *",
    )
    .bind(end_date)
    .bind(now)
    .bind(subscription_id.as_str())
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Subscription {subscription_id} now ends at {end_date}");
    Ok(subscription)
}

/// Cancels the subscription if it is active. Returns `None` if no active subscription with this id exists.
pub async fn cancel_subscription(
    subscription_id: &SubscriptionId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    let subscription = sqlx::query_as(
        r#"
            UPDATE subscriptions SET status = 'Cancelled', auto_renew = 0, cancelled_at = $1, updated_at = $2
            WHERE subscription_id = $3 AND status = 'Active'
            RETURNING *
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(subscription_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(subscription)
}

/// Sets the auto-renew flag if the subscription is active. Returns `None` if no active subscription with this id
/// exists.
pub async fn set_auto_renew(
    subscription_id: &SubscriptionId,
    enabled: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    let subscription = sqlx::query_as(
        r#"
            UPDATE subscriptions SET auto_renew = $1, updated_at = $2
            WHERE subscription_id = $3 AND status = 'Active'
            RETURNING *
        "#,
    )
    .bind(enabled)
    .bind(now)
    .bind(subscription_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(subscription)
}
